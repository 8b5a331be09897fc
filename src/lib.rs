pub mod core;
pub mod export;
pub mod input;
pub mod rates;
pub mod tax;
