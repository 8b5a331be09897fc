pub mod money;
pub mod transaction;
pub mod warnings;

// Flat public surface for domain types.
pub use money::{AccountingValue, Currency, UnsupportedCurrency, ValueWithFee};
pub use transaction::{
    AssetClass, CashFlow, Dated, Dividend, ExchangeRates, Trade, Transaction, TransactionLog,
};
pub use warnings::Warning;
