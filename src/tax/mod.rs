pub mod calculator;
pub mod lots;
pub mod matcher;
pub mod report;
pub mod year;

pub use calculator::{calculate, CalculationError, CalculationOptions};
pub use lots::{Lot, LotId, LotPool, SaleId};
pub use matcher::{match_sale, Consumption, SellOperation};
pub use report::{DividendBreakdown, Report};
pub use year::{time_test_cutoff, year_range, TaxYear, YearBounds, TIME_TEST_YEARS};
