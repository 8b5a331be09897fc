use super::lots::{LotPool, SaleId};
use super::matcher::match_sale;
use super::report::Report;
use super::year::{year_range, TaxYear};
use crate::core::{Currency, TransactionLog};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;

/// Settings of a single calculation run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalculationOptions {
    /// Exempt lots held for more than three years
    pub time_test: bool,
    /// Fail instead of warning when a sale is not covered by purchases
    pub strict: bool,
    /// Currency every transaction's rates must convert into
    pub currency: Currency,
}

impl Default for CalculationOptions {
    fn default() -> Self {
        CalculationOptions {
            time_test: true,
            strict: false,
            currency: Currency::CZK,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CalculationError {
    #[error("invalid tax year '{0}'")]
    InvalidYear(String),
    #[error("transaction converts into {found}, report currency is {expected}")]
    CurrencyMismatch { expected: Currency, found: Currency },
    #[error("sale of {required} {item} on {date} matched only {matched} against purchases")]
    UnmatchedQuantity {
        item: String,
        date: NaiveDateTime,
        required: Decimal,
        matched: Decimal,
    },
    #[error("tax year {next} processed after {previous}")]
    YearOutOfOrder { previous: TaxYear, next: TaxYear },
}

/// Compute one report per year, from the first year with a sale or
/// additional income up to `year`, in ascending order.
///
/// Lots are shared across all years so a purchase from any earlier year
/// can be matched by a later sale. The input log is left untouched.
pub fn calculate(
    log: &TransactionLog,
    year: &str,
    options: &CalculationOptions,
) -> Result<Vec<Report>, CalculationError> {
    let target = TaxYear::parse(year)?;
    check_currency(log, options.currency)?;

    let mut log = log.clone();
    log.sort_by_date();

    let mut pool = LotPool::from_purchases(&log.purchases);
    let years = year_range(&log, target);
    log::info!(
        "{}: calculating {} years up to {} from {} transactions",
        log.asset_class.label(),
        years.len(),
        target,
        log.len()
    );

    let mut reports = Vec::with_capacity(years.len());
    for year in years {
        pool.enter_year(year)?;
        let bounds = year.bounds();

        let mut operations = Vec::new();
        for (idx, sale) in log.sales.iter().enumerate() {
            if !bounds.contains(sale.date) {
                continue;
            }
            let operation = match_sale(&mut pool, SaleId(idx), sale, options.time_test);
            if options.strict && !operation.is_fully_matched() {
                return Err(CalculationError::UnmatchedQuantity {
                    item: sale.name.clone(),
                    date: sale.date,
                    required: sale.quantity,
                    matched: operation.matched_quantity(),
                });
            }
            operations.push(operation);
        }

        let dividends = bounds.filter(&log.dividends);
        let incomes = bounds.filter(&log.additional_incomes);
        let fees = bounds.filter(&log.additional_fees);
        log::info!(
            "{} {}: {} sales, {} dividends, {} additional incomes, {} additional fees",
            log.asset_class.label(),
            year,
            operations.len(),
            dividends.len(),
            incomes.len(),
            fees.len()
        );

        reports.push(Report::aggregate(
            year,
            log.asset_class,
            options.currency,
            operations,
            &dividends,
            &incomes,
            &fees,
        ));
    }
    Ok(reports)
}

fn check_currency(log: &TransactionLog, expected: Currency) -> Result<(), CalculationError> {
    match log.rates().find(|rates| rates.to != expected) {
        Some(rates) => Err(CalculationError::CurrencyMismatch {
            expected,
            found: rates.to,
        }),
        None => Ok(()),
    }
}
