use super::calculator::CalculationError;
use crate::core::{Dated, TransactionLog};
use chrono::{Datelike, Days, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;

/// Holding period after which a sale is exempt from tax
pub const TIME_TEST_YEARS: i32 = 3;

/// Calendar tax year (1 January to 31 December)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TaxYear(pub i32);

/// First and last second of a tax year
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearBounds {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TaxYear {
    /// Parse a four digit year. Surrounding whitespace is rejected.
    pub fn parse(s: &str) -> Result<TaxYear, CalculationError> {
        match s.parse::<i32>() {
            Ok(year) if (1000..10000).contains(&year) => Ok(TaxYear(year)),
            _ => Err(CalculationError::InvalidYear(s.to_string())),
        }
    }

    pub fn from_date(date: NaiveDateTime) -> Self {
        TaxYear(date.year())
    }

    pub fn start_date(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.0, 1, 1).expect("tax year within chrono's date range")
    }

    pub fn end_date(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.0, 12, 31).expect("tax year within chrono's date range")
    }

    /// `[1 Jan 00:00:00, 31 Dec 23:59:59]`
    pub fn bounds(&self) -> YearBounds {
        YearBounds {
            start: self.start_date().and_time(NaiveTime::MIN),
            end: self
                .end_date()
                .and_hms_opt(23, 59, 59)
                .expect("23:59:59 is a valid time"),
        }
    }
}

impl std::fmt::Display for TaxYear {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl YearBounds {
    /// Inclusive membership. Both ends are padded outward by one second,
    /// the date must still fall in the calendar year of the bounds so two
    /// consecutive windows never share an instant.
    pub fn contains(&self, date: NaiveDateTime) -> bool {
        let from = self.start - Duration::seconds(1);
        let to = self.end + Duration::seconds(1);
        date > from && date < to && date.year() == self.start.year()
    }

    /// Items dated within the bounds, in their original order
    pub fn filter<'a, T: Dated>(&self, items: &'a [T]) -> Vec<&'a T> {
        items.iter().filter(|item| self.contains(item.date())).collect()
    }
}

/// Years to process: from the earliest sale or additional income up to
/// `target`. Every year in between is included even when empty, lots
/// bought early may be sold years later.
pub fn year_range(log: &TransactionLog, target: TaxYear) -> Vec<TaxYear> {
    let earliest_sale = log.sales.iter().map(|t| t.date).min();
    let earliest_income = log.additional_incomes.iter().map(|c| c.date).min();

    let first = [earliest_sale, earliest_income]
        .into_iter()
        .flatten()
        .min()
        .map(TaxYear::from_date)
        .unwrap_or(target)
        .min(target);

    (first.0..=target.0).map(TaxYear).collect()
}

/// The same instant three years earlier. A 29 February without a
/// counterpart rolls over to 1 March.
pub fn time_test_cutoff(date: NaiveDateTime) -> Option<NaiveDateTime> {
    let year = date.year() - TIME_TEST_YEARS;
    date.with_year(year).or_else(|| {
        date.checked_sub_days(Days::new(1))
            .and_then(|d| d.with_year(year))
            .and_then(|d| d.checked_add_days(Days::new(1)))
    })
}
