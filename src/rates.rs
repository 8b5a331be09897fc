//! Exchange rates into Czech crowns.
//!
//! Two conventions exist side by side: the Czech National Bank rate of the
//! transaction day and the unified yearly rate published by the Ministry of
//! Finance. Yearly rates for the supported currencies are embedded, day
//! rates are loaded from a CSV export.

use crate::core::Currency;
use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Read;

/// How many days back a missing day rate may be taken from
pub const MAX_FALLBACK_DAYS: u64 = 7;

/// Unified yearly rates: year, EUR, USD
const UNIFIED_RATES: [(i32, Decimal, Decimal); 13] = [
    (2011, dec!(24.60), dec!(17.60)),
    (2012, dec!(25.12), dec!(19.45)),
    (2013, dec!(26.03), dec!(19.56)),
    (2014, dec!(27.55), dec!(20.90)),
    (2015, dec!(27.27), dec!(24.69)),
    (2016, dec!(27.04), dec!(24.53)),
    (2017, dec!(26.29), dec!(23.18)),
    (2018, dec!(25.68), dec!(21.78)),
    (2019, dec!(25.66), dec!(22.93)),
    (2020, dec!(26.50), dec!(23.14)),
    (2021, dec!(25.65), dec!(21.72)),
    (2022, dec!(24.54), dec!(23.41)),
    (2023, dec!(23.97), dec!(22.14)),
];

#[derive(Debug, thiserror::Error)]
pub enum RateError {
    #[error("no {currency} day rate for {date} or the week before")]
    MissingDay { currency: Currency, date: NaiveDate },
    #[error("no {currency} unified rate for {year}")]
    MissingYear { currency: Currency, year: i32 },
    #[error("invalid rate record on line {line}: {reason}")]
    InvalidRecord { line: u64, reason: String },
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

/// Provider of CZK rates, both quoted as crowns per one unit
pub trait RateSource {
    fn day_rate(&self, currency: Currency, date: NaiveDate) -> Result<Decimal, RateError>;

    fn year_rate(&self, currency: Currency, year: i32) -> Result<Decimal, RateError>;
}

/// In-memory rate tables
#[derive(Debug, Clone)]
pub struct RateBook {
    daily: HashMap<(Currency, NaiveDate), Decimal>,
    yearly: HashMap<(Currency, i32), Decimal>,
}

#[derive(Debug, Deserialize)]
struct DailyRecord {
    date: String,
    currency: String,
    amount: Decimal,
    rate: Decimal,
}

#[derive(Debug, Deserialize)]
struct YearlyRecord {
    year: i32,
    currency: String,
    rate: Decimal,
}

impl Default for RateBook {
    fn default() -> Self {
        Self::new()
    }
}

impl RateBook {
    /// Book with the embedded unified yearly rates and no day rates
    pub fn new() -> Self {
        let mut yearly = HashMap::new();
        for (year, eur, usd) in UNIFIED_RATES {
            yearly.insert((Currency::EUR, year), eur);
            yearly.insert((Currency::USD, year), usd);
        }
        RateBook {
            daily: HashMap::new(),
            yearly,
        }
    }

    pub fn insert_day_rate(&mut self, currency: Currency, date: NaiveDate, rate: Decimal) {
        self.daily.insert((currency, date), rate);
    }

    pub fn insert_year_rate(&mut self, currency: Currency, year: i32, rate: Decimal) {
        self.yearly.insert((currency, year), rate);
    }

    /// Load day rates from CSV with the header `date,currency,amount,rate`.
    ///
    /// `amount` is the quoted unit count, the stored rate is `rate / amount`.
    /// Rows of unsupported currencies are skipped.
    pub fn read_daily_csv<R: Read>(&mut self, reader: R) -> Result<usize, RateError> {
        let mut rdr = csv::Reader::from_reader(reader);
        let mut count = 0;
        for (idx, result) in rdr.deserialize::<DailyRecord>().enumerate() {
            let record = result?;
            let line = idx as u64 + 2;
            let Some(currency) = parse_currency(&record.currency) else {
                continue;
            };
            let date = parse_date(&record.date).ok_or_else(|| RateError::InvalidRecord {
                line,
                reason: format!("invalid date '{}'", record.date),
            })?;
            let rate = record
                .rate
                .checked_div(record.amount)
                .filter(|rate| *rate > Decimal::ZERO)
                .ok_or_else(|| RateError::InvalidRecord {
                    line,
                    reason: format!("invalid rate {} per {}", record.rate, record.amount),
                })?;
            self.insert_day_rate(currency, date, rate);
            count += 1;
        }
        log::debug!("Loaded {} day rates", count);
        Ok(count)
    }

    /// Load unified yearly rates from CSV with the header `year,currency,rate`.
    /// Loaded rates replace embedded ones.
    pub fn read_yearly_csv<R: Read>(&mut self, reader: R) -> Result<usize, RateError> {
        let mut rdr = csv::Reader::from_reader(reader);
        let mut count = 0;
        for (idx, result) in rdr.deserialize::<YearlyRecord>().enumerate() {
            let record = result?;
            let Some(currency) = parse_currency(&record.currency) else {
                continue;
            };
            if record.rate <= Decimal::ZERO {
                return Err(RateError::InvalidRecord {
                    line: idx as u64 + 2,
                    reason: format!("invalid rate {}", record.rate),
                });
            }
            self.insert_year_rate(currency, record.year, record.rate);
            count += 1;
        }
        log::debug!("Loaded {} yearly rates", count);
        Ok(count)
    }
}

impl RateSource for RateBook {
    /// Rate of `date`, or of the closest earlier day with a rate (weekends
    /// and bank holidays have none).
    fn day_rate(&self, currency: Currency, date: NaiveDate) -> Result<Decimal, RateError> {
        if currency == Currency::CZK {
            return Ok(Decimal::ONE);
        }
        for back in 0..=MAX_FALLBACK_DAYS {
            let Some(day) = date.checked_sub_days(Days::new(back)) else {
                break;
            };
            if let Some(rate) = self.daily.get(&(currency, day)) {
                if back > 0 {
                    log::debug!("{} rate for {} taken from {}", currency, date, day);
                }
                return Ok(*rate);
            }
        }
        Err(RateError::MissingDay { currency, date })
    }

    fn year_rate(&self, currency: Currency, year: i32) -> Result<Decimal, RateError> {
        if currency == Currency::CZK {
            return Ok(Decimal::ONE);
        }
        self.yearly
            .get(&(currency, year))
            .copied()
            .ok_or(RateError::MissingYear { currency, year })
    }
}

fn parse_currency(s: &str) -> Option<Currency> {
    match s.parse() {
        Ok(currency) => Some(currency),
        Err(err) => {
            log::debug!("Skipping rate: {}", err);
            None
        }
    }
}

/// ISO dates or the `DD.MM.YYYY` form of bank exports
fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%d.%m.%Y"))
        .ok()
}
