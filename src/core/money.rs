use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};
use std::str::FromStr;

use super::transaction::ExchangeRates;

/// Currencies accepted in the transaction log
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
    JsonSchema,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    CZK,
    EUR,
    USD,
}

impl Currency {
    pub fn code(&self) -> &'static str {
        match self {
            Currency::CZK => "CZK",
            Currency::EUR => "EUR",
            Currency::USD => "USD",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::CZK => "Kč",
            Currency::EUR => "€",
            Currency::USD => "$",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported currency '{0}'")]
pub struct UnsupportedCurrency(pub String);

impl FromStr for Currency {
    type Err = UnsupportedCurrency;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "CZK" => Ok(Currency::CZK),
            "EUR" => Ok(Currency::EUR),
            "USD" => Ok(Currency::USD),
            _ => Err(UnsupportedCurrency(s.to_string())),
        }
    }
}

/// One economic amount valued twice: at the exchange rate of the
/// transaction day and at the unified rate of the year.
///
/// Both components always move together; adding values of different
/// currencies is a bug in the caller and panics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct AccountingValue {
    pub at_day_rate: Decimal,
    pub at_year_rate: Decimal,
    pub currency: Currency,
}

impl AccountingValue {
    pub fn new(at_day_rate: Decimal, at_year_rate: Decimal, currency: Currency) -> Self {
        AccountingValue {
            at_day_rate,
            at_year_rate,
            currency,
        }
    }

    pub fn zero(currency: Currency) -> Self {
        AccountingValue::new(Decimal::ZERO, Decimal::ZERO, currency)
    }

    /// Value a raw transaction amount at the transaction's own rates
    pub fn convert(amount: Decimal, rates: &ExchangeRates) -> Self {
        AccountingValue::new(amount * rates.day, amount * rates.year, rates.to)
    }

    /// New value with both components multiplied by `ratio`
    pub fn scale(&self, ratio: Decimal) -> Self {
        AccountingValue::new(self.at_day_rate * ratio, self.at_year_rate * ratio, self.currency)
    }

    pub fn is_zero(&self) -> bool {
        self.at_day_rate.is_zero() && self.at_year_rate.is_zero()
    }

    fn check_currency(&self, other: &AccountingValue) {
        assert_eq!(
            self.currency, other.currency,
            "cannot combine {} and {} values",
            self.currency, other.currency
        );
    }
}

impl AddAssign for AccountingValue {
    fn add_assign(&mut self, other: AccountingValue) {
        self.check_currency(&other);
        self.at_day_rate += other.at_day_rate;
        self.at_year_rate += other.at_year_rate;
    }
}

impl SubAssign for AccountingValue {
    fn sub_assign(&mut self, other: AccountingValue) {
        self.check_currency(&other);
        self.at_day_rate -= other.at_day_rate;
        self.at_year_rate -= other.at_year_rate;
    }
}

impl Add for AccountingValue {
    type Output = AccountingValue;

    fn add(mut self, other: AccountingValue) -> AccountingValue {
        self += other;
        self
    }
}

impl Sub for AccountingValue {
    type Output = AccountingValue;

    fn sub(mut self, other: AccountingValue) -> AccountingValue {
        self -= other;
        self
    }
}

impl fmt::Display for AccountingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "day: {} {:.2}, year: {} {:.2}",
            self.currency.symbol(),
            self.at_day_rate,
            self.currency.symbol(),
            self.at_year_rate
        )
    }
}

/// A revenue or expense together with the fee paid on it. Kept apart
/// because fees and values are reported separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ValueWithFee {
    pub value: AccountingValue,
    pub fee: AccountingValue,
}

impl ValueWithFee {
    pub fn new(value: AccountingValue, fee: AccountingValue) -> Self {
        ValueWithFee { value, fee }
    }

    pub fn zero(currency: Currency) -> Self {
        ValueWithFee::new(AccountingValue::zero(currency), AccountingValue::zero(currency))
    }

    pub fn scale(&self, ratio: Decimal) -> Self {
        ValueWithFee::new(self.value.scale(ratio), self.fee.scale(ratio))
    }

    /// Value less fee
    pub fn net(&self) -> AccountingValue {
        self.value - self.fee
    }
}

impl AddAssign for ValueWithFee {
    fn add_assign(&mut self, other: ValueWithFee) {
        self.value += other.value;
        self.fee += other.fee;
    }
}

impl SubAssign for ValueWithFee {
    fn sub_assign(&mut self, other: ValueWithFee) {
        self.value -= other.value;
        self.fee -= other.fee;
    }
}

impl Sub for ValueWithFee {
    type Output = ValueWithFee;

    fn sub(mut self, other: ValueWithFee) -> ValueWithFee {
        self -= other;
        self
    }
}

impl fmt::Display for ValueWithFee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "value: ({}) fee: ({})", self.value, self.fee)
    }
}
