use super::money::Currency;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of traded items. Every class has its own lots and its own reports.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
    JsonSchema,
)]
pub enum AssetClass {
    #[default]
    Stock,
    Crypto,
}

impl AssetClass {
    pub const ALL: [AssetClass; 2] = [AssetClass::Stock, AssetClass::Crypto];

    /// Plural label used in report headings
    pub fn label(&self) -> &'static str {
        match self {
            AssetClass::Stock => "Stocks",
            AssetClass::Crypto => "Cryptos",
        }
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetClass::Stock => write!(f, "stock"),
            AssetClass::Crypto => write!(f, "crypto"),
        }
    }
}

/// Exchange rates converting a transaction's currency into the report currency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExchangeRates {
    pub from: Currency,
    pub to: Currency,
    /// Rate on the day of the transaction
    pub day: Decimal,
    /// Unified rate for the year of the transaction
    pub year: Decimal,
}

impl ExchangeRates {
    /// Rates for amounts already in the report currency
    pub fn identity(currency: Currency) -> Self {
        ExchangeRates {
            from: currency,
            to: currency,
            day: Decimal::ONE,
            year: Decimal::ONE,
        }
    }
}

/// A purchase or a sale of some item at a broker
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trade {
    /// Name of the traded item (ticker)
    pub name: String,
    /// Date and time of execution
    pub date: NaiveDateTime,
    /// Count of items, may be fractional
    pub quantity: Decimal,
    /// Price of a single item
    pub item_price: Decimal,
    /// Money sent from (buy) or received to (sell) the bank account
    pub bank_amount: Decimal,
    /// Money used to buy or received from selling the items at the broker
    pub broker_amount: Decimal,
    pub fee: Decimal,
    pub broker: String,
    pub rates: ExchangeRates,
}

/// A dividend payment, gross at the broker and net on the bank account
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dividend {
    pub name: String,
    pub date: NaiveDateTime,
    /// Net amount received
    pub bank_amount: Decimal,
    /// Gross amount before withholding tax
    pub broker_amount: Decimal,
    /// Withholding tax paid at source
    pub fee: Decimal,
    pub broker: String,
    /// Upper-case country of the payer
    pub country: String,
    pub rates: ExchangeRates,
    /// Bank amount before ingestion capped the withholding tax
    pub original_bank_amount: Option<Decimal>,
}

/// Ancillary income or fee not tied to any traded item
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CashFlow {
    pub date: NaiveDateTime,
    pub amount: Decimal,
    pub location: String,
    pub rates: ExchangeRates,
}

/// A single ingested transaction, one variant per role
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum Transaction {
    Buy(Trade),
    Sell(Trade),
    Dividend(Dividend),
    AdditionalIncome(CashFlow),
    AdditionalFee(CashFlow),
}

impl Transaction {
    pub fn date(&self) -> NaiveDateTime {
        match self {
            Transaction::Buy(t) | Transaction::Sell(t) => t.date,
            Transaction::Dividend(d) => d.date,
            Transaction::AdditionalIncome(c) | Transaction::AdditionalFee(c) => c.date,
        }
    }
}

/// Anything placed on the timeline
pub trait Dated {
    fn date(&self) -> NaiveDateTime;
}

impl Dated for Trade {
    fn date(&self) -> NaiveDateTime {
        self.date
    }
}

impl Dated for Dividend {
    fn date(&self) -> NaiveDateTime {
        self.date
    }
}

impl Dated for CashFlow {
    fn date(&self) -> NaiveDateTime {
        self.date
    }
}

/// All transactions of one asset class split by role
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TransactionLog {
    pub asset_class: AssetClass,
    pub purchases: Vec<Trade>,
    pub sales: Vec<Trade>,
    pub dividends: Vec<Dividend>,
    pub additional_incomes: Vec<CashFlow>,
    pub additional_fees: Vec<CashFlow>,
}

impl TransactionLog {
    pub fn from_transactions<I>(asset_class: AssetClass, transactions: I) -> Self
    where
        I: IntoIterator<Item = Transaction>,
    {
        let mut log = TransactionLog {
            asset_class,
            ..Default::default()
        };
        for tx in transactions {
            match tx {
                Transaction::Buy(t) => log.purchases.push(t),
                Transaction::Sell(t) => log.sales.push(t),
                Transaction::Dividend(d) => log.dividends.push(d),
                Transaction::AdditionalIncome(c) => log.additional_incomes.push(c),
                Transaction::AdditionalFee(c) => log.additional_fees.push(c),
            }
        }
        log
    }

    /// Sort every collection by date. Equal dates keep their input order.
    pub fn sort_by_date(&mut self) {
        sort_by_date(&mut self.purchases);
        sort_by_date(&mut self.sales);
        sort_by_date(&mut self.dividends);
        sort_by_date(&mut self.additional_incomes);
        sort_by_date(&mut self.additional_fees);
    }

    pub fn len(&self) -> usize {
        self.purchases.len()
            + self.sales.len()
            + self.dividends.len()
            + self.additional_incomes.len()
            + self.additional_fees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rates of every transaction in the log
    pub fn rates(&self) -> impl Iterator<Item = &ExchangeRates> {
        self.purchases
            .iter()
            .chain(self.sales.iter())
            .map(|t| &t.rates)
            .chain(self.dividends.iter().map(|d| &d.rates))
            .chain(
                self.additional_incomes
                    .iter()
                    .chain(self.additional_fees.iter())
                    .map(|c| &c.rates),
            )
    }
}

fn sort_by_date<T: Dated>(items: &mut [T]) {
    // stable: same-instant transactions stay in input order
    items.sort_by_key(|item| item.date());
}
