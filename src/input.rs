use crate::core::{
    AssetClass, CashFlow, Currency, Dividend, ExchangeRates, Trade, Transaction, TransactionLog,
};
use crate::rates::{RateError, RateSource};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer};
use std::io::Read;

/// Highest withholding tax credited on a dividend
pub const MAX_WITHHOLDING_TAX: Decimal = dec!(0.15);

const AMOUNT_TOLERANCE: Decimal = dec!(0.0001);
const WITHHOLDING_TOLERANCE: Decimal = dec!(0.01);

#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("transaction {index}: {source}")]
    Rate { index: usize, source: RateError },
    #[error("transaction {index}: {reason}")]
    Invalid { index: usize, reason: String },
    #[error("invalid datetime: {0}")]
    InvalidDatetime(String),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Input root for transaction JSON
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct TransactionInput {
    pub transactions: Vec<TransactionRecord>,
}

/// Transaction record with common fields + type-specific data
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct TransactionRecord {
    /// When the transaction happened (YYYY-MM-DD, optionally with HH:MM:SS)
    #[serde(deserialize_with = "deserialize_datetime")]
    #[schemars(with = "String")]
    pub date: NaiveDateTime,
    /// Currency of all amounts of the record: CZK, EUR or USD
    #[serde(deserialize_with = "deserialize_currency")]
    #[schemars(with = "String")]
    pub currency: Currency,
    /// CZK per unit on the transaction day, looked up when missing
    #[serde(default)]
    #[schemars(with = "Option<f64>")]
    pub day_rate: Option<Decimal>,
    /// Unified CZK per unit for the year, looked up when missing
    #[serde(default)]
    #[schemars(with = "Option<f64>")]
    pub year_rate: Option<Decimal>,
    /// Stock (default) or Crypto, lots of different classes never mix
    #[serde(default)]
    pub asset_class: AssetClass,
    #[serde(flatten)]
    pub details: RecordDetails,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(tag = "type")]
pub enum RecordDetails {
    /// Purchase of some item at a broker
    Buy(TradeRecord),
    /// Sale of previously bought items
    Sell(TradeRecord),
    /// Dividend, gross at the broker and net on the bank account
    Dividend(DividendRecord),
    /// Taxable income unrelated to traded items
    AdditionalIncome(CashFlowRecord),
    /// Fee unrelated to traded items
    AdditionalFee(CashFlowRecord),
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct TradeRecord {
    /// Ticker or name of the item
    pub name: String,
    #[schemars(with = "f64")]
    pub quantity: Decimal,
    #[schemars(with = "f64")]
    pub item_price: Decimal,
    /// Amount paid for (buy) or received for (sell) the items at the broker
    #[schemars(with = "f64")]
    pub broker_amount: Decimal,
    #[serde(default)]
    #[schemars(with = "f64")]
    pub fee: Decimal,
    /// Amount leaving (buy) or reaching (sell) the bank account, derived from
    /// broker amount and fee when missing
    #[serde(default)]
    #[schemars(with = "Option<f64>")]
    pub bank_amount: Option<Decimal>,
    #[serde(default)]
    pub broker: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DividendRecord {
    pub name: String,
    /// Gross dividend
    #[schemars(with = "f64")]
    pub broker_amount: Decimal,
    /// Net dividend after withholding tax
    #[schemars(with = "f64")]
    pub bank_amount: Decimal,
    /// Country of the payer
    pub country: String,
    #[serde(default)]
    pub broker: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CashFlowRecord {
    #[schemars(with = "f64")]
    pub amount: Decimal,
    #[serde(default)]
    pub location: String,
}

/// Read transaction records from JSON
pub fn read_transactions_json<R: Read>(reader: R) -> Result<Vec<TransactionRecord>, InputError> {
    let input: TransactionInput = serde_json::from_reader(reader)?;
    log::debug!("Read {} transaction records", input.transactions.len());
    Ok(input.transactions)
}

/// Validate the records of one asset class, resolve their exchange rates
/// and split them by role. Error indexes refer to the whole record list.
pub fn records_to_log(
    records: &[TransactionRecord],
    asset_class: AssetClass,
    rates: &dyn RateSource,
) -> Result<TransactionLog, InputError> {
    let transactions = records
        .iter()
        .enumerate()
        .filter(|(_, record)| record.asset_class == asset_class)
        .map(|(index, record)| record.to_transaction(index, rates))
        .collect::<Result<Vec<_>, _>>()?;
    let log = TransactionLog::from_transactions(asset_class, transactions);
    log::info!(
        "{}: ingested {} purchases, {} sales, {} dividends, {} additional incomes, {} additional fees",
        asset_class.label(),
        log.purchases.len(),
        log.sales.len(),
        log.dividends.len(),
        log.additional_incomes.len(),
        log.additional_fees.len()
    );
    Ok(log)
}

/// One log per asset class. Stocks are always present, cryptos only when
/// some record is a crypto one.
pub fn records_to_logs(
    records: &[TransactionRecord],
    rates: &dyn RateSource,
) -> Result<Vec<TransactionLog>, InputError> {
    let mut logs = Vec::new();
    for asset_class in AssetClass::ALL {
        let present = records.iter().any(|record| record.asset_class == asset_class);
        if present || asset_class == AssetClass::Stock {
            logs.push(records_to_log(records, asset_class, rates)?);
        }
    }
    Ok(logs)
}

impl TransactionRecord {
    pub fn to_transaction(
        &self,
        index: usize,
        source: &dyn RateSource,
    ) -> Result<Transaction, InputError> {
        let invalid = |reason: String| InputError::Invalid { index, reason };
        let rates = self
            .exchange_rates(source)
            .map_err(|err| InputError::Rate { index, source: err })?;
        if rates.day <= Decimal::ZERO || rates.year <= Decimal::ZERO {
            return Err(invalid(format!(
                "exchange rates must be positive, got day {} and year {}",
                rates.day, rates.year
            )));
        }

        let tx = match &self.details {
            RecordDetails::Buy(trade) => {
                let bank_amount = trade.bank_amount.unwrap_or(trade.broker_amount + trade.fee);
                if !leq_with_tolerance(trade.broker_amount, bank_amount, AMOUNT_TOLERANCE) {
                    return Err(invalid(format!(
                        "bank amount {} is lower than broker amount {}",
                        bank_amount, trade.broker_amount
                    )));
                }
                let expected = trade.broker_amount + trade.fee;
                if !eq_with_tolerance(expected, bank_amount, AMOUNT_TOLERANCE) {
                    return Err(invalid(format!(
                        "bank amount {} is not broker amount {} plus fee {}",
                        bank_amount, trade.broker_amount, trade.fee
                    )));
                }
                Transaction::Buy(self.trade(trade, bank_amount, rates, index)?)
            }
            RecordDetails::Sell(trade) => {
                let bank_amount = trade.bank_amount.unwrap_or(trade.broker_amount - trade.fee);
                if !leq_with_tolerance(bank_amount, trade.broker_amount, AMOUNT_TOLERANCE) {
                    return Err(invalid(format!(
                        "bank amount {} is greater than broker amount {}",
                        bank_amount, trade.broker_amount
                    )));
                }
                let expected = trade.broker_amount - trade.fee;
                if !eq_with_tolerance(bank_amount, expected, AMOUNT_TOLERANCE) {
                    return Err(invalid(format!(
                        "bank amount {} is not broker amount {} less fee {}",
                        bank_amount, trade.broker_amount, trade.fee
                    )));
                }
                Transaction::Sell(self.trade(trade, bank_amount, rates, index)?)
            }
            RecordDetails::Dividend(_) if self.asset_class != AssetClass::Stock => {
                return Err(invalid(format!(
                    "dividends are only accepted for stocks, not {}",
                    self.asset_class
                )));
            }
            RecordDetails::Dividend(dividend) => {
                Transaction::Dividend(self.dividend(dividend, rates, index)?)
            }
            RecordDetails::AdditionalIncome(cash) => {
                Transaction::AdditionalIncome(self.cash_flow(cash, rates))
            }
            RecordDetails::AdditionalFee(cash) => {
                Transaction::AdditionalFee(self.cash_flow(cash, rates))
            }
        };
        Ok(tx)
    }

    fn exchange_rates(&self, source: &dyn RateSource) -> Result<ExchangeRates, RateError> {
        if self.currency == Currency::CZK {
            return Ok(ExchangeRates::identity(Currency::CZK));
        }
        let day = match self.day_rate {
            Some(rate) => rate,
            None => source.day_rate(self.currency, self.date.date())?,
        };
        let year = match self.year_rate {
            Some(rate) => rate,
            None => source.year_rate(self.currency, self.date.year())?,
        };
        Ok(ExchangeRates {
            from: self.currency,
            to: Currency::CZK,
            day,
            year,
        })
    }

    fn trade(
        &self,
        trade: &TradeRecord,
        bank_amount: Decimal,
        rates: ExchangeRates,
        index: usize,
    ) -> Result<Trade, InputError> {
        if trade.quantity < Decimal::ZERO || trade.fee < Decimal::ZERO {
            return Err(InputError::Invalid {
                index,
                reason: format!("negative quantity {} or fee {}", trade.quantity, trade.fee),
            });
        }
        Ok(Trade {
            name: trade.name.clone(),
            date: self.date,
            quantity: trade.quantity,
            item_price: trade.item_price,
            bank_amount,
            broker_amount: trade.broker_amount,
            fee: trade.fee,
            broker: trade.broker.clone(),
            rates,
        })
    }

    fn dividend(
        &self,
        dividend: &DividendRecord,
        rates: ExchangeRates,
        index: usize,
    ) -> Result<Dividend, InputError> {
        let country = dividend.country.to_uppercase();
        if country.is_empty() {
            return Err(InputError::Invalid {
                index,
                reason: "dividend without country".to_string(),
            });
        }
        if !leq_with_tolerance(dividend.bank_amount, dividend.broker_amount, AMOUNT_TOLERANCE) {
            return Err(InputError::Invalid {
                index,
                reason: format!(
                    "bank amount {} is greater than broker amount {}",
                    dividend.bank_amount, dividend.broker_amount
                ),
            });
        }

        let mut bank_amount = dividend.bank_amount;
        let mut original_bank_amount = None;
        let paid_tax = Decimal::ONE
            - dividend
                .bank_amount
                .checked_div(dividend.broker_amount)
                .unwrap_or(Decimal::ONE);
        if !leq_with_tolerance(paid_tax, MAX_WITHHOLDING_TAX, WITHHOLDING_TOLERANCE) {
            bank_amount = dividend.broker_amount * (Decimal::ONE - MAX_WITHHOLDING_TAX);
            original_bank_amount = Some(dividend.bank_amount);
            log::warn!(
                "Withholding tax {} on {} dividend from {} exceeds {}, adjusting bank amount from {} to {}",
                paid_tax.round_dp(4),
                dividend.name,
                self.date,
                MAX_WITHHOLDING_TAX,
                dividend.bank_amount,
                bank_amount
            );
        }

        Ok(Dividend {
            name: dividend.name.clone(),
            date: self.date,
            bank_amount,
            broker_amount: dividend.broker_amount,
            fee: dividend.broker_amount - bank_amount,
            broker: dividend.broker.clone(),
            country,
            rates,
            original_bank_amount,
        })
    }

    fn cash_flow(&self, cash: &CashFlowRecord, rates: ExchangeRates) -> CashFlow {
        CashFlow {
            date: self.date,
            amount: cash.amount,
            location: cash.location.clone(),
            rates,
        }
    }
}

fn leq_with_tolerance(a: Decimal, b: Decimal, tolerance: Decimal) -> bool {
    a <= b + tolerance
}

fn eq_with_tolerance(a: Decimal, b: Decimal, tolerance: Decimal) -> bool {
    (a - b).abs() <= tolerance
}

fn parse_datetime(s: &str) -> Result<NaiveDateTime, InputError> {
    let s = s.trim();
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Ok(dt);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Ok(dt);
    }
    if let Some(dt) = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
    {
        return Ok(dt);
    }
    Err(InputError::InvalidDatetime(s.to_string()))
}

fn deserialize_datetime<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    parse_datetime(&s).map_err(|err| serde::de::Error::custom(err.to_string()))
}

fn deserialize_currency<'de, D>(deserializer: D) -> Result<Currency, D::Error>
where
    D: Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    s.parse()
        .map_err(|err: crate::core::UnsupportedCurrency| serde::de::Error::custom(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rates::RateBook;

    fn dt(s: &str) -> NaiveDateTime {
        parse_datetime(s).unwrap()
    }

    fn parse(json: &str) -> Vec<TransactionRecord> {
        read_transactions_json(json.as_bytes()).unwrap()
    }

    fn ingest(json: &str) -> Result<TransactionLog, InputError> {
        records_to_log(&parse(json), AssetClass::Stock, &RateBook::new())
    }

    #[test]
    fn parse_datetime_formats() {
        assert_eq!(dt("2022-06-01"), dt("2022-06-01 00:00:00"));
        assert_eq!(dt("2022-06-01T10:30:00"), dt("2022-06-01 10:30:00"));
        assert!(matches!(
            parse_datetime("01.06.2022"),
            Err(InputError::InvalidDatetime(_))
        ));
    }

    #[test]
    fn reads_every_record_type() {
        let log = ingest(
            r#"{"transactions": [
                {"type": "Buy", "date": "2021-01-04", "currency": "usd", "day_rate": 21.5, "year_rate": 21.72,
                 "name": "AAPL", "quantity": 10, "item_price": 130, "broker_amount": 1300, "fee": 1, "broker": "Degiro"},
                {"type": "Sell", "date": "2022-06-01 15:00:00", "currency": "USD", "day_rate": "23.1", "year_rate": "23.41",
                 "name": "AAPL", "quantity": 4, "item_price": 150, "broker_amount": 600, "fee": 2, "bank_amount": 598},
                {"type": "Dividend", "date": "2022-05-12", "currency": "CZK",
                 "name": "CEZ", "broker_amount": 100, "bank_amount": 85, "country": "cz"},
                {"type": "AdditionalIncome", "date": "2022-03-01", "currency": "EUR", "day_rate": 24.5, "year_rate": 24.54,
                 "amount": 12.5, "location": "bank"},
                {"type": "AdditionalFee", "date": "2022-03-01", "currency": "czk", "amount": 30}
            ]}"#,
        )
        .unwrap();

        assert_eq!(log.len(), 5);
        let buy = &log.purchases[0];
        assert_eq!(buy.bank_amount, dec!(1301));
        assert_eq!(buy.rates.day, dec!(21.5));
        assert_eq!(buy.rates.from, Currency::USD);
        assert_eq!(buy.broker, "Degiro");
        assert_eq!(log.sales[0].bank_amount, dec!(598));
        assert_eq!(log.sales[0].date, dt("2022-06-01 15:00:00"));
        assert_eq!(log.dividends[0].country, "CZ");
        assert_eq!(log.dividends[0].fee, dec!(15));
        assert_eq!(log.dividends[0].rates, ExchangeRates::identity(Currency::CZK));
        assert_eq!(log.additional_incomes[0].amount, dec!(12.5));
        assert_eq!(log.additional_fees[0].location, "");
    }

    #[test]
    fn missing_rates_come_from_the_book() {
        let mut book = RateBook::new();
        let day = NaiveDate::from_ymd_opt(2022, 6, 1).unwrap();
        book.insert_day_rate(Currency::USD, day, dec!(23.1));
        let records = parse(
            r#"{"transactions": [{"type": "AdditionalIncome", "date": "2022-06-03", "currency": "USD", "amount": 1}]}"#,
        );
        let log = records_to_log(&records, AssetClass::Stock, &book).unwrap();
        let rates = log.additional_incomes[0].rates;
        assert_eq!(rates.day, dec!(23.1));
        assert_eq!(rates.year, dec!(23.41));
    }

    #[test]
    fn missing_rate_reports_record_index() {
        let err = ingest(
            r#"{"transactions": [
                {"type": "AdditionalFee", "date": "2022-03-01", "currency": "CZK", "amount": 30},
                {"type": "AdditionalFee", "date": "2022-03-01", "currency": "USD", "amount": 30}
            ]}"#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            InputError::Rate {
                index: 1,
                source: RateError::MissingDay { .. }
            }
        ));
    }

    #[test]
    fn buy_bank_amount_must_cover_fee() {
        let err = ingest(
            r#"{"transactions": [{"type": "Buy", "date": "2021-01-04", "currency": "CZK",
                "name": "CEZ", "quantity": 1, "item_price": 100, "broker_amount": 100, "fee": 1, "bank_amount": 100.5}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, InputError::Invalid { index: 0, .. }));
    }

    #[test]
    fn buy_bank_amount_within_tolerance() {
        let log = ingest(
            r#"{"transactions": [{"type": "Buy", "date": "2021-01-04", "currency": "CZK",
                "name": "CEZ", "quantity": 1, "item_price": 100, "broker_amount": 100, "fee": 1, "bank_amount": 101.00005}]}"#,
        )
        .unwrap();
        assert_eq!(log.purchases[0].bank_amount, dec!(101.00005));
    }

    #[test]
    fn sell_bank_amount_cannot_exceed_broker_amount() {
        let err = ingest(
            r#"{"transactions": [{"type": "Sell", "date": "2021-01-04", "currency": "CZK",
                "name": "CEZ", "quantity": 1, "item_price": 100, "broker_amount": 100, "bank_amount": 101}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, InputError::Invalid { .. }));
    }

    #[test]
    fn sell_bank_amount_defaults_to_broker_less_fee() {
        let log = ingest(
            r#"{"transactions": [{"type": "Sell", "date": "2021-01-04", "currency": "CZK",
                "name": "CEZ", "quantity": 1, "item_price": 100, "broker_amount": 100, "fee": 3}]}"#,
        )
        .unwrap();
        assert_eq!(log.sales[0].bank_amount, dec!(97));
    }

    #[test]
    fn dividend_withholding_capped() {
        let log = ingest(
            r#"{"transactions": [{"type": "Dividend", "date": "2022-05-12", "currency": "CZK",
                "name": "X", "broker_amount": 100, "bank_amount": 70, "country": "de", "broker": "Fio"}]}"#,
        )
        .unwrap();
        let dividend = &log.dividends[0];
        assert_eq!(dividend.bank_amount, dec!(85.00));
        assert_eq!(dividend.fee, dec!(15));
        assert_eq!(dividend.original_bank_amount, Some(dec!(70)));
    }

    #[test]
    fn dividend_withholding_within_tolerance_is_kept() {
        let log = ingest(
            r#"{"transactions": [{"type": "Dividend", "date": "2022-05-12", "currency": "CZK",
                "name": "X", "broker_amount": 100, "bank_amount": 84.5, "country": "US"}]}"#,
        )
        .unwrap();
        assert_eq!(log.dividends[0].bank_amount, dec!(84.5));
        assert_eq!(log.dividends[0].original_bank_amount, None);
    }

    #[test]
    fn dividend_requires_country() {
        let err = ingest(
            r#"{"transactions": [{"type": "Dividend", "date": "2022-05-12", "currency": "CZK",
                "name": "X", "broker_amount": 100, "bank_amount": 85, "country": ""}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, InputError::Invalid { .. }));
    }

    #[test]
    fn unsupported_currency_fails_to_parse() {
        let result = read_transactions_json(
            r#"{"transactions": [{"type": "AdditionalFee", "date": "2022-03-01", "currency": "GBP", "amount": 1}]}"#
                .as_bytes(),
        );
        assert!(matches!(result, Err(InputError::Json(_))));
    }

    #[test]
    fn non_positive_explicit_rate_rejected() {
        let err = ingest(
            r#"{"transactions": [{"type": "AdditionalFee", "date": "2022-03-01", "currency": "EUR",
                "day_rate": 0, "year_rate": 24.54, "amount": 1}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, InputError::Invalid { .. }));
    }

    #[test]
    fn asset_classes_are_ingested_separately() {
        let records = parse(
            r#"{"transactions": [
                {"type": "Buy", "date": "2021-01-04", "currency": "CZK",
                 "name": "CEZ", "quantity": 1, "item_price": 100, "broker_amount": 100},
                {"type": "Buy", "date": "2021-02-04", "currency": "CZK", "asset_class": "Crypto",
                 "name": "BTC", "quantity": 0.5, "item_price": 800000, "broker_amount": 400000},
                {"type": "AdditionalFee", "date": "2021-03-01", "currency": "CZK", "asset_class": "Crypto",
                 "amount": 50}
            ]}"#,
        );
        assert_eq!(records[0].asset_class, AssetClass::Stock);

        let logs = records_to_logs(&records, &RateBook::new()).unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].asset_class, AssetClass::Stock);
        assert_eq!(logs[0].purchases.len(), 1);
        assert_eq!(logs[0].purchases[0].name, "CEZ");
        assert_eq!(logs[1].asset_class, AssetClass::Crypto);
        assert_eq!(logs[1].purchases[0].name, "BTC");
        assert_eq!(logs[1].additional_fees.len(), 1);
    }

    #[test]
    fn stock_log_is_present_without_stock_records() {
        let records = parse(
            r#"{"transactions": [{"type": "AdditionalIncome", "date": "2021-03-01", "currency": "CZK",
                "asset_class": "Crypto", "amount": 50}]}"#,
        );
        let logs = records_to_logs(&records, &RateBook::new()).unwrap();
        let classes: Vec<_> = logs.iter().map(|log| log.asset_class).collect();
        assert_eq!(classes, vec![AssetClass::Stock, AssetClass::Crypto]);
        assert!(logs[0].is_empty());
    }

    #[test]
    fn crypto_dividend_is_rejected() {
        let records = parse(
            r#"{"transactions": [
                {"type": "AdditionalFee", "date": "2022-03-01", "currency": "CZK", "amount": 30},
                {"type": "Dividend", "date": "2022-05-12", "currency": "CZK", "asset_class": "Crypto",
                 "name": "ETH", "broker_amount": 100, "bank_amount": 100, "country": "US"}
            ]}"#,
        );
        let err = records_to_logs(&records, &RateBook::new()).unwrap_err();
        assert!(matches!(err, InputError::Invalid { index: 1, .. }));
    }
}
