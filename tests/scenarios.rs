//! Whole-portfolio calculations through the library API

use cztax::core::{AccountingValue, AssetClass, Currency, TransactionLog};
use cztax::input::{read_transactions_json, records_to_log, records_to_logs};
use cztax::rates::RateBook;
use cztax::tax::{calculate, CalculationOptions, Report, TaxYear};
use rust_decimal_macros::dec;

fn run(json: &str, year: &str) -> Vec<Report> {
    let records = read_transactions_json(json.as_bytes()).expect("valid input");
    let log: TransactionLog =
        records_to_log(&records, AssetClass::Stock, &RateBook::new()).expect("valid records");
    calculate(&log, year, &CalculationOptions::default()).expect("calculation succeeds")
}

fn czk(day: rust_decimal::Decimal, year: rust_decimal::Decimal) -> AccountingValue {
    AccountingValue::new(day, year, Currency::CZK)
}

#[test]
fn lot_held_over_three_years_is_exempt() {
    let reports = run(
        r#"{"transactions": [
            {"type": "Buy", "date": "2019-01-01", "currency": "USD", "day_rate": 22, "year_rate": 22.93,
             "name": "AAPL", "quantity": 10, "item_price": 100, "broker_amount": 1000, "fee": 1},
            {"type": "Sell", "date": "2022-06-01", "currency": "USD", "day_rate": 23, "year_rate": 23.41,
             "name": "AAPL", "quantity": 10, "item_price": 150, "broker_amount": 1500, "fee": 2}
        ]}"#,
        "2022",
    );
    assert_eq!(reports.len(), 1);
    let report = &reports[0];
    assert_eq!(report.time_tested_revenue, report.total_revenue);
    assert_eq!(report.total_expense.value, czk(dec!(22022), dec!(22952.93)));
    assert!(report.non_time_tested_revenue().is_zero());
}

#[test]
fn sale_spanning_two_lots() {
    let reports = run(
        r#"{"transactions": [
            {"type": "Buy", "date": "2021-01-04", "currency": "CZK", "name": "CEZ", "quantity": 5, "item_price": 100, "broker_amount": 500},
            {"type": "Buy", "date": "2021-02-04", "currency": "CZK", "name": "CEZ", "quantity": 5, "item_price": 120, "broker_amount": 600},
            {"type": "Sell", "date": "2021-12-31T23:59:59", "currency": "CZK", "name": "CEZ", "quantity": 8, "item_price": 150, "broker_amount": 1200}
        ]}"#,
        "2021",
    );
    let consumptions = &reports[0].sell_operations[0].consumptions;
    assert_eq!(consumptions.len(), 2);
    assert_eq!(consumptions[0].quantity, dec!(5));
    assert_eq!(consumptions[0].cost.value, czk(dec!(500), dec!(500)));
    assert_eq!(consumptions[1].quantity, dec!(3));
    assert_eq!(consumptions[1].cost.value, czk(dec!(360), dec!(360)));
    assert_eq!(reports[0].profit(), czk(dec!(340), dec!(340)));
}

#[test]
fn oversized_sale_is_flagged() {
    let reports = run(
        r#"{"transactions": [
            {"type": "Buy", "date": "2021-01-04", "currency": "CZK", "name": "CEZ", "quantity": 4, "item_price": 100, "broker_amount": 400},
            {"type": "Buy", "date": "2021-02-04", "currency": "CZK", "name": "CEZ", "quantity": 6, "item_price": 100, "broker_amount": 600},
            {"type": "Sell", "date": "2021-06-01", "currency": "CZK", "name": "CEZ", "quantity": 20, "item_price": 100, "broker_amount": 2000}
        ]}"#,
        "2021",
    );
    let operation = &reports[0].sell_operations[0];
    assert_eq!(operation.matched_quantity(), dec!(10));
    assert_eq!(operation.unmatched, dec!(10));
    assert_eq!(reports[0].warnings.len(), 1);
}

#[test]
fn dividend_under_both_rates() {
    let reports = run(
        r#"{"transactions": [
            {"type": "Dividend", "date": "2021-06-15", "currency": "EUR", "day_rate": 25.5, "year_rate": 25.65,
             "name": "ALV", "broker_amount": 100, "bank_amount": 95, "country": "de", "broker": "Fio"}
        ]}"#,
        "2021",
    );
    assert_eq!(reports[0].year, TaxYear(2021));
    let entry = reports[0].dividends["DE"]["Fio"];
    assert_eq!(entry.value, czk(dec!(2550), dec!(2565)));
    assert_eq!(entry.fee, czk(dec!(127.5), dec!(128.25)));
}

#[test]
fn purchases_carry_across_years() {
    let reports = run(
        r#"{"transactions": [
            {"type": "Buy", "date": "2018-01-04", "currency": "CZK", "name": "CEZ", "quantity": 4, "item_price": 100, "broker_amount": 400},
            {"type": "Sell", "date": "2019-05-01", "currency": "CZK", "name": "CEZ", "quantity": 1, "item_price": 110, "broker_amount": 110},
            {"type": "Sell", "date": "2022-05-01", "currency": "CZK", "name": "CEZ", "quantity": 2, "item_price": 200, "broker_amount": 400}
        ]}"#,
        "2022",
    );
    let years: Vec<i32> = reports.iter().map(|r| r.year.0).collect();
    assert_eq!(years, vec![2019, 2020, 2021, 2022]);

    let last = &reports[3];
    assert!(last.warnings.is_empty());
    assert_eq!(last.time_tested_revenue, czk(dec!(400), dec!(400)));
    assert_eq!(last.total_expense.value, czk(dec!(200), dec!(200)));
}

#[test]
fn crypto_sale_does_not_consume_stock_lots() {
    let records = read_transactions_json(
        r#"{"transactions": [
            {"type": "Buy", "date": "2021-01-04", "currency": "CZK", "name": "ETH", "quantity": 10, "item_price": 100, "broker_amount": 1000},
            {"type": "Buy", "date": "2021-02-04", "currency": "CZK", "asset_class": "Crypto", "name": "ETH", "quantity": 1, "item_price": 50000, "broker_amount": 50000},
            {"type": "Sell", "date": "2021-06-01", "currency": "CZK", "asset_class": "Crypto", "name": "ETH", "quantity": 2, "item_price": 60000, "broker_amount": 120000},
            {"type": "Sell", "date": "2021-07-01", "currency": "CZK", "name": "ETH", "quantity": 10, "item_price": 110, "broker_amount": 1100}
        ]}"#
        .as_bytes(),
    )
    .expect("valid input");
    let logs = records_to_logs(&records, &RateBook::new()).expect("valid records");
    let options = CalculationOptions::default();

    let stocks = calculate(&logs[0], "2021", &options).expect("stock calculation");
    assert_eq!(stocks[0].asset_class, AssetClass::Stock);
    assert!(stocks[0].warnings.is_empty());
    assert_eq!(stocks[0].profit(), czk(dec!(100), dec!(100)));

    let cryptos = calculate(&logs[1], "2021", &options).expect("crypto calculation");
    assert_eq!(cryptos[0].asset_class, AssetClass::Crypto);
    assert_eq!(cryptos[0].sell_operations[0].matched_quantity(), dec!(1));
    assert_eq!(cryptos[0].sell_operations[0].unmatched, dec!(1));
    assert_eq!(cryptos[0].warnings.len(), 1);
}
