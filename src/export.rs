use crate::core::{AccountingValue, AssetClass, Currency, Warning};
use crate::tax::{Consumption, DividendBreakdown, Report, SellOperation, TaxYear};
use serde::{Deserialize, Serialize};
use std::io::Write;

/// CSV row of the sales log, one per lot consumed by a sale
#[derive(Debug, Serialize, Deserialize)]
pub struct SalesLogRecord {
    pub year: String,
    pub asset_class: AssetClass,
    pub name: String,
    pub sell_date: String,
    pub quantity: String,
    pub revenue_day: String,
    pub revenue_year: String,
    pub buy_date: String,
    pub time_tested: bool,
    pub buy_price_day: String,
    pub buy_price_year: String,
    pub fee_day: String,
    pub fee_year: String,
}

impl SalesLogRecord {
    fn new(report: &Report, operation: &SellOperation, consumption: &Consumption) -> Self {
        let mut fee = consumption.cost.fee;
        fee += consumption.revenue.fee;
        SalesLogRecord {
            year: report.year.to_string(),
            asset_class: report.asset_class,
            name: operation.sale.name.clone(),
            sell_date: operation.sale.date.format("%Y-%m-%d").to_string(),
            quantity: consumption.quantity.normalize().to_string(),
            revenue_day: money(consumption.revenue.value.at_day_rate),
            revenue_year: money(consumption.revenue.value.at_year_rate),
            buy_date: consumption.purchase_date.format("%Y-%m-%d").to_string(),
            time_tested: consumption.time_tested,
            buy_price_day: money(consumption.cost.value.at_day_rate),
            buy_price_year: money(consumption.cost.value.at_year_rate),
            fee_day: money(fee.at_day_rate),
            fee_year: money(fee.at_year_rate),
        }
    }
}

/// Write every consumption of every report as CSV
pub fn write_sales_csv<W: Write>(reports: &[Report], writer: W) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for report in reports {
        for operation in &report.sell_operations {
            for consumption in &operation.consumptions {
                wtr.serialize(SalesLogRecord::new(report, operation, consumption))?;
            }
        }
    }
    wtr.flush()?;
    Ok(())
}

/// Figures of one year as serialized by `report --json`
#[derive(Debug, Serialize)]
pub struct YearSummary<'a> {
    pub year: TaxYear,
    pub asset_class: AssetClass,
    pub currency: Currency,
    pub sales: usize,
    pub revenue: AccountingValue,
    pub time_tested_revenue: AccountingValue,
    pub expense: AccountingValue,
    pub time_tested_expense: AccountingValue,
    pub fees: AccountingValue,
    pub time_tested_fees: AccountingValue,
    pub profit: AccountingValue,
    pub time_tested_profit: AccountingValue,
    pub dividends: &'a DividendBreakdown,
    pub dividend_profit: AccountingValue,
    pub additional_income: AccountingValue,
    pub additional_fees: AccountingValue,
    pub taxable_revenue: AccountingValue,
    pub taxable_profit: AccountingValue,
    pub warnings: &'a [Warning],
}

impl<'a> From<&'a Report> for YearSummary<'a> {
    fn from(r: &'a Report) -> Self {
        YearSummary {
            year: r.year,
            asset_class: r.asset_class,
            currency: r.currency,
            sales: r.sell_operations.len(),
            revenue: r.total_revenue,
            time_tested_revenue: r.time_tested_revenue,
            expense: r.total_expense.value,
            time_tested_expense: r.time_tested_expense.value,
            fees: r.total_expense.fee,
            time_tested_fees: r.time_tested_expense.fee,
            profit: r.profit(),
            time_tested_profit: r.time_tested_profit(),
            dividends: &r.dividends,
            dividend_profit: r.dividend_profit(),
            additional_income: r.additional.value,
            additional_fees: r.additional.fee,
            taxable_revenue: r.taxable_revenue(),
            taxable_profit: r.taxable_profit(),
            warnings: &r.warnings,
        }
    }
}

fn money(value: rust_decimal::Decimal) -> String {
    format!("{:.2}", value)
}
