//! Report command - yearly overview of sales, dividends and additional income

use super::CalculationArgs;
use clap::Args;
use cztax::core::AccountingValue;
use cztax::export::YearSummary;
use cztax::tax::Report;
use rust_decimal::Decimal;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

#[derive(Args, Debug)]
pub struct ReportCommand {
    #[command(flatten)]
    calculation: CalculationArgs,

    /// Only print the last (requested) year of every asset class
    #[arg(long)]
    only_target: bool,

    /// Output as JSON instead of tables
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Tabled)]
struct OverviewRow {
    #[tabled(rename = "")]
    label: &'static str,
    #[tabled(rename = "Day rate")]
    day: String,
    #[tabled(rename = "Year rate")]
    year: String,
}

#[derive(Debug, Clone, Tabled)]
struct DividendRow {
    #[tabled(rename = "Country")]
    country: String,
    #[tabled(rename = "Broker")]
    broker: String,
    #[tabled(rename = "Gross (day)")]
    gross_day: String,
    #[tabled(rename = "Withheld (day)")]
    withheld_day: String,
    #[tabled(rename = "Gross (year)")]
    gross_year: String,
    #[tabled(rename = "Withheld (year)")]
    withheld_year: String,
}

impl ReportCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let mut reports = self.calculation.calculate()?;
        if self.only_target {
            if let Some(target) = reports.iter().map(|r| r.year).max() {
                reports.retain(|r| r.year == target);
            }
        }

        if self.json {
            let summaries: Vec<YearSummary> = reports.iter().map(YearSummary::from).collect();
            println!("{}", serde_json::to_string_pretty(&summaries)?);
        } else {
            for report in &reports {
                print_report(report);
            }
        }
        Ok(())
    }
}

fn print_report(report: &Report) {
    println!();
    println!(
        "TAX YEAR {} - {} ({})",
        report.year,
        report.asset_class.label(),
        report.currency
    );
    println!();

    let non_tested_expense = report.non_time_tested_expense();
    let rows = vec![
        row("Sales revenue", report.total_revenue),
        row("Sales expense", report.total_expense.value),
        row("Sales fees", report.total_expense.fee),
        row("Sales profit", report.profit()),
        row("Time tested revenue", report.time_tested_revenue),
        row("Time tested expense", report.time_tested_expense.value),
        row("Time tested fees", report.time_tested_expense.fee),
        row("Time tested profit", report.time_tested_profit()),
        row("Taxable sales revenue", report.non_time_tested_revenue()),
        row("Taxable sales expense", non_tested_expense.value),
        row("Taxable sales fees", non_tested_expense.fee),
        row("Dividends", report.dividend_total().value),
        row("Withheld tax", report.dividend_total().fee),
        row("Additional income", report.additional.value),
        row("Additional fees", report.additional.fee),
        row("Taxable revenue", report.taxable_revenue()),
        row("Taxable profit", report.taxable_profit()),
    ];
    println!(
        "OVERVIEW ({} sales, {} lots)",
        report.sell_operations.len(),
        report.consumption_count()
    );
    println!("{}", table(rows));
    println!();

    let dividends: Vec<DividendRow> = report
        .dividends
        .iter()
        .flat_map(|(country, brokers)| {
            brokers.iter().map(move |(broker, value)| DividendRow {
                country: country.clone(),
                broker: broker.clone(),
                gross_day: format_money(value.value.at_day_rate),
                withheld_day: format_money(value.fee.at_day_rate),
                gross_year: format_money(value.value.at_year_rate),
                withheld_year: format_money(value.fee.at_year_rate),
            })
        })
        .collect();
    if !dividends.is_empty() {
        println!("DIVIDENDS");
        println!("{}", table(dividends));
        println!();
    }

    for warning in &report.warnings {
        println!("WARNING: {}", warning);
    }
}

fn row(label: &'static str, value: AccountingValue) -> OverviewRow {
    OverviewRow {
        label,
        day: format_money(value.at_day_rate),
        year: format_money(value.at_year_rate),
    }
}

fn table<T: Tabled>(rows: Vec<T>) -> String {
    Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Rows::new(1..)).with(Alignment::right()))
        .to_string()
}

fn format_money(amount: Decimal) -> String {
    format!("{:.2}", amount)
}
