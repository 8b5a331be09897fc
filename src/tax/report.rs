use super::matcher::SellOperation;
use super::year::TaxYear;
use crate::core::{
    AccountingValue, AssetClass, CashFlow, Currency, Dividend, ValueWithFee, Warning,
};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

/// Dividends by country, then by broker
pub type DividendBreakdown = BTreeMap<String, BTreeMap<String, ValueWithFee>>;

/// One calendar year of sales, dividends and additional income
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub year: TaxYear,
    pub asset_class: AssetClass,
    pub currency: Currency,
    pub sell_operations: Vec<SellOperation>,
    pub total_revenue: AccountingValue,
    pub time_tested_revenue: AccountingValue,
    /// FIFO cost basis (value) and buy plus sell fees (fee)
    pub total_expense: ValueWithFee,
    pub time_tested_expense: ValueWithFee,
    pub dividends: DividendBreakdown,
    /// Additional income (value) and additional fees (fee)
    pub additional: ValueWithFee,
    pub warnings: Vec<Warning>,
}

impl Report {
    pub fn new(year: TaxYear, asset_class: AssetClass, currency: Currency) -> Self {
        Report {
            year,
            asset_class,
            currency,
            sell_operations: Vec::new(),
            total_revenue: AccountingValue::zero(currency),
            time_tested_revenue: AccountingValue::zero(currency),
            total_expense: ValueWithFee::zero(currency),
            time_tested_expense: ValueWithFee::zero(currency),
            dividends: DividendBreakdown::new(),
            additional: ValueWithFee::zero(currency),
            warnings: Vec::new(),
        }
    }

    /// Sum one year's matched sales, dividends and additional cash flows
    pub fn aggregate(
        year: TaxYear,
        asset_class: AssetClass,
        currency: Currency,
        operations: Vec<SellOperation>,
        dividends: &[&Dividend],
        incomes: &[&CashFlow],
        fees: &[&CashFlow],
    ) -> Self {
        let mut report = Report::new(year, asset_class, currency);
        for operation in operations {
            report.add_sell_operation(operation);
        }
        for dividend in dividends {
            report.add_dividend(dividend);
        }
        for income in incomes {
            report.additional.value += AccountingValue::convert(income.amount, &income.rates);
        }
        for fee in fees {
            report.additional.fee += AccountingValue::convert(fee.amount, &fee.rates);
        }
        log::debug!("{}", report);
        report
    }

    fn add_sell_operation(&mut self, operation: SellOperation) {
        let mut time_tested_quantity = Decimal::ZERO;
        for consumption in &operation.consumptions {
            self.total_expense += consumption.cost;
            if consumption.time_tested {
                time_tested_quantity += consumption.quantity;
                self.time_tested_expense += consumption.cost;
            }
        }

        // sale fee split by tested share of the sold quantity
        let time_tested_ratio = time_tested_quantity
            .checked_div(operation.sale.quantity)
            .unwrap_or(Decimal::ZERO);
        let sale_fee = operation.sale_fee();
        self.total_expense.fee += sale_fee;
        self.time_tested_expense.fee += sale_fee.scale(time_tested_ratio);

        self.total_revenue += operation.total_revenue;
        self.time_tested_revenue += operation.time_tested_revenue;

        if let Some(warning) = operation.warning() {
            self.warnings.push(warning);
        }
        self.sell_operations.push(operation);
    }

    fn add_dividend(&mut self, dividend: &Dividend) {
        let currency = self.currency;
        let entry = self
            .dividends
            .entry(dividend.country.clone())
            .or_default()
            .entry(dividend.broker.clone())
            .or_insert_with(|| ValueWithFee::zero(currency));
        *entry += ValueWithFee::new(
            AccountingValue::convert(dividend.broker_amount, &dividend.rates),
            AccountingValue::convert(dividend.fee, &dividend.rates),
        );
    }

    pub fn non_time_tested_revenue(&self) -> AccountingValue {
        self.total_revenue - self.time_tested_revenue
    }

    pub fn non_time_tested_expense(&self) -> ValueWithFee {
        self.total_expense - self.time_tested_expense
    }

    /// Revenue less cost basis and fees
    pub fn profit(&self) -> AccountingValue {
        self.total_revenue - self.total_expense.value - self.total_expense.fee
    }

    pub fn time_tested_profit(&self) -> AccountingValue {
        self.time_tested_revenue - self.time_tested_expense.value - self.time_tested_expense.fee
    }

    /// All dividends, gross (value) and withheld tax (fee)
    pub fn dividend_total(&self) -> ValueWithFee {
        let mut total = ValueWithFee::zero(self.currency);
        for by_broker in self.dividends.values() {
            for value in by_broker.values() {
                total += *value;
            }
        }
        total
    }

    pub fn dividend_profit(&self) -> AccountingValue {
        self.dividend_total().net()
    }

    pub fn additional_profit(&self) -> AccountingValue {
        self.additional.net()
    }

    /// Revenue not exempted by the time test, dividends and additional income
    pub fn taxable_revenue(&self) -> AccountingValue {
        self.non_time_tested_revenue() + self.dividend_total().value + self.additional.value
    }

    pub fn taxable_profit(&self) -> AccountingValue {
        (self.profit() - self.time_tested_profit())
            + self.dividend_profit()
            + self.additional_profit()
    }

    pub fn consumption_count(&self) -> usize {
        self.sell_operations.iter().map(|op| op.consumptions.len()).sum()
    }
}

impl std::fmt::Display for Report {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "year: {} {} sales: {} total: (revenue: ({}) expense: ({})) time tested: (revenue: ({}) expense: ({})) dividends: ({}) additional: ({})",
            self.year,
            self.asset_class,
            self.sell_operations.len(),
            self.total_revenue,
            self.total_expense,
            self.time_tested_revenue,
            self.time_tested_expense,
            self.dividend_total(),
            self.additional
        )
    }
}
