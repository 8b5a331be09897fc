//! FIFO matching of sales against purchase lots.
//!
//! A sale walks the open lots of its item from the oldest one, taking as
//! much as each lot still holds until the sold quantity is covered. Every
//! step is recorded as a [`Consumption`] carrying the proportional cost basis
//! of the lot and the proportional revenue of the sale, both valued at the
//! respective transaction's own exchange rates.

use super::lots::{LotId, LotPool, SaleId};
use super::year::time_test_cutoff;
use crate::core::{AccountingValue, Currency, Trade, ValueWithFee, Warning};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::Serialize;

/// One lot (partially) used to satisfy one sale
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Consumption {
    pub lot: LotId,
    pub purchase_date: NaiveDateTime,
    pub quantity: Decimal,
    /// Lot held for more than three years at the sale date
    pub time_tested: bool,
    /// Share of the lot's bank amount and fee
    pub cost: ValueWithFee,
    /// Share of the sale's broker amount and fee
    pub revenue: ValueWithFee,
}

/// A sale and the lots it was matched against
#[derive(Debug, Clone, Serialize)]
pub struct SellOperation {
    pub sale_id: SaleId,
    pub sale: Trade,
    pub consumptions: Vec<Consumption>,
    pub total_revenue: AccountingValue,
    pub time_tested_revenue: AccountingValue,
    /// Sold quantity no open lot covered
    pub unmatched: Decimal,
}

impl SellOperation {
    pub fn new(sale_id: SaleId, sale: Trade) -> Self {
        let currency = sale.rates.to;
        SellOperation {
            sale_id,
            sale,
            consumptions: Vec::new(),
            total_revenue: AccountingValue::zero(currency),
            time_tested_revenue: AccountingValue::zero(currency),
            unmatched: Decimal::ZERO,
        }
    }

    pub fn currency(&self) -> Currency {
        self.sale.rates.to
    }

    pub fn matched_quantity(&self) -> Decimal {
        self.consumptions.iter().map(|c| c.quantity).sum()
    }

    pub fn time_tested_quantity(&self) -> Decimal {
        self.consumptions
            .iter()
            .filter(|c| c.time_tested)
            .map(|c| c.quantity)
            .sum()
    }

    /// Sale-side fee at the sale's rates
    pub fn sale_fee(&self) -> AccountingValue {
        AccountingValue::convert(self.sale.fee, &self.sale.rates)
    }

    pub fn is_fully_matched(&self) -> bool {
        self.unmatched <= Decimal::ZERO
    }

    pub fn warning(&self) -> Option<Warning> {
        (!self.is_fully_matched()).then(|| Warning::UnmatchedQuantity {
            item: self.sale.name.clone(),
            date: self.sale.date,
            required: self.sale.quantity,
            matched: self.matched_quantity(),
        })
    }

    fn record(&mut self, consumption: Consumption) {
        if consumption.time_tested {
            self.time_tested_revenue += consumption.revenue.value;
        }
        self.total_revenue += consumption.revenue.value;
        self.consumptions.push(consumption);
    }
}

impl std::fmt::Display for SellOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "sale {} {} on {}: lots={} total revenue=({}) time tested revenue=({})",
            self.sale.quantity,
            self.sale.name,
            self.sale.date,
            self.consumptions.len(),
            self.total_revenue,
            self.time_tested_revenue
        )
    }
}

/// Match one sale against the open lots of its item.
///
/// Lots are mutated in place. When `time_test` is off nothing is ever
/// time tested. Lots running out before the sale is covered leave the rest
/// in [`SellOperation::unmatched`].
pub fn match_sale(
    pool: &mut LotPool,
    sale_id: SaleId,
    sale: &Trade,
    time_test: bool,
) -> SellOperation {
    let mut operation = SellOperation::new(sale_id, sale.clone());
    let quantity = sale.quantity;
    if quantity <= Decimal::ZERO {
        log::warn!("Sale of {} on {} has no quantity, skipping", sale.name, sale.date);
        return operation;
    }

    let cutoff = if time_test {
        time_test_cutoff(sale.date)
    } else {
        None
    };
    let sale_value = AccountingValue::convert(sale.broker_amount, &sale.rates);
    let sale_fee = AccountingValue::convert(sale.fee, &sale.rates);

    let mut remaining = quantity;
    for (lot_id, lot) in pool.available_mut(&sale.name) {
        if lot.available <= Decimal::ZERO {
            continue;
        }

        let purchase = &lot.purchase;
        let time_tested = cutoff.is_some_and(|cutoff| purchase.date < cutoff);
        let take = lot.available.min(remaining);
        let lot_ratio = ratio(take, purchase.quantity);
        let sale_ratio = ratio(take, quantity);

        let cost = ValueWithFee::new(
            AccountingValue::convert(purchase.bank_amount, &purchase.rates),
            AccountingValue::convert(purchase.fee, &purchase.rates),
        )
        .scale(lot_ratio);
        let revenue = ValueWithFee::new(sale_value, sale_fee).scale(sale_ratio);

        operation.record(Consumption {
            lot: lot_id,
            purchase_date: purchase.date,
            quantity: take,
            time_tested,
            cost,
            revenue,
        });
        lot.consume(take, sale_id);

        remaining -= take;
        if remaining <= Decimal::ZERO {
            break;
        }
    }

    if remaining > Decimal::ZERO {
        operation.unmatched = remaining;
        log::warn!(
            "Sale of {} {} on {} is not covered by purchases, {} left unmatched",
            quantity,
            sale.name,
            sale.date,
            remaining
        );
    }
    log::debug!("Processed {}", operation);
    operation
}

fn ratio(part: Decimal, whole: Decimal) -> Decimal {
    part.checked_div(whole).unwrap_or(Decimal::ZERO)
}
