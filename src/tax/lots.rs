use super::calculator::CalculationError;
use super::year::TaxYear;
use crate::core::Trade;
use rust_decimal::Decimal;
use serde::Serialize;

/// Position of a lot in the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct LotId(pub usize);

/// Position of a sale in the date-sorted sales of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SaleId(pub usize);

/// Unsold remainder of one purchase
#[derive(Debug, Clone, Serialize)]
pub struct Lot {
    pub purchase: Trade,
    /// Never negative, only ever decreases
    pub available: Decimal,
    /// Sales which consumed part of this lot, in consumption order
    pub sold_by: Vec<SaleId>,
}

impl Lot {
    pub fn new(purchase: Trade) -> Self {
        Lot {
            available: purchase.quantity,
            purchase,
            sold_by: Vec::new(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.available > Decimal::ZERO
    }

    pub(crate) fn consume(&mut self, quantity: Decimal, sale: SaleId) {
        self.available -= quantity;
        self.sold_by.push(sale);
        log::debug!(
            "Lot {} {} CONSUME: qty={}. Remaining: qty={}",
            self.purchase.name,
            self.purchase.date,
            quantity,
            self.available
        );
    }
}

/// All purchase lots of a run. Built once and consumed across every
/// processed year, so years must be entered in ascending order.
#[derive(Debug, Clone, Default)]
pub struct LotPool {
    lots: Vec<Lot>,
    year: Option<TaxYear>,
}

impl LotPool {
    /// One lot per purchase. Purchases must already be sorted by date,
    /// the pool order is the FIFO order.
    pub fn from_purchases(purchases: &[Trade]) -> Self {
        let lots: Vec<Lot> = purchases.iter().cloned().map(Lot::new).collect();
        log::debug!("Lot pool built from {} purchases", lots.len());
        LotPool { lots, year: None }
    }

    /// Open lots of `item`, oldest first
    pub fn find_available(&self, item: &str) -> Vec<&Lot> {
        self.lots
            .iter()
            .filter(|lot| lot.is_open() && same_item(&lot.purchase.name, item))
            .collect()
    }

    /// Open lots of `item`, oldest first, for consumption
    pub fn available_mut<'a>(
        &'a mut self,
        item: &'a str,
    ) -> impl Iterator<Item = (LotId, &'a mut Lot)> + 'a {
        self.lots
            .iter_mut()
            .enumerate()
            .filter(move |(_, lot)| lot.is_open() && same_item(&lot.purchase.name, item))
            .map(|(idx, lot)| (LotId(idx), lot))
    }

    pub fn get(&self, id: LotId) -> Option<&Lot> {
        self.lots.get(id.0)
    }

    pub fn lots(&self) -> &[Lot] {
        &self.lots
    }

    /// Move the pool to the next processed year
    pub fn enter_year(&mut self, year: TaxYear) -> Result<(), CalculationError> {
        if let Some(previous) = self.year {
            if year <= previous {
                return Err(CalculationError::YearOutOfOrder { previous, next: year });
            }
        }
        self.year = Some(year);
        Ok(())
    }
}

/// Case-insensitive item comparison, no trimming
pub fn same_item(a: &str, b: &str) -> bool {
    a.chars()
        .flat_map(char::to_lowercase)
        .eq(b.chars().flat_map(char::to_lowercase))
}
