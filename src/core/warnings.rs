use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::Serialize;

/// Domain warning types emitted during calculation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum Warning {
    /// Open lots did not cover the sale. The uncovered part has neither
    /// cost basis nor revenue in the report.
    UnmatchedQuantity {
        item: String,
        date: NaiveDateTime,
        required: Decimal,
        matched: Decimal,
    },
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::UnmatchedQuantity {
                item,
                date,
                required,
                matched,
            } => write!(
                f,
                "sale of {} {} on {} matched only {} against open lots",
                required, item, date, matched
            ),
        }
    }
}
