use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::quantity::{format_quantity, parse_optional_quantity};

/// Text recorded when an inspection rejected nothing.
pub const NOT_APPLICABLE: &str = "-";

/// Quantity rejected at inspection.
///
/// Paper ledgers write either a number or a marker such as `-` in this
/// column. Only [`FailQty::Numeric`] takes part in stock arithmetic; the
/// other variants count as zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FailQty {
    Numeric(Decimal),
    NotApplicable,
    Custom(String),
}

impl FailQty {
    /// Classifies raw form text. Blank input means no value at all.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        if trimmed == NOT_APPLICABLE {
            return Some(Self::NotApplicable);
        }
        Some(match parse_optional_quantity(trimmed) {
            Some(amount) => Self::Numeric(amount),
            None => Self::Custom(trimmed.to_string()),
        })
    }

    /// Amount used by remain arithmetic.
    pub fn numeric(&self) -> Decimal {
        match self {
            Self::Numeric(amount) => *amount,
            Self::NotApplicable | Self::Custom(_) => Decimal::ZERO,
        }
    }

    /// Rebuilds the value from the two mutually exclusive storage columns.
    ///
    /// A numeric column wins if a backend ever hands back both.
    pub fn from_columns(
        amount: Option<Decimal>,
        text: Option<String>,
    ) -> Option<Self> {
        match (amount, text) {
            (Some(amount), _) => Some(Self::Numeric(amount)),
            (None, Some(text)) if text == NOT_APPLICABLE => Some(Self::NotApplicable),
            (None, Some(text)) if !text.trim().is_empty() => Some(Self::Custom(text)),
            _ => None,
        }
    }

    /// Splits the value into `(fail_qty, fail_qty_text)` storage columns.
    pub fn to_columns(&self) -> (Option<Decimal>, Option<String>) {
        match self {
            Self::Numeric(amount) => (Some(*amount), None),
            Self::NotApplicable => (None, Some(NOT_APPLICABLE.to_string())),
            Self::Custom(text) => (None, Some(text.clone())),
        }
    }
}

impl fmt::Display for FailQty {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Self::Numeric(amount) => f.write_str(&format_quantity(*amount)),
            Self::NotApplicable => f.write_str(NOT_APPLICABLE),
            Self::Custom(text) => f.write_str(text),
        }
    }
}
