//! Percentage values with an explicit "not available" state.

use serde::Serialize;
use std::fmt::{Display, Formatter};

/// A percentage, or a tagged non-value when the denominator is zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Percent {
    Value(f64),
    NotAvailable,
}

impl Percent {
    /// Returns `part / whole * 100`, or `NotAvailable` for a zero or
    /// non-finite result.
    pub fn of(part: f64, whole: f64) -> Self {
        if whole == 0.0 {
            return Self::NotAvailable;
        }
        let value = part / whole * 100.0;
        if value.is_finite() {
            Self::Value(value)
        } else {
            Self::NotAvailable
        }
    }

    pub fn value(self) -> Option<f64> {
        match self {
            Self::Value(value) => Some(value),
            Self::NotAvailable => None,
        }
    }

    pub fn is_available(self) -> bool {
        matches!(self, Self::Value(_))
    }
}

/// Renders `12.34%` or `N/A`.
impl Display for Percent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Value(value) => write!(f, "{value:.2}%"),
            Self::NotAvailable => write!(f, "N/A"),
        }
    }
}

/// Shorthand for `Percent::of`.
pub fn percentage(part: f64, whole: f64) -> Percent {
    Percent::of(part, whole)
}
