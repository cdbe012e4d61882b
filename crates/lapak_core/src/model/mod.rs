//! Retail domain model shared by repositories, services and reports.
//!
//! # Responsibility
//! - Define canonical records for tenants, catalog, customers and sales.
//! - Own field-level validation so every write path enforces the same rules.
//!
//! # Invariants
//! - Every tenant-owned record carries the `company_id` it belongs to.
//! - Money is an integer amount in the smallest currency unit.
//! - Timestamps are Unix epoch milliseconds.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod customer;
pub mod org;
pub mod product;
pub mod transaction;

/// Field-level validation failure raised before persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Required text field is blank after trim.
    Blank(&'static str),
    /// Numeric field is below its allowed minimum.
    Negative(&'static str),
    /// Field has a value with an unsupported shape.
    Malformed { field: &'static str, value: String },
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Blank(field) => write!(f, "{field} must not be blank"),
            Self::Negative(field) => write!(f, "{field} must not be negative"),
            Self::Malformed { field, value } => write!(f, "{field} is malformed: `{value}`"),
        }
    }
}

impl Error for ValidationError {}

pub(crate) fn require_text(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Blank(field));
    }
    Ok(())
}

/// Collapses optional text so blank input is stored as `NULL`.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

/// Returns the current wall-clock time in epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
