//! Point-of-sale transaction model.
//!
//! # Invariants
//! - `line_total == quantity * unit_price` for every item.
//! - `total` equals the sum of item line totals.
//! - `change == paid - total` and is never negative.

use super::customer::CustomerId;
use super::org::{CompanyId, EmployeeId, StoreId};
use super::product::ProductId;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type TransactionId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    Transfer,
    Qris,
}

impl PaymentMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::Card => "card",
            Self::Transfer => "transfer",
            Self::Qris => "qris",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "cash" | "tunai" => Some(Self::Cash),
            "card" | "debit" | "credit" => Some(Self::Card),
            "transfer" => Some(Self::Transfer),
            "qris" => Some(Self::Qris),
            _ => None,
        }
    }

    /// Only cash tenders can exceed the total and produce change.
    pub fn allows_change(self) -> bool {
        matches!(self, Self::Cash)
    }

    /// Returns the change due for `paid` against `total`.
    ///
    /// Cash must cover the total; every other method must match it exactly.
    pub fn settle(self, total: i64, paid: i64) -> Result<i64, PaymentError> {
        if paid < total {
            return Err(PaymentError::Insufficient { total, paid });
        }
        if paid > total && !self.allows_change() {
            return Err(PaymentError::ExactAmountRequired {
                method: self,
                total,
                paid,
            });
        }
        Ok(paid - total)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentError {
    Insufficient {
        total: i64,
        paid: i64,
    },
    ExactAmountRequired {
        method: PaymentMethod,
        total: i64,
        paid: i64,
    },
}

impl Display for PaymentError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Insufficient { total, paid } => {
                write!(f, "payment {paid} does not cover total {total}")
            }
            Self::ExactAmountRequired {
                method,
                total,
                paid,
            } => write!(
                f,
                "{} payments must equal the total {total}, got {paid}",
                method.as_str()
            ),
        }
    }
}

impl Error for PaymentError {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionItem {
    pub product_id: ProductId,
    /// Product name captured at sale time.
    pub product_name: String,
    pub quantity: i64,
    /// Product price captured at sale time.
    pub unit_price: i64,
    pub line_total: i64,
}

impl TransactionItem {
    pub fn new(
        product_id: ProductId,
        product_name: impl Into<String>,
        quantity: i64,
        unit_price: i64,
    ) -> Self {
        Self {
            product_id,
            product_name: product_name.into(),
            quantity,
            unit_price,
            line_total: quantity.saturating_mul(unit_price),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub company_id: CompanyId,
    pub store_id: StoreId,
    /// `None` for walk-in sales.
    pub customer_id: Option<CustomerId>,
    pub cashier_id: EmployeeId,
    pub payment_method: PaymentMethod,
    pub total: i64,
    pub paid: i64,
    pub change: i64,
    pub created_at: i64,
    pub items: Vec<TransactionItem>,
}

/// Sums line totals; the single definition of revenue for one sale.
pub fn items_total(items: &[TransactionItem]) -> i64 {
    items.iter().map(|item| item.line_total).sum()
}
