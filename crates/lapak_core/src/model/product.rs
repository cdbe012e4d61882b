//! Catalog product model.
//!
//! # Invariants
//! - `sku` is unique within one company (enforced by storage).
//! - `price` and `stock` are never negative.
//! - Deactivated products stay referenced by historical sales.

use super::org::CompanyId;
use super::{non_blank, require_text, ValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type ProductId = Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub company_id: CompanyId,
    pub sku: String,
    pub name: String,
    pub category: Option<String>,
    /// Unit price in the smallest currency unit.
    pub price: i64,
    pub stock: i64,
    pub is_active: bool,
}

impl Product {
    pub fn new(
        company_id: CompanyId,
        sku: impl Into<String>,
        name: impl Into<String>,
        price: i64,
        stock: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            company_id,
            sku: normalize_sku(&sku.into()),
            name: name.into().trim().to_string(),
            category: None,
            price,
            stock,
            is_active: true,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = non_blank(Some(category.into()));
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("product.sku", &self.sku)?;
        require_text("product.name", &self.name)?;
        if self.sku.chars().any(char::is_whitespace) {
            return Err(ValidationError::Malformed {
                field: "product.sku",
                value: self.sku.clone(),
            });
        }
        if self.price < 0 {
            return Err(ValidationError::Negative("product.price"));
        }
        if self.stock < 0 {
            return Err(ValidationError::Negative("product.stock"));
        }
        Ok(())
    }
}

/// SKUs compare case-insensitively; storage keeps them upper-case.
pub fn normalize_sku(value: &str) -> String {
    value.trim().to_ascii_uppercase()
}
