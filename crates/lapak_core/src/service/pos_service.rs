//! Point-of-sale (cashier) use-case service.
//!
//! # Responsibility
//! - Validate a cart before it reaches storage.
//! - Record the sale through [`TransactionRepository::record_sale`].
//!
//! # Invariants
//! - Cart lines for the same product are merged, first-seen order kept.
//! - Quantities are strictly positive; payment is never negative.
//! - Stock, prices and payment are settled inside one storage transaction.

use crate::access::{AccessError, Actor, Permission};
use crate::model::customer::CustomerId;
use crate::model::now_epoch_ms;
use crate::model::org::StoreId;
use crate::model::product::ProductId;
use crate::model::transaction::{PaymentMethod, Transaction, TransactionId};
use crate::repo::transaction_repo::{
    NewSale, SaleError, SaleLine, TransactionListQuery, TransactionRepository,
};
use crate::repo::RepoError;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Cart submitted from the cashier screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub store_id: StoreId,
    pub customer_id: Option<CustomerId>,
    pub payment_method: PaymentMethod,
    pub paid: i64,
    pub lines: Vec<CartLine>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: i64,
}

#[derive(Debug)]
pub enum CheckoutError {
    Access(AccessError),
    EmptyCart,
    InvalidQuantity { product_id: ProductId, quantity: i64 },
    NegativePayment(i64),
    Sale(SaleError),
}

impl Display for CheckoutError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Access(err) => write!(f, "{err}"),
            Self::EmptyCart => write!(f, "cart is empty"),
            Self::InvalidQuantity {
                product_id,
                quantity,
            } => write!(f, "invalid quantity {quantity} for product {product_id}"),
            Self::NegativePayment(paid) => write!(f, "payment must not be negative, got {paid}"),
            Self::Sale(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CheckoutError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Access(err) => Some(err),
            Self::Sale(err) => Some(err),
            _ => None,
        }
    }
}

impl From<AccessError> for CheckoutError {
    fn from(value: AccessError) -> Self {
        Self::Access(value)
    }
}

impl From<SaleError> for CheckoutError {
    fn from(value: SaleError) -> Self {
        Self::Sale(value)
    }
}

impl From<RepoError> for CheckoutError {
    fn from(value: RepoError) -> Self {
        Self::Sale(SaleError::Repo(value))
    }
}

/// Cashier service over a sales repository.
pub struct PosService<R: TransactionRepository> {
    repo: R,
    clock: fn() -> i64,
}

impl<R: TransactionRepository> PosService<R> {
    pub fn new(repo: R) -> Self {
        Self::with_clock(repo, now_epoch_ms)
    }

    /// Uses `clock` (epoch ms) to stamp sales; lets back-dated imports and
    /// tests control time.
    pub fn with_clock(repo: R, clock: fn() -> i64) -> Self {
        Self { repo, clock }
    }

    /// Validates the cart and records the sale.
    pub fn checkout(
        &mut self,
        actor: &Actor,
        request: &CheckoutRequest,
    ) -> Result<Transaction, CheckoutError> {
        let company_id = actor.require(Permission::Checkout)?;
        let lines = merge_cart_lines(&request.lines)?;
        if request.paid < 0 {
            return Err(CheckoutError::NegativePayment(request.paid));
        }

        let sale = NewSale {
            company_id,
            store_id: request.store_id,
            customer_id: request.customer_id,
            cashier_id: actor.employee_id,
            payment_method: request.payment_method,
            paid: request.paid,
            created_at: (self.clock)(),
            lines,
        };

        match self.repo.record_sale(&sale) {
            Ok(transaction) => {
                info!(
                    "event=checkout module=pos status=ok company_id={} lines={} method={}",
                    company_id,
                    transaction.items.len(),
                    transaction.payment_method.as_str()
                );
                Ok(transaction)
            }
            Err(err) => {
                warn!(
                    "event=checkout module=pos status=error company_id={} error={}",
                    company_id, err
                );
                Err(err.into())
            }
        }
    }

    pub fn get_sale(
        &self,
        actor: &Actor,
        id: TransactionId,
    ) -> Result<Option<Transaction>, CheckoutError> {
        let company_id = actor.require(Permission::ViewTransactions)?;
        Ok(self.repo.get_transaction(company_id, id)?)
    }

    pub fn list_sales(
        &self,
        actor: &Actor,
        query: &TransactionListQuery,
    ) -> Result<Vec<Transaction>, CheckoutError> {
        let company_id = actor.require(Permission::ViewTransactions)?;
        Ok(self.repo.list_transactions(company_id, query)?)
    }
}

/// Merges duplicate product lines and rejects non-positive quantities.
pub fn merge_cart_lines(lines: &[CartLine]) -> Result<Vec<SaleLine>, CheckoutError> {
    if lines.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }

    let mut merged: Vec<SaleLine> = Vec::with_capacity(lines.len());
    for line in lines {
        if line.quantity <= 0 {
            return Err(CheckoutError::InvalidQuantity {
                product_id: line.product_id,
                quantity: line.quantity,
            });
        }
        match merged
            .iter_mut()
            .find(|existing| existing.product_id == line.product_id)
        {
            Some(existing) => existing.quantity = existing.quantity.saturating_add(line.quantity),
            None => merged.push(SaleLine {
                product_id: line.product_id,
                quantity: line.quantity,
            }),
        }
    }
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::{merge_cart_lines, CartLine, CheckoutError};
    use uuid::Uuid;

    #[test]
    fn merge_keeps_first_seen_order() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let merged = merge_cart_lines(&[
            CartLine {
                product_id: a,
                quantity: 1,
            },
            CartLine {
                product_id: b,
                quantity: 2,
            },
            CartLine {
                product_id: a,
                quantity: 3,
            },
        ])
        .unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].product_id, a);
        assert_eq!(merged[0].quantity, 4);
        assert_eq!(merged[1].quantity, 2);
    }

    #[test]
    fn merge_rejects_empty_and_zero_quantity() {
        assert!(matches!(merge_cart_lines(&[]), Err(CheckoutError::EmptyCart)));
        let err = merge_cart_lines(&[CartLine {
            product_id: Uuid::new_v4(),
            quantity: 0,
        }])
        .unwrap_err();
        assert!(matches!(err, CheckoutError::InvalidQuantity { quantity: 0, .. }));
    }
}
