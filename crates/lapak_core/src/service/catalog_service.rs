//! Product catalog use-case service.
//!
//! # Invariants
//! - Writes require `ManageCatalog`; reads are open to every tenant member.
//! - Products are created in the actor's own company regardless of input.

use super::{ServiceError, ServiceResult};
use crate::access::{Actor, Permission};
use crate::model::product::{Product, ProductId};
use crate::repo::product_repo::{ProductListQuery, ProductRepository};
use crate::repo::RepoError;
use log::info;

/// Input for creating or editing a product. `stock` is the opening stock
/// and is only read on create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductDraft {
    pub sku: String,
    pub name: String,
    pub category: Option<String>,
    pub price: i64,
    pub stock: i64,
}

/// Use-case service wrapper for catalog operations.
pub struct CatalogService<R: ProductRepository> {
    repo: R,
}

impl<R: ProductRepository> CatalogService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn create_product(&self, actor: &Actor, draft: &ProductDraft) -> ServiceResult<Product> {
        let company_id = actor.require(Permission::ManageCatalog)?;
        let mut product = Product::new(
            company_id,
            draft.sku.as_str(),
            draft.name.as_str(),
            draft.price,
            draft.stock,
        );
        if let Some(category) = draft.category.clone() {
            product = product.with_category(category);
        }
        let id = self.repo.create_product(&product)?;
        info!("event=product_create module=catalog status=ok company_id={company_id}");
        self.repo
            .get_product(company_id, id)?
            .ok_or(ServiceError::InconsistentState(
                "created product not found in read-back",
            ))
    }

    /// Replaces sku, name, category and price of an existing product.
    ///
    /// `draft.stock` is ignored here; stock moves through [`Self::adjust_stock`].
    pub fn update_product(
        &self,
        actor: &Actor,
        id: ProductId,
        draft: &ProductDraft,
    ) -> ServiceResult<Product> {
        let company_id = actor.require(Permission::ManageCatalog)?;
        let mut product = self
            .repo
            .get_product(company_id, id)?
            .ok_or_else(|| RepoError::not_found("product", id))?;
        let rebuilt = Product::new(
            company_id,
            draft.sku.as_str(),
            draft.name.as_str(),
            draft.price,
            product.stock,
        )
        .with_category(draft.category.clone().unwrap_or_default());
        product.sku = rebuilt.sku;
        product.name = rebuilt.name;
        product.category = rebuilt.category;
        product.price = rebuilt.price;
        self.repo.update_product(&product)?;
        info!("event=product_update module=catalog status=ok company_id={company_id}");
        self.repo
            .get_product(company_id, id)?
            .ok_or(ServiceError::InconsistentState(
                "updated product not found in read-back",
            ))
    }

    /// Adds `delta` (may be negative) to stock; used for restocks and stock opname.
    pub fn adjust_stock(&self, actor: &Actor, id: ProductId, delta: i64) -> ServiceResult<Product> {
        let company_id = actor.require(Permission::ManageCatalog)?;
        let product = self.repo.adjust_stock(company_id, id, delta)?;
        info!("event=stock_adjust module=catalog status=ok company_id={company_id} delta={delta}");
        Ok(product)
    }

    pub fn get_product(&self, actor: &Actor, id: ProductId) -> ServiceResult<Option<Product>> {
        let company_id = actor.require(Permission::Checkout)?;
        Ok(self.repo.get_product(company_id, id)?)
    }

    pub fn find_by_sku(&self, actor: &Actor, sku: &str) -> ServiceResult<Option<Product>> {
        let company_id = actor.require(Permission::Checkout)?;
        Ok(self.repo.get_product_by_sku(company_id, sku)?)
    }

    pub fn list_products(
        &self,
        actor: &Actor,
        query: &ProductListQuery,
    ) -> ServiceResult<Vec<Product>> {
        let company_id = actor.require(Permission::Checkout)?;
        Ok(self.repo.list_products(company_id, query)?)
    }

    pub fn deactivate_product(&self, actor: &Actor, id: ProductId) -> ServiceResult<()> {
        let company_id = actor.require(Permission::ManageCatalog)?;
        self.repo.deactivate_product(company_id, id)?;
        info!("event=product_deactivate module=catalog status=ok company_id={company_id}");
        Ok(())
    }
}
