//! Product catalog repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide tenant-scoped CRUD over `products`.
//! - Provide sku-keyed upsert used by bulk import.
//!
//! # Invariants
//! - Every statement binds `company_id`.
//! - Deactivation is a soft flag; sold products are never hard-deleted.

use super::{
    bool_to_int, like_pattern, map_unique_violation, normalize_list_limit, parse_flag, parse_uuid,
    RepoError, RepoResult,
};
use crate::model::org::CompanyId;
use crate::model::ValidationError;
use crate::model::product::{normalize_sku, Product, ProductId};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use serde::Serialize;

const PRODUCT_SELECT_SQL: &str = "SELECT
    id,
    company_id,
    sku,
    name,
    category,
    price,
    stock,
    is_active
FROM products";

/// Query options for listing products.
#[derive(Debug, Clone, Default)]
pub struct ProductListQuery {
    /// Exact category match, case-insensitive.
    pub category: Option<String>,
    /// Substring match on name or sku.
    pub search: Option<String>,
    pub include_inactive: bool,
    /// Defaults to 20 and clamps to 100.
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Whether an upsert created a new row or refreshed an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// Repository interface for product catalog operations.
pub trait ProductRepository {
    fn create_product(&self, product: &Product) -> RepoResult<ProductId>;
    /// Rewrites sku, name, category, price and the active flag.
    ///
    /// `stock` is left untouched; it only moves through [`adjust_stock`]
    /// and sales.
    ///
    /// [`adjust_stock`]: ProductRepository::adjust_stock
    fn update_product(&self, product: &Product) -> RepoResult<()>;
    /// Adds `delta` to stock in one statement and returns the updated row.
    ///
    /// Refused with `Validation` when the result would go below zero.
    fn adjust_stock(&self, company_id: CompanyId, id: ProductId, delta: i64)
        -> RepoResult<Product>;
    fn get_product(&self, company_id: CompanyId, id: ProductId) -> RepoResult<Option<Product>>;
    fn get_product_by_sku(&self, company_id: CompanyId, sku: &str)
        -> RepoResult<Option<Product>>;
    fn list_products(
        &self,
        company_id: CompanyId,
        query: &ProductListQuery,
    ) -> RepoResult<Vec<Product>>;
    /// Active products with `stock <= threshold`, lowest stock first.
    fn list_low_stock(
        &self,
        company_id: CompanyId,
        threshold: i64,
        limit: u32,
    ) -> RepoResult<Vec<Product>>;
    fn deactivate_product(&self, company_id: CompanyId, id: ProductId) -> RepoResult<()>;
    /// Inserts by sku or refreshes name/category/price/stock of the existing row.
    fn upsert_product_by_sku(&self, product: &Product) -> RepoResult<UpsertOutcome>;
}

/// SQLite-backed product repository.
pub struct SqliteProductRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteProductRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl ProductRepository for SqliteProductRepository<'_> {
    fn create_product(&self, product: &Product) -> RepoResult<ProductId> {
        product.validate()?;

        self.conn
            .execute(
                "INSERT INTO products (
                    id,
                    company_id,
                    sku,
                    name,
                    category,
                    price,
                    stock,
                    is_active
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
                params![
                    product.id.to_string(),
                    product.company_id.to_string(),
                    product.sku.as_str(),
                    product.name.as_str(),
                    product.category.as_deref(),
                    product.price,
                    product.stock,
                    bool_to_int(product.is_active),
                ],
            )
            .map_err(|err| {
                map_unique_violation(err, || format!("sku `{}` already exists", product.sku))
            })?;

        Ok(product.id)
    }

    fn update_product(&self, product: &Product) -> RepoResult<()> {
        product.validate()?;

        let changed = self
            .conn
            .execute(
                "UPDATE products
                 SET
                    sku = ?1,
                    name = ?2,
                    category = ?3,
                    price = ?4,
                    is_active = ?5,
                    updated_at = (strftime('%s', 'now') * 1000)
                 WHERE id = ?6 AND company_id = ?7;",
                params![
                    product.sku.as_str(),
                    product.name.as_str(),
                    product.category.as_deref(),
                    product.price,
                    bool_to_int(product.is_active),
                    product.id.to_string(),
                    product.company_id.to_string(),
                ],
            )
            .map_err(|err| {
                map_unique_violation(err, || format!("sku `{}` already exists", product.sku))
            })?;

        if changed == 0 {
            return Err(RepoError::not_found("product", product.id));
        }
        Ok(())
    }

    fn adjust_stock(
        &self,
        company_id: CompanyId,
        id: ProductId,
        delta: i64,
    ) -> RepoResult<Product> {
        let changed = self.conn.execute(
            "UPDATE products
             SET
                stock = stock + ?1,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?2 AND company_id = ?3 AND stock + ?1 >= 0;",
            params![delta, id.to_string(), company_id.to_string()],
        )?;

        let product = self
            .get_product(company_id, id)?
            .ok_or_else(|| RepoError::not_found("product", id))?;
        if changed == 0 {
            return Err(ValidationError::Negative("product.stock").into());
        }
        Ok(product)
    }

    fn get_product(&self, company_id: CompanyId, id: ProductId) -> RepoResult<Option<Product>> {
        let mut stmt = self.conn.prepare(&format!(
            "{PRODUCT_SELECT_SQL} WHERE id = ?1 AND company_id = ?2;"
        ))?;
        let mut rows = stmt.query(params![id.to_string(), company_id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_product_row(row)?));
        }
        Ok(None)
    }

    fn get_product_by_sku(
        &self,
        company_id: CompanyId,
        sku: &str,
    ) -> RepoResult<Option<Product>> {
        let mut stmt = self.conn.prepare(&format!(
            "{PRODUCT_SELECT_SQL} WHERE company_id = ?1 AND sku = ?2;"
        ))?;
        let mut rows = stmt.query(params![company_id.to_string(), normalize_sku(sku)])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_product_row(row)?));
        }
        Ok(None)
    }

    fn list_products(
        &self,
        company_id: CompanyId,
        query: &ProductListQuery,
    ) -> RepoResult<Vec<Product>> {
        let mut sql = format!("{PRODUCT_SELECT_SQL} WHERE company_id = ?");
        let mut bind_values: Vec<Value> = vec![Value::Text(company_id.to_string())];

        if !query.include_inactive {
            sql.push_str(" AND is_active = 1");
        }

        if let Some(category) = query.category.as_deref().map(str::trim) {
            if !category.is_empty() {
                sql.push_str(" AND category = ? COLLATE NOCASE");
                bind_values.push(Value::Text(category.to_string()));
            }
        }

        if let Some(search) = query.search.as_deref() {
            if !search.trim().is_empty() {
                sql.push_str(" AND (name LIKE ? ESCAPE '\\' OR sku LIKE ? ESCAPE '\\')");
                let pattern = like_pattern(search);
                bind_values.push(Value::Text(pattern.clone()));
                bind_values.push(Value::Text(pattern));
            }
        }

        sql.push_str(" ORDER BY name COLLATE NOCASE ASC, id ASC LIMIT ?");
        bind_values.push(Value::Integer(i64::from(normalize_list_limit(query.limit))));
        if query.offset > 0 {
            sql.push_str(" OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut products = Vec::new();
        while let Some(row) = rows.next()? {
            products.push(parse_product_row(row)?);
        }
        Ok(products)
    }

    fn list_low_stock(
        &self,
        company_id: CompanyId,
        threshold: i64,
        limit: u32,
    ) -> RepoResult<Vec<Product>> {
        let mut stmt = self.conn.prepare(&format!(
            "{PRODUCT_SELECT_SQL}
             WHERE company_id = ?1
               AND is_active = 1
               AND stock <= ?2
             ORDER BY stock ASC, name COLLATE NOCASE ASC, id ASC
             LIMIT ?3;"
        ))?;
        let mut rows = stmt.query(params![
            company_id.to_string(),
            threshold,
            i64::from(limit)
        ])?;
        let mut products = Vec::new();
        while let Some(row) = rows.next()? {
            products.push(parse_product_row(row)?);
        }
        Ok(products)
    }

    fn deactivate_product(&self, company_id: CompanyId, id: ProductId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE products
             SET
                is_active = 0,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1 AND company_id = ?2;",
            params![id.to_string(), company_id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("product", id));
        }
        Ok(())
    }

    fn upsert_product_by_sku(&self, product: &Product) -> RepoResult<UpsertOutcome> {
        product.validate()?;

        let changed = self.conn.execute(
            "UPDATE products
             SET
                name = ?1,
                category = ?2,
                price = ?3,
                stock = ?4,
                is_active = 1,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE company_id = ?5 AND sku = ?6;",
            params![
                product.name.as_str(),
                product.category.as_deref(),
                product.price,
                product.stock,
                product.company_id.to_string(),
                product.sku.as_str(),
            ],
        )?;
        if changed > 0 {
            return Ok(UpsertOutcome::Updated);
        }

        self.create_product(product)?;
        Ok(UpsertOutcome::Inserted)
    }
}

pub(crate) fn parse_product_row(row: &Row<'_>) -> RepoResult<Product> {
    let id: String = row.get("id")?;
    let company_id: String = row.get("company_id")?;
    let product = Product {
        id: parse_uuid(&id, "products.id")?,
        company_id: parse_uuid(&company_id, "products.company_id")?,
        sku: row.get("sku")?,
        name: row.get("name")?,
        category: row.get("category")?,
        price: row.get("price")?,
        stock: row.get("stock")?,
        is_active: parse_flag(row.get("is_active")?, "products.is_active")?,
    };
    product
        .validate()
        .map_err(|err| RepoError::InvalidData(format!("product {id}: {err}")))?;
    Ok(product)
}
