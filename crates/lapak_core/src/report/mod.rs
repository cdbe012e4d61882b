//! Tenant dashboard aggregations ("Data All" report).
//!
//! # Responsibility
//! - Aggregate sales into revenue, product, store, daily and payment views.
//! - Define revenue once: the sum of `transaction_items.line_total`.
//!
//! # Invariants
//! - Every query filters on `company_id`.
//! - Ranges are half-open `[start_ms, end_ms)`.
//! - Ordering is deterministic for equal aggregates.

use crate::model::org::{CompanyId, StoreId};
use crate::model::product::ProductId;
use crate::repo::{parse_uuid, RepoError, RepoResult};
use chrono::NaiveDate;
use rusqlite::{params, Connection};
use serde::Serialize;

pub const DAY_MS: i64 = 86_400_000;

/// Half-open time range in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start_ms: i64,
    pub end_ms: i64,
}

impl DateRange {
    pub fn new(start_ms: i64, end_ms: i64) -> Self {
        Self { start_ms, end_ms }
    }

    /// The `days` days up to and including `reference_ms`.
    pub fn ending_at(reference_ms: i64, days: u32) -> Self {
        let end_ms = reference_ms.saturating_add(1);
        Self {
            start_ms: end_ms.saturating_sub(i64::from(days).saturating_mul(DAY_MS)),
            end_ms,
        }
    }

    /// The range of equal length immediately before this one.
    pub fn previous(&self) -> Self {
        let length = self.end_ms.saturating_sub(self.start_ms);
        Self {
            start_ms: self.start_ms.saturating_sub(length),
            end_ms: self.start_ms,
        }
    }

    pub fn contains(&self, at_ms: i64) -> bool {
        at_ms >= self.start_ms && at_ms < self.end_ms
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RevenueSummary {
    pub revenue: i64,
    pub transactions: u64,
    pub items_sold: i64,
    /// Integer average of revenue per transaction; zero without sales.
    pub average_basket: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductSales {
    pub product_id: ProductId,
    pub name: String,
    pub quantity: i64,
    pub revenue: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorePerformance {
    pub store_id: StoreId,
    pub name: String,
    pub transactions: u64,
    pub revenue: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyRevenue {
    pub date: NaiveDate,
    pub transactions: u64,
    pub revenue: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentBreakdown {
    pub method: String,
    pub transactions: u64,
    pub revenue: i64,
}

pub fn revenue_summary(
    conn: &Connection,
    company_id: CompanyId,
    range: DateRange,
) -> RepoResult<RevenueSummary> {
    let (transactions, revenue, items_sold): (i64, i64, i64) = conn.query_row(
        "SELECT
            COUNT(DISTINCT t.id),
            COALESCE(SUM(i.line_total), 0),
            COALESCE(SUM(i.quantity), 0)
         FROM transactions t
         JOIN transaction_items i ON i.transaction_id = t.id
         WHERE t.company_id = ?1
           AND t.created_at >= ?2
           AND t.created_at < ?3;",
        params![company_id.to_string(), range.start_ms, range.end_ms],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    )?;
    let transactions = to_count(transactions)?;
    let average_basket = if transactions == 0 {
        0
    } else {
        revenue / transactions as i64
    };
    Ok(RevenueSummary {
        revenue,
        transactions,
        items_sold,
        average_basket,
    })
}

/// Best sellers by revenue, then quantity.
pub fn top_products(
    conn: &Connection,
    company_id: CompanyId,
    range: DateRange,
    limit: u32,
) -> RepoResult<Vec<ProductSales>> {
    let mut stmt = conn.prepare(
        "SELECT
            i.product_id AS product_id,
            p.name AS name,
            SUM(i.quantity) AS quantity,
            SUM(i.line_total) AS revenue
         FROM transactions t
         JOIN transaction_items i ON i.transaction_id = t.id
         JOIN products p ON p.id = i.product_id AND p.company_id = t.company_id
         WHERE t.company_id = ?1
           AND t.created_at >= ?2
           AND t.created_at < ?3
         GROUP BY i.product_id, p.name
         ORDER BY revenue DESC, quantity DESC, i.product_id ASC
         LIMIT ?4;",
    )?;
    let mut rows = stmt.query(params![
        company_id.to_string(),
        range.start_ms,
        range.end_ms,
        i64::from(limit)
    ])?;
    let mut products = Vec::new();
    while let Some(row) = rows.next()? {
        let product_id: String = row.get("product_id")?;
        products.push(ProductSales {
            product_id: parse_uuid(&product_id, "transaction_items.product_id")?,
            name: row.get("name")?,
            quantity: row.get("quantity")?,
            revenue: row.get("revenue")?,
        });
    }
    Ok(products)
}

/// Every store of the tenant, including stores without sales in range.
pub fn store_performance(
    conn: &Connection,
    company_id: CompanyId,
    range: DateRange,
) -> RepoResult<Vec<StorePerformance>> {
    let mut stmt = conn.prepare(
        "SELECT
            s.id AS store_id,
            s.name AS name,
            COUNT(DISTINCT t.id) AS transactions,
            COALESCE(SUM(i.line_total), 0) AS revenue
         FROM stores s
         LEFT JOIN transactions t
           ON t.store_id = s.id
          AND t.company_id = s.company_id
          AND t.created_at >= ?2
          AND t.created_at < ?3
         LEFT JOIN transaction_items i ON i.transaction_id = t.id
         WHERE s.company_id = ?1
         GROUP BY s.id, s.name
         ORDER BY revenue DESC, s.name COLLATE NOCASE ASC, s.id ASC;",
    )?;
    let mut rows = stmt.query(params![company_id.to_string(), range.start_ms, range.end_ms])?;
    let mut stores = Vec::new();
    while let Some(row) = rows.next()? {
        let store_id: String = row.get("store_id")?;
        stores.push(StorePerformance {
            store_id: parse_uuid(&store_id, "stores.id")?,
            name: row.get("name")?,
            transactions: to_count(row.get("transactions")?)?,
            revenue: row.get("revenue")?,
        });
    }
    Ok(stores)
}

/// Revenue per UTC calendar day; days without sales are omitted.
pub fn daily_revenue(
    conn: &Connection,
    company_id: CompanyId,
    range: DateRange,
) -> RepoResult<Vec<DailyRevenue>> {
    let mut stmt = conn.prepare(
        "SELECT
            date(t.created_at / 1000, 'unixepoch') AS day,
            COUNT(DISTINCT t.id) AS transactions,
            SUM(i.line_total) AS revenue
         FROM transactions t
         JOIN transaction_items i ON i.transaction_id = t.id
         WHERE t.company_id = ?1
           AND t.created_at >= ?2
           AND t.created_at < ?3
         GROUP BY day
         ORDER BY day ASC;",
    )?;
    let mut rows = stmt.query(params![company_id.to_string(), range.start_ms, range.end_ms])?;
    let mut days = Vec::new();
    while let Some(row) = rows.next()? {
        let day: String = row.get("day")?;
        let date = NaiveDate::parse_from_str(&day, "%Y-%m-%d")
            .map_err(|_| RepoError::InvalidData(format!("invalid report day `{day}`")))?;
        days.push(DailyRevenue {
            date,
            transactions: to_count(row.get("transactions")?)?,
            revenue: row.get("revenue")?,
        });
    }
    Ok(days)
}

pub fn payment_breakdown(
    conn: &Connection,
    company_id: CompanyId,
    range: DateRange,
) -> RepoResult<Vec<PaymentBreakdown>> {
    let mut stmt = conn.prepare(
        "SELECT
            t.payment_method AS method,
            COUNT(DISTINCT t.id) AS transactions,
            SUM(i.line_total) AS revenue
         FROM transactions t
         JOIN transaction_items i ON i.transaction_id = t.id
         WHERE t.company_id = ?1
           AND t.created_at >= ?2
           AND t.created_at < ?3
         GROUP BY t.payment_method
         ORDER BY revenue DESC, method ASC;",
    )?;
    let mut rows = stmt.query(params![company_id.to_string(), range.start_ms, range.end_ms])?;
    let mut methods = Vec::new();
    while let Some(row) = rows.next()? {
        methods.push(PaymentBreakdown {
            method: row.get("method")?,
            transactions: to_count(row.get("transactions")?)?,
            revenue: row.get("revenue")?,
        });
    }
    Ok(methods)
}

fn to_count(value: i64) -> RepoResult<u64> {
    u64::try_from(value).map_err(|_| RepoError::InvalidData(format!("negative count {value}")))
}
