//! Business context assembly for assistant prompts.
//!
//! # Invariants
//! - Only aggregates of the requested tenant are read.
//! - Rendering is deterministic for the same data and reference time.
//! - No individual customer is named; RFM appears as a distribution.

use crate::config::AssistantConfig;
use crate::model::org::CompanyId;
use crate::model::product::Product;
use crate::report::{
    revenue_summary, store_performance, top_products, DateRange, ProductSales, RevenueSummary,
    StorePerformance,
};
use crate::repo::customer_repo::{CustomerRepository, SqliteCustomerRepository};
use crate::repo::product_repo::{ProductRepository, SqliteProductRepository};
use crate::repo::RepoResult;
use crate::rfm::{self, SegmentSummary};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;
use std::fmt::{self, Display, Formatter};

const LOW_STOCK_LIMIT: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextOptions {
    pub days: u32,
    pub top_products: u32,
    pub low_stock_threshold: i64,
    pub rfm_lookback_days: u32,
}

impl ContextOptions {
    pub fn from_config(assistant: &AssistantConfig, rfm_lookback_days: u32) -> Self {
        Self {
            days: assistant.context_days,
            top_products: assistant.top_products,
            low_stock_threshold: assistant.low_stock_threshold,
            rfm_lookback_days,
        }
    }
}

/// Aggregates fed into the assistant prompt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BusinessContext {
    pub company_name: String,
    pub generated_at_ms: i64,
    pub current: DateRange,
    pub summary: RevenueSummary,
    pub previous_summary: RevenueSummary,
    pub top_products: Vec<ProductSales>,
    pub stores: Vec<StorePerformance>,
    pub low_stock: Vec<Product>,
    pub registered_customers: u64,
    pub segments: Vec<SegmentSummary>,
}

/// Runs the aggregate queries for one tenant.
pub fn build_business_context(
    conn: &Connection,
    company_id: CompanyId,
    company_name: &str,
    now_ms: i64,
    options: &ContextOptions,
) -> RepoResult<BusinessContext> {
    let current = DateRange::ending_at(now_ms, options.days);
    let products = SqliteProductRepository::new(conn);
    let rfm_report = rfm::analyze(conn, company_id, now_ms, options.rfm_lookback_days)?;

    Ok(BusinessContext {
        company_name: company_name.to_string(),
        generated_at_ms: now_ms,
        current,
        summary: revenue_summary(conn, company_id, current)?,
        previous_summary: revenue_summary(conn, company_id, current.previous())?,
        top_products: top_products(conn, company_id, current, options.top_products)?,
        stores: store_performance(conn, company_id, current)?,
        low_stock: products.list_low_stock(
            company_id,
            options.low_stock_threshold,
            LOW_STOCK_LIMIT,
        )?,
        registered_customers: SqliteCustomerRepository::new(conn).count_customers(company_id)?,
        segments: rfm_report.segments,
    })
}

impl BusinessContext {
    /// Plain-text block placed between the instructions and the question.
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl Display for BusinessContext {
    fn fmt(&self, out: &mut Formatter<'_>) -> fmt::Result {
        let days = (self.current.end_ms - self.current.start_ms) / crate::report::DAY_MS;

        writeln!(out, "Business: {}", self.company_name)?;
        writeln!(
            out,
            "Period: {} to {} ({} days, UTC)",
            utc_date(self.current.start_ms),
            utc_date(self.current.end_ms - 1),
            days
        )?;

        writeln!(out, "\nSales summary:")?;
        writeln!(
            out,
            "- Revenue: {} ({})",
            format_rupiah(self.summary.revenue),
            change_label(self.summary.revenue, self.previous_summary.revenue)
        )?;
        writeln!(
            out,
            "- Transactions: {} (previous period {})",
            self.summary.transactions, self.previous_summary.transactions
        )?;
        writeln!(out, "- Items sold: {}", self.summary.items_sold)?;
        writeln!(
            out,
            "- Average basket: {}",
            format_rupiah(self.summary.average_basket)
        )?;

        writeln!(out, "\nTop products:")?;
        if self.top_products.is_empty() {
            writeln!(out, "- none")?;
        }
        for (rank, product) in self.top_products.iter().enumerate() {
            writeln!(
                out,
                "{}. {}: {} sold, {}",
                rank + 1,
                product.name,
                product.quantity,
                format_rupiah(product.revenue)
            )?;
        }

        writeln!(out, "\nStores:")?;
        if self.stores.is_empty() {
            writeln!(out, "- none")?;
        }
        for store in &self.stores {
            writeln!(
                out,
                "- {}: {} transactions, {}",
                store.name,
                store.transactions,
                format_rupiah(store.revenue)
            )?;
        }

        writeln!(out, "\nLow stock:")?;
        if self.low_stock.is_empty() {
            writeln!(out, "- none")?;
        }
        for product in &self.low_stock {
            writeln!(out, "- {} ({}): {} left", product.name, product.sku, product.stock)?;
        }

        writeln!(
            out,
            "\nCustomer segments (RFM, {} registered):",
            self.registered_customers
        )?;
        if self.segments.is_empty() {
            writeln!(out, "- no scored customers")?;
        }
        for segment in &self.segments {
            writeln!(
                out,
                "- {}: {} customers ({:.2}%), {}",
                segment.label,
                segment.customers,
                segment.percentage,
                format_rupiah(segment.monetary)
            )?;
        }
        Ok(())
    }
}

fn utc_date(at_ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(at_ms)
        .unwrap_or_default()
        .format("%Y-%m-%d")
        .to_string()
}

/// `1250000` -> `Rp 1.250.000`.
pub fn format_rupiah(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }
    if amount < 0 {
        format!("-Rp {grouped}")
    } else {
        format!("Rp {grouped}")
    }
}

fn change_label(current: i64, previous: i64) -> String {
    if previous == 0 {
        return "no sales in previous period".to_string();
    }
    let change = (current - previous) as f64 * 100.0 / previous as f64;
    format!("{change:+.1}% vs previous period")
}

#[cfg(test)]
mod tests {
    use super::{change_label, format_rupiah, BusinessContext};
    use crate::model::product::Product;
    use crate::report::{DateRange, ProductSales, RevenueSummary, StorePerformance, DAY_MS};
    use crate::rfm::{Segment, SegmentSummary};
    use uuid::Uuid;

    #[test]
    fn format_rupiah_groups_thousands() {
        assert_eq!(format_rupiah(0), "Rp 0");
        assert_eq!(format_rupiah(999), "Rp 999");
        assert_eq!(format_rupiah(1_000), "Rp 1.000");
        assert_eq!(format_rupiah(1_250_000), "Rp 1.250.000");
        assert_eq!(format_rupiah(-15_000), "-Rp 15.000");
    }

    #[test]
    fn change_label_handles_empty_previous_period() {
        assert_eq!(change_label(100, 0), "no sales in previous period");
        assert_eq!(change_label(150, 100), "+50.0% vs previous period");
        assert_eq!(change_label(50, 100), "-50.0% vs previous period");
    }

    #[test]
    fn render_is_deterministic_and_marks_empty_sections() {
        let context = BusinessContext {
            company_name: "Toko Maju".to_string(),
            generated_at_ms: 30 * DAY_MS,
            current: DateRange::ending_at(30 * DAY_MS, 30),
            summary: RevenueSummary {
                revenue: 45_000,
                transactions: 3,
                items_sold: 5,
                average_basket: 15_000,
            },
            previous_summary: RevenueSummary::default(),
            top_products: Vec::new(),
            stores: Vec::new(),
            low_stock: Vec::new(),
            registered_customers: 4,
            segments: Vec::new(),
        };
        let rendered = context.render();
        assert_eq!(rendered, context.render());
        assert!(rendered.starts_with("Business: Toko Maju\n"));
        assert!(rendered.contains("- Revenue: Rp 45.000 (no sales in previous period)"));
        assert!(rendered.contains("(RFM, 4 registered):\n- no scored customers"));
        assert!(rendered.contains("(30 days, UTC)"));
    }

    #[test]
    fn populated_sections_render_every_row() {
        let company_id = Uuid::new_v4();
        let context = BusinessContext {
            company_name: "Toko Maju".to_string(),
            generated_at_ms: 30 * DAY_MS,
            current: DateRange::ending_at(30 * DAY_MS, 30),
            summary: RevenueSummary {
                revenue: 60_000,
                transactions: 4,
                items_sold: 6,
                average_basket: 15_000,
            },
            previous_summary: RevenueSummary {
                revenue: 30_000,
                transactions: 2,
                items_sold: 3,
                average_basket: 15_000,
            },
            top_products: vec![ProductSales {
                product_id: Uuid::new_v4(),
                name: "Kopi Tubruk".to_string(),
                quantity: 6,
                revenue: 60_000,
            }],
            stores: vec![StorePerformance {
                store_id: Uuid::new_v4(),
                name: "Pusat".to_string(),
                transactions: 4,
                revenue: 60_000,
            }],
            low_stock: vec![Product::new(company_id, "GULA-01", "Gula Pasir", 14_000, 2)],
            registered_customers: 2,
            segments: vec![SegmentSummary {
                segment: Segment::Champions,
                label: Segment::Champions.label(),
                customers: 2,
                percentage: 100.0,
                monetary: 60_000,
                avg_recency_days: 1.0,
                avg_frequency: 2.0,
                avg_monetary: 30_000.0,
            }],
        };

        let rendered = context.render();
        assert_eq!(rendered, format!("{context}"));
        assert!(rendered.contains("- Transactions: 4 (previous period 2)\n"));
        assert!(rendered.contains("\nTop products:\n1. Kopi Tubruk: 6 sold, Rp 60.000\n"));
        assert!(rendered.contains("\nStores:\n- Pusat: 4 transactions, Rp 60.000\n"));
        assert!(rendered.contains("\nLow stock:\n- Gula Pasir (GULA-01): 2 left\n"));
        assert!(rendered.ends_with("- Champions: 2 customers (100.00%), Rp 60.000\n"));
        assert!(!rendered.contains("- none"));
    }
}
