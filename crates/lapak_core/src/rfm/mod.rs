//! RFM (Recency / Frequency / Monetary) customer segmentation.
//!
//! # Responsibility
//! - Load per-customer purchase metrics for one tenant and window.
//! - Score and segment customers, then summarise each segment.
//!
//! # Invariants
//! - Customers without a transaction in the window are not scored.
//! - Monetary uses the same aggregation as [`crate::report::revenue_summary`]:
//!   scored monetary plus walk-in revenue equals window revenue.
//! - Recency never decreases as the reference time advances without new sales.

pub mod scoring;

use crate::model::customer::CustomerId;
use crate::model::org::CompanyId;
use crate::report::{DateRange, DAY_MS};
use crate::repo::{parse_uuid, RepoResult};
use log::info;
use rusqlite::{params, Connection};
use serde::Serialize;
use std::time::Instant;

pub use scoring::{score_population, segment_for, RfmScore, RfmValues, Segment};

/// Purchase metrics of one customer inside the window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomerMetrics {
    pub customer_id: CustomerId,
    pub name: String,
    pub last_purchase_ms: i64,
    pub recency_days: i64,
    pub frequency: u64,
    pub monetary: i64,
}

impl CustomerMetrics {
    pub fn values(&self) -> RfmValues {
        RfmValues {
            recency_days: self.recency_days,
            frequency: self.frequency,
            monetary: self.monetary,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomerRfm {
    pub metrics: CustomerMetrics,
    pub score: RfmScore,
    pub segment: Segment,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentSummary {
    pub segment: Segment,
    pub label: &'static str,
    pub customers: u64,
    /// Share of scored customers, percent rounded to two decimals.
    pub percentage: f64,
    pub monetary: i64,
    pub avg_recency_days: f64,
    pub avg_frequency: f64,
    pub avg_monetary: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RfmReport {
    pub company_id: CompanyId,
    pub reference_ms: i64,
    pub window: DateRange,
    /// Sorted by segment, then monetary descending, then customer id.
    pub customers: Vec<CustomerRfm>,
    /// Only segments with at least one customer, in [`Segment::ALL`] order.
    pub segments: Vec<SegmentSummary>,
    pub scored_monetary: i64,
    /// Revenue in the window from sales without a customer.
    pub walk_in_revenue: i64,
}

/// Whole days between `last_purchase_ms` and `reference_ms`, floored at 0.
pub fn recency_days(reference_ms: i64, last_purchase_ms: i64) -> i64 {
    reference_ms
        .saturating_sub(last_purchase_ms)
        .max(0)
        .div_euclid(DAY_MS)
}

/// Loads metrics for customers with at least one sale inside `window`.
pub fn load_customer_metrics(
    conn: &Connection,
    company_id: CompanyId,
    reference_ms: i64,
    window: DateRange,
) -> RepoResult<Vec<CustomerMetrics>> {
    let mut stmt = conn.prepare(
        "SELECT
            c.id AS customer_id,
            c.name AS name,
            MAX(t.created_at) AS last_purchase,
            COUNT(DISTINCT t.id) AS frequency,
            SUM(i.line_total) AS monetary
         FROM customers c
         JOIN transactions t
           ON t.customer_id = c.id
          AND t.company_id = c.company_id
         JOIN transaction_items i ON i.transaction_id = t.id
         WHERE c.company_id = ?1
           AND t.created_at >= ?2
           AND t.created_at < ?3
         GROUP BY c.id, c.name
         ORDER BY c.id ASC;",
    )?;
    let mut rows = stmt.query(params![
        company_id.to_string(),
        window.start_ms,
        window.end_ms
    ])?;

    let mut metrics = Vec::new();
    while let Some(row) = rows.next()? {
        let customer_id: String = row.get("customer_id")?;
        let last_purchase_ms: i64 = row.get("last_purchase")?;
        let frequency: i64 = row.get("frequency")?;
        metrics.push(CustomerMetrics {
            customer_id: parse_uuid(&customer_id, "customers.id")?,
            name: row.get("name")?,
            last_purchase_ms,
            recency_days: recency_days(reference_ms, last_purchase_ms),
            frequency: u64::try_from(frequency).unwrap_or(0),
            monetary: row.get("monetary")?,
        });
    }
    Ok(metrics)
}

/// Scores metrics and builds the report body. Pure; no storage access.
pub fn build_report(
    company_id: CompanyId,
    reference_ms: i64,
    window: DateRange,
    metrics: Vec<CustomerMetrics>,
    walk_in_revenue: i64,
) -> RfmReport {
    let values: Vec<RfmValues> = metrics.iter().map(CustomerMetrics::values).collect();
    let scores = score_population(&values);

    let mut customers: Vec<CustomerRfm> = metrics
        .into_iter()
        .zip(scores)
        .map(|(metrics, score)| CustomerRfm {
            metrics,
            score,
            segment: score.segment(),
        })
        .collect();
    customers.sort_by(|a, b| {
        a.segment
            .cmp(&b.segment)
            .then(b.metrics.monetary.cmp(&a.metrics.monetary))
            .then(a.metrics.customer_id.cmp(&b.metrics.customer_id))
    });

    let segments = summarize_segments(&customers);
    let scored_monetary = customers.iter().map(|c| c.metrics.monetary).sum();

    RfmReport {
        company_id,
        reference_ms,
        window,
        customers,
        segments,
        scored_monetary,
        walk_in_revenue,
    }
}

/// Runs the full RFM analysis for one tenant.
///
/// The window covers the `lookback_days` days up to and including
/// `reference_ms`.
pub fn analyze(
    conn: &Connection,
    company_id: CompanyId,
    reference_ms: i64,
    lookback_days: u32,
) -> RepoResult<RfmReport> {
    let started_at = Instant::now();
    let window = DateRange::ending_at(reference_ms, lookback_days);
    let metrics = load_customer_metrics(conn, company_id, reference_ms, window)?;
    let walk_in_revenue = walk_in_revenue(conn, company_id, window)?;
    let report = build_report(company_id, reference_ms, window, metrics, walk_in_revenue);

    info!(
        "event=rfm_analyze module=rfm status=ok company_id={} customers={} segments={} duration_ms={}",
        company_id,
        report.customers.len(),
        report.segments.len(),
        started_at.elapsed().as_millis()
    );
    Ok(report)
}

fn walk_in_revenue(
    conn: &Connection,
    company_id: CompanyId,
    window: DateRange,
) -> RepoResult<i64> {
    let revenue: i64 = conn.query_row(
        "SELECT COALESCE(SUM(i.line_total), 0)
         FROM transactions t
         JOIN transaction_items i ON i.transaction_id = t.id
         WHERE t.company_id = ?1
           AND t.customer_id IS NULL
           AND t.created_at >= ?2
           AND t.created_at < ?3;",
        params![company_id.to_string(), window.start_ms, window.end_ms],
        |row| row.get(0),
    )?;
    Ok(revenue)
}

fn summarize_segments(customers: &[CustomerRfm]) -> Vec<SegmentSummary> {
    let total = customers.len();
    if total == 0 {
        return Vec::new();
    }

    Segment::ALL
        .iter()
        .filter_map(|&segment| {
            let members: Vec<&CustomerRfm> =
                customers.iter().filter(|c| c.segment == segment).collect();
            if members.is_empty() {
                return None;
            }
            let count = members.len();
            let monetary: i64 = members.iter().map(|c| c.metrics.monetary).sum();
            let recency: i64 = members.iter().map(|c| c.metrics.recency_days).sum();
            let frequency: u64 = members.iter().map(|c| c.metrics.frequency).sum();
            Some(SegmentSummary {
                segment,
                label: segment.label(),
                customers: count as u64,
                percentage: round2(count as f64 * 100.0 / total as f64),
                monetary,
                avg_recency_days: round2(recency as f64 / count as f64),
                avg_frequency: round2(frequency as f64 / count as f64),
                avg_monetary: round2(monetary as f64 / count as f64),
            })
        })
        .collect()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::{build_report, recency_days, CustomerMetrics, Segment};
    use crate::report::{DateRange, DAY_MS};
    use uuid::Uuid;

    fn metrics(recency: i64, frequency: u64, monetary: i64) -> CustomerMetrics {
        CustomerMetrics {
            customer_id: Uuid::new_v4(),
            name: "customer".to_string(),
            last_purchase_ms: 0,
            recency_days: recency,
            frequency,
            monetary,
        }
    }

    #[test]
    fn recency_floors_partial_days_and_never_goes_negative() {
        assert_eq!(recency_days(3 * DAY_MS - 1, 0), 2);
        assert_eq!(recency_days(3 * DAY_MS, 0), 3);
        assert_eq!(recency_days(0, DAY_MS), 0);
    }

    #[test]
    fn report_percentages_and_totals_match_hand_computation() {
        let population = vec![
            metrics(1, 10, 500),
            metrics(5, 8, 400),
            metrics(10, 6, 300),
            metrics(20, 4, 200),
            metrics(40, 2, 100),
            metrics(40, 2, 100),
        ];
        let report = build_report(
            Uuid::new_v4(),
            100 * DAY_MS,
            DateRange::ending_at(100 * DAY_MS, 365),
            population,
            250,
        );

        // (5,5,5) (5,5,5) (4,4,4) -> Champions; (3,3,3) -> Need Attention;
        // both (2,2,2) -> Hibernating.
        let summary: Vec<(Segment, u64, f64)> = report
            .segments
            .iter()
            .map(|s| (s.segment, s.customers, s.percentage))
            .collect();
        assert_eq!(
            summary,
            vec![
                (Segment::Champions, 3, 50.0),
                (Segment::NeedAttention, 1, 16.67),
                (Segment::Hibernating, 2, 33.33),
            ]
        );
        assert_eq!(report.scored_monetary, 1_600);
        assert_eq!(report.walk_in_revenue, 250);
        assert_eq!(report.customers[0].metrics.monetary, 500);

        let hibernating = &report.segments[2];
        assert_eq!(hibernating.monetary, 200);
        assert_eq!(hibernating.avg_monetary, 100.0);
        assert_eq!(hibernating.avg_recency_days, 40.0);
        assert_eq!(hibernating.avg_frequency, 2.0);

        let champions = &report.segments[0];
        assert_eq!(champions.monetary, 1_200);
        assert_eq!(champions.avg_recency_days, 5.33);
    }

    #[test]
    fn empty_population_yields_empty_report() {
        let report = build_report(
            Uuid::new_v4(),
            0,
            DateRange::ending_at(0, 30),
            Vec::new(),
            0,
        );
        assert!(report.customers.is_empty());
        assert!(report.segments.is_empty());
        assert_eq!(report.scored_monetary, 0);
    }
}
