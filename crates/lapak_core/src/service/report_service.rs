//! Dashboard and RFM reads behind `ViewReports`.
//!
//! # Invariants
//! - Tenant members only read their own company; super admins may read any.

use super::ServiceResult;
use crate::access::{Actor, Permission};
use crate::model::org::CompanyId;
use crate::report::{
    daily_revenue, payment_breakdown, revenue_summary, store_performance, top_products,
    DailyRevenue, DateRange, PaymentBreakdown, ProductSales, RevenueSummary, StorePerformance,
};
use crate::rfm::{self, RfmReport};
use log::info;
use rusqlite::Connection;
use serde::Serialize;
use std::time::Instant;

const DASHBOARD_TOP_PRODUCTS: u32 = 10;

/// Everything the "Data All" dashboard shows for one range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub company_id: CompanyId,
    pub range: DateRange,
    pub summary: RevenueSummary,
    pub previous: RevenueSummary,
    pub top_products: Vec<ProductSales>,
    pub stores: Vec<StorePerformance>,
    pub daily: Vec<DailyRevenue>,
    pub payments: Vec<PaymentBreakdown>,
}

pub struct ReportService<'conn> {
    conn: &'conn Connection,
}

impl<'conn> ReportService<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn dashboard(
        &self,
        actor: &Actor,
        company_id: CompanyId,
        range: DateRange,
    ) -> ServiceResult<Dashboard> {
        let company_id = actor.tenant_for(company_id, Permission::ViewReports)?;
        let started_at = Instant::now();
        let dashboard = Dashboard {
            company_id,
            range,
            summary: revenue_summary(self.conn, company_id, range)?,
            previous: revenue_summary(self.conn, company_id, range.previous())?,
            top_products: top_products(self.conn, company_id, range, DASHBOARD_TOP_PRODUCTS)?,
            stores: store_performance(self.conn, company_id, range)?,
            daily: daily_revenue(self.conn, company_id, range)?,
            payments: payment_breakdown(self.conn, company_id, range)?,
        };
        info!(
            "event=dashboard module=report status=ok company_id={} transactions={} duration_ms={}",
            company_id,
            dashboard.summary.transactions,
            started_at.elapsed().as_millis()
        );
        Ok(dashboard)
    }

    pub fn rfm(
        &self,
        actor: &Actor,
        company_id: CompanyId,
        reference_ms: i64,
        lookback_days: u32,
    ) -> ServiceResult<RfmReport> {
        let company_id = actor.tenant_for(company_id, Permission::ViewReports)?;
        Ok(rfm::analyze(self.conn, company_id, reference_ms, lookback_days)?)
    }
}
