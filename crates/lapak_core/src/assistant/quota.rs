//! Monthly assistant quota periods and status.
//!
//! # Invariants
//! - A period is the UTC calendar month `YYYY-MM` of the request time.
//! - Remaining counts saturate at zero; token usage may overshoot the limit
//!   by at most one reply.

use crate::config::QuotaLimits;
use crate::model::org::Plan;
use crate::repo::quota_repo::QuotaUsage;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Billing period key for `at_ms`.
pub fn period_key(at_ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(at_ms)
        .unwrap_or_default()
        .format("%Y-%m")
        .to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuotaStatus {
    pub period: String,
    pub plan: Plan,
    pub limits: QuotaLimits,
    pub usage: QuotaUsage,
}

impl QuotaStatus {
    pub fn remaining_requests(&self) -> u64 {
        self.limits.max_requests.saturating_sub(self.usage.requests_used)
    }

    pub fn remaining_tokens(&self) -> u64 {
        self.limits.max_tokens.saturating_sub(self.usage.tokens_used)
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining_requests() == 0 || self.remaining_tokens() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuotaError {
    Exhausted(QuotaStatus),
}

impl Display for QuotaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exhausted(status) => write!(
                f,
                "assistant quota exhausted for {}: {}/{} requests, {}/{} tokens",
                status.period,
                status.usage.requests_used,
                status.limits.max_requests,
                status.usage.tokens_used,
                status.limits.max_tokens
            ),
        }
    }
}

impl Error for QuotaError {}

#[cfg(test)]
mod tests {
    use super::{period_key, QuotaStatus};
    use crate::config::QuotaLimits;
    use crate::model::org::Plan;
    use crate::repo::quota_repo::QuotaUsage;

    #[test]
    fn period_key_uses_utc_month() {
        // 2024-02-29T23:59:59.999Z
        assert_eq!(period_key(1_709_251_199_999), "2024-02");
        assert_eq!(period_key(1_709_251_200_000), "2024-03");
        assert_eq!(period_key(0), "1970-01");
    }

    #[test]
    fn remaining_saturates_and_reports_exhaustion() {
        let status = QuotaStatus {
            period: "2024-03".to_string(),
            plan: Plan::Free,
            limits: QuotaLimits {
                max_requests: 3,
                max_tokens: 100,
            },
            usage: QuotaUsage {
                requests_used: 1,
                tokens_used: 130,
            },
        };
        assert_eq!(status.remaining_requests(), 2);
        assert_eq!(status.remaining_tokens(), 0);
        assert!(status.is_exhausted());
    }
}
