//! Assistant quota counters and chat usage log.
//!
//! # Invariants
//! - Counters are keyed by `(company_id, period)`; a period is `YYYY-MM`.
//! - `try_consume_request` never lets `requests_used` exceed the limit,
//!   even with concurrent callers: the increment is one conditional UPDATE.
//! - A chat log row exists exactly when its tokens were billed.

use super::{RepoError, RepoResult};
use crate::model::org::{CompanyId, EmployeeId};
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use serde::Serialize;
use uuid::Uuid;

/// Usage snapshot for one tenant and billing period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QuotaUsage {
    pub requests_used: u64,
    pub tokens_used: u64,
}

/// Metadata-only record of one assistant exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatLogEntry {
    pub company_id: CompanyId,
    pub employee_id: EmployeeId,
    pub period: String,
    pub question_chars: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub created_at: i64,
}

/// Repository interface for quota accounting.
pub trait QuotaRepository {
    fn get_usage(&self, company_id: CompanyId, period: &str) -> RepoResult<QuotaUsage>;
    /// Takes one request slot when both counters are under their limits.
    ///
    /// Returns `false` without side effects when the quota is exhausted.
    fn try_consume_request(
        &self,
        company_id: CompanyId,
        period: &str,
        max_requests: u64,
        max_tokens: u64,
    ) -> RepoResult<bool>;
    /// Gives back a slot taken by `try_consume_request` (provider failure).
    fn release_request(&self, company_id: CompanyId, period: &str) -> RepoResult<()>;
    /// Bills the exchange's tokens and writes its log row, both or neither.
    fn record_exchange(&self, entry: &ChatLogEntry) -> RepoResult<()>;
    fn count_chat_logs(&self, company_id: CompanyId, period: &str) -> RepoResult<u64>;
}

/// SQLite-backed quota repository.
pub struct SqliteQuotaRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteQuotaRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl QuotaRepository for SqliteQuotaRepository<'_> {
    fn get_usage(&self, company_id: CompanyId, period: &str) -> RepoResult<QuotaUsage> {
        let usage = self
            .conn
            .query_row(
                "SELECT requests_used, tokens_used
                 FROM ai_quota_usage
                 WHERE company_id = ?1 AND period = ?2;",
                params![company_id.to_string(), period],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
            )
            .optional()?;

        match usage {
            Some((requests, tokens)) => Ok(QuotaUsage {
                requests_used: to_counter(requests, "ai_quota_usage.requests_used")?,
                tokens_used: to_counter(tokens, "ai_quota_usage.tokens_used")?,
            }),
            None => Ok(QuotaUsage::default()),
        }
    }

    fn try_consume_request(
        &self,
        company_id: CompanyId,
        period: &str,
        max_requests: u64,
        max_tokens: u64,
    ) -> RepoResult<bool> {
        let company_text = company_id.to_string();
        self.conn.execute(
            "INSERT OR IGNORE INTO ai_quota_usage (company_id, period) VALUES (?1, ?2);",
            params![company_text.as_str(), period],
        )?;
        let changed = self.conn.execute(
            "UPDATE ai_quota_usage
             SET
                requests_used = requests_used + 1,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE company_id = ?1
               AND period = ?2
               AND requests_used < ?3
               AND tokens_used < ?4;",
            params![
                company_text.as_str(),
                period,
                to_sql_counter(max_requests),
                to_sql_counter(max_tokens),
            ],
        )?;
        Ok(changed == 1)
    }

    fn release_request(&self, company_id: CompanyId, period: &str) -> RepoResult<()> {
        self.conn.execute(
            "UPDATE ai_quota_usage
             SET
                requests_used = requests_used - 1,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE company_id = ?1
               AND period = ?2
               AND requests_used > 0;",
            params![company_id.to_string(), period],
        )?;
        Ok(())
    }

    fn record_exchange(&self, entry: &ChatLogEntry) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let company_text = entry.company_id.to_string();
        let tokens = entry.prompt_tokens.saturating_add(entry.completion_tokens);
        let changed = tx.execute(
            "UPDATE ai_quota_usage
             SET
                tokens_used = tokens_used + ?3,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE company_id = ?1 AND period = ?2;",
            params![company_text.as_str(), entry.period.as_str(), to_sql_counter(tokens)],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found(
                "quota period",
                format!("{}/{}", entry.company_id, entry.period),
            ));
        }
        tx.execute(
            "INSERT INTO ai_chat_logs (
                id,
                company_id,
                employee_id,
                period,
                question_chars,
                prompt_tokens,
                completion_tokens,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                Uuid::new_v4().to_string(),
                company_text.as_str(),
                entry.employee_id.to_string(),
                entry.period.as_str(),
                to_sql_counter(entry.question_chars),
                to_sql_counter(entry.prompt_tokens),
                to_sql_counter(entry.completion_tokens),
                entry.created_at,
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn count_chat_logs(&self, company_id: CompanyId, period: &str) -> RepoResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM ai_chat_logs WHERE company_id = ?1 AND period = ?2;",
            params![company_id.to_string(), period],
            |row| row.get(0),
        )?;
        to_counter(count, "ai_chat_logs.count")
    }
}

fn to_counter(value: i64, column: &str) -> RepoResult<u64> {
    u64::try_from(value)
        .map_err(|_| RepoError::InvalidData(format!("negative counter `{value}` in {column}")))
}

fn to_sql_counter(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
