//! Tenant business assistant.
//!
//! # Responsibility
//! - Gate assistant calls by permission and monthly plan quota.
//! - Assemble a prompt from tenant aggregates and call a [`ChatProvider`].
//! - Record token usage and a metadata-only chat log.
//!
//! # Invariants
//! - A request slot is taken atomically before any context is built.
//! - A slot is given back when context assembly or the provider fails.
//! - Question and answer text are never persisted or logged.

pub mod context;
pub mod provider;
pub mod quota;

use crate::access::{AccessError, Actor, Permission};
use crate::config::{AssistantConfig, QuotaConfig};
use crate::model::now_epoch_ms;
use crate::model::org::{Company, CompanyId};
use crate::repo::org_repo::{OrgRepository, SqliteOrgRepository};
use crate::repo::quota_repo::{ChatLogEntry, QuotaRepository, SqliteQuotaRepository};
use crate::repo::RepoError;
use log::{error, info, warn};
use rusqlite::Connection;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

pub use context::{build_business_context, format_rupiah, BusinessContext, ContextOptions};
pub use provider::{ChatProvider, ChatReply, ChatRequest, ProviderError};
pub use quota::{period_key, QuotaError, QuotaStatus};

pub const SYSTEM_PROMPT: &str = "You are a retail business assistant for a small shop owner. \
Answer using only the business data provided. Amounts are in Indonesian Rupiah. \
If the data does not answer the question, say so. Keep answers short and practical.";

#[derive(Debug)]
pub enum AssistantError {
    Access(AccessError),
    /// Question is blank or longer than the configured maximum.
    InvalidQuestion(String),
    Quota(QuotaError),
    Provider(ProviderError),
    Repo(RepoError),
}

impl Display for AssistantError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Access(err) => write!(f, "{err}"),
            Self::InvalidQuestion(message) => write!(f, "invalid question: {message}"),
            Self::Quota(err) => write!(f, "{err}"),
            Self::Provider(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for AssistantError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Access(err) => Some(err),
            Self::InvalidQuestion(_) => None,
            Self::Quota(err) => Some(err),
            Self::Provider(err) => Some(err),
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<AccessError> for AssistantError {
    fn from(value: AccessError) -> Self {
        Self::Access(value)
    }
}

impl From<QuotaError> for AssistantError {
    fn from(value: QuotaError) -> Self {
        Self::Quota(value)
    }
}

impl From<ProviderError> for AssistantError {
    fn from(value: ProviderError) -> Self {
        Self::Provider(value)
    }
}

impl From<RepoError> for AssistantError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Answer plus the quota left after it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssistantAnswer {
    pub answer: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub quota: QuotaStatus,
}

/// Assistant use-cases over one database connection.
pub struct AssistantService<'conn, P: ChatProvider> {
    conn: &'conn Connection,
    provider: P,
    quota: QuotaConfig,
    options: AssistantConfig,
    rfm_lookback_days: u32,
    clock: fn() -> i64,
}

impl<'conn, P: ChatProvider> AssistantService<'conn, P> {
    pub fn new(
        conn: &'conn Connection,
        provider: P,
        quota: QuotaConfig,
        options: AssistantConfig,
        rfm_lookback_days: u32,
    ) -> Self {
        Self {
            conn,
            provider,
            quota,
            options,
            rfm_lookback_days,
            clock: now_epoch_ms,
        }
    }

    pub fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self
    }

    /// Current quota of the actor's company.
    pub fn quota_status(&self, actor: &Actor) -> Result<QuotaStatus, AssistantError> {
        let company_id = actor.require(Permission::UseAssistant)?;
        let company = self.company(company_id)?;
        self.status_for(&company, &period_key((self.clock)()))
    }

    /// Context block the assistant would see, without calling the provider
    /// or touching the quota.
    pub fn preview_context(&self, actor: &Actor) -> Result<BusinessContext, AssistantError> {
        let company_id = actor.require(Permission::UseAssistant)?;
        let company = self.company(company_id)?;
        Ok(self.context_for(&company, (self.clock)())?)
    }

    /// Answers one question about the actor's business.
    pub fn ask(&self, actor: &Actor, question: &str) -> Result<AssistantAnswer, AssistantError> {
        let company_id = actor.require(Permission::UseAssistant)?;
        let question = self.validate_question(question)?;
        let company = self.company(company_id)?;

        let now_ms = (self.clock)();
        let period = period_key(now_ms);
        let limits = self.quota.limits_for(company.plan);
        let quota_repo = SqliteQuotaRepository::new(self.conn);

        if !quota_repo.try_consume_request(
            company_id,
            &period,
            limits.max_requests,
            limits.max_tokens,
        )? {
            let status = self.status_for(&company, &period)?;
            warn!(
                "event=assistant_ask module=assistant status=quota_exhausted company_id={} period={} requests_used={} tokens_used={}",
                company_id, period, status.usage.requests_used, status.usage.tokens_used
            );
            return Err(QuotaError::Exhausted(status).into());
        }

        let started_at = Instant::now();
        let reply = match self.answer(&company, now_ms, question) {
            Ok(reply) => reply,
            Err(err) => {
                if let Err(release_err) = quota_repo.release_request(company_id, &period) {
                    error!(
                        "event=quota_release module=assistant status=error company_id={} period={} error={}",
                        company_id, period, release_err
                    );
                }
                warn!(
                    "event=assistant_ask module=assistant status=error company_id={} period={} error={}",
                    company_id, period, err
                );
                return Err(err);
            }
        };

        quota_repo.record_exchange(&ChatLogEntry {
            company_id,
            employee_id: actor.employee_id,
            period: period.clone(),
            question_chars: question.chars().count() as u64,
            prompt_tokens: reply.prompt_tokens,
            completion_tokens: reply.completion_tokens,
            created_at: now_ms,
        })?;

        let status = self.status_for(&company, &period)?;
        info!(
            "event=assistant_ask module=assistant status=ok company_id={} period={} prompt_tokens={} completion_tokens={} remaining_requests={} duration_ms={}",
            company_id,
            period,
            reply.prompt_tokens,
            reply.completion_tokens,
            status.remaining_requests(),
            started_at.elapsed().as_millis()
        );

        Ok(AssistantAnswer {
            answer: reply.answer,
            prompt_tokens: reply.prompt_tokens,
            completion_tokens: reply.completion_tokens,
            quota: status,
        })
    }

    fn answer(
        &self,
        company: &Company,
        now_ms: i64,
        question: &str,
    ) -> Result<ChatReply, AssistantError> {
        let context = self.context_for(company, now_ms)?;
        let request = ChatRequest {
            system: SYSTEM_PROMPT.to_string(),
            context: context.render(),
            question: question.to_string(),
        };
        Ok(self.provider.complete(&request)?)
    }

    fn context_for(&self, company: &Company, now_ms: i64) -> Result<BusinessContext, RepoError> {
        let options = ContextOptions::from_config(&self.options, self.rfm_lookback_days);
        build_business_context(self.conn, company.id, &company.name, now_ms, &options)
    }

    fn validate_question<'q>(&self, question: &'q str) -> Result<&'q str, AssistantError> {
        let trimmed = question.trim();
        if trimmed.is_empty() {
            return Err(AssistantError::InvalidQuestion(
                "question must not be blank".to_string(),
            ));
        }
        let chars = trimmed.chars().count();
        if chars > self.options.max_question_chars {
            return Err(AssistantError::InvalidQuestion(format!(
                "question has {chars} characters; maximum is {}",
                self.options.max_question_chars
            )));
        }
        Ok(trimmed)
    }

    fn company(&self, company_id: CompanyId) -> Result<Company, AssistantError> {
        SqliteOrgRepository::new(self.conn)
            .get_company(company_id)?
            .ok_or_else(|| RepoError::not_found("company", company_id).into())
    }

    fn status_for(&self, company: &Company, period: &str) -> Result<QuotaStatus, AssistantError> {
        let usage = SqliteQuotaRepository::new(self.conn).get_usage(company.id, period)?;
        Ok(QuotaStatus {
            period: period.to_string(),
            plan: company.plan,
            limits: self.quota.limits_for(company.plan),
            usage,
        })
    }
}
