mod common;

use common::{add_product, days, seed_tenant, sell, BASE_MS};
use lapak_core::access::AccessError;
use lapak_core::assistant::{
    period_key, AssistantError, AssistantService, ChatProvider, ChatReply, ChatRequest,
    ProviderError, QuotaError,
};
use lapak_core::config::{AssistantConfig, QuotaConfig};
use lapak_core::repo::quota_repo::{ChatLogEntry, QuotaRepository, SqliteQuotaRepository};
use lapak_core::{open_db_in_memory, Plan, RepoError};
use uuid::Uuid;
use std::cell::{Cell, RefCell};

/// Provider double that counts calls and remembers the last prompt.
struct ScriptedProvider {
    calls: Cell<u32>,
    fail: bool,
    last_request: RefCell<Option<ChatRequest>>,
}

impl ScriptedProvider {
    fn answering() -> Self {
        Self {
            calls: Cell::new(0),
            fail: false,
            last_request: RefCell::new(None),
        }
    }

    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::answering()
        }
    }
}

impl ChatProvider for ScriptedProvider {
    fn complete(&self, request: &ChatRequest) -> Result<ChatReply, ProviderError> {
        self.calls.set(self.calls.get() + 1);
        *self.last_request.borrow_mut() = Some(request.clone());
        if self.fail {
            return Err(ProviderError::Unavailable("timeout".to_string()));
        }
        Ok(ChatReply {
            answer: "Kopi Bubuk paling laris.".to_string(),
            prompt_tokens: 20,
            completion_tokens: 10,
        })
    }
}

fn march() -> i64 {
    BASE_MS
}

fn april() -> i64 {
    BASE_MS + days(20)
}

fn tight_quota(requests: u64, tokens: u64) -> QuotaConfig {
    QuotaConfig {
        free_requests: requests,
        free_tokens: tokens,
        ..QuotaConfig::default()
    }
}

#[test]
fn ask_sends_business_context_and_records_usage() {
    let mut conn = open_db_in_memory().unwrap();
    let tenant = seed_tenant(&conn, "Toko Maju", Plan::Free);
    let kopi = add_product(&conn, &tenant, "KOPI", 15_000, 10);
    sell(&mut conn, &tenant, None, &[(kopi.id, 2)], BASE_MS - days(1));

    let provider = ScriptedProvider::answering();
    let assistant = AssistantService::new(
        &conn,
        &provider,
        QuotaConfig::default(),
        AssistantConfig::default(),
        365,
    )
    .with_clock(march);

    let answer = assistant
        .ask(&tenant.owner, "  Produk apa yang paling laris?  ")
        .unwrap();
    assert_eq!(answer.answer, "Kopi Bubuk paling laris.");
    assert_eq!(answer.quota.period, "2024-03");
    assert_eq!(answer.quota.usage.requests_used, 1);
    assert_eq!(answer.quota.usage.tokens_used, 30);
    assert_eq!(answer.quota.remaining_requests(), 49);

    let request = provider.last_request.borrow().clone().unwrap();
    assert_eq!(request.question, "Produk apa yang paling laris?");
    assert!(request.context.contains("Business: Toko Maju"));
    assert!(request.context.contains("Produk KOPI"));
    assert!(request.context.contains("Rp 30.000"));

    let logs = SqliteQuotaRepository::new(&conn)
        .count_chat_logs(tenant.company.id, "2024-03")
        .unwrap();
    assert_eq!(logs, 1);
}

#[test]
fn exhausted_request_quota_refuses_without_calling_provider() {
    let conn = open_db_in_memory().unwrap();
    let tenant = seed_tenant(&conn, "Toko Maju", Plan::Free);
    let provider = ScriptedProvider::answering();
    let assistant = AssistantService::new(
        &conn,
        &provider,
        tight_quota(2, 100_000),
        AssistantConfig::default(),
        365,
    )
    .with_clock(march);

    assistant.ask(&tenant.owner, "Omzet minggu ini?").unwrap();
    assistant.ask(&tenant.admin, "Stok yang menipis?").unwrap();
    let err = assistant.ask(&tenant.owner, "Pelanggan terbaik?").unwrap_err();

    match err {
        AssistantError::Quota(QuotaError::Exhausted(status)) => {
            assert_eq!(status.usage.requests_used, 2);
            assert!(status.is_exhausted());
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(provider.calls.get(), 2);
}

#[test]
fn token_budget_allows_one_overshoot_then_refuses() {
    let conn = open_db_in_memory().unwrap();
    let tenant = seed_tenant(&conn, "Toko Maju", Plan::Free);
    let provider = ScriptedProvider::answering();
    let assistant = AssistantService::new(
        &conn,
        &provider,
        tight_quota(50, 25),
        AssistantConfig::default(),
        365,
    )
    .with_clock(march);

    let answer = assistant.ask(&tenant.owner, "Omzet?").unwrap();
    assert_eq!(answer.quota.usage.tokens_used, 30);
    assert_eq!(answer.quota.remaining_tokens(), 0);

    assert!(matches!(
        assistant.ask(&tenant.owner, "Omzet lagi?").unwrap_err(),
        AssistantError::Quota(QuotaError::Exhausted(_))
    ));
    assert_eq!(provider.calls.get(), 1);
}

#[test]
fn provider_failure_gives_the_request_back() {
    let conn = open_db_in_memory().unwrap();
    let tenant = seed_tenant(&conn, "Toko Maju", Plan::Free);
    let provider = ScriptedProvider::failing();
    let assistant = AssistantService::new(
        &conn,
        &provider,
        QuotaConfig::default(),
        AssistantConfig::default(),
        365,
    )
    .with_clock(march);

    assert!(matches!(
        assistant.ask(&tenant.owner, "Omzet?").unwrap_err(),
        AssistantError::Provider(ProviderError::Unavailable(_))
    ));
    let status = assistant.quota_status(&tenant.owner).unwrap();
    assert_eq!(status.usage.requests_used, 0);
    assert_eq!(status.usage.tokens_used, 0);
    assert_eq!(
        SqliteQuotaRepository::new(&conn)
            .count_chat_logs(tenant.company.id, "2024-03")
            .unwrap(),
        0
    );
}

#[test]
fn invalid_questions_are_rejected_before_quota() {
    let conn = open_db_in_memory().unwrap();
    let tenant = seed_tenant(&conn, "Toko Maju", Plan::Free);
    let provider = ScriptedProvider::answering();
    let assistant = AssistantService::new(
        &conn,
        &provider,
        QuotaConfig::default(),
        AssistantConfig {
            max_question_chars: 10,
            ..AssistantConfig::default()
        },
        365,
    )
    .with_clock(march);

    assert!(matches!(
        assistant.ask(&tenant.owner, "   ").unwrap_err(),
        AssistantError::InvalidQuestion(_)
    ));
    assert!(matches!(
        assistant
            .ask(&tenant.owner, "Berapa omzet bulan ini?")
            .unwrap_err(),
        AssistantError::InvalidQuestion(_)
    ));
    assistant.ask(&tenant.owner, "Omzet?").unwrap();
    assert_eq!(provider.calls.get(), 1);
    assert_eq!(
        assistant
            .quota_status(&tenant.owner)
            .unwrap()
            .usage
            .requests_used,
        1
    );
}

#[test]
fn plan_selects_limits_and_month_resets_usage() {
    let conn = open_db_in_memory().unwrap();
    let free = seed_tenant(&conn, "Toko Gratis", Plan::Free);
    let pro = seed_tenant(&conn, "Toko Pro", Plan::Pro);
    let provider = ScriptedProvider::answering();
    let march_service = AssistantService::new(
        &conn,
        &provider,
        QuotaConfig::default(),
        AssistantConfig::default(),
        365,
    )
    .with_clock(march);

    let free_status = march_service.quota_status(&free.owner).unwrap();
    assert_eq!(free_status.limits.max_requests, 50);
    assert_eq!(free_status.limits.max_tokens, 100_000);
    let pro_status = march_service.quota_status(&pro.owner).unwrap();
    assert_eq!(pro_status.limits.max_requests, 1_000);
    assert_eq!(pro_status.limits.max_tokens, 2_000_000);

    march_service.ask(&free.owner, "Omzet?").unwrap();
    assert_eq!(
        march_service
            .quota_status(&pro.owner)
            .unwrap()
            .usage
            .requests_used,
        0
    );

    let april_service = AssistantService::new(
        &conn,
        &provider,
        QuotaConfig::default(),
        AssistantConfig::default(),
        365,
    )
    .with_clock(april);
    let april_status = april_service.quota_status(&free.owner).unwrap();
    assert_eq!(april_status.period, "2024-04");
    assert_eq!(april_status.usage.requests_used, 0);
}

#[test]
fn kasir_cannot_use_assistant_and_preview_leaves_quota_alone() {
    let conn = open_db_in_memory().unwrap();
    let tenant = seed_tenant(&conn, "Toko Maju", Plan::Free);
    let provider = ScriptedProvider::answering();
    let assistant = AssistantService::new(
        &conn,
        &provider,
        QuotaConfig::default(),
        AssistantConfig::default(),
        365,
    )
    .with_clock(march);

    assert!(matches!(
        assistant.ask(&tenant.kasir, "Omzet?").unwrap_err(),
        AssistantError::Access(AccessError::Forbidden { .. })
    ));

    let context = assistant.preview_context(&tenant.owner).unwrap();
    assert_eq!(context.company_name, "Toko Maju");
    assert!(context.render().contains("- no scored customers"));
    assert_eq!(provider.calls.get(), 0);
    assert_eq!(
        assistant
            .quota_status(&tenant.owner)
            .unwrap()
            .usage
            .requests_used,
        0
    );
}

#[test]
fn tokens_are_billed_only_together_with_their_chat_log() {
    let conn = open_db_in_memory().unwrap();
    let tenant = seed_tenant(&conn, "Toko Maju", Plan::Free);
    let quota = SqliteQuotaRepository::new(&conn);
    let period = period_key(march());
    let entry = ChatLogEntry {
        company_id: tenant.company.id,
        employee_id: tenant.owner.employee_id,
        period: period.clone(),
        question_chars: 12,
        prompt_tokens: 20,
        completion_tokens: 10,
        created_at: march(),
    };

    assert!(matches!(
        quota.record_exchange(&entry).unwrap_err(),
        RepoError::NotFound { .. }
    ));
    assert_eq!(quota.count_chat_logs(tenant.company.id, &period).unwrap(), 0);

    assert!(quota
        .try_consume_request(tenant.company.id, &period, 5, 1_000)
        .unwrap());
    let orphan = ChatLogEntry {
        employee_id: Uuid::new_v4(),
        ..entry.clone()
    };
    quota.record_exchange(&orphan).unwrap_err();
    let usage = quota.get_usage(tenant.company.id, &period).unwrap();
    assert_eq!(usage.tokens_used, 0);
    assert_eq!(quota.count_chat_logs(tenant.company.id, &period).unwrap(), 0);

    quota.record_exchange(&entry).unwrap();
    let usage = quota.get_usage(tenant.company.id, &period).unwrap();
    assert_eq!(usage.requests_used, 1);
    assert_eq!(usage.tokens_used, 30);
    assert_eq!(quota.count_chat_logs(tenant.company.id, &period).unwrap(), 1);
}
