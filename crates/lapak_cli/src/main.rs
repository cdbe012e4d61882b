//! `lapak` command line front end.
//!
//! # Responsibility
//! - Resolve configuration, logging and the database for one invocation.
//! - Run tenant use-cases as the staff member named by `--as`.

use anyhow::{bail, Context};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use lapak_core::assistant::{
    format_rupiah, AssistantService, ChatProvider, ChatReply, ChatRequest, ProviderError,
};
use lapak_core::import::{import_customers, import_products, ImportOptions, ImportReport};
use lapak_core::model::now_epoch_ms;
use lapak_core::report::DateRange;
use lapak_core::repo::org_repo::SqliteOrgRepository;
use lapak_core::service::org_service::OrgService;
use lapak_core::service::report_service::ReportService;
use lapak_core::{
    init_logging, open_db, Actor, ConfigOverrides, Employee, LapakConfig, Plan, Role,
};
use rusqlite::Connection;
use serde::Serialize;
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "lapak", version, about = "Retail CRM/POS toolkit")]
struct Cli {
    #[arg(long, global = true, help = "SQLite database file")]
    db: Option<PathBuf>,
    #[arg(long, global = true, help = "Config file (defaults to ./lapak.toml)")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Directory for rolling log files")]
    log_dir: Option<PathBuf>,
    #[arg(long, global = true, help = "trace|debug|info|warn|error")]
    log_level: Option<String>,
    #[arg(long, global = true, help = "Output machine-readable JSON")]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a company with its owner account.
    InitCompany {
        #[arg(long)]
        name: String,
        #[arg(long)]
        owner_name: String,
        #[arg(long)]
        owner_email: String,
        #[arg(long, value_enum, default_value_t = PlanArg::Free)]
        plan: PlanArg,
    },
    AddStore {
        #[command(flatten)]
        actor: ActorArgs,
        #[arg(long)]
        name: String,
        #[arg(long)]
        address: Option<String>,
    },
    /// Register an admin or cashier account.
    AddStaff {
        #[command(flatten)]
        actor: ActorArgs,
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, value_enum, default_value_t = RoleArg::Kasir)]
        role: RoleArg,
        #[arg(long, help = "Home store id")]
        store: Option<Uuid>,
    },
    /// List staff accounts of the actor's company.
    Staff {
        #[command(flatten)]
        actor: ActorArgs,
    },
    /// Bulk upsert from a CSV export.
    Import {
        #[command(subcommand)]
        kind: ImportKind,
    },
    /// Customer segmentation for the actor's company.
    Rfm {
        #[command(flatten)]
        actor: ActorArgs,
        #[arg(long, help = "Lookback window in days (config rfm.lookback_days)")]
        days: Option<u32>,
        #[arg(long, help = "Reference date YYYY-MM-DD, end of day UTC (default: now)")]
        reference: Option<NaiveDate>,
    },
    /// Sales dashboard for the last N days.
    Report {
        #[command(flatten)]
        actor: ActorArgs,
        #[arg(long, default_value_t = 30)]
        days: u32,
    },
    /// Print the business context the assistant would receive.
    Context {
        #[command(flatten)]
        actor: ActorArgs,
    },
    /// Show this month's assistant quota.
    Quota {
        #[command(flatten)]
        actor: ActorArgs,
    },
}

#[derive(Subcommand, Debug)]
enum ImportKind {
    Products(ImportArgs),
    Customers(ImportArgs),
}

#[derive(Args, Debug)]
struct ImportArgs {
    #[command(flatten)]
    actor: ActorArgs,
    file: PathBuf,
    #[arg(long, default_value_t = false, help = "Validate without saving")]
    dry_run: bool,
}

#[derive(Args, Debug)]
struct ActorArgs {
    #[arg(long = "as", value_name = "EMAIL", help = "Staff email to act as")]
    email: String,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PlanArg {
    Free,
    Pro,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum RoleArg {
    Owner,
    Admin,
    Kasir,
}

impl From<RoleArg> for Role {
    fn from(value: RoleArg) -> Self {
        match value {
            RoleArg::Owner => Role::Owner,
            RoleArg::Admin => Role::Admin,
            RoleArg::Kasir => Role::Kasir,
        }
    }
}

impl From<PlanArg> for Plan {
    fn from(value: PlanArg) -> Self {
        match value {
            PlanArg::Free => Plan::Free,
            PlanArg::Pro => Plan::Pro,
        }
    }
}

#[derive(Serialize)]
struct JsonOut<T: Serialize> {
    ok: bool,
    data: T,
}

/// The CLI ships without a network model; only quota and context commands
/// reach the assistant.
struct OfflineProvider;

impl ChatProvider for OfflineProvider {
    fn complete(&self, _request: &ChatRequest) -> Result<ChatReply, ProviderError> {
        Err(ProviderError::Unavailable("no provider configured".to_string()))
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = LapakConfig::load(
        cli.config.as_deref(),
        &ConfigOverrides {
            db_path: cli.db.clone(),
            log_level: cli.log_level.clone(),
            log_dir: cli.log_dir.clone(),
        },
    )?;
    if let Some(dir) = &config.logging.dir {
        init_logging(&config.logging.level, dir)?;
    }

    let mut conn = open_db(&config.database.path)
        .with_context(|| format!("opening {}", config.database.path.display()))?;

    match cli.command {
        Commands::InitCompany {
            name,
            owner_name,
            owner_email,
            plan,
        } => {
            let onboarded = OrgService::new(SqliteOrgRepository::new(&conn)).bootstrap_company(
                &name,
                plan.into(),
                &owner_name,
                &owner_email,
            )?;
            print_one(cli.json, &onboarded.company, |company| {
                format!("{}\t{}\t{}", company.id, company.name, company.plan.as_str())
            })?;
        }
        Commands::AddStore {
            actor,
            name,
            address,
        } => {
            let service = OrgService::new(SqliteOrgRepository::new(&conn));
            let actor = service.actor_for_email(&actor.email)?;
            let store = service.add_store(&actor, &name, address)?;
            print_one(cli.json, &store, |store| format!("{}\t{}", store.id, store.name))?;
        }
        Commands::AddStaff {
            actor,
            name,
            email,
            role,
            store,
        } => {
            let service = OrgService::new(SqliteOrgRepository::new(&conn));
            let actor = service.actor_for_email(&actor.email)?;
            let employee = service.add_staff(&actor, &name, &email, role.into(), store)?;
            print_one(cli.json, employee, staff_row)?;
        }
        Commands::Staff { actor } => {
            let service = OrgService::new(SqliteOrgRepository::new(&conn));
            let actor = service.actor_for_email(&actor.email)?;
            print_out(cli.json, &service.list_staff(&actor)?, staff_row)?;
        }
        Commands::Import { kind } => {
            let (args, products) = match kind {
                ImportKind::Products(args) => (args, true),
                ImportKind::Customers(args) => (args, false),
            };
            let actor = resolve_actor(&conn, &args.actor)?;
            let input = std::fs::read_to_string(&args.file)
                .with_context(|| format!("reading {}", args.file.display()))?;
            let options = ImportOptions {
                dry_run: args.dry_run,
            };
            let report = if products {
                import_products(&mut conn, &actor, &input, options)?
            } else {
                import_customers(&mut conn, &actor, &input, options)?
            };
            print_one(cli.json, &report, |report| import_summary(report))?;
        }
        Commands::Rfm {
            actor,
            days,
            reference,
        } => {
            let actor = resolve_actor(&conn, &actor)?;
            let reference_ms = match reference {
                Some(date) => end_of_day_ms(date)?,
                None => now_epoch_ms(),
            };
            let company_id = own_company(&actor)?;
            let report = ReportService::new(&conn).rfm(
                &actor,
                company_id,
                reference_ms,
                days.unwrap_or(config.rfm.lookback_days),
            )?;
            print_out(cli.json, &report.segments, |segment| {
                format!(
                    "{}\t{}\t{:.2}%\t{}",
                    segment.label,
                    segment.customers,
                    segment.percentage,
                    format_rupiah(segment.monetary)
                )
            })?;
        }
        Commands::Report { actor, days } => {
            let actor = resolve_actor(&conn, &actor)?;
            let company_id = own_company(&actor)?;
            let range = DateRange::ending_at(now_epoch_ms(), days);
            let dashboard = ReportService::new(&conn).dashboard(&actor, company_id, range)?;
            print_one(cli.json, &dashboard, |dashboard| {
                let mut lines = vec![
                    format!("revenue\t{}", format_rupiah(dashboard.summary.revenue)),
                    format!("previous\t{}", format_rupiah(dashboard.previous.revenue)),
                    format!("transactions\t{}", dashboard.summary.transactions),
                    format!("items_sold\t{}", dashboard.summary.items_sold),
                    format!(
                        "average_basket\t{}",
                        format_rupiah(dashboard.summary.average_basket)
                    ),
                ];
                for store in &dashboard.stores {
                    lines.push(format!(
                        "store\t{}\t{}\t{}",
                        store.name,
                        store.transactions,
                        format_rupiah(store.revenue)
                    ));
                }
                for product in &dashboard.top_products {
                    lines.push(format!(
                        "product\t{}\t{}\t{}",
                        product.name,
                        product.quantity,
                        format_rupiah(product.revenue)
                    ));
                }
                lines.join("\n")
            })?;
        }
        Commands::Context { actor } => {
            let actor = resolve_actor(&conn, &actor)?;
            let context = assistant(&conn, &config).preview_context(&actor)?;
            if cli.json {
                print_one(true, &context, |_| String::new())?;
            } else {
                print!("{}", context.render());
            }
        }
        Commands::Quota { actor } => {
            let actor = resolve_actor(&conn, &actor)?;
            let status = assistant(&conn, &config).quota_status(&actor)?;
            print_one(cli.json, &status, |status| {
                format!(
                    "{}\t{}\trequests {}/{}\ttokens {}/{}",
                    status.period,
                    status.plan.as_str(),
                    status.usage.requests_used,
                    status.limits.max_requests,
                    status.usage.tokens_used,
                    status.limits.max_tokens
                )
            })?;
        }
    }
    Ok(())
}

fn resolve_actor(conn: &Connection, args: &ActorArgs) -> anyhow::Result<Actor> {
    Ok(OrgService::new(SqliteOrgRepository::new(conn)).actor_for_email(&args.email)?)
}

fn own_company(actor: &Actor) -> anyhow::Result<lapak_core::CompanyId> {
    match actor.company_id {
        Some(company_id) => Ok(company_id),
        None => bail!("super admin accounts have no company of their own"),
    }
}

fn assistant<'conn>(
    conn: &'conn Connection,
    config: &LapakConfig,
) -> AssistantService<'conn, OfflineProvider> {
    AssistantService::new(
        conn,
        OfflineProvider,
        config.quota.clone(),
        config.assistant.clone(),
        config.rfm.lookback_days,
    )
}

fn staff_row(employee: &Employee) -> String {
    format!(
        "{}\t{}\t{}\t{}{}",
        employee.id,
        employee.email,
        employee.role.as_str(),
        employee.name,
        if employee.is_active { "" } else { "\t(inactive)" }
    )
}

fn end_of_day_ms(date: NaiveDate) -> anyhow::Result<i64> {
    let end = date
        .and_hms_milli_opt(23, 59, 59, 999)
        .context("invalid reference date")?;
    Ok(end.and_utc().timestamp_millis())
}

fn import_summary(report: &ImportReport) -> String {
    let mut lines = vec![format!(
        "inserted={} updated={} skipped={}{}",
        report.inserted,
        report.updated,
        report.skipped.len(),
        if report.dry_run { " (dry run)" } else { "" }
    )];
    for row in &report.skipped {
        lines.push(format!("line {}\t{}", row.line, row.message));
    }
    lines.join("\n")
}

fn print_out<T: Serialize>(
    json: bool,
    data: &[T],
    row: impl Fn(&T) -> String,
) -> anyhow::Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&JsonOut { ok: true, data })?
        );
    } else {
        for item in data {
            println!("{}", row(item));
        }
    }
    Ok(())
}

fn print_one<T: Serialize>(json: bool, data: T, row: impl Fn(&T) -> String) -> anyhow::Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&JsonOut { ok: true, data })?
        );
    } else {
        println!("{}", row(&data));
    }
    Ok(())
}
