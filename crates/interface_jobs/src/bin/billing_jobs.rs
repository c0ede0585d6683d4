//! Billing automation runner
//!
//! The cron entry point for the financial automation core: one process
//! run executes the orchestrated billing pass (invoice generation,
//! overdue transitions, client status sync) plus the recurring-expense
//! materializer, then prints the batch-run report as JSON for the
//! invoking scheduler or operator.
//!
//! # Usage
//!
//! ```bash
//! JOBS_DATABASE_URL=postgres://... JOBS_ORG_ID=<uuid> cargo run --bin billing-jobs
//! ```
//!
//! # Environment Variables
//!
//! * `JOBS_DATABASE_URL` - PostgreSQL connection string
//! * `JOBS_ORG_ID` - Organisation to run for (required)
//! * `JOBS_TIMEZONE` - Organisation locale, e.g. America/Sao_Paulo (default: UTC)
//! * `JOBS_RUN_ANNUAL` - Also materialize annual expenses (default: false)
//! * `JOBS_LOG_LEVEL` - trace, debug, info, warn, error (default: info)

use std::str::FromStr;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use core_kernel::{BillingCycle, OrgId, Timezone};
use domain_automation::{
    BillingScheduler, ClientStatusSync, FinancialAutomationOrchestrator, OverdueAutomator,
    RecurringExpenseMaterializer,
};
use infra_db::{
    run_migrations, DatabaseConfig, PgClientRepository, PgInstallmentRepository,
    PgInvoiceRepository, PgLedgerRepository, PgRecurringExpenseRepository,
};
use interface_jobs::{JobsConfig, TracingNotifier};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (useful for local development)
    dotenvy::dotenv().ok();

    let config = load_config()?;
    init_tracing(&config.log_level);

    let org_id =
        OrgId::from_str(&config.org_id).context("JOBS_ORG_ID is not a valid organisation id")?;
    let tz = chrono_tz::Tz::from_str(&config.timezone)
        .map_err(|_| anyhow::anyhow!("JOBS_TIMEZONE is not a valid timezone"))?;
    let tz = Timezone::new(tz);

    tracing::info!(%org_id, timezone = %config.timezone, "starting billing automation run");

    let pool = DatabaseConfig::new(&config.database_url).create_pool().await?;
    run_migrations(&pool).await?;

    let clients = Arc::new(PgClientRepository::new(pool.clone()));
    let invoices = Arc::new(PgInvoiceRepository::new(pool.clone()));
    let installments = Arc::new(PgInstallmentRepository::new(pool.clone()));
    let ledger = Arc::new(PgLedgerRepository::new(pool.clone()));
    let expenses = Arc::new(PgRecurringExpenseRepository::new(pool.clone()));
    let notifier = Arc::new(TracingNotifier);

    let orchestrator = FinancialAutomationOrchestrator::new(
        clients.clone(),
        BillingScheduler::new(
            clients.clone(),
            invoices.clone(),
            installments.clone(),
            notifier.clone(),
        ),
        OverdueAutomator::new(invoices.clone()),
        ClientStatusSync::new(clients.clone(), invoices.clone()),
        notifier.clone(),
    );
    let materializer = RecurringExpenseMaterializer::new(expenses.clone(), ledger.clone());

    let now = Utc::now();
    let automation = orchestrator.run_for_org(org_id, now, tz).await?;
    let monthly = materializer
        .run_for_org(org_id, BillingCycle::Monthly, now, tz)
        .await?;
    let annual = if config.run_annual {
        Some(
            materializer
                .run_for_org(org_id, BillingCycle::Annual, now, tz)
                .await?,
        )
    } else {
        None
    };

    let report = serde_json::json!({
        "automation": automation,
        "materializer": {
            "monthly": monthly,
            "annual": annual,
        },
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    tracing::info!("billing automation run complete");
    Ok(())
}

/// Loads jobs configuration, falling back to individual env vars
fn load_config() -> anyhow::Result<JobsConfig> {
    let config = JobsConfig::from_env().unwrap_or_else(|_| JobsConfig {
        database_url: std::env::var("DATABASE_URL")
            .or_else(|_| std::env::var("JOBS_DATABASE_URL"))
            .unwrap_or_else(|_| "postgres://localhost/atelier".to_string()),
        org_id: std::env::var("JOBS_ORG_ID").unwrap_or_default(),
        timezone: std::env::var("JOBS_TIMEZONE").unwrap_or_else(|_| "UTC".to_string()),
        run_annual: std::env::var("JOBS_RUN_ANNUAL")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(false),
        log_level: std::env::var("JOBS_LOG_LEVEL")
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or_else(|_| "info".to_string()),
    });

    if config.org_id.is_empty() {
        anyhow::bail!("JOBS_ORG_ID must be set");
    }
    Ok(config)
}

/// Initializes the tracing subscriber for structured logging
fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}
