//! AdMela Background Worker
//!
//! Runs the scheduled jobs:
//! - Ad expiry & renewal batch (daily at 21:00 UTC, 02:30 IST)
//!
//! The renewal service itself is idempotent-safe under re-run, so a manual
//! trigger through the API racing this schedule is harmless.

use std::sync::Arc;

use time::OffsetDateTime;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use admela_billing::{RenewalOutcome, RenewalRunSummary, RenewalService};
use admela_shared::{create_pool, run_migrations};

/// Log the results of a renewal run.
fn log_renewal_summary(summary: &RenewalRunSummary) {
    info!(
        due = summary.due,
        renewed = summary.renewed,
        expired = summary.expired,
        skipped = summary.skipped,
        errored = summary.errored,
        "Renewal cycle complete"
    );

    // Log individual errors
    for outcome in &summary.outcomes {
        if let RenewalOutcome::Error { ad_id, error } = outcome {
            error!(ad_id = %ad_id, error = %error, "Failed to process ad renewal");
        }
    }
}

async fn run_renewal_cycle(renewal: &RenewalService) {
    info!("Running scheduled ad renewal batch");
    match renewal.run(OffsetDateTime::now_utc()).await {
        Ok(summary) => log_renewal_summary(&summary),
        Err(e) => error!(error = %e, "Renewal run failed"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    info!("Starting AdMela Worker");

    // Create database pool
    let database_url = std::env::var("DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;
    let pool = create_pool(&database_url).await?;
    run_migrations(&pool).await?;

    let renewal = Arc::new(RenewalService::new(pool));

    // Catch up immediately on startup, then follow the schedule. Ads that
    // came due while the worker was down should not wait another day.
    run_renewal_cycle(&renewal).await;

    // Create scheduler
    let scheduler = JobScheduler::new().await?;

    // Daily renewal batch at 21:00 UTC (02:30 IST, off-peak for the site)
    let renewal_for_job = renewal.clone();
    scheduler
        .add(Job::new_async("0 0 21 * * *", move |_uuid, _l| {
            let renewal = renewal_for_job.clone();
            Box::pin(async move {
                run_renewal_cycle(&renewal).await;
            })
        })?)
        .await?;

    scheduler.start().await?;
    info!("Scheduler started (daily renewal at 21:00 UTC)");

    // Run until interrupted
    tokio::signal::ctrl_c().await?;
    info!("Shutting down worker");

    Ok(())
}
