use std::sync::Arc;

use batchsync::{
    batch::{
        BatchOrchestrator, repository_sqlx::SqlxBatchStateRepository, tracker::StateTracker,
    },
    config::{AppConfig, initial_run_from_env},
    db::Db,
    logger::init_tracing,
    metrics::Counters,
    notify::{LogNotifier, Notifier, WebhookNotifier},
    records::{repository_sqlx::SqlxRecordRepository, store::RecordStore},
    scheduler::run_scheduler_loop,
    source::RemoteClient,
};
use tokio_util::sync::CancellationToken;

/// Connects, migrates and builds the two persistence fronts.
async fn init_stores(cfg: &AppConfig) -> anyhow::Result<(RecordStore, StateTracker)> {
    let db = Db::connect(&cfg.database_url).await?;
    db.migrate().await?;

    let records = RecordStore::new(
        Arc::new(SqlxRecordRepository::new(db.pool.clone())),
        cfg.insert_chunk_size,
    );
    let tracker = StateTracker::new(Arc::new(SqlxBatchStateRepository::new(db.pool.clone())));

    Ok((records, tracker))
}

fn select_notifier(cfg: &AppConfig) -> anyhow::Result<Arc<dyn Notifier>> {
    match &cfg.notify_webhook_url {
        Some(url) => {
            tracing::info!(%url, "notifications go to webhook");
            Ok(Arc::new(WebhookNotifier::new(
                url.clone(),
                cfg.source_http_timeout,
            )?))
        }
        None => Ok(Arc::new(LogNotifier)),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    sqlx::any::install_default_drivers();

    let is_production = std::env::var("APP_ENV").unwrap_or_default() == "production";
    init_tracing(is_production);

    tracing::info!("Starting batchsync...");

    let cfg = AppConfig::from_env()?;
    let initial = initial_run_from_env()?;

    let (records, tracker) = init_stores(&cfg).await?;

    let source = Arc::new(RemoteClient::new(
        cfg.source_api_url.clone(),
        cfg.source_api_token.clone(),
        cfg.source_http_timeout,
    )?);

    let shutdown = CancellationToken::new();
    let counters = Counters::default();

    let orchestrator = Arc::new(
        BatchOrchestrator::new(
            source,
            records,
            tracker,
            select_notifier(&cfg)?,
            cfg.retry_policy(),
            cfg.notification_address.clone(),
        )
        .with_shutdown(shutdown.clone())
        .with_counters(counters.clone()),
    );

    // Restart safety: an unfinished run resumes from its checkpoint and takes
    // precedence over the SYNC_* request.
    if let Some(run) = orchestrator.bootstrap(initial.as_ref()).await? {
        tracing::info!(run_id = %run.run_id, "active run ready");
    }

    // The first tick fires immediately, so a configured or restored run starts right away.
    let scheduler = tokio::spawn(run_scheduler_loop(
        Arc::clone(&orchestrator),
        cfg.scheduler_interval,
        shutdown.clone(),
    ));

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    shutdown.cancel();
    scheduler.await?;

    tracing::info!(
        intervals = Counters::get(&counters.intervals_processed),
        inserted = Counters::get(&counters.records_inserted),
        failed_attempts = Counters::get(&counters.failed_attempts),
        "batchsync stopped"
    );
    Ok(())
}
