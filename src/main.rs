// Initialize configuration and logging
// Create the database pool and ledger client
// Sync the transaction horizon (degraded mode when rate limited)
// Refresh balances and build the metric tables

use wallet_metrics_service::{
    config::Config,
    db,
    indexer::{balances::RefreshProgress, LedgerClient, RefreshConfig},
    metrics,
    sync::SyncEngine,
};

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting wallet-metrics-service");

    let config = Config::from_env();
    info!("Configuration loaded: {:?}", config);

    let pool = db::connection::establish_connection(&config.database_url).await?;
    info!("Database connection established");

    let client = LedgerClient::new(&config)?;

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("shutdown requested; finishing the current step");
            signal_token.cancel();
        }
    });

    let engine = SyncEngine::new(&client, &pool, config.page_limit, config.max_pages);
    match engine.ensure_history(config.history_days, false).await {
        Ok(outcome) => info!(
            "sync complete: {} pages, {} records upserted, {} dropped",
            outcome.pages_fetched, outcome.records_upserted, outcome.records_dropped
        ),
        Err(err) if err.is_rate_limited() => {
            warn!("rate limit exhausted while syncing; continuing with existing store state");
        }
        Err(err) => return Err(err.into()),
    }

    let activity = metrics::load_recent_activity(&pool, config.history_days).await?;
    let first_seen = metrics::update_first_seen(&pool, &activity).await?;
    if first_seen.is_empty() {
        info!("no wallets discovered; nothing to aggregate");
        return Ok(());
    }
    info!(
        "loaded {} activity rows across {} wallets",
        activity.len(),
        first_seen.len()
    );

    let today = Utc::now().date_naive();
    let start = (Utc::now() - chrono::Duration::days(config.history_days)).date_naive();

    let new_wallets = metrics::compute_new_wallets(&first_seen, start);
    let active_wallets = metrics::compute_active_wallets(&activity, start);
    let retention = metrics::compute_retention(
        &activity,
        &first_seen,
        &config.metric_windows,
        today,
        metrics::RetentionMode::Cumulative,
        None,
    );
    let fee_per_wallet =
        metrics::compute_fee_per_wallet(&activity, &first_seen, &config.metric_windows, today);
    info!(
        "computed {} new-wallet rows, {} active-wallet rows, {} retention rows, {} fee rows",
        new_wallets.len(),
        active_wallets.len(),
        retention.len(),
        fee_per_wallet.len()
    );

    let refresh = RefreshConfig::from_config(&config);
    let progress = |update: RefreshProgress| {
        info!(
            "balance refresh batch {}/{} | {}/{} wallets",
            update.completed_batches, update.total_batches, update.processed, update.total
        );
    };
    let panel = metrics::build_segmented_panel(
        &client,
        &pool,
        &activity,
        &first_seen,
        &config.metric_windows,
        &refresh,
        config.balance_lookback_days,
        today,
        Some(&progress),
        &shutdown,
    )
    .await?;
    info!("segmented retention panel updated with {} rows", panel.len());

    Ok(())
}
