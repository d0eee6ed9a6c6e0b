//! DineLoop - campaign worker entry point

use anyhow::Result;
use dineloop_common::config::Config;
use dineloop_engine::{
    AvailabilityMonitor, CampaignManager, CampaignScheduler, EngineRepositories, SmtpTransport,
};
use dineloop_storage::db::DatabasePool;
use dineloop_storage::repository::{
    DbCampaignRepository, DbClientRepository, DbDispatchRecordRepository, DbPrizeWheelRepository,
    DbRewardDefinitionRepository, DbRewardRepository, DbSenderRepository,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load()?;

    init_logging(&config.logging.filter);

    info!("Starting DineLoop campaign worker...");

    // Initialize database
    let db_pool = DatabasePool::new(&config.database).await?;
    db_pool.migrate().await?;

    // Repositories
    let campaigns = Arc::new(DbCampaignRepository::new(db_pool.clone()));
    let senders = Arc::new(DbSenderRepository::new(db_pool.clone()));
    let repos = EngineRepositories {
        campaigns: campaigns.clone(),
        clients: Arc::new(DbClientRepository::new(db_pool.clone())),
        reward_definitions: Arc::new(DbRewardDefinitionRepository::new(db_pool.clone())),
        prize_wheels: Arc::new(DbPrizeWheelRepository::new(db_pool.clone())),
        rewards: Arc::new(DbRewardRepository::new(db_pool.clone())),
        dispatch_records: Arc::new(DbDispatchRecordRepository::new(db_pool.clone())),
        senders: senders.clone(),
    };

    // Engine wiring, resolved once at startup
    let transport = Arc::new(SmtpTransport::new(config.smtp.clone()));
    let scheduler = Arc::new(CampaignScheduler::new());
    let manager = Arc::new(CampaignManager::new(
        repos,
        transport,
        scheduler.clone(),
        &config.engine,
    ));

    // Re-register triggers for campaigns scheduled before the last restart
    let restored = manager.restore_scheduled().await?;
    info!(restored, "Deferred campaign triggers restored");

    // Start the availability monitor
    let monitor = AvailabilityMonitor::new(
        campaigns,
        senders,
        manager.clone(),
        Duration::from_secs(config.engine.monitor_interval_secs),
    );
    let monitor_handle = tokio::spawn(async move {
        monitor.run().await;
    });

    info!("DineLoop campaign worker started successfully");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    monitor_handle.abort();

    info!("DineLoop campaign worker shutdown complete");

    Ok(())
}

fn init_logging(filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter.to_string()));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_level(true))
        .with(filter)
        .init();
}
