use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ledger_client::{Config as LedgerConfig, LedgerClient};
use payout_core::TransferBuilder;
use payoutd::config::PayoutConfig;
use payoutd::server::{self, AppState};
use payoutd::store::PgRecordStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "payoutd=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting payout orchestrator");

    dotenvy::dotenv().ok();
    let config = PayoutConfig::from_env()?;

    info!("Ledger network endpoint: {}", config.network_url);
    info!("Treasury identity: {}", config.treasury.treasury_id());
    info!("Listening on: {}:{}", config.host, config.port);

    let store = Arc::new(
        PgRecordStore::connect(&config.database_url)
            .await
            .map_err(|e| anyhow::anyhow!("Record store unavailable: {}", e))?,
    );

    let gateway = Arc::new(LedgerClient::new(
        LedgerConfig::new(&config.network_url).with_timeout(config.gateway_timeout_secs),
    )?);

    let state = Arc::new(AppState::new(config, store, gateway));
    server::run(state).await?;
    Ok(())
}
