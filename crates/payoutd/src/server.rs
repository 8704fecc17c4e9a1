use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::HeaderValue,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use uuid::Uuid;

use payout_core::{NetworkGateway, RecordStore};

use crate::config::PayoutConfig;
use crate::error::PayoutError;
use crate::orchestrator::{PayoutOrchestrator, PayoutReceipt};

pub struct AppState {
    pub config: PayoutConfig,
    pub orchestrator: PayoutOrchestrator,
}

impl AppState {
    pub fn new(
        config: PayoutConfig,
        store: Arc<dyn RecordStore>,
        gateway: Arc<dyn NetworkGateway>,
    ) -> Self {
        let orchestrator = PayoutOrchestrator::new(
            store,
            gateway,
            config.treasury.clone(),
            config.payout_share_bps,
            config.window_offset,
            config.explorer_url.clone(),
        );
        Self {
            config,
            orchestrator,
        }
    }
}

pub async fn run(state: Arc<AppState>) -> anyhow::Result<()> {
    // 10 requests per second per IP
    let governor_conf = GovernorConfigBuilder::default()
        .per_second(10)
        .burst_size(20)
        .key_extractor(tower_governor::key_extractor::SmartIpKeyExtractor)
        .finish()
        .unwrap();

    let cors = cors_layer(&state.config.allowed_origin)?;

    let app = Router::new()
        // Liveness
        .route("/health", get(health))
        // Treasury public identity and payout parameters
        .route("/treasury", get(get_treasury))
        // Trigger processing of one withdrawal
        .route("/withdrawals/:id/process", post(process_withdrawal))
        .layer(GovernorLayer {
            config: Arc::new(governor_conf),
        })
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state.clone());

    let addr = format!("{}:{}", state.config.host, state.config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Payout orchestrator listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(), // ConnectInfo for rate limiting
    )
    .await?;
    Ok(())
}

fn cors_layer(allowed_origin: &str) -> anyhow::Result<CorsLayer> {
    if allowed_origin == "*" {
        return Ok(CorsLayer::permissive());
    }
    let origin: HeaderValue = allowed_origin
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid ALLOWED_ORIGIN: {}", allowed_origin))?;
    Ok(CorsLayer::new().allow_origin(AllowOrigin::exact(origin)))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct TreasuryResponse {
    /// Treasury public identity (base58)
    treasury: String,
    payout_share_bps: u16,
    window_offset: u64,
}

#[derive(Serialize)]
struct ProcessResponse {
    success: bool,
    transaction_id: String,
    explorer_url: String,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn get_treasury(State(state): State<Arc<AppState>>) -> Json<TreasuryResponse> {
    Json(TreasuryResponse {
        treasury: state.orchestrator.treasury_id(),
        payout_share_bps: state.config.payout_share_bps,
        window_offset: state.config.window_offset,
    })
}

async fn process_withdrawal(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> std::result::Result<Json<ProcessResponse>, PayoutError> {
    let PayoutReceipt {
        transaction_id,
        explorer_url,
    } = state.orchestrator.process(id).await?;

    Ok(Json(ProcessResponse {
        success: true,
        transaction_id,
        explorer_url,
    }))
}
