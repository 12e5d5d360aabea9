//! # finagent-server
//!
//! Axum HTTP surface over the finagent agents:
//!
//! | Route | Body |
//! |---|---|
//! | `POST /stock_prices` | `{"symbols": ["TSM"]}` |
//! | `POST /historical_data` | `{"symbol": "TSM", "interval": "1d", "period": "1y"}` |
//! | `POST /company_overview` | `{"symbol": "TSM"}` |
//! | `POST /orchestrate` | `{"audio_data": "<base64 wav>", "query": "market data"}` |
//! | `GET /health` | |

mod error;
mod handlers;

pub use error::ApiError;
pub use handlers::{
    CompanyOverviewRequest, HistoricalDataRequest, OrchestrateRequest, OrchestrateResponse,
    StockPricesRequest,
};

use axum::{
    Router,
    routing::{get, post},
};
use finagent_core::Agent;
use finagent_market::{MarketDataProvider, Orchestrator};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Environment variable with the listen address
pub const BIND_ENV: &str = "FINAGENT_BIND";

pub const DEFAULT_BIND: &str = "0.0.0.0:8000";

/// Environment variable with comma-separated filing URLs ingested at startup
pub const FILINGS_ENV: &str = "FINAGENT_FILINGS";

pub struct AppState {
    pub provider: Arc<dyn MarketDataProvider>,
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    /// State whose quote endpoints share the orchestrator's provider
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            provider: orchestrator.provider(),
            orchestrator,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/stock_prices", post(handlers::stock_prices))
        .route("/historical_data", post(handlers::historical))
        .route("/company_overview", post(handlers::company_overview))
        .route("/orchestrate", post(handlers::orchestrate))
        .route("/orchestrate/", post(handlers::orchestrate))
        .route("/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

/// Serve `router` on `bind` until Ctrl-C
pub async fn serve(router: Router, bind: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {e}");
            }
        })
        .await?;
    Ok(())
}

/// Build the orchestrator from the environment, ingest startup filings and
/// serve on `bind`
pub async fn run(bind: &str) -> anyhow::Result<()> {
    let mut orchestrator = Orchestrator::from_env()?;
    orchestrator.initialize().await?;
    let orchestrator = Arc::new(orchestrator);

    if let Some(list) = finagent_utils::optional_env(FILINGS_ENV) {
        let urls: Vec<String> = list
            .split(',')
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(str::to_string)
            .collect();
        let chunks = orchestrator.ingest_filings(&urls).await;
        if chunks == 0 {
            tracing::warn!(filings = urls.len(), "No startup filings were ingested");
        } else {
            tracing::info!(filings = urls.len(), chunks, "Startup filings ingested");
        }
    }

    serve(build_router(AppState::new(orchestrator)), bind).await
}
