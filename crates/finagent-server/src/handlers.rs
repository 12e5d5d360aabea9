//! Request handlers

use axum::{Json, extract::State};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::Local;
use finagent_market::api::{get_stock_prices, historical_data};
use finagent_core::{Context, InputMode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use super::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct StockPricesRequest {
    pub symbols: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoricalDataRequest {
    pub symbol: String,
    #[serde(default = "default_interval")]
    pub interval: String,
    #[serde(default = "default_period")]
    pub period: String,
}

fn default_interval() -> String {
    "1d".to_string()
}

fn default_period() -> String {
    "1y".to_string()
}

#[derive(Debug, Deserialize)]
pub struct CompanyOverviewRequest {
    pub symbol: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct OrchestrateRequest {
    /// Base64 WAV; takes precedence over `query` when non-empty
    #[serde(default)]
    pub audio_data: String,
    #[serde(default)]
    pub query: String,
    /// Narrative language code, e.g. "en" or "zh"
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OrchestrateResponse {
    pub response: String,
    /// Base64 WAV of the spoken response
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_data: Option<String>,
}

/// Latest quote per symbol; symbols without a quote map to `{}`
#[instrument(skip(state))]
pub async fn stock_prices(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StockPricesRequest>,
) -> Result<Json<BTreeMap<String, Value>>, ApiError> {
    let quotes = get_stock_prices(state.provider.as_ref(), &request.symbols).await;

    let mut body = BTreeMap::new();
    for (symbol, quote) in quotes {
        let record = match quote {
            Some(quote) => serde_json::to_value(quote)
                .map_err(|e| ApiError::internal(e.to_string()))?,
            None => Value::Object(Map::new()),
        };
        body.insert(symbol, record);
    }
    Ok(Json(body))
}

#[instrument(skip(state))]
pub async fn historical(
    State(state): State<Arc<AppState>>,
    Json(request): Json<HistoricalDataRequest>,
) -> Result<Json<Value>, ApiError> {
    let today = Local::now().date_naive();
    let series = historical_data(
        state.provider.as_ref(),
        &request.symbol,
        &request.interval,
        &request.period,
        today,
    )
    .await?;

    // No bars in the window renders as an empty object, like the other lookups
    if series.is_empty() {
        return Ok(Json(Value::Object(Map::new())));
    }
    let records = serde_json::to_value(series.to_records())
        .map_err(|e| ApiError::internal(e.to_string()))?;
    Ok(Json(records))
}

/// Company fundamentals, or `{}` when the provider knows nothing
#[instrument(skip(state))]
pub async fn company_overview(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CompanyOverviewRequest>,
) -> Result<Json<Value>, ApiError> {
    let overview = state.provider.company_overview(&request.symbol).await?;
    let body = match overview {
        Some(overview) => {
            serde_json::to_value(overview).map_err(|e| ApiError::internal(e.to_string()))?
        }
        None => Value::Object(Map::new()),
    };
    Ok(Json(body))
}

pub async fn orchestrate(
    State(state): State<Arc<AppState>>,
    Json(request): Json<OrchestrateRequest>,
) -> Result<Json<OrchestrateResponse>, ApiError> {
    let request_id = Uuid::new_v4();
    let orchestrator = &state.orchestrator;
    let mut context = Context::new().with_session_id(request_id.to_string());
    if let Some(language) = request.language.as_deref() {
        context = context.with_language(language);
    }

    let reply = if request.audio_data.trim().is_empty() {
        info!(%request_id, "Orchestrating text query");
        context.set_input_mode(InputMode::Text);
        orchestrator.handle_query_with(&request.query, &context).await
    } else {
        info!(%request_id, "Orchestrating voice query");
        let audio = STANDARD.decode(request.audio_data.trim())?;
        orchestrator.handle_audio_with(audio, &mut context).await?
    };

    Ok(Json(OrchestrateResponse {
        response: reply.response,
        audio_data: reply.audio.map(|audio| STANDARD.encode(audio)),
    }))
}

pub async fn health() -> &'static str {
    "ok"
}
