//! Handler tests driving the router in-process

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use chrono::{Days, Local, NaiveDate};
use finagent_llm::{
    CompletionRequest, CompletionResponse, EmbeddingProvider, LLMProvider, Message, StopReason,
    TokenUsage,
};
use finagent_market::orchestrator::UNKNOWN_REQUEST;
use finagent_market::{
    CompanyOverview, EarningsSurprise, GlobalQuote, Interval, LanguageAgent, MarketConfig,
    MarketDataProvider, MarketError, Orchestrator, PriceBar, PriceSeries,
};
use finagent_server::{AppState, build_router};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use tower::ServiceExt;

struct FakeProvider;

fn recent_series(symbol: &str) -> PriceSeries {
    let today = Local::now().date_naive();
    PriceSeries::from_bars(
        symbol,
        (1..=5u64).map(|offset| {
            let close = 100.0 + offset as f64;
            PriceBar {
                date: today - Days::new(offset),
                open: close,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: 1_000.0,
            }
        }),
    )
}

#[async_trait]
impl MarketDataProvider for FakeProvider {
    async fn time_series(
        &self,
        symbol: &str,
        _interval: Interval,
    ) -> finagent_market::Result<PriceSeries> {
        if symbol == "EMPTY" {
            return Ok(PriceSeries::new(symbol));
        }
        Ok(recent_series(symbol))
    }

    async fn global_quote(&self, symbol: &str) -> finagent_market::Result<Option<GlobalQuote>> {
        match symbol {
            "TSM" => Ok(Some(GlobalQuote {
                symbol: "TSM".to_string(),
                open: Some(101.0),
                high: Some(103.5),
                low: Some(100.2),
                price: Some(102.8),
                volume: Some(12_345_678.0),
                latest_trading_day: NaiveDate::from_ymd_opt(2024, 3, 28),
                previous_close: Some(100.9),
                change: Some(1.9),
                change_percent: Some(1.883),
            })),
            "FAIL" => Err(MarketError::RateLimited {
                provider: "Alpha Vantage".to_string(),
            }),
            _ => Ok(None),
        }
    }

    async fn company_overview(
        &self,
        symbol: &str,
    ) -> finagent_market::Result<Option<CompanyOverview>> {
        if symbol != "TSM" {
            return Ok(None);
        }
        let mut other = BTreeMap::new();
        other.insert("Sector".to_string(), "TECHNOLOGY".to_string());
        Ok(Some(CompanyOverview {
            symbol: "TSM".to_string(),
            name: Some("Taiwan Semiconductor Manufacturing".to_string()),
            market_capitalization: Some(6.5e11),
            ebitda: None,
            pe_ratio: Some(27.4),
            peg_ratio: None,
            book_value: None,
            dividend_yield: None,
            eps: Some(5.18),
            revenue: None,
            gross_profit: None,
            profit_margin: None,
            operating_margin: None,
            other,
        }))
    }

    async fn earnings(&self, _symbol: &str) -> finagent_market::Result<Vec<EarningsSurprise>> {
        Ok(Vec::new())
    }
}

struct FakeLlm;

#[async_trait]
impl LLMProvider for FakeLlm {
    async fn complete(
        &self,
        _request: CompletionRequest,
    ) -> finagent_llm::Result<CompletionResponse> {
        Ok(CompletionResponse {
            message: Message::assistant("Asia tech allocation is steady."),
            stop_reason: StopReason::EndTurn,
            usage: TokenUsage::default(),
        })
    }

    fn name(&self) -> &str {
        "fake"
    }
}

struct FakeEmbedder;

#[async_trait]
impl EmbeddingProvider for FakeEmbedder {
    async fn embed(&self, texts: Vec<String>) -> finagent_llm::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
    }

    fn dimension(&self) -> usize {
        2
    }
}

fn create_test_app() -> Router {
    let orchestrator = Orchestrator::new(
        MarketConfig::default(),
        Arc::new(FakeProvider),
        Arc::new(FakeEmbedder),
        LanguageAgent::new(Arc::new(FakeLlm), "test-model"),
    )
    .unwrap();
    build_router(AppState::new(Arc::new(orchestrator)))
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_returns_ok() {
    let response = create_test_app()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"ok");
}

mod stock_prices_tests {
    use super::*;

    #[tokio::test]
    async fn returns_quote_records_keyed_by_symbol() {
        let response = create_test_app()
            .oneshot(post_json(
                "/stock_prices",
                &json!({"symbols": ["TSM", "NOPE", "FAIL"]}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["TSM"]["price"], json!(102.8));
        assert_eq!(body["TSM"]["latest_trading_day"], json!("2024-03-28"));
        assert_eq!(body["NOPE"], json!({}));
        assert_eq!(body["FAIL"], json!({}));
    }

    #[tokio::test]
    async fn rejects_missing_symbols_field() {
        let response = create_test_app()
            .oneshot(post_json("/stock_prices", &json!({})))
            .await
            .unwrap();
        assert!(response.status().is_client_error());
    }
}

mod historical_data_tests {
    use super::*;

    #[tokio::test]
    async fn defaults_to_daily_bars_for_a_year() {
        let response = create_test_app()
            .oneshot(post_json("/historical_data", &json!({"symbol": "TSM"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        let bars = body.as_array().unwrap();
        assert_eq!(bars.len(), 5);
        // Oldest first
        assert_eq!(bars[0]["close"], json!(105.0));
        assert_eq!(bars[4]["close"], json!(101.0));
    }

    #[tokio::test]
    async fn empty_history_is_empty_object() {
        let response = create_test_app()
            .oneshot(post_json("/historical_data", &json!({"symbol": "EMPTY"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({}));
    }

    #[tokio::test]
    async fn bad_interval_is_400_with_detail() {
        let response = create_test_app()
            .oneshot(post_json(
                "/historical_data",
                &json!({"symbol": "TSM", "interval": "5m"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = json_body(response).await;
        assert_eq!(
            body["detail"],
            json!("Interval '5m' not supported. Use '1d', '1wk', or '1mo'.")
        );
    }
}

mod company_overview_tests {
    use super::*;

    #[tokio::test]
    async fn returns_provider_field_names() {
        let response = create_test_app()
            .oneshot(post_json("/company_overview", &json!({"symbol": "TSM"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["Symbol"], json!("TSM"));
        assert_eq!(body["PERatio"], json!(27.4));
        assert_eq!(body["Sector"], json!("TECHNOLOGY"));
    }

    #[tokio::test]
    async fn unknown_symbol_is_empty_object() {
        let response = create_test_app()
            .oneshot(post_json("/company_overview", &json!({"symbol": "ZZZZ"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({}));
    }
}

mod orchestrate_tests {
    use super::*;

    #[tokio::test]
    async fn text_query_runs_market_branch() {
        let response = create_test_app()
            .oneshot(post_json(
                "/orchestrate",
                &json!({"audio_data": "", "query": "market data for TSM"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["response"], json!("Asia tech allocation is steady."));
        assert!(body.get("audio_data").is_none());
    }

    #[tokio::test]
    async fn trailing_slash_route_and_unknown_query() {
        let response = create_test_app()
            .oneshot(post_json("/orchestrate/", &json!({"query": "hello there"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["response"], json!(UNKNOWN_REQUEST));
    }

    #[tokio::test]
    async fn audio_without_voice_is_500() {
        let response = create_test_app()
            .oneshot(post_json(
                "/orchestrate",
                &json!({"audio_data": "UklGRg==", "query": ""}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(response).await;
        assert!(body["detail"].as_str().unwrap().contains("Voice input"));
    }

    #[tokio::test]
    async fn invalid_base64_is_500() {
        let response = create_test_app()
            .oneshot(post_json(
                "/orchestrate",
                &json!({"audio_data": "not base64!!", "query": "market data"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(response).await;
        assert!(body["detail"].as_str().unwrap().starts_with("Invalid audio_data"));
    }
}
