// Shared test helpers — not all items used by every test binary.
#![allow(unused)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::Request;

use courier::bus::{EventBus, MemoryTransport};
use courier::channels::{ChannelAdapter, ChannelRegistry, HttpChannelAdapter};
use courier::config::{Config, Environment};
use courier::gateway::{AppState, build_router};
use courier::health::HealthAggregator;
use courier::model::ChannelType;

pub const TEST_API_KEY: &str = "integration-key";
pub const TEST_WEBHOOK_SECRET: &str = "integration-secret";

pub fn test_config(environment: Environment) -> Config {
    let mut config = Config::default();
    config.service_api_key = Some(TEST_API_KEY.to_string());
    config.webhook_secret = Some(TEST_WEBHOOK_SECRET.to_string());
    config.environment = environment;
    config
}

pub struct TestGateway {
    pub app: Router,
    pub transport: Arc<MemoryTransport>,
}

/// Gateway wired to an in-memory bus and the given adapters. Channels
/// without an adapter stay unconfigured, as in a partial deployment.
pub fn build_gateway(config: Config, adapters: Vec<Arc<dyn ChannelAdapter>>) -> TestGateway {
    build_gateway_with_ai(config, adapters, None)
}

pub fn build_gateway_with_ai(
    config: Config,
    adapters: Vec<Arc<dyn ChannelAdapter>>,
    ai_service_url: Option<String>,
) -> TestGateway {
    let transport = Arc::new(MemoryTransport::new());
    let bus = Arc::new(EventBus::new(transport.clone()));
    let mut registry = ChannelRegistry::new();
    for adapter in adapters {
        registry.register(adapter);
    }
    let registry = Arc::new(registry);
    let health = Arc::new(HealthAggregator::new(
        bus.clone(),
        registry.clone(),
        ai_service_url,
        Duration::from_millis(500),
    ));
    let state = AppState::new(&config, bus, registry, health);
    TestGateway {
        app: build_router(state),
        transport,
    }
}

/// An adapter speaking to a wiremock server.
pub fn http_adapter(channel: ChannelType, base_url: &str) -> Arc<dyn ChannelAdapter> {
    Arc::new(HttpChannelAdapter::new(channel, Some(base_url.to_string())))
}

pub fn authed_json(method: &str, uri: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-api-key", TEST_API_KEY)
        .body(Body::from(body.to_string()))
        .expect("build request")
}

pub fn unauthed_json(method: &str, uri: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("build request")
}

pub async fn response_json(resp: axum::http::Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(resp.into_body(), 65536)
        .await
        .expect("read response body");
    serde_json::from_slice(&bytes).expect("parse response body")
}
