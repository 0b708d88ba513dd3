//! HTTP surface of the gateway.
//!
//! Composes the authenticator, signature verifier, rate limiter, channel
//! registry, event bus and health aggregator into the fixed route set
//! consumed by the backend. All resources are constructed by the bootstrap
//! and injected here; nothing is fetched through ambient globals.

pub mod conversations;
pub mod telegram;

use std::sync::{Arc, Mutex};

use axum::extract::{Path, Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::auth::signature::{SIGNATURE_HEADER, SignatureOutcome};
use crate::auth::{ServiceAuthenticator, SignaturePolicy, SignatureVerifier, service_key};
use crate::bus::{BusChannel, EventBus};
use crate::channels::{ChannelRegistry, SendRequest};
use crate::config::Config;
use crate::errors::{GatewayError, GatewayResult};
use crate::health::HealthAggregator;
use crate::limit::{RateLimits, RouteClass};
use crate::model::{
    ChannelType, EventType, MessageStatus, SessionStatus, StatusLedger, Transition,
    UnifiedMessage, WebhookEvent,
};

pub use conversations::ConversationStore;
pub use telegram::TelegramBindings;

/// Maximum message text length accepted on the send surface, in characters.
pub const MAX_TEXT_CHARS: usize = 4096;

/// Shared state handed to every route handler.
#[derive(Clone)]
pub struct AppState {
    pub auth: ServiceAuthenticator,
    pub verifier: Option<SignatureVerifier>,
    pub signature_policy: SignaturePolicy,
    pub limits: Arc<RateLimits>,
    pub registry: Arc<ChannelRegistry>,
    pub bus: Arc<EventBus>,
    pub health: Arc<HealthAggregator>,
    pub telegram: Arc<TelegramBindings>,
    pub conversations: Arc<ConversationStore>,
    pub ledger: Arc<Mutex<StatusLedger>>,
}

impl AppState {
    pub fn new(
        config: &Config,
        bus: Arc<EventBus>,
        registry: Arc<ChannelRegistry>,
        health: Arc<HealthAggregator>,
    ) -> Self {
        let signature_policy = config.environment.signature_policy();
        let verifier = config
            .webhook_secret
            .clone()
            .filter(|s| !s.is_empty())
            .map(|secret| SignatureVerifier::new(secret, signature_policy));
        if verifier.is_none() {
            warn!("webhook secret not configured; signed webhook routes will fail closed");
        }
        Self {
            auth: ServiceAuthenticator::new(config.service_api_key.clone()),
            verifier,
            signature_policy,
            limits: Arc::new(RateLimits::new(config.limits.clone().into())),
            registry,
            bus,
            health,
            telegram: Arc::new(TelegramBindings::new()),
            conversations: Arc::new(ConversationStore::new()),
            ledger: Arc::new(Mutex::new(StatusLedger::new())),
        }
    }
}

/// Build the gateway router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/send", post(send_handler))
        .route("/webhook/{channel}", post(webhook_handler))
        .route("/telegram/register", post(telegram_register_handler))
        .route("/telegram/unregister", post(telegram_unregister_handler))
        .route("/telegram/status", get(telegram_status_handler))
        .route("/health", get(health_handler))
        .route("/health/ready", get(ready_handler))
        .route("/health/live", get(live_handler))
        .fallback(fallback_handler)
        .layer(middleware::from_fn(log_requests))
        .with_state(state)
}

/// Log method, path and status for every response, before it leaves the
/// process. Detail for 5xx goes to error, 4xx to warn.
async fn log_requests(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let response = next.run(req).await;
    let status = response.status();
    if status.is_server_error() {
        error!("{} {} -> {}", method, path, status);
    } else if status.is_client_error() {
        warn!("{} {} -> {}", method, path, status);
    } else {
        debug!("{} {} -> {}", method, path, status);
    }
    response
}

/// Rate-limit key: authenticated tenant when known, else forwarded client
/// address, else one shared anonymous bucket.
fn client_key(headers: &HeaderMap, user_id: Option<i64>) -> String {
    if let Some(id) = user_id {
        return format!("user:{}", id);
    }
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|ip| format!("ip:{}", ip.trim()))
        .unwrap_or_else(|| "anonymous".to_string())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub user_id: i64,
    pub messenger_type: ChannelType,
    pub messenger_id: String,
    pub text: String,
    #[serde(default)]
    pub media_urls: Vec<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// POST /send — deliver one outbound message through a channel adapter.
async fn send_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<SendMessageRequest>,
) -> GatewayResult<Json<serde_json::Value>> {
    let identity = state.auth.authenticate(&headers)?;
    let key = client_key(&headers, identity.user_id.or(Some(body.user_id)));
    state.limits.check(RouteClass::Send, &key)?;

    if body.messenger_id.trim().is_empty() {
        return Err(GatewayError::Validation {
            message: "messengerId must not be empty".into(),
            details: Some(serde_json::json!({"field": "messengerId"})),
        });
    }
    let text_chars = body.text.chars().count();
    if text_chars > MAX_TEXT_CHARS {
        return Err(GatewayError::Validation {
            message: format!("text exceeds {} characters", MAX_TEXT_CHARS),
            details: Some(serde_json::json!({
                "field": "text",
                "maxLength": MAX_TEXT_CHARS,
                "actualLength": text_chars,
            })),
        });
    }

    let request = SendRequest {
        user_id: body.user_id,
        channel_type: body.messenger_type,
        channel_contact_id: body.messenger_id.clone(),
        text: body.text.clone(),
        media_urls: body.media_urls.clone(),
        session_id: body.session_id.clone(),
    };
    let receipt = state.registry.send(&request).await?;

    let mut message = UnifiedMessage::outbound(
        body.messenger_type,
        body.messenger_id,
        body.user_id,
        body.text,
    );
    message.id = receipt.message_id.clone();
    message.media_urls = body.media_urls;
    message.status = MessageStatus::Sent;

    state
        .ledger
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .apply(&message.id, MessageStatus::Sent);
    state.conversations.record(&message);
    state
        .bus
        .publish_event(&WebhookEvent::message(EventType::MessageSent, message))
        .await?;

    info!("message sent via {}: id={}", request.channel_type, receipt.message_id);
    Ok(Json(serde_json::json!({
        "success": true,
        "data": {"messageId": receipt.message_id},
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WebhookBody {
    #[serde(rename = "type")]
    event_type: EventType,
    #[serde(default)]
    user_id: Option<i64>,
    data: serde_json::Value,
}

/// POST /webhook/{channel} — backend-proxied vendor events: inbound
/// messages, delivery status callbacks and session status changes.
async fn webhook_handler(
    State(state): State<AppState>,
    Path(channel): Path<String>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> GatewayResult<Json<serde_json::Value>> {
    let channel: ChannelType = channel.parse().map_err(|_| GatewayError::NotFound)?;

    let key = client_key(&headers, service_key::parse_user_id(&headers));
    state.limits.check(RouteClass::Webhook, &key)?;

    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    match (&state.verifier, signature) {
        (Some(verifier), signature) => {
            if verifier.verify(signature, &body)? == SignatureOutcome::Skipped {
                debug!("webhook {}: unsigned request accepted (optional policy)", channel);
            }
        }
        (None, None) if state.signature_policy == SignaturePolicy::Optional => {
            debug!("webhook {}: no secret configured, verification skipped", channel);
        }
        (None, _) => {
            return Err(GatewayError::Misconfigured(
                "webhook secret not configured".into(),
            ));
        }
    }

    let envelope: WebhookBody = serde_json::from_value(body).map_err(|e| {
        GatewayError::Validation {
            message: format!("malformed webhook envelope: {}", e),
            details: None,
        }
    })?;

    match envelope.event_type {
        EventType::MessageReceived => {
            let message: UnifiedMessage =
                serde_json::from_value(envelope.data).map_err(|e| {
                    GatewayError::validation(format!("malformed message payload: {}", e))
                })?;
            message
                .validate()
                .map_err(GatewayError::validation)?;
            if message.channel_type != channel {
                return Err(GatewayError::validation(format!(
                    "payload channel {} does not match route {}",
                    message.channel_type, channel
                )));
            }
            state.conversations.record(&message);
            state
                .bus
                .publish_event(&WebhookEvent::message(EventType::MessageReceived, message))
                .await?;
            Ok(Json(serde_json::json!({"success": true})))
        }
        EventType::MessageSent | EventType::MessageDelivered | EventType::MessageRead => {
            let mut message: UnifiedMessage =
                serde_json::from_value(envelope.data).map_err(|e| {
                    GatewayError::validation(format!("malformed message payload: {}", e))
                })?;
            let status = envelope
                .event_type
                .message_status()
                .ok_or_else(|| GatewayError::validation("unexpected event type"))?;

            let transition = state
                .ledger
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .apply(&message.id, status);
            if transition == Transition::Ignored {
                // Late or out-of-order callback; status never regresses.
                debug!(
                    "webhook {}: ignored stale {:?} for message {}",
                    channel, status, message.id
                );
                return Ok(Json(serde_json::json!({"success": true, "applied": false})));
            }

            message.status = status;
            if status == MessageStatus::Read {
                state.conversations.mark_read(
                    message.user_id,
                    &message.channel_contact_id,
                    channel,
                );
            }
            state
                .bus
                .publish_event(&WebhookEvent::message(envelope.event_type, message))
                .await?;
            Ok(Json(serde_json::json!({"success": true, "applied": true})))
        }
        EventType::SessionStatus => {
            let status: SessionStatus = serde_json::from_value(envelope.data).map_err(|e| {
                GatewayError::validation(format!("malformed session payload: {}", e))
            })?;
            let user_id = envelope
                .user_id
                .or_else(|| service_key::parse_user_id(&headers))
                .ok_or_else(|| GatewayError::validation("userId required for session events"))?;
            state
                .bus
                .publish_event(&WebhookEvent::session(channel, user_id, status))
                .await?;
            Ok(Json(serde_json::json!({"success": true})))
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TelegramBindingRequest {
    #[serde(default)]
    user_id: Option<i64>,
    #[serde(default)]
    chat_id: Option<serde_json::Value>,
}

/// Telegram chat ids arrive as numbers or strings depending on the caller.
fn chat_id_string(value: Option<&serde_json::Value>) -> Option<String> {
    match value {
        Some(serde_json::Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

/// POST /telegram/register — bind a chat to a tenant and update the default
/// recipient.
async fn telegram_register_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<TelegramBindingRequest>,
) -> GatewayResult<Json<serde_json::Value>> {
    let identity = state.auth.authenticate(&headers)?;
    state.limits.check(
        RouteClass::General,
        &client_key(&headers, identity.user_id),
    )?;

    let user_id = body
        .user_id
        .or(identity.user_id)
        .ok_or_else(|| GatewayError::validation("userId required (body or x-user-id header)"))?;
    let chat_id = chat_id_string(body.chat_id.as_ref());
    state.telegram.register(user_id, chat_id.as_deref());

    Ok(Json(serde_json::json!({"success": true, "userId": user_id})))
}

/// POST /telegram/unregister — idempotent unbind. No auth: unbinding only
/// ever removes a binding, never creates or reads one.
async fn telegram_unregister_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<TelegramBindingRequest>,
) -> GatewayResult<Json<serde_json::Value>> {
    state.limits.check(
        RouteClass::General,
        &client_key(&headers, service_key::parse_user_id(&headers)),
    )?;
    let chat_id = chat_id_string(body.chat_id.as_ref());
    state.telegram.unregister(body.user_id, chat_id.as_deref());
    Ok(Json(serde_json::json!({"success": true})))
}

/// GET /telegram/status — adapter connectivity plus binding counts.
async fn telegram_status_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> GatewayResult<Json<serde_json::Value>> {
    state
        .limits
        .check(RouteClass::General, &client_key(&headers, None))?;
    let connected = state.registry.health(ChannelType::Telegram).await
        == crate::channels::AdapterHealth::Healthy;
    Ok(Json(serde_json::json!({
        "connected": connected,
        "bot": state.telegram.snapshot(),
    })))
}

/// GET /health — deep composite check over all dependencies.
async fn health_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(e) = state
        .limits
        .check(RouteClass::General, &client_key(&headers, None))
    {
        return e.into_response();
    }
    let report = state.health.composite().await;
    let code = if report.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(report)).into_response()
}

/// GET /health/ready — backbone reachability only; used for traffic gating.
async fn ready_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(e) = state
        .limits
        .check(RouteClass::General, &client_key(&headers, None))
    {
        return e.into_response();
    }
    if state.health.ready().await {
        (StatusCode::OK, Json(serde_json::json!({"status": "ready"}))).into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({"status": "unavailable"})),
        )
            .into_response()
    }
}

/// GET /health/live — answers iff the process can respond at all.
async fn live_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "alive"}))
}

async fn fallback_handler() -> GatewayError {
    GatewayError::NotFound
}

/// Consume send commands published by the backend on the bus and dispatch
/// them to the channel adapters. Failures are isolated per command.
pub async fn spawn_send_command_worker(
    bus: Arc<EventBus>,
    registry: Arc<ChannelRegistry>,
) -> anyhow::Result<tokio::task::JoinHandle<()>> {
    let mut rx = bus.subscribe(BusChannel::SendCommand).await?;
    let handle = tokio::spawn(async move {
        while let Some(raw) = rx.recv().await {
            let request: SendRequest = match serde_json::from_slice(&raw) {
                Ok(request) => request,
                Err(e) => {
                    warn!("malformed send command on bus: {}", e);
                    continue;
                }
            };
            match registry.send(&request).await {
                Ok(receipt) => {
                    let mut message = UnifiedMessage::outbound(
                        request.channel_type,
                        request.channel_contact_id.clone(),
                        request.user_id,
                        request.text.clone(),
                    );
                    message.id = receipt.message_id;
                    message.status = MessageStatus::Sent;
                    if let Err(e) = bus
                        .publish_event(&WebhookEvent::message(EventType::MessageSent, message))
                        .await
                    {
                        error!("send command event publish failed: {}", e);
                    }
                }
                Err(e) => {
                    error!("send command dispatch failed: {}", e);
                }
            }
        }
        debug!("send command worker stopped");
    });
    Ok(handle)
}
