//! Webhook HTTP gateway for ChatRelay.
//!
//! Receives updates pushed by Telegram (webhook mode) and hands them to the
//! shared [`UpdateLoop`]. Exposes:
//!
//! - `GET /health`: liveness probe
//! - `POST {path}`: update delivery; always answers `OK` once accepted
//!
//! Built on Axum, with a 1 MB body limit and HTTP trace logging.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use chatrelay_agent::UpdateLoop;
use chatrelay_channels::parse_update;
use chatrelay_config::AppConfig;
use chatrelay_core::channel::Update;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

/// Header Telegram sets when a webhook was registered with a secret.
pub const SECRET_HEADER: &str = "X-Telegram-Bot-Api-Secret-Token";

const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Where and how the gateway listens.
#[derive(Clone)]
pub struct GatewayOptions {
    pub host: String,
    pub port: u16,
    pub path: String,
    pub secret: Option<String>,
}

impl std::fmt::Debug for GatewayOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayOptions")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("path", &self.path)
            .field("secret", &self.secret.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl GatewayOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            host: config.gateway.host.clone(),
            port: config.gateway.port,
            path: config.gateway.path.clone(),
            secret: config.telegram.webhook_secret.clone(),
        }
    }
}

/// Shared state of the gateway handlers.
pub struct GatewayState {
    pub relay: Arc<UpdateLoop>,
    pub secret: Option<String>,
}

type SharedState = Arc<GatewayState>;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Build the Axum router with the health and webhook routes.
pub fn build_router(relay: Arc<UpdateLoop>, options: &GatewayOptions) -> Router {
    let state = Arc::new(GatewayState {
        relay,
        secret: options.secret.clone(),
    });

    Router::new()
        .route("/health", get(health_handler))
        .route(&options.path, post(webhook_handler))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until `shutdown` resolves.
pub async fn start<F>(
    relay: Arc<UpdateLoop>,
    options: GatewayOptions,
    shutdown: F,
) -> Result<(), Box<dyn std::error::Error>>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = format!("{}:{}", options.host, options.port);
    let app = build_router(relay, &options);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| format!("Failed to bind {addr}: {e}"))?;
    info!(address = %addr, path = %options.path, "Webhook gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Webhook gateway stopped");
    Ok(())
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Parse a pushed body: one update object or an array of them.
fn parse_body(body: &[u8]) -> Vec<Update> {
    let value: Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "Ignoring unparseable webhook body");
            return Vec::new();
        }
    };

    let items = match value {
        Value::Array(items) => items,
        other => vec![other],
    };

    items
        .iter()
        .filter_map(|item| {
            let update = parse_update(item);
            if update.is_none() {
                warn!("Skipping pushed update without update_id");
            }
            update
        })
        .collect()
}

async fn webhook_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<&'static str, StatusCode> {
    if let Some(expected) = state.secret.as_deref() {
        let provided = headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok());
        if provided != Some(expected) {
            warn!("Webhook call with missing or wrong secret token");
            return Err(StatusCode::UNAUTHORIZED);
        }
    }

    let updates = parse_body(&body);
    debug!(count = updates.len(), "Webhook updates received");

    // Own task: a client hanging up drops this handler, not the dispatch.
    let relay = state.relay.clone();
    let dispatch = tokio::spawn(async move { relay.handle_push(updates).await });
    if let Err(e) = dispatch.await {
        error!(error = %e, "Webhook dispatch task failed");
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }

    Ok("OK")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use chatrelay_agent::{CommandRouter, RelaySettings};
    use chatrelay_core::channel::Channel;
    use chatrelay_core::completion::{CompletionClient, CompletionRequest, CompletionResponse};
    use chatrelay_core::error::{ChannelError, CompletionError};
    use chatrelay_core::message::ConversationId;
    use chatrelay_memory::{InMemoryConversationStore, InMemoryCursorStore};
    use http_body_util::BodyExt;
    use std::sync::Mutex;
    use std::time::Duration;
    use tower::ServiceExt;

    /// Echoes the last message, optionally after a delay on the tokio clock.
    struct EchoClient {
        delay: Duration,
    }

    #[async_trait]
    impl CompletionClient for EchoClient {
        fn name(&self) -> &str {
            "echo"
        }

        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> Result<CompletionResponse, CompletionError> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let last = request.messages.last().map(|m| m.content.clone());
            Ok(CompletionResponse {
                content: format!("echo: {}", last.unwrap_or_default()),
                model: "echo".into(),
                usage: None,
            })
        }
    }

    #[derive(Default)]
    struct SinkChannel {
        sent: Mutex<Vec<(ConversationId, String)>>,
    }

    #[async_trait]
    impl Channel for SinkChannel {
        fn name(&self) -> &str {
            "sink"
        }

        async fn fetch_updates(
            &self,
            _offset: i64,
            _timeout: Duration,
        ) -> Result<Vec<Update>, ChannelError> {
            Ok(Vec::new())
        }

        async fn send(
            &self,
            conversation_id: &ConversationId,
            text: &str,
        ) -> Result<(), ChannelError> {
            self.sent
                .lock()
                .unwrap()
                .push((conversation_id.clone(), text.to_string()));
            Ok(())
        }
    }

    fn test_app(secret: Option<&str>) -> (Router, Arc<SinkChannel>, Arc<InMemoryCursorStore>) {
        test_app_with_delay(secret, Duration::ZERO)
    }

    fn test_app_with_delay(
        secret: Option<&str>,
        delay: Duration,
    ) -> (Router, Arc<SinkChannel>, Arc<InMemoryCursorStore>) {
        let channel = Arc::new(SinkChannel::default());
        let cursor = Arc::new(InMemoryCursorStore::new(0));
        let relay = Arc::new(UpdateLoop::new(
            channel.clone(),
            CommandRouter::new(Arc::new(EchoClient { delay }), RelaySettings::default()),
            Arc::new(InMemoryConversationStore::new()),
            cursor.clone(),
        ));
        let options = GatewayOptions {
            host: "127.0.0.1".into(),
            port: 0,
            path: "/webhook".into(),
            secret: secret.map(str::to_string),
        };
        (build_router(relay, &options), channel, cursor)
    }

    fn webhook_request(body: &str, secret: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/webhook")
            .header("content-type", "application/json");
        if let Some(secret) = secret {
            builder = builder.header(SECRET_HEADER, secret);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn health_endpoint() {
        let (app, _, _) = test_app(None);
        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json: Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn pushed_update_is_relayed_without_cursor() {
        let (app, channel, cursor) = test_app(None);
        let body = r#"{"update_id": 40, "message": {"chat": {"id": 9}, "text": "ping"}}"#;

        let response = app.oneshot(webhook_request(body, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "OK");

        let sent = channel.sent.lock().unwrap().clone();
        assert_eq!(sent, vec![(ConversationId::from("9"), "echo: ping".to_string())]);
        assert_eq!(cursor.save_count(), 0);
    }

    #[tokio::test]
    async fn batch_body_is_dispatched_in_order() {
        let (app, channel, _) = test_app(None);
        let body = r#"[
            {"update_id": 1, "message": {"chat": {"id": 9}, "text": "/start"}},
            {"update_id": 2, "message": {"chat": {"id": 9}, "text": "/memory"}}
        ]"#;

        app.oneshot(webhook_request(body, None)).await.unwrap();

        let texts: Vec<String> = channel
            .sent
            .lock()
            .unwrap()
            .iter()
            .map(|(_, t)| t.clone())
            .collect();
        assert_eq!(texts.len(), 2);
        assert_eq!(texts[1], "Memory contains 2 recent turns.");
    }

    #[tokio::test(start_paused = true)]
    async fn dispatch_survives_client_hang_up() {
        let (app, channel, _) = test_app_with_delay(None, Duration::from_secs(5));
        let body = r#"{"update_id": 3, "message": {"chat": {"id": 9}, "text": "slow"}}"#;

        // Drop the request future while the completion is still pending.
        let abandoned =
            tokio::time::timeout(Duration::from_secs(1), app.oneshot(webhook_request(body, None)))
                .await;
        assert!(abandoned.is_err());

        tokio::time::sleep(Duration::from_secs(10)).await;
        let sent = channel.sent.lock().unwrap().clone();
        assert_eq!(sent, vec![(ConversationId::from("9"), "echo: slow".to_string())]);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_webhooks_for_one_chat_keep_every_turn() {
        let (app, channel, _) = test_app_with_delay(None, Duration::from_secs(2));
        let first = r#"{"update_id": 1, "message": {"chat": {"id": 9}, "text": "one"}}"#;
        let second = r#"{"update_id": 2, "message": {"chat": {"id": 9}, "text": "two"}}"#;

        let (a, b) = tokio::join!(
            app.clone().oneshot(webhook_request(first, None)),
            app.clone().oneshot(webhook_request(second, None)),
        );
        assert_eq!(a.unwrap().status(), StatusCode::OK);
        assert_eq!(b.unwrap().status(), StatusCode::OK);

        let memory = app
            .oneshot(webhook_request(
                r#"{"update_id": 3, "message": {"chat": {"id": 9}, "text": "/memory"}}"#,
                None,
            ))
            .await
            .unwrap();
        assert_eq!(memory.status(), StatusCode::OK);

        let texts: Vec<String> = channel
            .sent
            .lock()
            .unwrap()
            .iter()
            .map(|(_, t)| t.clone())
            .collect();
        assert_eq!(texts.len(), 3);
        assert_eq!(texts[2], "Memory contains 4 recent turns.");
    }

    #[tokio::test]
    async fn garbage_body_still_answers_ok() {
        let (app, channel, _) = test_app(None);
        let response = app
            .oneshot(webhook_request("not json", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(channel.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn wrong_secret_is_rejected() {
        let (app, channel, _) = test_app(Some("s3cret"));
        let body = r#"{"update_id": 1, "message": {"chat": {"id": 9}, "text": "hi"}}"#;

        let missing = app
            .clone()
            .oneshot(webhook_request(body, None))
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

        let wrong = app
            .clone()
            .oneshot(webhook_request(body, Some("nope")))
            .await
            .unwrap();
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
        assert!(channel.sent.lock().unwrap().is_empty());

        let right = app
            .oneshot(webhook_request(body, Some("s3cret")))
            .await
            .unwrap();
        assert_eq!(right.status(), StatusCode::OK);
    }

    #[test]
    fn options_debug_redacts_secret() {
        let options = GatewayOptions {
            host: "0.0.0.0".into(),
            port: 8443,
            path: "/hook".into(),
            secret: Some("s3cret".into()),
        };
        assert!(!format!("{options:?}").contains("s3cret"));
    }
}
