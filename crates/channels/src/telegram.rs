//! Telegram channel adapter.
//!
//! Implements the Channel trait for the Telegram Bot API: `getUpdates` long
//! polling for inbound updates and `sendMessage` for replies. Push delivery
//! (webhook mode) reuses [`parse_update`] from the gateway.

use std::time::Duration;

use async_trait::async_trait;
use chatrelay_config::TelegramConfig;
use chatrelay_core::channel::{Channel, InboundMessage, Update};
use chatrelay_core::error::ChannelError;
use chatrelay_core::message::ConversationId;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

/// Appended to outbound text that had to be cut.
pub const TRUNCATION_MARKER: &str = "\n...[truncated]";

/// Extra wait on top of the long-poll timeout before the HTTP call gives up.
const POLL_MARGIN: Duration = Duration::from_secs(10);

const SEND_TIMEOUT: Duration = Duration::from_secs(30);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Telegram channel adapter.
pub struct TelegramChannel {
    bot_token: String,
    api_base: String,
    max_message_chars: usize,
    disable_web_page_preview: bool,
    poll_margin: Duration,
    client: reqwest::Client,
}

impl std::fmt::Debug for TelegramChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramChannel")
            .field("bot_token", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("max_message_chars", &self.max_message_chars)
            .finish()
    }
}

#[derive(Serialize)]
struct GetUpdatesRequest<'a> {
    offset: i64,
    timeout: u64,
    allowed_updates: &'a [&'a str],
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    disable_web_page_preview: bool,
}

impl TelegramChannel {
    pub fn new(
        bot_token: impl Into<String>,
        api_base: impl Into<String>,
        max_message_chars: usize,
    ) -> Result<Self, ChannelError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| ChannelError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            bot_token: bot_token.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            max_message_chars,
            disable_web_page_preview: true,
            poll_margin: POLL_MARGIN,
            client,
        })
    }

    /// Build from the `[telegram]` config section. The bot token must be set.
    pub fn from_config(config: &TelegramConfig) -> Result<Self, ChannelError> {
        let token = config
            .bot_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ChannelError::NotConfigured("telegram.bot_token is not set".into()))?;

        let mut channel = Self::new(token, config.api_base.clone(), config.max_message_chars)?;
        channel.disable_web_page_preview = config.disable_web_page_preview;
        Ok(channel)
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.bot_token, method)
    }

    /// Read a Bot API envelope and return its `result`, or why it failed.
    async fn envelope(response: reqwest::Response) -> Result<Value, String> {
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| format!("HTTP {status}: body not received: {}", e.without_url()))?;
        Self::parse_envelope(status, &body)
    }

    fn parse_envelope(status: reqwest::StatusCode, body: &[u8]) -> Result<Value, String> {
        let body: Value = serde_json::from_slice(body)
            .map_err(|e| format!("HTTP {status}: unparseable body: {e}"))?;

        if body.get("ok").and_then(Value::as_bool) != Some(true) {
            let description = body
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or("no description");
            return Err(format!("HTTP {status}: {description}"));
        }
        Ok(body.get("result").cloned().unwrap_or(Value::Null))
    }
}

/// Parse one element of a `getUpdates` batch or one webhook body.
///
/// Returns `None` only when `update_id` is missing. Missing message, chat or
/// text leave the matching fields empty so the update still moves the cursor.
pub fn parse_update(value: &Value) -> Option<Update> {
    let update_id = value.get("update_id")?.as_i64()?;

    let message = value.get("message").map(|message| {
        let conversation_id = message
            .get("chat")
            .and_then(|chat| chat.get("id"))
            .and_then(|id| match id {
                Value::Number(n) => n.as_i64().map(ConversationId::from),
                Value::String(s) => Some(ConversationId::from(s.as_str())),
                _ => None,
            });
        let text = message
            .get("text")
            .and_then(Value::as_str)
            .map(str::to_string);
        InboundMessage {
            conversation_id,
            text,
        }
    });

    Some(Update { update_id, message })
}

/// Cut `text` so that it, including [`TRUNCATION_MARKER`], fits in `max_chars`.
pub fn truncate_for_display(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(TRUNCATION_MARKER.chars().count());
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(TRUNCATION_MARKER);
    out
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn fetch_updates(
        &self,
        offset: i64,
        timeout: Duration,
    ) -> Result<Vec<Update>, ChannelError> {
        let request = GetUpdatesRequest {
            offset,
            timeout: timeout.as_secs(),
            allowed_updates: &["message"],
        };

        let response = match self
            .client
            .post(self.method_url("getUpdates"))
            .timeout(timeout + self.poll_margin)
            .json(&request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                debug!(offset, "getUpdates timed out, treating as empty batch");
                return Ok(Vec::new());
            }
            Err(e) => return Err(ChannelError::ConnectionLost(e.without_url().to_string())),
        };

        // The request timeout also covers the body, which can stall like the headers.
        let status = response.status();
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) if e.is_timeout() => {
                debug!(offset, "getUpdates body timed out, treating as empty batch");
                return Ok(Vec::new());
            }
            Err(e) => return Err(ChannelError::ConnectionLost(e.without_url().to_string())),
        };

        let result = Self::parse_envelope(status, &body).map_err(ChannelError::InvalidPayload)?;

        let Some(items) = result.as_array() else {
            return Err(ChannelError::InvalidPayload(
                "getUpdates result is not an array".into(),
            ));
        };

        let updates: Vec<Update> = items
            .iter()
            .filter_map(|item| {
                let parsed = parse_update(item);
                if parsed.is_none() {
                    warn!("Skipping update without update_id");
                }
                parsed
            })
            .collect();

        debug!(offset, count = updates.len(), "Fetched updates");
        Ok(updates)
    }

    async fn send(&self, conversation_id: &ConversationId, text: &str) -> Result<(), ChannelError> {
        let text = truncate_for_display(text, self.max_message_chars);
        let request = SendMessageRequest {
            chat_id: conversation_id.as_str(),
            text: &text,
            disable_web_page_preview: self.disable_web_page_preview,
        };

        let failed = |reason: String| ChannelError::DeliveryFailed {
            chat_id: conversation_id.to_string(),
            reason,
        };

        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .timeout(SEND_TIMEOUT)
            .json(&request)
            .send()
            .await
            .map_err(|e| failed(e.without_url().to_string()))?;

        Self::envelope(response).await.map_err(failed)?;

        info!(
            chat_id = %conversation_id,
            content_len = text.chars().count(),
            "Telegram reply sent"
        );
        Ok(())
    }

    async fn health_check(&self) -> Result<bool, ChannelError> {
        let response = self
            .client
            .get(self.method_url("getMe"))
            .timeout(SEND_TIMEOUT)
            .send()
            .await
            .map_err(|e| ChannelError::ConnectionLost(e.without_url().to_string()))?;
        Ok(Self::envelope(response).await.is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Json;
    use axum::routing::post;
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    /// Fake Bot API that answers every method with `reply` and records bodies.
    async fn fake_bot_api(reply: Value) -> (String, Arc<Mutex<Vec<Value>>>) {
        let seen: Arc<Mutex<Vec<Value>>> = Arc::default();
        let recorder = seen.clone();
        let handler = move |Json(body): Json<Value>| {
            let recorder = recorder.clone();
            let reply = reply.clone();
            async move {
                recorder.lock().unwrap().push(body);
                Json(reply)
            }
        };
        let app = axum::Router::new()
            .route("/botTEST/getUpdates", post(handler.clone()))
            .route("/botTEST/sendMessage", post(handler));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), seen)
    }

    #[test]
    fn parse_full_update() {
        let update = parse_update(&json!({
            "update_id": 815,
            "message": {"message_id": 1, "chat": {"id": -100123, "type": "group"}, "text": "hi"}
        }))
        .unwrap();
        assert_eq!(update.update_id, 815);
        let (chat, text) = update.extract().unwrap();
        assert_eq!(chat.as_str(), "-100123");
        assert_eq!(text, "hi");
    }

    #[test]
    fn parse_update_without_text_keeps_id() {
        let update = parse_update(&json!({
            "update_id": 7,
            "message": {"chat": {"id": 5}, "sticker": {}}
        }))
        .unwrap();
        assert_eq!(update.update_id, 7);
        assert!(update.extract().is_none());
        assert_eq!(update.conversation_id().unwrap().as_str(), "5");
    }

    #[test]
    fn parse_update_without_id_is_rejected() {
        assert!(parse_update(&json!({"message": {"chat": {"id": 1}, "text": "x"}})).is_none());
        assert!(parse_update(&json!({"update_id": "12"})).is_none());
    }

    #[test]
    fn short_text_is_untouched() {
        assert_eq!(truncate_for_display("hello", 3900), "hello");
    }

    #[test]
    fn long_text_fits_with_marker() {
        let text = "é".repeat(5000);
        let out = truncate_for_display(&text, 3900);
        assert_eq!(out.chars().count(), 3900);
        assert!(out.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn from_config_requires_token() {
        let err = TelegramChannel::from_config(&TelegramConfig::default()).unwrap_err();
        assert!(matches!(err, ChannelError::NotConfigured(_)));
    }

    #[test]
    fn debug_redacts_token() {
        let channel = TelegramChannel::new("123:SECRET", "https://api.telegram.org", 3900).unwrap();
        let dbg = format!("{channel:?}");
        assert!(!dbg.contains("SECRET"));
        assert!(dbg.contains("[REDACTED]"));
    }

    #[tokio::test]
    async fn fetch_skips_elements_without_update_id() {
        let (base, seen) = fake_bot_api(json!({
            "ok": true,
            "result": [
                {"update_id": 11, "message": {"chat": {"id": 1}, "text": "a"}},
                {"bogus": true},
                {"update_id": 12}
            ]
        }))
        .await;
        let channel = TelegramChannel::new("TEST", base, 3900).unwrap();

        let updates = channel
            .fetch_updates(11, Duration::from_secs(0))
            .await
            .unwrap();
        assert_eq!(
            updates.iter().map(|u| u.update_id).collect::<Vec<_>>(),
            vec![11, 12]
        );

        let requests = seen.lock().unwrap();
        assert_eq!(requests[0]["offset"], 11);
        assert_eq!(requests[0]["allowed_updates"][0], "message");
    }

    #[tokio::test]
    async fn fetch_not_ok_is_invalid_payload() {
        let (base, _) = fake_bot_api(json!({"ok": false, "description": "Unauthorized"})).await;
        let channel = TelegramChannel::new("TEST", base, 3900).unwrap();

        let err = channel
            .fetch_updates(1, Duration::from_secs(0))
            .await
            .unwrap_err();
        match err {
            ChannelError::InvalidPayload(reason) => assert!(reason.contains("Unauthorized")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn stalled_update_body_is_an_empty_batch() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = vec![0u8; 4096];
            let _ = socket.read(&mut request).await;
            socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 64\r\n\r\n{\"ok\":true,",
                )
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let mut channel = TelegramChannel::new("TEST", format!("http://{addr}"), 3900).unwrap();
        channel.poll_margin = Duration::from_millis(300);

        let updates = channel.fetch_updates(1, Duration::ZERO).await.unwrap();
        assert!(updates.is_empty());
    }

    #[test]
    fn envelope_without_ok_reports_description() {
        let err = TelegramChannel::parse_envelope(
            reqwest::StatusCode::CONFLICT,
            br#"{"ok":false,"description":"Conflict: terminated by other getUpdates request"}"#,
        )
        .unwrap_err();
        assert!(err.contains("409"));
        assert!(err.contains("terminated by other getUpdates"));

        let err = TelegramChannel::parse_envelope(reqwest::StatusCode::BAD_GATEWAY, b"<html>")
            .unwrap_err();
        assert!(err.contains("unparseable body"));
    }

    #[tokio::test]
    async fn send_truncates_and_disables_previews() {
        let (base, seen) = fake_bot_api(json!({"ok": true, "result": {}})).await;
        let channel = TelegramChannel::new("TEST", base, 100).unwrap();

        channel
            .send(&ConversationId::from("42"), &"x".repeat(500))
            .await
            .unwrap();

        let requests = seen.lock().unwrap();
        assert_eq!(requests[0]["chat_id"], "42");
        assert_eq!(requests[0]["disable_web_page_preview"], true);
        assert_eq!(requests[0]["text"].as_str().unwrap().chars().count(), 100);
    }

    #[tokio::test]
    async fn health_check_calls_get_me() {
        let app = axum::Router::new()
            .route(
                "/botGOOD/getMe",
                axum::routing::get(|| async { Json(json!({"ok": true, "result": {"id": 1}})) }),
            )
            .route(
                "/botBAD/getMe",
                axum::routing::get(|| async {
                    Json(json!({"ok": false, "description": "Unauthorized"}))
                }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        let base = format!("http://{addr}");

        let good = TelegramChannel::new("GOOD", base.clone(), 3900).unwrap();
        assert!(good.health_check().await.unwrap());
        let bad = TelegramChannel::new("BAD", base, 3900).unwrap();
        assert!(!bad.health_check().await.unwrap());
    }

    #[tokio::test]
    async fn rejected_send_is_delivery_failure() {
        let (base, _) = fake_bot_api(json!({"ok": false, "description": "chat not found"})).await;
        let channel = TelegramChannel::new("TEST", base, 3900).unwrap();

        let err = channel.send(&"42".into(), "hi").await.unwrap_err();
        assert!(matches!(err, ChannelError::DeliveryFailed { .. }));
    }
}
