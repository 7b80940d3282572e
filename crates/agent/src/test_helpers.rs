//! Shared stubs for router and update-loop tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chatrelay_core::channel::{Channel, Update};
use chatrelay_core::completion::{CompletionClient, CompletionRequest, CompletionResponse};
use chatrelay_core::error::{ChannelError, CompletionError};
use chatrelay_core::message::ConversationId;

use crate::backoff::Sleeper;

/// One scripted outcome of a completion call.
#[derive(Debug, Clone)]
pub enum Script {
    Reply(String),
    /// Reply after waiting on the tokio clock.
    Slow(Duration, String),
    Fail(CompletionError),
    Panic,
}

/// A completion client that plays back scripted outcomes.
///
/// Queued outcomes are used first; after that every call gets `fallback`.
pub struct ScriptedCompletionClient {
    queue: Mutex<VecDeque<Script>>,
    fallback: Script,
    calls: AtomicUsize,
    last_request: Mutex<Option<CompletionRequest>>,
}

impl ScriptedCompletionClient {
    pub fn new(queue: Vec<Script>, fallback: Script) -> Self {
        Self {
            queue: Mutex::new(queue.into()),
            fallback,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn replying(text: &str) -> Self {
        Self::new(vec![], Script::Reply(text.into()))
    }

    pub fn failing(error: CompletionError) -> Self {
        Self::new(vec![], Script::Fail(error))
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionClient for ScriptedCompletionClient {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, CompletionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request);

        let script = self
            .queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        match script {
            Script::Reply(content) => Ok(CompletionResponse {
                content,
                model: "scripted".into(),
                usage: None,
            }),
            Script::Slow(delay, content) => {
                tokio::time::sleep(delay).await;
                Ok(CompletionResponse {
                    content,
                    model: "scripted".into(),
                    usage: None,
                })
            }
            Script::Fail(error) => Err(error),
            Script::Panic => panic!("scripted completion panic"),
        }
    }
}

/// A channel that hands out queued batches and records every reply.
#[derive(Default)]
pub struct RecordingChannel {
    batches: Mutex<VecDeque<Result<Vec<Update>, ChannelError>>>,
    offsets: Mutex<Vec<i64>>,
    sent: Mutex<Vec<(ConversationId, String)>>,
    fail_sends: AtomicBool,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one `fetch_updates` outcome. An empty queue yields empty batches.
    pub fn push_batch(&self, batch: Result<Vec<Update>, ChannelError>) {
        self.batches.lock().unwrap().push_back(batch);
    }

    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<(ConversationId, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sent().into_iter().map(|(_, text)| text).collect()
    }

    pub fn offsets(&self) -> Vec<i64> {
        self.offsets.lock().unwrap().clone()
    }
}

#[async_trait]
impl Channel for RecordingChannel {
    fn name(&self) -> &str {
        "recording"
    }

    async fn fetch_updates(
        &self,
        offset: i64,
        _timeout: Duration,
    ) -> Result<Vec<Update>, ChannelError> {
        self.offsets.lock().unwrap().push(offset);
        self.batches
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn send(&self, conversation_id: &ConversationId, text: &str) -> Result<(), ChannelError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(ChannelError::DeliveryFailed {
                chat_id: conversation_id.to_string(),
                reason: "scripted failure".into(),
            });
        }
        self.sent
            .lock()
            .unwrap()
            .push((conversation_id.clone(), text.to_string()));
        Ok(())
    }
}

/// Records requested delays instead of sleeping.
#[derive(Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}
