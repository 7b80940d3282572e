//! The relay loop: fetch updates, dispatch them, keep the cursor.
//!
//! Two entry points share one dispatch path:
//!
//! 1. **Pull**: [`UpdateLoop::run_until`] long-polls the channel, advances
//!    and persists the cursor before each dispatch, backs off on failures.
//! 2. **Push**: [`UpdateLoop::handle_push`] dispatches updates delivered to
//!    the gateway. The cursor is not involved.
//!
//! Dispatch never takes the loop down: errors and panics are logged and the
//! conversation gets a generic notice.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chatrelay_core::channel::{Channel, Update};
use chatrelay_core::error::MemoryError;
use chatrelay_core::memory::{ConversationStore, CursorStore};
use futures::FutureExt;
use tracing::{debug, error, info, warn};

use crate::backoff::{Backoff, Sleeper, TokioSleeper};
use crate::locks::ConversationLocks;
use crate::router::CommandRouter;

pub const INTERNAL_ERROR_REPLY: &str = "Internal error, retry.";

/// Mutable state of the pull loop.
#[derive(Debug, Clone)]
pub struct PollState {
    /// Last update id accepted for dispatch.
    pub cursor: i64,
    pub backoff: Backoff,
}

impl PollState {
    pub fn new(cursor: i64, backoff: Backoff) -> Self {
        Self { cursor, backoff }
    }

    /// Load the persisted cursor. An unreadable cursor restarts from 0.
    pub async fn restore(store: &dyn CursorStore, backoff: Backoff) -> Self {
        let cursor = match store.load().await {
            Ok(cursor) => cursor,
            Err(MemoryError::Corrupted { location, reason }) => {
                warn!(%location, %reason, "Cursor is corrupted, starting from 0");
                0
            }
            Err(e) => {
                warn!(error = %e, "Failed to load cursor, starting from 0");
                0
            }
        };
        Self::new(cursor, backoff)
    }
}

/// Outcome of one pull iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The fetch succeeded; this many updates were past the cursor.
    Fetched { dispatched: usize, skipped: usize },
    /// The fetch failed and the loop waited this long.
    BackedOff(Duration),
}

pub struct UpdateLoop {
    channel: Arc<dyn Channel>,
    router: CommandRouter,
    conversations: Arc<dyn ConversationStore>,
    cursor_store: Arc<dyn CursorStore>,
    sleeper: Arc<dyn Sleeper>,
    locks: ConversationLocks,
    backoff: Backoff,
    poll_timeout: Duration,
}

impl UpdateLoop {
    pub fn new(
        channel: Arc<dyn Channel>,
        router: CommandRouter,
        conversations: Arc<dyn ConversationStore>,
        cursor_store: Arc<dyn CursorStore>,
    ) -> Self {
        Self {
            channel,
            router,
            conversations,
            cursor_store,
            sleeper: Arc::new(TokioSleeper),
            locks: ConversationLocks::new(),
            backoff: Backoff::default(),
            poll_timeout: Duration::from_secs(25),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    /// Fresh pull state from the persisted cursor.
    pub async fn restore_state(&self) -> PollState {
        PollState::restore(self.cursor_store.as_ref(), self.backoff.clone()).await
    }

    /// Pull mode until `shutdown` resolves. Returns the final state.
    ///
    /// Shutdown interrupts only the fetch (and a backoff wait). Once a batch
    /// has arrived, the update being dispatched always runs to completion and
    /// shutdown is checked between updates, so an update whose cursor was
    /// persisted is never abandoned halfway.
    pub async fn run_until<F>(&self, shutdown: F) -> PollState
    where
        F: Future<Output = ()>,
    {
        let mut state = self.restore_state().await;
        info!(
            channel = %self.channel.name(),
            cursor = state.cursor,
            "Update loop started (pull mode)"
        );

        tokio::pin!(shutdown);
        loop {
            let fetched = tokio::select! {
                biased;
                _ = &mut shutdown => break,
                fetched = self.fetch(&mut state) => fetched,
            };
            let Ok(updates) = fetched else {
                continue;
            };

            let mut stopping = false;
            self.dispatch_batch(&mut state, updates, || {
                stopping = (&mut shutdown).now_or_never().is_some();
                stopping
            })
            .await;
            if stopping {
                break;
            }
        }

        info!(cursor = state.cursor, "Update loop stopped");
        state
    }

    /// One fetch plus in-order dispatch of everything past the cursor.
    pub async fn poll_once(&self, state: &mut PollState) -> PollOutcome {
        match self.fetch(state).await {
            Ok(updates) => self.dispatch_batch(state, updates, || false).await,
            Err(delay) => PollOutcome::BackedOff(delay),
        }
    }

    /// Fetch the next batch. On failure, wait out the backoff and return the delay.
    async fn fetch(&self, state: &mut PollState) -> Result<Vec<Update>, Duration> {
        match self
            .channel
            .fetch_updates(state.cursor + 1, self.poll_timeout)
            .await
        {
            Ok(updates) => {
                state.backoff.reset();
                Ok(updates)
            }
            Err(e) => {
                let delay = state.backoff.next_delay();
                warn!(error = %e, delay_secs = delay.as_secs(), "Fetching updates failed, backing off");
                self.sleeper.sleep(delay).await;
                Err(delay)
            }
        }
    }

    /// Advance the cursor and dispatch each fresh update in order.
    ///
    /// `stop` is asked after every dispatched update; updates left behind keep
    /// the cursor where it is and are fetched again later.
    async fn dispatch_batch(
        &self,
        state: &mut PollState,
        updates: Vec<Update>,
        mut stop: impl FnMut() -> bool,
    ) -> PollOutcome {
        let mut dispatched = 0;
        let mut skipped = 0;
        for update in updates {
            if update.update_id <= state.cursor {
                debug!(update_id = update.update_id, cursor = state.cursor, "Skipping stale update");
                skipped += 1;
                continue;
            }

            state.cursor = update.update_id;
            if let Err(e) = self.cursor_store.save(state.cursor).await {
                warn!(cursor = state.cursor, error = %e, "Failed to persist cursor");
            }

            self.dispatch_guarded(&update).await;
            dispatched += 1;

            if stop() {
                info!(cursor = state.cursor, "Shutdown requested, leaving rest of batch");
                break;
            }
        }

        PollOutcome::Fetched {
            dispatched,
            skipped,
        }
    }

    /// Push mode: dispatch delivered updates in order.
    pub async fn handle_push(&self, updates: Vec<Update>) {
        for update in &updates {
            self.dispatch_guarded(update).await;
        }
    }

    /// Dispatch with errors and panics contained.
    async fn dispatch_guarded(&self, update: &Update) {
        let failure = match AssertUnwindSafe(self.dispatch(update)).catch_unwind().await {
            Ok(Ok(())) => return,
            Ok(Err(e)) => e.to_string(),
            Err(panic) => panic_message(panic.as_ref()),
        };

        error!(update_id = update.update_id, error = %failure, "Dispatch failed");

        if let Some(chat_id) = update.conversation_id() {
            if let Err(e) = self.channel.send(chat_id, INTERNAL_ERROR_REPLY).await {
                warn!(chat_id = %chat_id, error = %e, "Failed to send error notice");
            }
        }
    }

    /// Route one update and persist the resulting memory.
    pub async fn dispatch(&self, update: &Update) -> chatrelay_core::Result<()> {
        let Some((chat_id, text)) = update.extract() else {
            debug!(update_id = update.update_id, "Update has no chat or text, ignoring");
            return Ok(());
        };

        let _guard = self.locks.acquire(chat_id).await;

        let history = self.conversations.load(chat_id).await?;
        let Some(routed) = self.router.route(text, &history).await else {
            return Ok(());
        };

        let sent = self.channel.send(chat_id, &routed.reply).await;
        if let Err(e) = &sent {
            warn!(chat_id = %chat_id, error = %e, "Failed to relay reply");
        }

        let updated = self.router.apply(history, routed.update);
        if let Err(e) = self.conversations.save(chat_id, &updated).await {
            warn!(chat_id = %chat_id, error = %e, "Failed to persist conversation");
        }

        debug!(
            update_id = update.update_id,
            chat_id = %chat_id,
            turns = updated.len(),
            "Update handled"
        );
        sent.map_err(Into::into)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panic: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panic: {s}")
    } else {
        "panic".into()
    }
}
