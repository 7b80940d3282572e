//! The relay core of ChatRelay.
//!
//! Each inbound update goes through the same steps:
//!
//! 1. **Receive** an update (long polling or webhook push)
//! 2. **Classify** the text: command, oversized input, or free-form question
//! 3. **Build context** (system directive + stored turns + new input)
//! 4. **Ask** the completion service (free-form input only)
//! 5. **Reply** through the channel
//! 6. **Remember** the exchange, trimmed to the memory bounds
//!
//! Updates of one conversation are handled one at a time; different
//! conversations proceed independently.

pub mod backoff;
pub mod context;
pub mod locks;
pub mod router;
pub mod update_loop;

#[cfg(test)]
mod test_helpers;

pub use backoff::{Backoff, Sleeper, TokioSleeper};
pub use context::{build, trim};
pub use locks::ConversationLocks;
pub use router::{classify, CommandRouter, Intent, MemoryUpdate, RelaySettings, Routed};
pub use update_loop::{PollOutcome, PollState, UpdateLoop, INTERNAL_ERROR_REPLY};
