//! Context handling: bounding stored memory and assembling the prompt.
//!
//! | Step | Function | Rule |
//! |------|----------|------|
//! | Memory bound | [`trim`] | newest `max_turns`, then newest-first char budget |
//! | Prompt | [`build`] | system directive + history + new input |

pub mod builder;
pub mod trimmer;

pub use builder::build;
pub use trimmer::trim;
