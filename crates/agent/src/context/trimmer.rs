//! Bounded conversation memory.
//!
//! Keeps at most `max_turns` of the newest turns, then fits them into a
//! character budget with a sliding window from newest to oldest.

use chatrelay_core::message::Turn;

/// Trim `turns` to at most `max_turns` entries and `max_chars` characters.
///
/// A turn that would overflow the budget is skipped and scanning continues,
/// so a shorter older turn may still be kept. Survivors stay chronological.
pub fn trim(turns: &[Turn], max_turns: usize, max_chars: usize) -> Vec<Turn> {
    let start = turns.len().saturating_sub(max_turns);
    let window = &turns[start..];

    let mut used = 0;
    let mut kept = Vec::with_capacity(window.len());

    // Newest (end) → oldest.
    for turn in window.iter().rev() {
        let len = turn.char_len();
        if used + len <= max_chars {
            kept.push(turn.clone());
            used += len;
        }
    }

    kept.reverse();
    kept
}
