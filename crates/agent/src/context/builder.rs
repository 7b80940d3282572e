//! Context assembly for the completion call.

use chatrelay_core::message::{ChatMessage, Turn};

/// System directive, then every history turn in order, then the new input.
pub fn build(system_directive: &str, history: &[Turn], new_input: &str) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(system_directive));
    messages.extend(history.iter().map(ChatMessage::from));
    messages.push(ChatMessage::user(new_input));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatrelay_core::message::Role;

    #[test]
    fn empty_history_gives_two_entries() {
        let messages = build("be helpful", &[], "hello");
        assert_eq!(
            messages,
            vec![ChatMessage::system("be helpful"), ChatMessage::user("hello")]
        );
    }

    #[test]
    fn history_sits_between_directive_and_input() {
        let history = vec![
            Turn::user("q1"),
            Turn::assistant("a1"),
            Turn::user("q2"),
            Turn::assistant("a2"),
        ];
        let messages = build("rules", &history, "q3");

        assert_eq!(messages.len(), history.len() + 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages.last().unwrap(), &ChatMessage::user("q3"));
        let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::User, Role::Assistant, Role::User]
        );
        assert_eq!(messages[3].content, "q2");
    }
}
