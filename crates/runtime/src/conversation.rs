//! Conversation state.

use crate::llm::Message;

/// Ordered message log for one session.
///
/// At most one system message exists, and when present it is the first
/// element. Role alternation is not validated.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the system prompt, keeping it at index 0.
    pub fn load_system_prompt(&mut self, text: impl Into<String>) {
        self.messages.retain(|m| !m.is_system());
        self.messages.insert(0, Message::system(text));
    }

    /// Push a message to the end of the log.
    ///
    /// System messages go through [`Conversation::load_system_prompt`].
    pub fn append(&mut self, message: Message) {
        match message {
            Message::System { content } => self.load_system_prompt(content),
            other => self.messages.push(other),
        }
    }

    /// Drop every message except the system prompt.
    pub fn clear(&mut self) {
        self.messages.retain(Message::is_system);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The active system prompt, if any.
    pub fn system_prompt(&self) -> Option<&str> {
        match self.messages.first() {
            Some(Message::System { content }) => Some(content),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_system_prompt_twice_keeps_one() {
        let mut conv = Conversation::new();
        conv.append(Message::user("hi"));
        conv.load_system_prompt("first");
        conv.load_system_prompt("second");

        assert_eq!(conv.len(), 2);
        assert_eq!(conv.messages()[0], Message::system("second"));
        assert_eq!(conv.system_prompt(), Some("second"));
        assert_eq!(conv.messages()[1], Message::user("hi"));
    }

    #[test]
    fn appended_system_message_moves_to_front() {
        let mut conv = Conversation::new();
        conv.append(Message::user("hi"));
        conv.append(Message::assistant("hello"));
        conv.append(Message::system("P"));

        assert_eq!(conv.len(), 3);
        assert_eq!(conv.system_prompt(), Some("P"));
        assert_eq!(
            conv.messages().iter().filter(|m| m.is_system()).count(),
            1
        );
    }

    #[test]
    fn clear_retains_system_prompt() {
        let mut conv = Conversation::new();
        conv.load_system_prompt("P");
        conv.append(Message::user("a"));
        conv.append(Message::assistant("b"));
        conv.append(Message::tool("call_1", "c"));

        conv.clear();

        assert_eq!(conv.messages(), [Message::system("P")]);
    }

    #[test]
    fn clear_without_system_prompt_empties() {
        let mut conv = Conversation::new();
        conv.append(Message::user("a"));
        conv.clear();
        assert!(conv.is_empty());
        assert_eq!(conv.system_prompt(), None);
    }
}
