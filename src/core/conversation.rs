use std::collections::BTreeSet;

use tokio::sync::mpsc;
use tracing::debug;

use crate::api::ChatMessage;
use crate::core::events::TurnEvent;
use crate::core::message::{Message, Role};

/// Handle to the message a stream is still writing into.
///
/// Only one exists at a time. It is consumed by [`Conversation::close`].
#[derive(Debug, PartialEq, Eq)]
#[must_use = "an open message must be closed when its stream ends"]
pub struct OpenMessage {
    index: usize,
}

impl OpenMessage {
    pub fn index(&self) -> usize {
        self.index
    }
}

/// Ordered message log plus the flags a front end renders from.
#[derive(Debug, Default)]
pub struct Conversation {
    messages: Vec<Message>,
    /// Indices kept for the reader only and never sent to the model.
    records: BTreeSet<usize>,
    open: Option<usize>,
    streaming: bool,
    function_call: bool,
    started: bool,
    events: Option<mpsc::UnboundedSender<TurnEvent>>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_system_prompt(prompt: impl Into<String>) -> Self {
        let mut conversation = Self::new();
        conversation.messages.push(Message::system(prompt));
        conversation
    }

    /// Swaps the leading system message, or inserts one if there is none.
    pub(crate) fn replace_system_prompt(&mut self, prompt: impl Into<String>) {
        let system = Message::system(prompt);
        match self.messages.first_mut() {
            Some(first) if first.role == Role::System => *first = system,
            _ => {
                self.messages.insert(0, system);
                self.records = self.records.iter().map(|index| index + 1).collect();
            }
        }
    }

    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<TurnEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.events = Some(tx);
        rx
    }

    pub(crate) fn emit(&self, event: TurnEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
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

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Appends a closed message. Any message still open is closed first.
    pub fn push(&mut self, message: Message) -> usize {
        self.close_dangling();
        let index = self.messages.len();
        self.emit(TurnEvent::MessageAppended {
            index,
            message: message.clone(),
        });
        self.messages.push(message);
        index
    }

    /// Appends a message that stays in the log but is left out of
    /// [`api_messages`](Self::api_messages).
    pub fn push_record(&mut self, message: Message) -> usize {
        let index = self.push(message);
        self.records.insert(index);
        index
    }

    pub fn is_record(&self, index: usize) -> bool {
        self.records.contains(&index)
    }

    /// Appends `message` as the open message that later chunks rewrite.
    pub fn open_message(&mut self, message: Message) -> OpenMessage {
        self.close_dangling();
        let index = self.messages.len();
        self.emit(TurnEvent::MessageOpened {
            index,
            function_call: message.is_function_call(),
            content: message.content.clone(),
        });
        self.messages.push(message);
        self.open = Some(index);
        OpenMessage { index }
    }

    /// Replaces the open message's content with the full text so far.
    pub fn replace_open(&mut self, handle: &OpenMessage, content: &str) {
        if self.open != Some(handle.index) {
            debug!(index = handle.index, "Ignoring update for a message that is no longer open");
            return;
        }
        if let Some(message) = self.messages.get_mut(handle.index) {
            message.content.clear();
            message.content.push_str(content);
            self.emit(TurnEvent::MessageUpdated {
                index: handle.index,
                content: content.to_string(),
            });
        }
    }

    pub fn close(&mut self, handle: OpenMessage) {
        if self.open == Some(handle.index) {
            self.open = None;
            self.emit(TurnEvent::MessageClosed {
                index: handle.index,
            });
        }
    }

    pub fn has_open_message(&self) -> bool {
        self.open.is_some()
    }

    fn close_dangling(&mut self) {
        if let Some(index) = self.open.take() {
            debug!(index, "Closing message left open by an earlier stream");
            self.emit(TurnEvent::MessageClosed { index });
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    pub fn is_function_call(&self) -> bool {
        self.function_call
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub(crate) fn set_streaming(&mut self, streaming: bool) {
        self.streaming = streaming;
    }

    pub(crate) fn set_function_call(&mut self, function_call: bool) {
        self.function_call = function_call;
    }

    pub(crate) fn mark_started(&mut self) {
        self.started = true;
    }

    /// Clears the per-turn flags and closes anything still open.
    pub(crate) fn finish_turn(&mut self) {
        self.close_dangling();
        self.streaming = false;
        self.function_call = false;
    }

    /// Messages in order, in the shape the chat endpoint expects. Records
    /// pushed with [`push_record`](Self::push_record) are skipped.
    pub fn api_messages(&self) -> Vec<ChatMessage> {
        self.messages
            .iter()
            .enumerate()
            .filter(|(index, _)| !self.is_record(*index))
            .map(|(_, message)| ChatMessage::from(message))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_message_is_rewritten_in_place() {
        let mut conversation = Conversation::with_system_prompt("be brief");
        conversation.push(Message::user("hi"));

        let handle = conversation.open_message(Message::assistant("Hel"));
        conversation.replace_open(&handle, "Hello");
        conversation.replace_open(&handle, "Hello there");
        assert!(conversation.has_open_message());
        conversation.close(handle);

        assert!(!conversation.has_open_message());
        assert_eq!(conversation.len(), 3);
        assert_eq!(conversation.last().unwrap().content, "Hello there");
        assert_eq!(conversation.last().unwrap().role, Role::Assistant);
    }

    #[test]
    fn pushing_closes_a_dangling_message_and_stale_handles_are_ignored() {
        let mut conversation = Conversation::new();
        let stale = conversation.open_message(Message::assistant("partial"));
        conversation.push(Message::user("next"));

        assert!(!conversation.has_open_message());
        conversation.replace_open(&stale, "rewritten");
        assert_eq!(conversation.messages()[0].content, "partial");
        conversation.close(stale);
        assert_eq!(conversation.len(), 2);
    }

    #[test]
    fn events_follow_the_message_lifecycle() {
        let mut conversation = Conversation::new();
        let mut rx = conversation.subscribe();

        conversation.push(Message::user("list files"));
        let handle = conversation.open_message(Message::function_call("{\"function_call\":"));
        conversation.replace_open(&handle, "{\"function_call\":{}}");
        conversation.close(handle);

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert_eq!(
            events,
            vec![
                TurnEvent::MessageAppended {
                    index: 0,
                    message: Message::user("list files")
                },
                TurnEvent::MessageOpened {
                    index: 1,
                    function_call: true,
                    content: "{\"function_call\":".to_string()
                },
                TurnEvent::MessageUpdated {
                    index: 1,
                    content: "{\"function_call\":{}}".to_string()
                },
                TurnEvent::MessageClosed { index: 1 },
            ]
        );
    }

    #[test]
    fn finish_turn_resets_flags_but_keeps_started() {
        let mut conversation = Conversation::new();
        conversation.mark_started();
        conversation.set_streaming(true);
        conversation.set_function_call(true);
        let _handle = conversation.open_message(Message::assistant("x"));

        conversation.finish_turn();
        assert!(!conversation.is_streaming());
        assert!(!conversation.is_function_call());
        assert!(!conversation.has_open_message());
        assert!(conversation.is_started());
    }

    #[test]
    fn api_messages_keep_order_and_names() {
        let mut conversation = Conversation::with_system_prompt("sys");
        conversation.push(Message::user("list files"));
        conversation.push(Message::function_result("listFiles", "a.txt"));

        let wire = conversation.api_messages();
        let roles: Vec<_> = wire.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["system", "user", "function"]);
        assert_eq!(wire[2].name.as_deref(), Some("listFiles"));
    }

    #[test]
    fn records_stay_in_the_log_but_not_on_the_wire() {
        let mut conversation = Conversation::new();
        conversation.push(Message::user("list files"));
        let record = conversation.push_record(Message::function_call("{\"result\":\"a.txt\"}"));
        conversation.push(Message::function_result("listFiles", "a.txt"));
        conversation.replace_system_prompt("sys");

        assert_eq!(conversation.len(), 4);
        assert!(conversation.is_record(record + 1));
        assert!(!conversation.is_record(record));

        let wire = conversation.api_messages();
        let roles: Vec<_> = wire.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["system", "user", "function"]);
    }
}
