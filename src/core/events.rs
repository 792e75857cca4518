use crate::core::message::Message;

/// Where a turn currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    UserMessageAppended,
    /// `pass` counts decoder runs within the turn, starting at 1.
    Streaming { pass: usize },
    Dispatching,
}

/// Progress notifications for whatever renders the conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnEvent {
    State(TurnState),
    MessageAppended {
        index: usize,
        message: Message,
    },
    /// A stream started a new message; `content` is its first chunk.
    MessageOpened {
        index: usize,
        function_call: bool,
        content: String,
    },
    /// Full accumulated text of the open message, not a delta.
    MessageUpdated { index: usize, content: String },
    MessageClosed { index: usize },
}
