use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::cancel::CancellationChannel;
use crate::core::chat_stream::{stream_completion, ChatBackend};
use crate::core::conversation::Conversation;
use crate::core::dispatch::{dispatch_function_call, parse_function_call, PluginClient};
use crate::core::error::TurnError;
use crate::core::events::{TurnEvent, TurnState};
use crate::core::message::Message;
use crate::core::models::Model;

/// How many plugin round trips a single user message may trigger.
pub const DEFAULT_MAX_FUNCTION_CALLS: usize = 1;

/// What a finished turn produced.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TurnOutcome {
    /// Text of the last stream in the turn.
    pub final_text: String,
    pub function_calls: usize,
    pub cancelled: bool,
    /// Set when the model asked for another call after the limit was spent.
    pub call_limit_reached: bool,
}

/// One conversation with a chat backend and the plugin it may call.
pub struct ChatSession {
    conversation: Conversation,
    backend: Arc<dyn ChatBackend>,
    plugin: PluginClient,
    model: Model,
    max_function_calls: usize,
    pending_upload: Option<String>,
}

impl ChatSession {
    pub fn new(backend: Arc<dyn ChatBackend>, plugin: PluginClient, model: Model) -> Self {
        Self {
            conversation: Conversation::with_system_prompt(model.system_prompt()),
            backend,
            plugin,
            model,
            max_function_calls: DEFAULT_MAX_FUNCTION_CALLS,
            pending_upload: None,
        }
    }

    pub fn with_max_function_calls(mut self, max_function_calls: usize) -> Self {
        self.max_function_calls = max_function_calls;
        self
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<TurnEvent> {
        self.conversation.subscribe()
    }

    pub fn model(&self) -> Model {
        self.model
    }

    pub fn plugin(&self) -> &PluginClient {
        &self.plugin
    }

    /// Switches models. Only allowed before the first message is sent, since
    /// the system prompt depends on the model.
    pub fn set_model(&mut self, model: Model) -> Result<(), String> {
        if self.conversation.is_started() {
            return Err(format!(
                "Cannot switch to {model}: the conversation has already started"
            ));
        }
        if model != self.model {
            self.conversation.replace_system_prompt(model.system_prompt());
            self.model = model;
        }
        Ok(())
    }

    /// Remembers an uploaded file's URL so the next user message mentions it.
    pub fn attach_upload(&mut self, url: impl Into<String>) {
        self.pending_upload = Some(url.into());
    }

    pub fn pending_upload(&self) -> Option<&str> {
        self.pending_upload.as_deref()
    }

    /// Runs one full turn for `text`: the user message, the assistant stream
    /// and, when the model asks for it, plugin calls followed by another
    /// stream each.
    ///
    /// The conversation's turn flags are cleared on every exit path,
    /// including errors and the future being dropped mid-turn.
    pub async fn send(
        &mut self,
        text: &str,
        cancel: CancellationToken,
    ) -> Result<TurnOutcome, TurnError> {
        let mut turn = TurnGuard::begin(self);
        let result = turn.run(text, &cancel).await;
        if let Err(err) = &result {
            warn!(error = %err, "Turn failed");
        }
        result
    }

    async fn run(
        &mut self,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<TurnOutcome, TurnError> {
        let content = match self.pending_upload.take() {
            Some(url) => format!("{text}\n{url}"),
            None => text.to_string(),
        };
        self.conversation.push(Message::user(content));
        self.set_state(TurnState::UserMessageAppended);

        let mut outcome = TurnOutcome::default();
        let mut pass = 0;
        loop {
            pass += 1;
            self.set_state(TurnState::Streaming { pass });
            let streamed = stream_completion(
                self.backend.as_ref(),
                &mut self.conversation,
                self.model.label(),
                cancel,
            )
            .await?;
            outcome.final_text = streamed.text;

            if streamed.cancelled {
                info!(pass, "Turn cancelled");
                outcome.cancelled = true;
                return Ok(outcome);
            }

            let Some(call) = parse_function_call(&outcome.final_text) else {
                return Ok(outcome);
            };
            if outcome.function_calls >= self.max_function_calls {
                warn!(
                    function = %call.name,
                    limit = self.max_function_calls,
                    "Function call limit reached; not dispatching"
                );
                outcome.call_limit_reached = true;
                return Ok(outcome);
            }

            self.set_state(TurnState::Dispatching);
            debug!(function = %call.name, "Dispatching function call");
            dispatch_function_call(&self.plugin, &mut self.conversation, &call).await?;
            outcome.function_calls += 1;
            self.conversation.set_function_call(false);
        }
    }

    fn set_state(&self, state: TurnState) {
        self.conversation.emit(TurnEvent::State(state));
    }
}

/// Marks a turn as running for as long as it lives.
struct TurnGuard<'a> {
    session: &'a mut ChatSession,
}

impl<'a> TurnGuard<'a> {
    fn begin(session: &'a mut ChatSession) -> Self {
        session.conversation.mark_started();
        session.conversation.set_streaming(true);
        Self { session }
    }
}

impl Deref for TurnGuard<'_> {
    type Target = ChatSession;

    fn deref(&self) -> &ChatSession {
        self.session
    }
}

impl DerefMut for TurnGuard<'_> {
    fn deref_mut(&mut self) -> &mut ChatSession {
        self.session
    }
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        self.session.conversation.finish_turn();
        self.session.set_state(TurnState::Idle);
    }
}

/// A [`ChatSession`] shared between the input loop and whatever cancels
/// turns. At most one turn runs at a time; a second `send` while one is in
/// flight is rejected instead of queued.
#[derive(Clone)]
pub struct SharedSession {
    inner: Arc<Mutex<ChatSession>>,
    cancel: CancellationChannel,
}

impl SharedSession {
    pub fn new(session: ChatSession) -> Self {
        Self {
            inner: Arc::new(Mutex::new(session)),
            cancel: CancellationChannel::new(),
        }
    }

    /// The channel that cancels whichever turn is running.
    pub fn cancellation(&self) -> CancellationChannel {
        self.cancel.clone()
    }

    pub async fn send(&self, text: &str) -> Result<TurnOutcome, TurnError> {
        let mut session = self
            .inner
            .try_lock()
            .map_err(|_| TurnError::TurnInProgress)?;
        // A rejected send must never touch the running turn's token.
        let token = self.cancel.reset();
        session.send(text, token).await
    }

    pub async fn lock(&self) -> MutexGuard<'_, ChatSession> {
        self.inner.lock().await
    }
}
