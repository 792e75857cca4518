//! Line-oriented rendering of turn events.

use std::io::{self, Write};

use crate::core::events::TurnEvent;
use crate::core::message::{Message, Role};

/// Prints streamed text as it grows and reports each message once it is
/// complete.
pub struct EventPrinter<W: Write> {
    out: W,
    open: Option<OpenState>,
}

struct OpenState {
    index: usize,
    function_call: bool,
    content: String,
}

impl<W: Write> EventPrinter<W> {
    pub fn new(out: W) -> Self {
        Self { out, open: None }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Renders `event` and returns the message it completed, if any.
    pub fn handle(&mut self, event: &TurnEvent) -> io::Result<Option<Message>> {
        match event {
            TurnEvent::State(_) => Ok(None),
            TurnEvent::MessageOpened {
                index,
                function_call,
                content,
            } => {
                if *function_call {
                    write!(self.out, "⚙ ")?;
                }
                write!(self.out, "{content}")?;
                self.out.flush()?;
                self.open = Some(OpenState {
                    index: *index,
                    function_call: *function_call,
                    content: content.clone(),
                });
                Ok(None)
            }
            TurnEvent::MessageUpdated { index, content } => {
                let Some(open) = self.open.as_mut().filter(|open| open.index == *index) else {
                    return Ok(None);
                };
                match content.strip_prefix(open.content.as_str()) {
                    Some(suffix) => write!(self.out, "{suffix}")?,
                    // Content was rewritten rather than extended.
                    None => write!(self.out, "\n{content}")?,
                }
                self.out.flush()?;
                open.content.clone_from(content);
                Ok(None)
            }
            TurnEvent::MessageClosed { index } => {
                let Some(open) = self.open.take_if(|open| open.index == *index) else {
                    return Ok(None);
                };
                writeln!(self.out)?;
                writeln!(self.out)?;
                let message = if open.function_call {
                    Message::function_call(open.content)
                } else {
                    Message::assistant(open.content)
                };
                Ok(Some(message))
            }
            TurnEvent::MessageAppended { message, .. } => {
                match message.role {
                    Role::Function => {
                        let name = message.name.as_deref().unwrap_or("function");
                        writeln!(self.out, "⚙ {name} returned:")?;
                        writeln!(self.out, "{}", message.content)?;
                        writeln!(self.out)?;
                    }
                    // Raw plugin responses and echoed user input stay quiet.
                    Role::Assistant | Role::User | Role::System => {}
                }
                Ok(Some(message.clone()))
            }
        }
    }
}
