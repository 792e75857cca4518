//! Sherpa is a terminal chat client whose model can call a local
//! code-execution plugin described by an OpenAPI document.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns the conversation, the streaming decoder, plugin endpoint
//!   resolution and dispatch, cancellation, and the turn state machine that
//!   ties them together in [`core::session`].
//! - [`api`] defines the wire payloads exchanged with the chat endpoint, the
//!   plugin server, and the upload endpoint.
//! - [`cli`] parses arguments and runs the interactive chat and the one-shot
//!   commands on top of [`core::session::SharedSession`].
//! - [`logging`] installs the diagnostics subscriber; [`utils`] holds the
//!   transcript writer and URL helpers.
//!
//! The binary (`src/main.rs`) routes straight into [`crate::cli::main`].

pub mod api;
pub mod cli;
pub mod core;
pub mod logging;
pub mod utils;
