pub mod cancel;
pub mod chat_stream;
pub mod config;
pub mod conversation;
pub mod dispatch;
pub mod endpoints;
pub mod error;
pub mod events;
pub mod message;
pub mod models;
pub mod session;
pub mod upload;
