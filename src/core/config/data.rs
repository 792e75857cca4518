use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::core::models::Model;
use crate::core::session::DEFAULT_MAX_FUNCTION_CALLS;

pub const DEFAULT_CHAT_URL: &str = "http://localhost:3000/api/chat";
pub const DEFAULT_PLUGIN_DOCUMENT: &str = "openapi.json";
pub const DEFAULT_UPLOAD_URL: &str = "http://localhost:3333/upload";

/// Persisted settings. Unset keys fall back to the defaults above when read
/// through the accessor methods.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct Config {
    /// Streaming chat endpoint
    pub chat_url: Option<String>,
    /// Model label used for new conversations (e.g., "GPT-4 Code Interpreter")
    pub default_model: Option<String>,
    /// Path or http(s) URL of the plugin's OpenAPI document
    pub plugin_document: Option<String>,
    pub upload_url: Option<String>,
    /// Plugin round trips allowed per user message
    pub max_function_calls: Option<usize>,
    /// Applies to plugin and upload requests. The chat stream never times out.
    pub request_timeout_secs: Option<u64>,
}

/// Keys accepted by `sherpa set` / `sherpa unset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    ChatUrl,
    DefaultModel,
    PluginDocument,
    UploadUrl,
    MaxFunctionCalls,
    RequestTimeoutSecs,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 6] = [
        ConfigKey::ChatUrl,
        ConfigKey::DefaultModel,
        ConfigKey::PluginDocument,
        ConfigKey::UploadUrl,
        ConfigKey::MaxFunctionCalls,
        ConfigKey::RequestTimeoutSecs,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ConfigKey::ChatUrl => "chat-url",
            ConfigKey::DefaultModel => "default-model",
            ConfigKey::PluginDocument => "plugin-document",
            ConfigKey::UploadUrl => "upload-url",
            ConfigKey::MaxFunctionCalls => "max-function-calls",
            ConfigKey::RequestTimeoutSecs => "request-timeout-secs",
        }
    }

    /// Accepts the kebab-case name or the snake_case field name.
    pub fn parse(name: &str) -> Option<ConfigKey> {
        let normalized = name.trim().replace('_', "-");
        ConfigKey::ALL
            .into_iter()
            .find(|key| key.name().eq_ignore_ascii_case(&normalized))
    }
}

impl Config {
    pub fn chat_url(&self) -> &str {
        self.chat_url.as_deref().unwrap_or(DEFAULT_CHAT_URL)
    }

    /// The configured model, or the default when unset or unrecognized.
    pub fn default_model(&self) -> Model {
        self.default_model
            .as_deref()
            .and_then(|label| label.parse().ok())
            .unwrap_or_default()
    }

    pub fn plugin_document(&self) -> &str {
        self.plugin_document
            .as_deref()
            .unwrap_or(DEFAULT_PLUGIN_DOCUMENT)
    }

    pub fn upload_url(&self) -> &str {
        self.upload_url.as_deref().unwrap_or(DEFAULT_UPLOAD_URL)
    }

    pub fn max_function_calls(&self) -> usize {
        self.max_function_calls.unwrap_or(DEFAULT_MAX_FUNCTION_CALLS)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}
