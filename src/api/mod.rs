use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::message::Message;

/// Literal text a function-call stream starts with.
pub const FUNCTION_CALL_PREFIX: &str = r#"{"function_call":"#;

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub content: String,
}

impl From<&Message> for ChatMessage {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role.as_str().to_string(),
            name: message.name.clone(),
            content: message.content.clone(),
        }
    }
}

#[derive(Serialize, Debug)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub model: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded argument object, kept as the raw text the model produced.
    pub arguments: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FunctionCallEnvelope {
    pub function_call: FunctionCall,
}

impl FunctionCallEnvelope {
    /// Parses completed stream text. `None` means the text is a plain answer.
    pub fn parse(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }
}

/// Body returned by a plugin endpoint. Only `result` is read; the rest is
/// echoed back into the conversation verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct PluginResponse {
    pub raw: Value,
}

impl PluginResponse {
    pub fn new(raw: Value) -> Self {
        Self { raw }
    }

    /// Text the model reads next: a string `result` as-is, any other JSON
    /// value serialized, and an absent or null `result` as the empty string.
    pub fn result_text(&self) -> String {
        match self.raw.get("result") {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(text)) => text.clone(),
            Some(other) => other.to_string(),
        }
    }

    pub fn to_json_string(&self) -> String {
        self.raw.to_string()
    }
}

#[derive(Deserialize, Debug)]
pub struct UploadResponse {
    pub url: Option<String>,
    pub message: Option<String>,
}
