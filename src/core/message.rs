use serde::{Deserialize, Serialize};

/// `name` carried by assistant messages that hold function-call text.
pub const FUNCTION_CALL_NAME: &str = "function_call";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Role {
    System,
    User,
    Assistant,
    Function,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Function => "function",
        }
    }
}

impl AsRef<str> for Role {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl TryFrom<&str> for Role {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "system" => Ok(Role::System),
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "function" => Ok(Role::Function),
            _ => Err(format!("invalid message role: {value}")),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

impl From<Role> for String {
    fn from(value: Role) -> Self {
        value.as_str().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            name: None,
            content: content.into(),
        }
    }

    pub fn named(role: Role, name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role,
            name: Some(name.into()),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Assistant message tagged as function-call text (a raw envelope or a
    /// stringified plugin response).
    pub fn function_call(content: impl Into<String>) -> Self {
        Self::named(Role::Assistant, FUNCTION_CALL_NAME, content)
    }

    /// Result of a plugin call as the model reads it.
    pub fn function_result(function_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self::named(Role::Function, function_name, content)
    }

    pub fn is_function_call(&self) -> bool {
        self.role == Role::Assistant && self.name.as_deref() == Some(FUNCTION_CALL_NAME)
    }
}
