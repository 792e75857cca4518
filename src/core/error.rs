use std::path::PathBuf;

use reqwest::StatusCode;

/// Longest slice of an error body kept in a transport error.
const BODY_EXCERPT_LIMIT: usize = 512;

/// Failures that abandon a conversation turn.
///
/// A plain (non function-call) answer and a user cancellation are both
/// normal outcomes and never show up here.
#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    #[error("{target} request failed: {source}")]
    Transport {
        target: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{target} request returned {status}: {body}")]
    Status {
        target: &'static str,
        status: StatusCode,
        body: String,
    },
    #[error("no plugin endpoint is registered for function `{name}`")]
    UnresolvedEndpoint { name: String },
    #[error("the plugin document declares no server URL; cannot call `{name}`")]
    MissingServerUrl { name: String },
    #[error("plugin response for `{name}` is not valid JSON: {source}")]
    PluginResponse {
        name: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("another turn is already in progress")]
    TurnInProgress,
}

impl TurnError {
    pub(crate) fn transport(target: &'static str, source: reqwest::Error) -> Self {
        TurnError::Transport { target, source }
    }

    pub(crate) fn status(target: &'static str, status: StatusCode, body: &str) -> Self {
        let trimmed = body.trim();
        let body = if trimmed.is_empty() {
            "<no body>".to_string()
        } else if trimmed.len() > BODY_EXCERPT_LIMIT {
            let mut end = BODY_EXCERPT_LIMIT;
            while !trimmed.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}…", &trimmed[..end])
        } else {
            trimmed.to_string()
        };
        TurnError::Status {
            target,
            status,
            body,
        }
    }

    /// Network-level and HTTP status failures, as opposed to dispatch failures.
    pub fn is_transport(&self) -> bool {
        matches!(self, TurnError::Transport { .. } | TurnError::Status { .. })
    }
}

/// Failures while loading the plugin description document.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("failed to read plugin document at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to fetch plugin document from {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("plugin document request to {url} returned {status}")]
    FetchStatus { url: String, status: StatusCode },
    #[error("plugin document is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("plugin document is not valid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Failures of the file upload collaborator.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("upload request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Upload failed: {0}")]
    Rejected(String),
}
