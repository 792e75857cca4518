//! Resolution of plugin function names to HTTP endpoints.
//!
//! The plugin server describes itself with an OpenAPI document. Only two
//! things are read from it: the `operationId` → path mapping under `paths`
//! and the URL of the first entry under `servers`.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::core::error::{DocumentError, TurnError};
use crate::utils::url::join_endpoint_url;

const HTTP_METHODS: [&str; 8] = [
    "get", "put", "post", "delete", "options", "head", "patch", "trace",
];

#[derive(Debug, Clone, Deserialize)]
pub struct ServerEntry {
    pub url: String,
}

/// The subset of an OpenAPI document this client understands.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PluginDocument {
    #[serde(default)]
    pub paths: Map<String, Value>,
    #[serde(default)]
    pub servers: Vec<ServerEntry>,
}

impl PluginDocument {
    pub fn from_json_str(text: &str) -> Result<Self, DocumentError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, DocumentError> {
        // Go through serde_json::Value so path order is kept.
        let value: Value = serde_yaml::from_str(text)?;
        Ok(serde_json::from_value(value)?)
    }

    /// Loads the document from a local path or an http(s) URL.
    pub async fn load(source: &str, client: &reqwest::Client) -> Result<Self, DocumentError> {
        if source.starts_with("http://") || source.starts_with("https://") {
            return Self::fetch(source, client).await;
        }

        let path = Path::new(source);
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| DocumentError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        if has_yaml_extension(source) {
            Self::from_yaml_str(&text)
        } else {
            Self::from_json_str(&text)
        }
    }

    async fn fetch(url: &str, client: &reqwest::Client) -> Result<Self, DocumentError> {
        let fetch_error = |source| DocumentError::Fetch {
            url: url.to_string(),
            source,
        };
        let response = client.get(url).send().await.map_err(fetch_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(DocumentError::FetchStatus {
                url: url.to_string(),
                status,
            });
        }

        let yaml_content = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.to_ascii_lowercase().contains("yaml"));
        let text = response.text().await.map_err(fetch_error)?;
        if yaml_content || has_yaml_extension(url) {
            Self::from_yaml_str(&text)
        } else {
            Self::from_json_str(&text)
        }
    }
}

fn has_yaml_extension(source: &str) -> bool {
    let lower = source.to_ascii_lowercase();
    lower.ends_with(".yaml") || lower.ends_with(".yml")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub path: String,
    /// Method the operation was declared under. Dispatch always POSTs.
    pub method: String,
}

/// An `operationId` declared more than once. The later declaration won.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationIdCollision {
    pub operation_id: String,
    pub replaced_path: String,
    pub path: String,
}

#[derive(Debug, Clone, Default)]
pub struct EndpointMap {
    entries: HashMap<String, Endpoint>,
    collisions: Vec<OperationIdCollision>,
}

impl EndpointMap {
    pub fn get(&self, operation_id: &str) -> Option<&Endpoint> {
        self.entries.get(operation_id)
    }

    pub fn path(&self, operation_id: &str) -> Option<&str> {
        self.get(operation_id).map(|endpoint| endpoint.path.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn collisions(&self) -> &[OperationIdCollision] {
        &self.collisions
    }

    /// Entries sorted by operation id.
    pub fn iter_sorted(&self) -> Vec<(&str, &Endpoint)> {
        let mut entries: Vec<_> = self
            .entries
            .iter()
            .map(|(id, endpoint)| (id.as_str(), endpoint))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }

    fn insert(&mut self, operation_id: &str, endpoint: Endpoint) {
        if let Some(previous) = self.entries.get(operation_id) {
            warn!(
                operation_id,
                replaced_path = %previous.path,
                path = %endpoint.path,
                "Duplicate operationId in plugin document; later declaration wins"
            );
            self.collisions.push(OperationIdCollision {
                operation_id: operation_id.to_string(),
                replaced_path: previous.path.clone(),
                path: endpoint.path.clone(),
            });
        }
        self.entries.insert(operation_id.to_string(), endpoint);
    }
}

/// Maps every declared `operationId` to the path it was declared under.
/// Operations without an id are skipped.
pub fn build_endpoint_map(document: &PluginDocument) -> EndpointMap {
    let mut map = EndpointMap::default();
    for (path, item) in &document.paths {
        let Some(operations) = item.as_object() else {
            continue;
        };
        for (method, operation) in operations {
            if !HTTP_METHODS.contains(&method.to_ascii_lowercase().as_str()) {
                continue;
            }
            let Some(operation_id) = operation.get("operationId").and_then(Value::as_str) else {
                continue;
            };
            map.insert(
                operation_id,
                Endpoint {
                    path: path.clone(),
                    method: method.to_ascii_uppercase(),
                },
            );
        }
    }
    debug!(
        operations = map.len(),
        collisions = map.collisions.len(),
        "Built plugin endpoint map"
    );
    map
}

/// URL of the first declared server. No default host is assumed.
pub fn server_base_url(document: &PluginDocument) -> Option<&str> {
    document.servers.first().map(|server| server.url.as_str())
}

/// Endpoint map plus server URL, built once at startup.
#[derive(Debug, Clone, Default)]
pub struct PluginRoutes {
    endpoints: EndpointMap,
    server_url: Option<String>,
}

impl PluginRoutes {
    pub fn new(endpoints: EndpointMap, server_url: Option<String>) -> Self {
        Self {
            endpoints,
            server_url,
        }
    }

    pub fn from_document(document: &PluginDocument) -> Self {
        Self::new(
            build_endpoint_map(document),
            server_base_url(document).map(str::to_owned),
        )
    }

    pub fn endpoints(&self) -> &EndpointMap {
        &self.endpoints
    }

    pub fn server_url(&self) -> Option<&str> {
        self.server_url.as_deref()
    }

    /// Full URL for a function call. The endpoint is checked first, so an
    /// unknown name is reported as such even when no server is declared.
    pub fn resolve(&self, function_name: &str) -> Result<String, TurnError> {
        let path = self
            .endpoints
            .path(function_name)
            .ok_or_else(|| TurnError::UnresolvedEndpoint {
                name: function_name.to_string(),
            })?;
        let base = self
            .server_url
            .as_deref()
            .ok_or_else(|| TurnError::MissingServerUrl {
                name: function_name.to_string(),
            })?;
        Ok(join_endpoint_url(base, path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CODESHERPA_DOC: &str = r#"{
        "openapi": "3.0.2",
        "servers": [
            {"url": "http://localhost:3333", "description": "local"},
            {"url": "http://backup:3333"}
        ],
        "paths": {
            "/repl": {
                "post": {"operationId": "execute_code", "summary": "Run code"}
            },
            "/command": {
                "parameters": [],
                "post": {"operationId": "execute_command"},
                "get": {"summary": "No id here"}
            },
            "/static/images/{filename}": {
                "get": {"operationId": "get_image"}
            }
        }
    }"#;

    #[test]
    fn maps_each_operation_id_to_its_path() {
        let document = PluginDocument::from_json_str(CODESHERPA_DOC).unwrap();
        let map = build_endpoint_map(&document);

        assert_eq!(map.len(), 3);
        assert_eq!(map.path("execute_code"), Some("/repl"));
        assert_eq!(map.path("execute_command"), Some("/command"));
        assert_eq!(map.path("get_image"), Some("/static/images/{filename}"));
        assert_eq!(map.get("get_image").unwrap().method, "GET");
        assert!(map.collisions().is_empty());
    }

    #[test]
    fn operations_without_ids_contribute_nothing() {
        let document = PluginDocument::from_json_str(
            r#"{"paths": {"/health": {"get": {"summary": "ok"}}, "/x": {"post": {}}}}"#,
        )
        .unwrap();
        let map = build_endpoint_map(&document);
        assert!(map.is_empty());
    }

    #[test]
    fn colliding_operation_ids_keep_the_last_declaration() {
        let document = PluginDocument::from_json_str(
            r#"{"paths": {
                "/first": {"post": {"operationId": "run"}},
                "/second": {"post": {"operationId": "run"}}
            }}"#,
        )
        .unwrap();
        let map = build_endpoint_map(&document);

        assert_eq!(map.len(), 1);
        assert_eq!(map.path("run"), Some("/second"));
        assert_eq!(
            map.collisions(),
            &[OperationIdCollision {
                operation_id: "run".to_string(),
                replaced_path: "/first".to_string(),
                path: "/second".to_string(),
            }]
        );
    }

    #[test]
    fn server_url_is_first_entry_or_absent() {
        let document = PluginDocument::from_json_str(CODESHERPA_DOC).unwrap();
        assert_eq!(server_base_url(&document), Some("http://localhost:3333"));

        let empty = PluginDocument::from_json_str(r#"{"servers": [], "paths": {}}"#).unwrap();
        assert_eq!(server_base_url(&empty), None);

        let missing = PluginDocument::from_json_str(r#"{"paths": {}}"#).unwrap();
        assert_eq!(server_base_url(&missing), None);
    }

    #[test]
    fn yaml_documents_are_supported() {
        let yaml = r#"
openapi: 3.0.2
servers:
  - url: http://localhost:3333
paths:
  /command:
    post:
      operationId: execute_command
"#;
        let document = PluginDocument::from_yaml_str(yaml).unwrap();
        let routes = PluginRoutes::from_document(&document);
        assert_eq!(
            routes.resolve("execute_command").unwrap(),
            "http://localhost:3333/command"
        );
    }

    #[test]
    fn resolve_reports_unknown_names_before_missing_servers() {
        let document = PluginDocument::from_json_str(
            r#"{"paths": {"/command": {"post": {"operationId": "execute_command"}}}}"#,
        )
        .unwrap();
        let routes = PluginRoutes::from_document(&document);

        assert!(matches!(
            routes.resolve("nope"),
            Err(TurnError::UnresolvedEndpoint { name }) if name == "nope"
        ));
        assert!(matches!(
            routes.resolve("execute_command"),
            Err(TurnError::MissingServerUrl { name }) if name == "execute_command"
        ));
    }

    #[tokio::test]
    async fn load_reads_json_and_yaml_files() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let json_path = dir.path().join("openapi.json");
        std::fs::write(&json_path, CODESHERPA_DOC).unwrap();
        let yaml_path = dir.path().join("openapi.yml");
        std::fs::write(
            &yaml_path,
            "paths:\n  /repl:\n    post:\n      operationId: execute_code\n",
        )
        .unwrap();

        let client = reqwest::Client::new();
        let json_doc = PluginDocument::load(json_path.to_str().unwrap(), &client)
            .await
            .unwrap();
        assert_eq!(json_doc.servers.len(), 2);

        let yaml_doc = PluginDocument::load(yaml_path.to_str().unwrap(), &client)
            .await
            .unwrap();
        assert_eq!(build_endpoint_map(&yaml_doc).path("execute_code"), Some("/repl"));

        let missing = PluginDocument::load(
            dir.path().join("absent.json").to_str().unwrap(),
            &client,
        )
        .await;
        assert!(matches!(missing, Err(DocumentError::Read { .. })));
    }
}
