//! Turns configuration plus command-line overrides into a ready session.

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::core::chat_stream::HttpChatBackend;
use crate::core::config::Config;
use crate::core::dispatch::PluginClient;
use crate::core::endpoints::{PluginDocument, PluginRoutes};
use crate::core::models::Model;
use crate::core::session::ChatSession;

/// Values the command line may override.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub model: Option<String>,
    pub chat_url: Option<String>,
    pub plugin: Option<String>,
}

/// Effective settings for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub chat_url: String,
    pub model: Model,
    pub plugin_document: String,
    pub upload_url: String,
    pub max_function_calls: usize,
    pub request_timeout: Option<Duration>,
}

impl Settings {
    /// Flags win over the config file, which wins over built-in defaults.
    pub fn resolve(config: &Config, overrides: &Overrides) -> Result<Self, Box<dyn Error>> {
        let model = match overrides.model.as_deref() {
            Some(label) => label.parse::<Model>()?,
            None => config.default_model(),
        };
        Ok(Self {
            chat_url: overrides
                .chat_url
                .clone()
                .unwrap_or_else(|| config.chat_url().to_string()),
            model,
            plugin_document: overrides
                .plugin
                .clone()
                .unwrap_or_else(|| config.plugin_document().to_string()),
            upload_url: config.upload_url().to_string(),
            max_function_calls: config.max_function_calls(),
            request_timeout: config.request_timeout(),
        })
    }
}

pub fn http_client() -> Result<reqwest::Client, Box<dyn Error>> {
    Ok(reqwest::Client::builder()
        .user_agent(concat!("sherpa/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// Loads the plugin document and reports operationId collisions.
pub async fn load_routes(
    settings: &Settings,
    client: &reqwest::Client,
) -> Result<PluginRoutes, Box<dyn Error>> {
    let document = PluginDocument::load(&settings.plugin_document, client).await?;
    let routes = PluginRoutes::from_document(&document);
    for collision in routes.endpoints().collisions() {
        eprintln!(
            "⚠️  operationId '{}' is declared by both {} and {}; using {}",
            collision.operation_id, collision.replaced_path, collision.path, collision.path
        );
    }
    if routes.server_url().is_none() {
        warn!(document = %settings.plugin_document, "Plugin document declares no servers");
    }
    info!(
        document = %settings.plugin_document,
        endpoints = routes.endpoints().len(),
        server = routes.server_url().unwrap_or("<none>"),
        "Loaded plugin document"
    );
    Ok(routes)
}

pub async fn build_session(
    settings: &Settings,
    client: reqwest::Client,
) -> Result<ChatSession, Box<dyn Error>> {
    let routes = load_routes(settings, &client).await?;
    let plugin = PluginClient::new(client.clone(), routes).with_timeout(settings.request_timeout);
    let backend = Arc::new(HttpChatBackend::new(client, settings.chat_url.clone()));
    Ok(ChatSession::new(backend, plugin, settings.model)
        .with_max_function_calls(settings.max_function_calls))
}
