use std::time::Duration;

use tracing::{debug, info};

use crate::api::{FunctionCall, FunctionCallEnvelope, PluginResponse};
use crate::core::conversation::Conversation;
use crate::core::endpoints::PluginRoutes;
use crate::core::error::TurnError;
use crate::core::message::Message;

/// Reads completed stream text as a function call. `None` is the ordinary
/// plain-answer case.
pub fn parse_function_call(text: &str) -> Option<FunctionCall> {
    FunctionCallEnvelope::parse(text).map(|envelope| envelope.function_call)
}

/// HTTP client for the plugin server described by [`PluginRoutes`].
#[derive(Clone, Debug)]
pub struct PluginClient {
    client: reqwest::Client,
    routes: PluginRoutes,
    timeout: Option<Duration>,
}

impl PluginClient {
    pub fn new(client: reqwest::Client, routes: PluginRoutes) -> Self {
        Self {
            client,
            routes,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn routes(&self) -> &PluginRoutes {
        &self.routes
    }

    /// POSTs the call's raw argument text to the endpoint registered for its
    /// name. Nothing is sent when the name or the server URL cannot be
    /// resolved.
    pub async fn call(&self, call: &FunctionCall) -> Result<PluginResponse, TurnError> {
        let url = self.routes.resolve(&call.name)?;
        info!(function = %call.name, %url, "Calling plugin endpoint");

        let mut request = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .body(call.arguments.clone());
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        let response = request
            .send()
            .await
            .map_err(|err| TurnError::transport("plugin", err))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| TurnError::transport("plugin", err))?;
        if !status.is_success() {
            return Err(TurnError::status("plugin", status, &body));
        }

        let raw = serde_json::from_str(&body).map_err(|source| TurnError::PluginResponse {
            name: call.name.clone(),
            source,
        })?;
        debug!(function = %call.name, bytes = body.len(), "Plugin responded");
        Ok(PluginResponse::new(raw))
    }
}

/// Runs `call` against the plugin and appends the two result messages: the
/// stringified response for the record, then the `function` message the
/// model reads next.
pub async fn dispatch_function_call(
    plugin: &PluginClient,
    conversation: &mut Conversation,
    call: &FunctionCall,
) -> Result<(), TurnError> {
    let response = plugin.call(call).await?;
    conversation.push_record(Message::function_call(response.to_json_string()));
    conversation.push(Message::function_result(
        call.name.clone(),
        response.result_text(),
    ));
    Ok(())
}
