//! NLU collaborator: request/response shapes and the API.AI client
//!
//! Responses are kept as loose JSON wherever the service may omit a field,
//! send `null`, or send an empty string. Every accessor goes through
//! [`defined`] so all of those read as "not there".

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

use crate::error::NluError;

/// API.AI protocol version pinned by the `v` query parameter
pub const API_VERSION: &str = "20150910";

pub const DEFAULT_BASE_URL: &str = "https://api.api.ai/v1";

/// Named context carried with a query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NluContext {
    pub name: String,
    pub parameters: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NluRequest {
    pub query: String,
    pub session_id: String,
    pub lang: String,
    pub contexts: Vec<NluContext>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NluResponse {
    #[serde(default)]
    pub result: Option<NluResult>,
    #[serde(default)]
    pub status: Option<NluStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NluResult {
    #[serde(default)]
    pub resolved_query: Value,
    #[serde(default)]
    pub action: Value,
    #[serde(default)]
    pub parameters: Value,
    #[serde(default)]
    pub fulfillment: Value,
    #[serde(default)]
    pub metadata: Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NluStatus {
    #[serde(default)]
    pub code: u16,
    #[serde(default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub error_details: Option<String>,
}

/// `Some` only for values that are present and truthy.
///
/// Missing, `null`, `false`, `0`, and `""` all count as not defined.
pub fn defined(value: &Value) -> Option<&Value> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        other => Some(other),
    }
}

fn defined_str(value: &Value) -> Option<&str> {
    defined(value).and_then(Value::as_str)
}

impl NluResult {
    /// Slack-specific rich reply (`fulfillment.data.slack`)
    pub fn slack_payload(&self) -> Option<&Value> {
        defined(&self.fulfillment)
            .and_then(|f| f.get("data"))
            .and_then(defined)
            .and_then(|d| d.get("slack"))
            .and_then(defined)
    }

    /// Plain reply text (`fulfillment.speech`)
    pub fn speech(&self) -> Option<&str> {
        defined(&self.fulfillment)
            .and_then(|f| f.get("speech"))
            .and_then(defined_str)
    }

    pub fn action(&self) -> Option<&str> {
        defined_str(&self.action)
    }

    pub fn parameter(&self, name: &str) -> Option<&Value> {
        defined(&self.parameters)
            .and_then(|p| p.get(name))
            .and_then(defined)
    }

    /// Name of the intent that matched (`metadata.intentName`)
    pub fn intent_name(&self) -> Option<&str> {
        defined(&self.metadata)
            .and_then(|m| m.get("intentName"))
            .and_then(defined_str)
    }

    pub fn resolved_query(&self) -> Option<&str> {
        defined_str(&self.resolved_query)
    }
}

#[async_trait]
pub trait NluClient: Send + Sync {
    async fn query(&self, request: &NluRequest) -> Result<NluResponse, NluError>;
}

/// API.AI (Dialogflow v1) `/query` client
pub struct ApiAiClient {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl ApiAiClient {
    pub fn new(
        base_url: impl Into<String>,
        access_token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, NluError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
        })
    }
}

#[async_trait]
impl NluClient for ApiAiClient {
    async fn query(&self, request: &NluRequest) -> Result<NluResponse, NluError> {
        let url = format!("{}/query", self.base_url);
        debug!("NLU query (session {}): {}", request.session_id, request.query);

        let response = self
            .http
            .post(&url)
            .query(&[("v", API_VERSION)])
            .bearer_auth(&self.access_token)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NluError::Service {
                code: status.as_u16(),
                message: body,
            });
        }

        let parsed: NluResponse = response.json().await?;
        if let Some(status) = &parsed.status {
            if status.code >= 400 {
                return Err(NluError::Service {
                    code: status.code,
                    message: status
                        .error_details
                        .clone()
                        .or_else(|| status.error_type.clone())
                        .unwrap_or_default(),
                });
            }
        }
        Ok(parsed)
    }
}
