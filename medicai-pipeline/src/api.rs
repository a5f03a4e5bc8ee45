use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use tracing::{debug, error, info};

use crate::config::PipelineConfig;
use crate::error::ApiError;
use crate::models::{ResourceKind, SessionId};

/// Per-call options. Headers supplied here replace the default JSON content type.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            headers: Vec::new(),
            body: None,
        }
    }
}

impl RequestOptions {
    pub fn post(body: Value) -> Self {
        Self {
            method: Method::POST,
            body: Some(body),
            ..Self::default()
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// JSON client for the MedicAI backend.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self, ApiError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| ApiError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.api_base_url.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn http(&self) -> &Client {
        &self.http
    }

    pub fn url_for(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Issue a request and decode the JSON response body.
    pub async fn call(&self, path: &str, options: RequestOptions) -> Result<Value, ApiError> {
        let url = self.url_for(path);
        let headers = merge_headers(&options.headers)?;
        debug!("{} {}", options.method, url);

        let mut request = self.http.request(options.method, &url).headers(headers);
        if let Some(body) = &options.body {
            request = request.body(body.to_string());
        }

        let response = request.send().await.map_err(|e| {
            error!("API call to {} failed: {}", url, e);
            ApiError::Network(e.to_string())
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            error!("Failed to read response body from {}: {}", url, e);
            ApiError::Network(e.to_string())
        })?;

        if !status.is_success() {
            let message = error_message(status, &text);
            error!("API error from {}: {}", url, message);
            return Err(ApiError::Api {
                status: Some(status.as_u16()),
                message,
            });
        }

        serde_json::from_str(&text).map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }

    /// Fetch the raw payload for `kind` and unwrap the `{status, <field>}` envelope.
    pub async fn fetch_resource(
        &self,
        kind: ResourceKind,
        session_id: &SessionId,
    ) -> Result<Value, ApiError> {
        info!("Fetching {} for session {}", kind, session_id);

        let path = format!(
            "{}?session_id={}",
            kind.endpoint(),
            urlencoding::encode(session_id.as_str())
        );
        let envelope = self.call(&path, RequestOptions::default()).await?;
        unwrap_envelope(kind, envelope)
    }

    pub async fn fetch_diagnosis(&self, session_id: &SessionId) -> Result<Value, ApiError> {
        self.fetch_resource(ResourceKind::Diagnosis, session_id).await
    }

    pub async fn fetch_summary(&self, session_id: &SessionId) -> Result<Value, ApiError> {
        self.fetch_resource(ResourceKind::Summary, session_id).await
    }
}

fn merge_headers(overrides: &[(String, String)]) -> Result<HeaderMap, ApiError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    for (name, value) in overrides {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ApiError::application(format!("Invalid header name {}: {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| ApiError::application(format!("Invalid header value: {}", e)))?;
        headers.insert(name, value);
    }
    Ok(headers)
}

/// `error` field of a JSON error body, else a templated message.
pub(crate) fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|data| data.get("error").and_then(Value::as_str).map(str::to_string))
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| format!("API error: {}", status.as_u16()))
}

fn unwrap_envelope(kind: ResourceKind, mut envelope: Value) -> Result<Value, ApiError> {
    let succeeded = envelope.get("status").and_then(Value::as_str) == Some("success");
    let payload = envelope
        .get_mut(kind.payload_field())
        .map(Value::take)
        .filter(|payload| !payload.is_null());

    match payload {
        Some(payload) if succeeded => Ok(payload),
        _ => {
            let message = envelope
                .get("error")
                .and_then(Value::as_str)
                .filter(|message| !message.is_empty())
                .unwrap_or(kind.failure_message());
            Err(ApiError::application(message))
        }
    }
}
