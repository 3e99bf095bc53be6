use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use super::models::ApiError;
use crate::controller::{RpcCaller, TimeSource};
use crate::models::{GraphPayload, RpcRequest, TimeResponse};
use crate::utils::{extract_clean_error, PlotError};

/// HTTP client for the graph server's time endpoint and RPC dispatcher
#[derive(Debug, Clone)]
pub struct BackendClient {
    http_client: HttpClient,
    base_url: String,
}

impl BackendClient {
    /// Create a client for the API rooted at `base_url`, e.g. `http://host:5000/api`
    pub fn with_base_url(base_url: String, timeout: Duration) -> Result<Self, ApiError> {
        let http_client = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::RequestError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Pull the most useful message out of a JSON error body
    fn message_from_body(body_text: &str, field: &str) -> Option<String> {
        let json = serde_json::from_str::<Value>(body_text).ok()?;
        match json.get(field)? {
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Parse error response based on HTTP status code
    async fn handle_error_response(
        status: reqwest::StatusCode,
        response: reqwest::Response,
    ) -> ApiError {
        let status_code = status.as_u16();
        let body_text = response.text().await.unwrap_or_default();

        match status_code {
            400 => ApiError::BadRequest(
                Self::message_from_body(&body_text, "message")
                    .or_else(|| Self::message_from_body(&body_text, "error"))
                    .unwrap_or(body_text),
            ),
            401 => ApiError::Unauthorized(body_text),
            403 => ApiError::Forbidden(body_text),
            404 => ApiError::NotFound(body_text),
            500..=599 => match Self::message_from_body(&body_text, "exception") {
                Some(exception) => {
                    warn!("RPC raised on the server: {}", extract_clean_error(&exception));
                    ApiError::RpcException(exception)
                }
                None => {
                    warn!("Server error {}: {}", status_code, body_text);
                    ApiError::ServerError(status_code, body_text)
                }
            },
            _ => ApiError::HttpError(status_code, body_text),
        }
    }

    /// GET /get_time
    ///
    /// # Returns
    /// * `Ok(TimeResponse)` - The server's current time
    /// * `Err(ApiError)` - Transport, status or body error
    pub async fn get_time(&self) -> Result<TimeResponse, ApiError> {
        let url = format!("{}/get_time", self.base_url);

        let response = self.http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| ApiError::RequestError(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(Self::handle_error_response(status, response).await);
        }

        response
            .json::<TimeResponse>()
            .await
            .map_err(|e| ApiError::DeserializationError(format!("Failed to parse response: {}", e)))
    }

    /// POST /rpcs
    ///
    /// Dispatches a named remote procedure.
    ///
    /// # Returns
    /// * `Ok(Some(Value))` - The procedure's JSON result
    /// * `Ok(None)` - The procedure returned nothing
    /// * `Err(ApiError)` - Transport error, `{"error": ..}` reply or server exception
    pub async fn call_rpc(&self, request: &RpcRequest) -> Result<Option<Value>, ApiError> {
        let url = format!("{}/rpcs", self.base_url);
        debug!("Calling RPC '{}' at {}", request.funcname, url);

        let response = self.http_client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| ApiError::RequestError(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(Self::handle_error_response(status, response).await);
        }

        let body_text = response
            .text()
            .await
            .map_err(|e| ApiError::RequestError(format!("Failed to read response: {}", e)))?;

        if body_text.trim().is_empty() {
            return Ok(None);
        }

        let value: Value = serde_json::from_str(&body_text)
            .map_err(|e| ApiError::DeserializationError(format!("Failed to parse response: {}", e)))?;

        if let Some(message) = Self::message_from_body(&body_text, "error") {
            return Err(ApiError::RpcRejected(message));
        }

        Ok(Some(value))
    }
}

#[async_trait]
impl TimeSource for BackendClient {
    async fn fetch_time(&self) -> Result<f64, PlotError> {
        self.get_time()
            .await
            .map(|body| body.time)
            .map_err(|e| PlotError::NetworkFailure(e.to_string()))
    }
}

#[async_trait]
impl RpcCaller for BackendClient {
    async fn call(&self, name: &str) -> Result<GraphPayload, PlotError> {
        let request = RpcRequest::new(name);
        match self.call_rpc(&request).await {
            Ok(value) => Ok(GraphPayload::new(value.unwrap_or(Value::Null))),
            Err(ApiError::RpcException(msg)) => Err(PlotError::RpcFailure(extract_clean_error(&msg))),
            Err(e) => Err(PlotError::RpcFailure(e.to_string())),
        }
    }
}
