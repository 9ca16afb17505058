//! Common utilities for the GCP API client
//!
//! Provides the authenticated HTTP wrapper shared by the DNS and SQL APIs,
//! plus parsing of the standard GCP error envelope.

use crate::error::GcpError;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Standard GCP error envelope: `{"error": {"code", "message", "status"}}`
#[derive(Debug, Deserialize)]
struct GcpErrorResponse {
    error: GcpErrorBody,
}

#[derive(Debug, Deserialize)]
struct GcpErrorBody {
    code: u16,
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

/// HTTP client wrapper with bearer-token authentication
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
    token: String,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl HttpClient {
    /// Create a new HTTP client wrapper
    pub fn new(client: Client, base_url: String, token: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build a full URL from a path
    pub fn build_url(&self, path: &str) -> String {
        if path.starts_with("http") {
            path.to_string()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        }
    }

    /// Get authorization header value
    pub fn auth_header(&self) -> String {
        if self.token.starts_with("Bearer ") {
            self.token.clone()
        } else {
            format!("Bearer {}", self.token)
        }
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("Authorization", self.auth_header())
            .header("Accept", "application/json")
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, GcpError> {
        let url = self.build_url(path);
        debug!("GET {}", url);

        let response = self.authorized(self.client.get(&url)).send().await?;
        let response = check_status("GET", path, response).await?;
        response.json().await.map_err(GcpError::Http)
    }

    /// Make a POST request
    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, GcpError> {
        let url = self.build_url(path);
        debug!("POST {}", url);

        let response = self
            .authorized(self.client.post(&url))
            .json(body)
            .send()
            .await?;
        let response = check_status("POST", path, response).await?;
        response.json().await.map_err(GcpError::Http)
    }

    /// Make a PATCH request
    pub async fn patch<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, GcpError> {
        let url = self.build_url(path);
        debug!("PATCH {}", url);

        let response = self
            .authorized(self.client.patch(&url))
            .json(body)
            .send()
            .await?;
        let response = check_status("PATCH", path, response).await?;
        response.json().await.map_err(GcpError::Http)
    }

    /// Make a DELETE request, returning the response body
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, GcpError> {
        let url = self.build_url(path);
        debug!("DELETE {}", url);

        let response = self.authorized(self.client.delete(&url)).send().await?;
        let response = check_status("DELETE", path, response).await?;

        // Some DELETEs answer 204 with no body
        let text = response.text().await?;
        let text = if text.trim().is_empty() { "{}" } else { text.as_str() };
        serde_json::from_str(text).map_err(GcpError::Serialization)
    }
}

/// Turn a non-success response into a [`GcpError`]
async fn check_status(method: &str, path: &str, response: Response) -> Result<Response, GcpError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    if status == 404 {
        return Err(GcpError::NotFound(format!("{} {}: {}", method, path, error_message(&body))));
    }
    Err(parse_error(status.as_u16(), &body))
}

/// Parse a GCP error body, falling back to the raw text
pub(crate) fn parse_error(code: u16, body: &str) -> GcpError {
    match serde_json::from_str::<GcpErrorResponse>(body) {
        Ok(envelope) => GcpError::Api {
            code: envelope.error.code,
            status: envelope.error.status,
            message: envelope.error.message,
        },
        Err(_) => GcpError::Api {
            code,
            status: String::new(),
            message: body.chars().take(500).collect(),
        },
    }
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<GcpErrorResponse>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.chars().take(500).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_envelope() {
        let body = r#"{"error":{"code":409,"message":"The resource 'x' already exists","status":"ALREADY_EXISTS"}}"#;
        match parse_error(409, body) {
            GcpError::Api { code, status, message } => {
                assert_eq!(code, 409);
                assert_eq!(status, "ALREADY_EXISTS");
                assert!(message.contains("already exists"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_error_plain_text() {
        let err = parse_error(502, "Bad Gateway");
        assert_eq!(err.status_code(), Some(502));
        assert!(err.is_transient());
    }

    #[test]
    fn test_build_url_and_auth_header() {
        let http = HttpClient::new(
            Client::new(),
            "https://dns.googleapis.com/dns/v1/".to_string(),
            "abc".to_string(),
        );
        assert_eq!(
            http.build_url("/projects/p/managedZones/z"),
            "https://dns.googleapis.com/dns/v1/projects/p/managedZones/z"
        );
        assert_eq!(http.auth_header(), "Bearer abc");
    }
}
