//! Access token acquisition
//!
//! Two sources are supported: a token stored in a Kubernetes Secret (raw or
//! as an OAuth2 token response) and the GCE/GKE metadata server.

use crate::error::GcpError;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Extract an access token from secret data.
///
/// Accepts either the bare token or a JSON token response with an
/// `access_token` field. Service account key files are rejected since they
/// would need JWT signing.
pub fn parse_access_token(raw: &[u8]) -> Result<String, GcpError> {
    let text = std::str::from_utf8(raw)
        .map_err(|e| GcpError::Authentication(format!("credentials are not valid UTF-8: {}", e)))?
        .trim();

    if text.is_empty() {
        return Err(GcpError::Authentication("credentials are empty".to_string()));
    }

    if text.starts_with('{') {
        let value: serde_json::Value = serde_json::from_str(text)?;
        if value.get("type").and_then(|t| t.as_str()) == Some("service_account") {
            return Err(GcpError::Authentication(
                "service account key files are not supported, store an access token or use InjectedIdentity".to_string(),
            ));
        }
        let token: TokenResponse = serde_json::from_value(value).map_err(|e| {
            GcpError::Authentication(format!("credentials JSON has no access_token: {}", e))
        })?;
        return Ok(token.access_token);
    }

    Ok(text.to_string())
}

/// Fetch an access token for the pod's service account from the metadata server
pub async fn metadata_access_token(client: &Client, endpoint: &str) -> Result<String, GcpError> {
    debug!("Requesting access token from metadata server {}", endpoint);
    let response = client
        .get(endpoint)
        .header("Metadata-Flavor", "Google")
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(GcpError::Authentication(format!(
            "metadata server returned {}: {}",
            status, body
        )));
    }

    let token: TokenResponse = response.json().await?;
    Ok(token.access_token)
}
