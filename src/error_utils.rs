use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Parse an HTTP response body as JSON with contextual error handling.
///
/// A body that does not match `T` indicates the remote API contract changed,
/// so the error carries which API produced it.
pub async fn parse_http_response_json<T: DeserializeOwned>(
    response: reqwest::Response,
    api_desc: &str,
) -> Result<T> {
    response
        .json::<T>()
        .await
        .with_context(|| format!("Failed to parse {api_desc} response"))
}

/// Get a required environment variable with contextual error handling.
pub fn get_required_env_var(var_name: &str) -> Result<String> {
    std::env::var(var_name).with_context(|| format!("{var_name} environment variable not set"))
}

/// Get an optional environment variable, returning None if not set or empty.
pub fn get_optional_env_var(var_name: &str) -> Option<String> {
    std::env::var(var_name).ok().filter(|v| !v.is_empty())
}

/// Create an HTTP client with a request timeout and contextual error handling.
pub fn create_http_client_with_context() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .context("Failed to create HTTP client")
}
