//! Raw protected-endpoint probe for the minimal PKCE demo
//!
//! Unlike [`super::ApiClient`] this performs no classification: whatever the
//! server answers is shown verbatim with its status code.

use std::time::Duration;

pub const PROTECTED_PATH: &str = "/protected";
pub const NO_TOKEN_MESSAGE: &str = "No access token. Please sign in first.";

/// Call `<base_url>/protected` with the bearer token and describe the outcome
pub async fn call_protected(
    http: &reqwest::Client,
    base_url: &str,
    access_token: Option<&str>,
    timeout: Duration,
) -> String {
    let Some(token) = access_token.filter(|t| !t.is_empty()) else {
        return NO_TOKEN_MESSAGE.to_string();
    };

    let url = format!("{}{}", base_url.trim_end_matches('/'), PROTECTED_PATH);
    tracing::debug!("Calling {}", url);

    let result = http
        .get(&url)
        .bearer_auth(token)
        .timeout(timeout)
        .send()
        .await;

    match result {
        Ok(response) => {
            let status = response.status().as_u16();
            match response.text().await {
                Ok(text) => format!("Status {}\n\n{}", status, text),
                Err(e) => format!("Error calling API: {}", e),
            }
        }
        Err(e) => format!("Error calling API: {}", e),
    }
}
