//! Shared HTTP client with retry/backoff for capability calls.
//!
//! Retry strategy (applies to every capability endpoint):
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors and timeouts → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (exponent capped at 5)

use std::time::Duration;

use super::CapabilityError;

/// Build a client with a per-request timeout.
pub fn client(timeout_secs: u64) -> Result<reqwest::Client, CapabilityError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| CapabilityError(format!("failed to build HTTP client: {e}")))
}

/// POST a JSON body, retrying transient failures, and parse the response
/// body as JSON.
pub async fn post_json(
    client: &reqwest::Client,
    url: &str,
    bearer: Option<&str>,
    body: &serde_json::Value,
    max_retries: u32,
) -> Result<serde_json::Value, CapabilityError> {
    let mut last_err: Option<CapabilityError> = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tokio::time::sleep(delay).await;
        }

        let mut req = client.post(url).header("Content-Type", "application/json");
        if let Some(token) = bearer {
            req = req.header("Authorization", format!("Bearer {token}"));
        }

        match req.json(body).send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return response
                        .json()
                        .await
                        .map_err(|e| CapabilityError(format!("invalid JSON response: {e}")));
                }

                let body_text = response.text().await.unwrap_or_default();
                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = Some(CapabilityError(format!("{url}: HTTP {status}: {body_text}")));
                    continue;
                }

                // Client error (not 429): retrying will not help.
                return Err(CapabilityError(format!("{url}: HTTP {status}: {body_text}")));
            }
            Err(e) => {
                last_err = Some(CapabilityError(format!("{url}: {e}")));
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| CapabilityError(format!("{url}: failed after retries"))))
}

/// Pull `choices[0].message.content` out of a chat-completions response.
pub fn chat_content(json: &serde_json::Value) -> Result<String, CapabilityError> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| CapabilityError("chat response missing choices[0].message.content".into()))
}
