//! X (Twitter) API adapters

mod read;
mod write;

pub use read::XTimelineSource;
pub use write::XResharer;

use reecho_domain::{PostId, ReshareError, TimelineError};
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use time::OffsetDateTime;

/// Common failure shape for X API calls, converted into the per-port
/// error type at the boundary.
#[derive(Debug)]
pub(crate) enum ApiFailure {
    Auth(String),
    RateLimited(Option<Duration>),
    Api(String),
    Network(String),
}

impl From<ApiFailure> for TimelineError {
    fn from(failure: ApiFailure) -> Self {
        match failure {
            ApiFailure::Auth(msg) => TimelineError::Auth(msg),
            ApiFailure::RateLimited(retry_after) => TimelineError::RateLimited(retry_after),
            ApiFailure::Api(msg) => TimelineError::Api(msg),
            ApiFailure::Network(msg) => TimelineError::Network(msg),
        }
    }
}

impl From<ApiFailure> for ReshareError {
    fn from(failure: ApiFailure) -> Self {
        match failure {
            ApiFailure::Auth(msg) => ReshareError::Auth(msg),
            ApiFailure::RateLimited(_) => ReshareError::RateLimited,
            ApiFailure::Api(msg) => ReshareError::Api(msg),
            ApiFailure::Network(msg) => ReshareError::Network(msg),
        }
    }
}

pub(crate) fn build_client() -> Client {
    Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .expect("Failed to build HTTP client")
}

/// Map 401/429/non-success responses to an `ApiFailure`
pub(crate) async fn error_for_status(
    response: Response,
    what: &str,
) -> Result<Response, ApiFailure> {
    if response.status() == 401 {
        return Err(ApiFailure::Auth("invalid or revoked token".to_string()));
    }

    if response.status() == 429 {
        let retry_after = response
            .headers()
            .get("x-rate-limit-reset")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .map(|ts| {
                let now = OffsetDateTime::now_utc().unix_timestamp() as u64;
                Duration::from_secs(ts.saturating_sub(now))
            });
        return Err(ApiFailure::RateLimited(retry_after));
    }

    if !response.status().is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ApiFailure::Api(format!("{} failed: {}", what, body)));
    }

    Ok(response)
}

pub(crate) fn parse_post_id(raw: &str) -> Result<PostId, ApiFailure> {
    raw.parse::<PostId>()
        .map_err(|_| ApiFailure::Api(format!("non-numeric post id: {}", raw)))
}

#[derive(Deserialize)]
struct UserResponse {
    data: UserData,
}

#[derive(Deserialize)]
struct UserData {
    id: String,
}

/// Look up the platform user id for a handle
pub(crate) async fn lookup_user_id(
    client: &Client,
    base_url: &str,
    bearer: &SecretString,
    username: &str,
) -> Result<String, ApiFailure> {
    let url = format!("{}/2/users/by/username/{}", base_url, username);

    let response = client
        .get(&url)
        .header(
            "Authorization",
            format!("Bearer {}", bearer.expose_secret()),
        )
        .send()
        .await
        .map_err(|e| ApiFailure::Network(e.to_string()))?;

    let response = error_for_status(response, "user lookup").await?;

    let user_response: UserResponse = response
        .json()
        .await
        .map_err(|e| ApiFailure::Api(e.to_string()))?;

    Ok(user_response.data.id)
}
