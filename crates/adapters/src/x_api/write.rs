//! X API write adapter: issuing retweets

use async_trait::async_trait;
use reecho_domain::{Credentials, PostId, ReshareError, Resharer};
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use super::{build_client, lookup_user_id};

/// X API resharer posting retweets on behalf of the account
pub struct XResharer {
    client: Client,
    base_url: String,
}

impl XResharer {
    pub fn new() -> Self {
        Self::with_base_url("https://api.twitter.com".to_string())
    }

    pub fn with_base_url(base_url: String) -> Self {
        Self {
            client: build_client(),
            base_url,
        }
    }
}

impl Default for XResharer {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
struct RetweetRequest {
    tweet_id: String,
}

#[derive(Deserialize)]
struct RetweetResponse {
    data: RetweetData,
}

#[derive(Deserialize)]
struct RetweetData {
    retweeted: bool,
}

#[async_trait]
impl Resharer for XResharer {
    async fn reshare(
        &self,
        credentials: &Credentials,
        handle: &str,
        post_id: PostId,
    ) -> Result<(), ReshareError> {
        let bearer = &credentials.key;
        let user_id = lookup_user_id(&self.client, &self.base_url, bearer, handle).await?;

        let url = format!("{}/2/users/{}/retweets", self.base_url, user_id);

        let response = self
            .client
            .post(&url)
            .header(
                "Authorization",
                format!("Bearer {}", bearer.expose_secret()),
            )
            .header("Content-Type", "application/json")
            .json(&RetweetRequest {
                tweet_id: post_id.to_string(),
            })
            .send()
            .await
            .map_err(|e| ReshareError::Network(e.to_string()))?;

        if response.status() == 401 {
            return Err(ReshareError::Auth("invalid or revoked token".to_string()));
        }

        if response.status() == 429 {
            return Err(ReshareError::RateLimited);
        }

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            // The platform rejects duplicate retweets; the port contract
            // makes that a harmless no-op.
            if body.to_lowercase().contains("already retweeted") {
                tracing::debug!(handle = %handle, post_id, "Post already reshared, treating as no-op");
                return Ok(());
            }
            return Err(ReshareError::Api(format!("Failed to retweet: {}", body)));
        }

        let retweet_response: RetweetResponse = response
            .json()
            .await
            .map_err(|e| ReshareError::Api(e.to_string()))?;

        if !retweet_response.data.retweeted {
            return Err(ReshareError::Api(
                "retweet was not applied by the platform".to_string(),
            ));
        }

        Ok(())
    }
}
