//! X API read adapter: list timelines and reshare history

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use reecho_domain::{Credentials, Post, PostId, PostStream, TimelineError, TimelineSource};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::{build_client, error_for_status, lookup_user_id, parse_post_id, ApiFailure};

/// Pages of the account's own timeline scanned by the backfill guard.
/// The guard only needs recent history, not the full archive.
const MAX_HISTORY_PAGES: usize = 5;

/// X API timeline source reading list timelines
pub struct XTimelineSource {
    client: Client,
    base_url: String,
}

impl XTimelineSource {
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

impl Default for XTimelineSource {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Deserialize)]
struct TweetsResponse {
    data: Option<Vec<Tweet>>,
    includes: Option<Includes>,
    meta: Option<Meta>,
}

#[derive(Deserialize)]
struct Tweet {
    id: String,
    text: String,
    author_id: Option<String>,
    referenced_tweets: Option<Vec<ReferencedTweet>>,
}

#[derive(Deserialize)]
struct ReferencedTweet {
    r#type: String,
    id: String,
}

#[derive(Deserialize)]
struct Includes {
    #[serde(default)]
    users: Vec<IncludedUser>,
}

#[derive(Deserialize)]
struct IncludedUser {
    id: String,
    username: String,
}

#[derive(Deserialize)]
struct Meta {
    next_token: Option<String>,
}

struct Page {
    posts: Vec<Post>,
    next_token: Option<String>,
}

enum Cursor {
    Start,
    Next(String),
    Done,
}

async fn fetch_list_page(
    client: &Client,
    base_url: &str,
    bearer: &SecretString,
    list_id: &str,
    since_id: Option<PostId>,
    page_token: Option<&str>,
) -> Result<Page, TimelineError> {
    let mut url = format!(
        "{}/2/lists/{}/tweets?max_results=100&expansions=author_id&user.fields=username",
        base_url, list_id
    );

    if let Some(since_id) = since_id {
        url.push_str(&format!("&since_id={}", since_id));
    }

    if let Some(page_token) = page_token {
        url.push_str(&format!("&pagination_token={}", page_token));
    }

    let response = client
        .get(&url)
        .header(
            "Authorization",
            format!("Bearer {}", bearer.expose_secret()),
        )
        .send()
        .await
        .map_err(|e| TimelineError::Network(e.to_string()))?;

    let response = error_for_status(response, "list timeline fetch").await?;

    let body: TweetsResponse = response
        .json()
        .await
        .map_err(|e| TimelineError::Api(e.to_string()))?;

    let usernames: HashMap<String, String> = body
        .includes
        .map(|i| i.users)
        .unwrap_or_default()
        .into_iter()
        .map(|u| (u.id, u.username))
        .collect();

    let posts = body
        .data
        .unwrap_or_default()
        .into_iter()
        .map(|tweet| {
            let id = parse_post_id(&tweet.id)?;
            let author = tweet
                .author_id
                .as_ref()
                .and_then(|author_id| usernames.get(author_id))
                .cloned()
                .unwrap_or_default();
            Ok(Post {
                id,
                author,
                text: tweet.text,
            })
        })
        .collect::<Result<Vec<_>, ApiFailure>>()?;

    Ok(Page {
        posts,
        next_token: body.meta.and_then(|m| m.next_token),
    })
}

#[async_trait]
impl TimelineSource for XTimelineSource {
    async fn fetch(
        &self,
        credentials: &Credentials,
        handle: &str,
        list_id: &str,
        since_id: Option<PostId>,
    ) -> Result<PostStream, TimelineError> {
        tracing::info!(
            handle = %handle,
            list_id = %list_id,
            since_id = ?since_id,
            "Fetching list timeline from X"
        );

        let client = self.client.clone();
        let base_url = self.base_url.clone();
        let bearer = credentials.key.clone();
        let list_id = list_id.to_string();

        // Pages are fetched lazily as the stream is polled.
        let stream = futures::stream::try_unfold(Cursor::Start, move |cursor| {
            let client = client.clone();
            let base_url = base_url.clone();
            let bearer = bearer.clone();
            let list_id = list_id.clone();

            async move {
                let page_token = match cursor {
                    Cursor::Start => None,
                    Cursor::Next(token) => Some(token),
                    Cursor::Done => return Ok(None),
                };

                let page = fetch_list_page(
                    &client,
                    &base_url,
                    &bearer,
                    &list_id,
                    since_id,
                    page_token.as_deref(),
                )
                .await?;

                let next = match page.next_token {
                    Some(token) => Cursor::Next(token),
                    None => Cursor::Done,
                };

                Ok(Some((
                    futures::stream::iter(page.posts.into_iter().map(Ok::<Post, TimelineError>)),
                    next,
                )))
            }
        })
        .try_flatten()
        .boxed();

        Ok(stream)
    }

    async fn reshare_history(
        &self,
        credentials: &Credentials,
        handle: &str,
    ) -> Result<HashSet<PostId>, TimelineError> {
        let bearer = &credentials.key;
        let user_id = lookup_user_id(&self.client, &self.base_url, bearer, handle).await?;

        let mut history = HashSet::new();
        let mut page_token: Option<String> = None;

        for _ in 0..MAX_HISTORY_PAGES {
            let mut url = format!(
                "{}/2/users/{}/tweets?max_results=100&tweet.fields=referenced_tweets",
                self.base_url, user_id
            );
            if let Some(token) = &page_token {
                url.push_str(&format!("&pagination_token={}", token));
            }

            let response = self
                .client
                .get(&url)
                .header(
                    "Authorization",
                    format!("Bearer {}", bearer.expose_secret()),
                )
                .send()
                .await
                .map_err(|e| TimelineError::Network(e.to_string()))?;

            let response = error_for_status(response, "reshare history fetch").await?;

            let body: TweetsResponse = response
                .json()
                .await
                .map_err(|e| TimelineError::Api(e.to_string()))?;

            for tweet in body.data.unwrap_or_default() {
                for referenced in tweet.referenced_tweets.unwrap_or_default() {
                    if referenced.r#type == "retweeted" {
                        history.insert(parse_post_id(&referenced.id)?);
                    }
                }
            }

            page_token = body.meta.and_then(|m| m.next_token);
            if page_token.is_none() {
                break;
            }
        }

        tracing::debug!(handle = %handle, count = history.len(), "Fetched reshare history");

        Ok(history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;
    use wiremock::matchers::{header, method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn creds(token: &str) -> Credentials {
        Credentials {
            key: SecretString::new(token.into()),
            secret: SecretString::new("unused".into()),
        }
    }

    async fn collect(stream: PostStream) -> Result<Vec<Post>, TimelineError> {
        stream.try_collect().await
    }

    #[tokio::test]
    async fn test_fetch_parses_posts_and_authors() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/2/lists/tech/tweets"))
            .and(header("Authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [
                    {"id": "101", "text": "we launch today", "author_id": "u1"},
                    {"id": "102", "text": "unrelated", "author_id": "u2"}
                ],
                "includes": {
                    "users": [
                        {"id": "u1", "username": "alice"},
                        {"id": "u2", "username": "bob"}
                    ]
                },
                "meta": {}
            })))
            .mount(&mock_server)
            .await;

        let source = XTimelineSource::with_base_url(mock_server.uri());
        let stream = source
            .fetch(&creds("test-token"), "alice", "tech", None)
            .await
            .unwrap();
        let posts = collect(stream).await.unwrap();

        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].id, 101);
        assert_eq!(posts[0].author, "alice");
        assert_eq!(posts[1].id, 102);
        assert_eq!(posts[1].author, "bob");
    }

    #[tokio::test]
    async fn test_fetch_forwards_since_id() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/2/lists/tech/tweets"))
            .and(query_param("since_id", "100"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"id": "101", "text": "new post", "author_id": "u1"}],
                "meta": {}
            })))
            .mount(&mock_server)
            .await;

        let source = XTimelineSource::with_base_url(mock_server.uri());
        let stream = source
            .fetch(&creds("test-token"), "alice", "tech", Some(100))
            .await
            .unwrap();
        let posts = collect(stream).await.unwrap();

        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].id, 101);
    }

    #[tokio::test]
    async fn test_fetch_follows_pagination() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/2/lists/tech/tweets"))
            .and(query_param_is_missing("pagination_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"id": "201", "text": "first page", "author_id": "u1"}],
                "meta": {"next_token": "page2"}
            })))
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/2/lists/tech/tweets"))
            .and(query_param("pagination_token", "page2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"id": "199", "text": "second page", "author_id": "u1"}],
                "meta": {}
            })))
            .mount(&mock_server)
            .await;

        let source = XTimelineSource::with_base_url(mock_server.uri());
        let stream = source
            .fetch(&creds("test-token"), "alice", "tech", None)
            .await
            .unwrap();
        let posts = collect(stream).await.unwrap();

        let ids: Vec<PostId> = posts.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![201, 199]);
    }

    #[tokio::test]
    async fn test_fetch_auth_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/2/lists/tech/tweets"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&mock_server)
            .await;

        let source = XTimelineSource::with_base_url(mock_server.uri());
        let stream = source
            .fetch(&creds("bad-token"), "alice", "tech", None)
            .await
            .unwrap();
        let result = collect(stream).await;

        assert!(matches!(result, Err(TimelineError::Auth(_))));
    }

    #[tokio::test]
    async fn test_fetch_rate_limited() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/2/lists/tech/tweets"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&mock_server)
            .await;

        let source = XTimelineSource::with_base_url(mock_server.uri());
        let stream = source
            .fetch(&creds("test-token"), "alice", "tech", None)
            .await
            .unwrap();
        let result = collect(stream).await;

        assert!(matches!(result, Err(TimelineError::RateLimited(_))));
    }

    #[tokio::test]
    async fn test_reshare_history_collects_retweeted_ids() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/2/users/by/username/alice"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {"id": "u1"}
            })))
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/2/users/u1/tweets"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [
                    {
                        "id": "900",
                        "text": "RT: something",
                        "referenced_tweets": [{"type": "retweeted", "id": "5"}]
                    },
                    {
                        "id": "901",
                        "text": "a reply",
                        "referenced_tweets": [{"type": "replied_to", "id": "6"}]
                    },
                    {
                        "id": "902",
                        "text": "RT: other",
                        "referenced_tweets": [{"type": "retweeted", "id": "7"}]
                    },
                    {"id": "903", "text": "original post"}
                ],
                "meta": {}
            })))
            .mount(&mock_server)
            .await;

        let source = XTimelineSource::with_base_url(mock_server.uri());
        let history = source
            .reshare_history(&creds("test-token"), "alice")
            .await
            .unwrap();

        assert_eq!(history, HashSet::from([5, 7]));
    }
}
