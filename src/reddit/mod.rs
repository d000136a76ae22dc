pub mod listing;

use std::collections::{HashSet, VecDeque};

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::Credentials;
use crate::model::{CommentTree, MoreComments, Post, Thing};
use crate::platform::{Platform, PlatformError, PostFeed};

const AUTH_URL: &str = "https://www.reddit.com/api/v1/access_token";
const API_BASE: &str = "https://oauth.reddit.com";
const PAGE_SIZE: usize = 100;
const MORE_CHILDREN_BATCH: usize = 100;

#[derive(Debug, Clone)]
pub struct Endpoints {
    pub auth_url: String,
    pub api_base: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            auth_url: AUTH_URL.into(),
            api_base: API_BASE.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
}

/// Application-only OAuth client for the Reddit JSON API.
#[derive(Clone)]
pub struct RedditClient {
    http: reqwest::Client,
    api_base: String,
    token: String,
}

impl RedditClient {
    pub async fn connect(creds: &Credentials) -> Result<Self, PlatformError> {
        Self::connect_to(creds, Endpoints::default()).await
    }

    pub async fn connect_to(creds: &Credentials, endpoints: Endpoints) -> Result<Self, PlatformError> {
        let http = reqwest::Client::builder()
            .user_agent(creds.user_agent.clone())
            .build()
            .map_err(|source| PlatformError::Http {
                url: endpoints.auth_url.clone(),
                source,
            })?;

        let url = endpoints.auth_url;
        let response = http
            .post(&url)
            .basic_auth(&creds.client_id, Some(&creds.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|source| PlatformError::Http {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(PlatformError::Auth(format!("token endpoint returned HTTP {}", status)));
        }
        if !status.is_success() {
            return Err(PlatformError::Status { url, status });
        }

        let body: TokenResponse = response.json().await.map_err(|e| PlatformError::Decode {
            url: url.clone(),
            message: e.to_string(),
        })?;
        let token = match (body.access_token, body.error) {
            (Some(token), _) => token,
            (None, Some(error)) => return Err(PlatformError::Auth(error)),
            (None, None) => return Err(PlatformError::Auth("no access token in response".into())),
        };

        info!("Authenticated with Reddit as application client");
        Ok(Self {
            http,
            api_base: endpoints.api_base.trim_end_matches('/').to_string(),
            token,
        })
    }

    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value, PlatformError> {
        let url = format!("{}{}", self.api_base, path);
        debug!("GET {} {:?}", url, query);

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .query(query)
            .query(&[("raw_json", "1")])
            .send()
            .await
            .map_err(|source| PlatformError::Http {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(PlatformError::Status { url, status });
        }
        response.json().await.map_err(|e| PlatformError::Decode {
            url,
            message: e.to_string(),
        })
    }

    /// Comment listing of a post, optionally rooted at one of its comments.
    async fn thread(&self, post_id: &str, focus: Option<&str>) -> Result<Vec<Thing>, PlatformError> {
        let path = format!("/comments/{}", post_id);
        let mut query = vec![("limit", "500".to_string())];
        if let Some(comment) = focus {
            query.push(("comment", comment.to_string()));
        }
        let value = self.get_json(&path, &query).await?;

        let decode = |message: String| PlatformError::Decode {
            url: path.clone(),
            message,
        };
        let second = match value {
            Value::Array(mut parts) if parts.len() >= 2 => parts.swap_remove(1),
            _ => return Err(decode("expected [post, comments] pair".into())),
        };
        let listing = listing::parse_listing(second).map_err(decode)?;
        listing::things_from_listing(listing).map_err(decode)
    }

    async fn more_children(&self, post: &Post, more: &MoreComments) -> Result<Vec<Thing>, PlatformError> {
        let mut things = Vec::new();
        for batch in more.children.chunks(MORE_CHILDREN_BATCH) {
            let query = [
                ("api_type", "json".to_string()),
                ("link_id", format!("t3_{}", post.id)),
                ("children", batch.join(",")),
                ("limit_children", "false".to_string()),
            ];
            let value = self.get_json("/api/morechildren", &query).await?;
            let fetched = listing::things_from_more_children(value).map_err(|message| {
                PlatformError::Decode {
                    url: "/api/morechildren".into(),
                    message,
                }
            })?;
            things.extend(fetched);
        }
        Ok(things)
    }
}

impl Platform for RedditClient {
    type Feed = HotFeed;

    fn hot(&self, community: &str) -> HotFeed {
        HotFeed {
            client: self.clone(),
            path: format!("/r/{}/hot", community),
            after: None,
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }

    async fn comments(&self, post: &Post) -> Result<CommentTree, PlatformError> {
        let things = self.thread(&post.id, None).await?;
        Ok(CommentTree::from_things(things))
    }

    async fn expand_all(&self, post: &Post, tree: &mut CommentTree) -> Result<(), PlatformError> {
        let mut seen = HashSet::new();
        let mut requests = 0usize;

        while let Some(&placeholder) = tree.placeholders().first() {
            let Some(more) = tree.more(placeholder).cloned() else {
                break;
            };
            // the API can hand back a placeholder it already resolved
            let key = (more.parent_id.clone(), more.children.clone());
            if !seen.insert(key) {
                tree.splice(placeholder, Vec::new());
                continue;
            }

            let things = if more.children.is_empty() {
                match more.parent_id.strip_prefix("t1_") {
                    Some(parent) => self.thread(&post.id, Some(parent)).await?,
                    None => Vec::new(),
                }
            } else {
                self.more_children(post, &more).await?
            };
            requests += 1;
            tree.splice(placeholder, things);
        }

        if requests > 0 {
            debug!("Expanded {} collapsed branches on {}", requests, post.id);
        }
        Ok(())
    }
}

/// Pages through `/r/<name>/hot` on demand.
pub struct HotFeed {
    client: RedditClient,
    path: String,
    after: Option<String>,
    buffer: VecDeque<Post>,
    exhausted: bool,
}

impl PostFeed for HotFeed {
    async fn next_post(&mut self) -> Result<Option<Post>, PlatformError> {
        loop {
            if let Some(post) = self.buffer.pop_front() {
                return Ok(Some(post));
            }
            if self.exhausted {
                return Ok(None);
            }

            let mut query = vec![("limit", PAGE_SIZE.to_string())];
            if let Some(after) = &self.after {
                query.push(("after", after.clone()));
            }
            let value = self.client.get_json(&self.path, &query).await?;

            let decode = |message: String| PlatformError::Decode {
                url: self.path.clone(),
                message,
            };
            let page = listing::parse_listing(value).map_err(decode)?;
            let posts = listing::posts_from_listing(&page).map_err(decode)?;
            debug!("Fetched {} posts from {}", posts.len(), self.path);

            self.after = page.after;
            if self.after.is_none() || posts.is_empty() {
                self.exhausted = true;
            }
            self.buffer.extend(posts);
        }
    }
}
