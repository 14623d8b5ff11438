//! Blogger v3 client with a locally persisted, refreshable OAuth2 token.
//!
//! The token file is Google's "authorized user" JSON. When the access token
//! is expired and a refresh token is present, it is refreshed and the file
//! is rewritten in place.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{RedatorError, Result};

pub const API_URL: &str = "https://www.googleapis.com/blogger/v3";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
// Refresh slightly early so the token does not expire mid-request.
const EXPIRY_SKEW_SECS: i64 = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizedUserToken {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub expiry: Option<DateTime<Utc>>,
    /// Fields we do not use but must write back unchanged.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl AuthorizedUserToken {
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        match (&self.token, self.expiry) {
            (None, _) => true,
            (Some(_), Some(expiry)) => expiry <= now + Duration::seconds(EXPIRY_SKEW_SECS),
            (Some(_), None) => false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// The token file on disk plus its parsed contents.
pub struct BloggerCredentials {
    path: PathBuf,
    token: AuthorizedUserToken,
}

impl BloggerCredentials {
    /// A missing file is a configuration problem, not a transient one.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(RedatorError::Config(format!(
                "token file '{}' not found",
                path.display()
            )));
        }
        let contents = std::fs::read_to_string(path)?;
        let token: AuthorizedUserToken = serde_json::from_str(&contents)?;
        Ok(Self {
            path: path.to_path_buf(),
            token,
        })
    }

    /// Returns a valid access token, refreshing and persisting it if needed.
    pub async fn access_token(&mut self, http: &Client) -> Result<String> {
        if self.token.needs_refresh(Utc::now()) {
            self.refresh(http).await?;
        }
        self.token
            .token
            .clone()
            .ok_or_else(|| RedatorError::Config("Blogger token file has no access token".into()))
    }

    async fn refresh(&mut self, http: &Client) -> Result<()> {
        let refresh_token = self.token.refresh_token.clone().ok_or_else(|| {
            RedatorError::Config("Blogger token expired and has no refresh_token".into())
        })?;
        let client_id = self.token.client_id.clone().unwrap_or_default();
        let client_secret = self.token.client_secret.clone().unwrap_or_default();

        let response = http
            .post(&self.token.token_uri)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.as_str()),
                ("client_id", client_id.as_str()),
                ("client_secret", client_secret.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RedatorError::Http {
                service: "Google OAuth",
                status: status.as_u16(),
                body,
            });
        }

        let refreshed: RefreshResponse = response.json().await?;
        self.token.token = Some(refreshed.access_token);
        self.token.expiry = refreshed
            .expires_in
            .map(|secs| Utc::now() + Duration::seconds(secs));
        if let Some(rt) = refreshed.refresh_token {
            self.token.refresh_token = Some(rt);
        }

        std::fs::write(&self.path, serde_json::to_string(&self.token)?)?;
        info!("Blogger access token refreshed");
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlogPost {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PostList {
    #[serde(default)]
    items: Vec<BlogPost>,
}

pub struct BloggerClient {
    http: Client,
    base_url: String,
    blog_id: String,
    access_token: String,
}

impl BloggerClient {
    pub fn new(http: Client, base_url: &str, blog_id: &str, access_token: String) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            blog_id: blog_id.to_string(),
            access_token,
        }
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RedatorError::Http {
                service: "Blogger",
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Publishes a new post. Every call creates a new post.
    pub async fn insert_post(&self, title: &str, content: &str, is_draft: bool) -> Result<BlogPost> {
        let url = format!("{}/blogs/{}/posts", self.base_url, self.blog_id);
        let body = serde_json::json!({
            "kind": "blogger#post",
            "blog": {"id": self.blog_id},
            "title": title,
            "content": content,
        });
        debug!(%url, is_draft, "inserting post");
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.access_token)
            .query(&[("isDraft", if is_draft { "true" } else { "false" })])
            .json(&body)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    /// Most recently published post, if the blog has any.
    pub async fn latest_post(&self) -> Result<Option<BlogPost>> {
        let url = format!("{}/blogs/{}/posts", self.base_url, self.blog_id);
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.access_token)
            .query(&[("maxResults", "1"), ("orderBy", "PUBLISHED")])
            .send()
            .await?;
        let list: PostList = Self::check(response).await?.json().await?;
        Ok(list.items.into_iter().next())
    }
}
