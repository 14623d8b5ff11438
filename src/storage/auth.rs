//! Access tokens for the Cloud Storage JSON API.
//!
//! A static bearer token is used as-is. A service-account key is exchanged
//! once per process for an access token through the JWT bearer grant.

use std::path::Path;

use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::debug;

use super::StorageError;

const STORAGE_SCOPE: &str = "https://www.googleapis.com/auth/devstorage.full_control";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Fields of a Google service-account key file that the grant needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

enum Credential {
    Static(String),
    ServiceAccount(ServiceAccountKey),
}

pub struct TokenSource {
    credential: Credential,
    http: Client,
    cached: OnceCell<String>,
}

impl TokenSource {
    pub fn from_token(token: String) -> Self {
        Self {
            credential: Credential::Static(token),
            http: Client::new(),
            cached: OnceCell::new(),
        }
    }

    pub fn from_key(key: ServiceAccountKey) -> Self {
        Self {
            credential: Credential::ServiceAccount(key),
            http: Client::new(),
            cached: OnceCell::new(),
        }
    }

    pub fn from_key_file(path: &Path) -> Result<Self, StorageError> {
        let contents = std::fs::read_to_string(path)?;
        let key: ServiceAccountKey = serde_json::from_str(&contents)?;
        Ok(Self::from_key(key))
    }

    /// Bearer token for the next request.
    pub async fn token(&self) -> Result<String, StorageError> {
        match &self.credential {
            Credential::Static(token) => Ok(token.clone()),
            Credential::ServiceAccount(key) => self
                .cached
                .get_or_try_init(|| self.exchange(key))
                .await
                .cloned(),
        }
    }

    async fn exchange(&self, key: &ServiceAccountKey) -> Result<String, StorageError> {
        let assertion = sign_assertion(key)?;
        debug!(email = %key.client_email, "exchanging service-account assertion");

        let response = self
            .http
            .post(&key.token_uri)
            .form(&[("grant_type", JWT_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Auth(format!("token endpoint returned {status}: {body}")));
        }

        let token: TokenResponse = response.json().await?;
        Ok(token.access_token)
    }
}

fn sign_assertion(key: &ServiceAccountKey) -> Result<String, StorageError> {
    let iat = Utc::now().timestamp();
    let claims = Claims {
        iss: &key.client_email,
        scope: STORAGE_SCOPE,
        aud: &key.token_uri,
        iat,
        exp: iat + 3600,
    };
    let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())?;
    Ok(jsonwebtoken::encode(
        &Header::new(Algorithm::RS256),
        &claims,
        &encoding_key,
    )?)
}
