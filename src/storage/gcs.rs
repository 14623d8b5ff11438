use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::debug;

use super::{BlobStore, StorageError, TokenSource};

const API_BASE: &str = "https://storage.googleapis.com";
const PUBLIC_BASE: &str = "https://storage.googleapis.com";

#[derive(Debug, Deserialize)]
struct ObjectList {
    #[serde(default)]
    items: Vec<ObjectMeta>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectMeta {
    name: String,
}

/// Google Cloud Storage through the JSON API.
pub struct GcsStore {
    bucket: String,
    base_url: String,
    http: Client,
    tokens: TokenSource,
}

impl GcsStore {
    pub fn new(bucket: String, tokens: TokenSource) -> Result<Self, StorageError> {
        Self::with_base_url(bucket, tokens, API_BASE.to_string())
    }

    pub fn with_base_url(
        bucket: String,
        tokens: TokenSource,
        base_url: String,
    ) -> Result<Self, StorageError> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            bucket,
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            tokens,
        })
    }

    fn object_url(&self, name: &str) -> String {
        format!(
            "{}/storage/v1/b/{}/o/{}",
            self.base_url,
            self.bucket,
            urlencoding::encode(name)
        )
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, StorageError> {
        let token = self.tokens.token().await?;
        Ok(request.bearer_auth(token).send().await?)
    }
}

/// Maps non-success statuses to errors, 404 to `NotFound(name)`.
async fn check(response: Response, name: &str) -> Result<Response, StorageError> {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Err(StorageError::NotFound(name.to_string()));
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(StorageError::Http {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response)
}

impl BlobStore for GcsStore {
    async fn list(&self, folder: &str) -> Result<Vec<String>, StorageError> {
        let url = format!("{}/storage/v1/b/{}/o", self.base_url, self.bucket);
        let prefix = format!("{folder}/");
        let mut names = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .http
                .get(&url)
                .query(&[("prefix", prefix.as_str()), ("fields", "items(name),nextPageToken")]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }
            let response = check(self.send(request).await?, &prefix).await?;
            let page: ObjectList = response.json().await?;
            names.extend(page.items.into_iter().map(|o| o.name));

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!(folder, count = names.len(), "listed objects");
        Ok(names)
    }

    async fn read_bytes(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        let request = self.http.get(self.object_url(name)).query(&[("alt", "media")]);
        let response = check(self.send(request).await?, name).await?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn write(
        &self,
        name: &str,
        data: &[u8],
        content_type: &str,
    ) -> Result<(), StorageError> {
        let url = format!("{}/upload/storage/v1/b/{}/o", self.base_url, self.bucket);
        let request = self
            .http
            .post(url)
            .query(&[("uploadType", "media"), ("name", name)])
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(data.to_vec());
        check(self.send(request).await?, name).await?;
        Ok(())
    }

    async fn exists(&self, name: &str) -> Result<bool, StorageError> {
        let request = self.http.get(self.object_url(name));
        match check(self.send(request).await?, name).await {
            Ok(_) => Ok(true),
            Err(StorageError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn check_access(&self) -> Result<(), StorageError> {
        let url = format!("{}/storage/v1/b/{}", self.base_url, self.bucket);
        check(self.send(self.http.get(url)).await?, &self.bucket).await?;
        Ok(())
    }

    async fn make_public(&self, name: &str) -> Result<String, StorageError> {
        let url = format!("{}/acl", self.object_url(name));
        let request = self
            .http
            .post(url)
            .json(&serde_json::json!({"entity": "allUsers", "role": "READER"}));
        check(self.send(request).await?, name).await?;

        let path = name
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        Ok(format!("{PUBLIC_BASE}/{}/{path}", self.bucket))
    }

    fn location(&self, name: &str) -> String {
        format!("gs://{}/{name}", self.bucket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn store(server: &MockServer) -> GcsStore {
        GcsStore::with_base_url(
            "bkt".into(),
            TokenSource::from_token("tok".into()),
            server.uri(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn list_follows_page_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/storage/v1/b/bkt/o"))
            .and(query_param("prefix", "fichaum/"))
            .and(query_param("pageToken", "p2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [{"name": "fichaum/20250102_000000.json"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/storage/v1/b/bkt/o"))
            .and(query_param("prefix", "fichaum/"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [{"name": "fichaum/20250101_000000.json"}],
                "nextPageToken": "p2"
            })))
            .mount(&server)
            .await;

        let names = store(&server).await.list("fichaum").await.unwrap();
        assert_eq!(
            names,
            vec!["fichaum/20250101_000000.json", "fichaum/20250102_000000.json"]
        );
    }

    #[tokio::test]
    async fn list_of_empty_folder_has_no_items_field() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/storage/v1/b/bkt/o"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let names = store(&server).await.list("rascunho").await.unwrap();
        assert!(names.is_empty());
    }

    #[tokio::test]
    async fn read_text_downloads_media() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/storage/v1/b/bkt/o/fichaum%2Fa.json"))
            .and(query_param("alt", "media"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"theme\": \"Estatística\"}"))
            .mount(&server)
            .await;

        let text = store(&server).await.read_text("fichaum/a.json").await.unwrap();
        assert_eq!(text, "{\"theme\": \"Estatística\"}");
    }

    #[tokio::test]
    async fn missing_object_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let store = store(&server).await;
        let err = store.read_bytes("htmlblog/x.jpg").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(n) if n == "htmlblog/x.jpg"));
        assert!(!store.exists("htmlblog/x.jpg").await.unwrap());
    }

    #[tokio::test]
    async fn write_uses_media_upload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload/storage/v1/b/bkt/o"))
            .and(query_param("uploadType", "media"))
            .and(query_param("name", "rascunho/a.json"))
            .and(header("content-type", "application/json"))
            .and(body_string("{}"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"name": "rascunho/a.json"})))
            .expect(1)
            .mount(&server)
            .await;

        store(&server)
            .await
            .write_text("rascunho/a.json", "{}", "application/json")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn check_access_surfaces_forbidden() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/storage/v1/b/bkt"))
            .respond_with(ResponseTemplate::new(403).set_body_string("denied"))
            .mount(&server)
            .await;

        let err = store(&server).await.check_access().await.unwrap_err();
        assert!(matches!(err, StorageError::Http { status: 403, .. }));
    }

    #[tokio::test]
    async fn make_public_returns_public_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/storage/v1/b/bkt/o/htmlblog%2F20250101_000000-en.jpg/acl"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"entity": "allUsers"})))
            .expect(1)
            .mount(&server)
            .await;

        let url = store(&server)
            .await
            .make_public("htmlblog/20250101_000000-en.jpg")
            .await
            .unwrap();
        assert_eq!(
            url,
            "https://storage.googleapis.com/bkt/htmlblog/20250101_000000-en.jpg"
        );
    }
}
