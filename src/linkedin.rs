//! LinkedIn v2 publishing: image asset registration, byte upload, UGC post.

use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{RedatorError, Result};

pub const API_URL: &str = "https://api.linkedin.com/v2";
const UPLOAD_MECHANISM: &str = "com.linkedin.digitalmedia.uploading.MediaUploadHttpRequest";

#[derive(Debug, Serialize)]
struct RegisterUploadBody<'a> {
    #[serde(rename = "registerUploadRequest")]
    register_upload_request: RegisterUploadRequest<'a>,
}

#[derive(Debug, Serialize)]
struct RegisterUploadRequest<'a> {
    recipes: [&'a str; 1],
    owner: &'a str,
    #[serde(rename = "serviceRelationships")]
    service_relationships: [ServiceRelationship<'a>; 1],
}

#[derive(Debug, Serialize)]
struct ServiceRelationship<'a> {
    #[serde(rename = "relationshipType")]
    relationship_type: &'a str,
    identifier: &'a str,
}

#[derive(Debug, Serialize)]
struct ShareContent<'a> {
    author: &'a str,
    #[serde(rename = "lifecycleState")]
    lifecycle_state: &'a str,
    #[serde(rename = "specificContent")]
    specific_content: SpecificContent<'a>,
    visibility: Visibility<'a>,
}

#[derive(Debug, Serialize)]
struct SpecificContent<'a> {
    #[serde(rename = "com.linkedin.ugc.ShareContent")]
    share_content: ShareBody<'a>,
}

#[derive(Debug, Serialize)]
struct ShareBody<'a> {
    #[serde(rename = "shareCommentary")]
    share_commentary: Text<'a>,
    #[serde(rename = "shareMediaCategory")]
    share_media_category: &'a str,
    media: [Media<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Text<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct Media<'a> {
    status: &'a str,
    description: Text<'a>,
    media: &'a str,
    title: Text<'a>,
}

#[derive(Debug, Serialize)]
struct Visibility<'a> {
    #[serde(rename = "com.linkedin.ugc.MemberNetworkVisibility")]
    visibility: &'a str,
}

#[derive(Debug, Deserialize)]
struct PostResponse {
    #[serde(default)]
    id: Option<String>,
}

/// Slot returned by asset registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSlot {
    pub asset: String,
    pub upload_url: String,
}

pub struct LinkedInClient {
    http: Client,
    base_url: String,
    access_token: String,
}

impl LinkedInClient {
    pub fn new(http: Client, base_url: &str, access_token: String) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token,
        }
    }

    /// Fails unless the status is one of `accepted`, keeping the body for the log.
    async fn expect_status(response: Response, accepted: &[StatusCode]) -> Result<Response> {
        let status = response.status();
        if !accepted.contains(&status) {
            let body = response.text().await.unwrap_or_default();
            return Err(RedatorError::Http {
                service: "LinkedIn",
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Step 1: reserve an upload URL for a feed image owned by `owner`.
    pub async fn register_image_upload(&self, owner: &str) -> Result<UploadSlot> {
        let body = RegisterUploadBody {
            register_upload_request: RegisterUploadRequest {
                recipes: ["urn:li:digitalmediaRecipe:feedshare-image"],
                owner,
                service_relationships: [ServiceRelationship {
                    relationship_type: "OWNER",
                    identifier: "urn:li:userGeneratedContent",
                }],
            },
        };
        let response = self
            .http
            .post(format!("{}/assets", self.base_url))
            .query(&[("action", "registerUpload")])
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await?;
        let response = Self::expect_status(response, &[StatusCode::OK]).await?;
        let raw = response.text().await?;
        parse_upload_slot(&raw)
    }

    /// Step 2: PUT the raw image bytes to the reserved URL.
    pub async fn upload_image(&self, slot: &UploadSlot, bytes: Vec<u8>) -> Result<()> {
        debug!(asset = %slot.asset, size = bytes.len(), "uploading image");
        let response = self
            .http
            .put(&slot.upload_url)
            .bearer_auth(&self.access_token)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(bytes)
            .send()
            .await?;
        Self::expect_status(response, &[StatusCode::OK, StatusCode::CREATED]).await?;
        Ok(())
    }

    /// Step 3: publish a public post with the uploaded image. Returns the post URN when known.
    pub async fn create_image_post(
        &self,
        author: &str,
        text: &str,
        asset: &str,
        title: &str,
    ) -> Result<Option<String>> {
        let body = ShareContent {
            author,
            lifecycle_state: "PUBLISHED",
            specific_content: SpecificContent {
                share_content: ShareBody {
                    share_commentary: Text { text },
                    share_media_category: "IMAGE",
                    media: [Media {
                        status: "READY",
                        description: Text { text: title },
                        media: asset,
                        title: Text { text: title },
                    }],
                },
            },
            visibility: Visibility {
                visibility: "PUBLIC",
            },
        };
        let response = self
            .http
            .post(format!("{}/ugcPosts", self.base_url))
            .bearer_auth(&self.access_token)
            .header("X-Restli-Protocol-Version", "2.0.0")
            .json(&body)
            .send()
            .await?;
        let response =
            Self::expect_status(response, &[StatusCode::OK, StatusCode::CREATED]).await?;

        let header_id = response
            .headers()
            .get("x-restli-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body_id = response
            .json::<PostResponse>()
            .await
            .ok()
            .and_then(|p| p.id);
        Ok(header_id.or(body_id))
    }
}

/// Pulls the asset URN and upload URL out of a registerUpload response.
fn parse_upload_slot(raw: &str) -> Result<UploadSlot> {
    let value: serde_json::Value = serde_json::from_str(raw)
        .map_err(|_| RedatorError::upstream("registerUpload response is not JSON", raw))?;
    let asset = value
        .pointer("/value/asset")
        .and_then(|v| v.as_str());
    let upload_url = value
        .get("value")
        .and_then(|v| v.get("uploadMechanism"))
        .and_then(|v| v.get(UPLOAD_MECHANISM))
        .and_then(|v| v.get("uploadUrl"))
        .and_then(|v| v.as_str());

    match (asset, upload_url) {
        (Some(asset), Some(upload_url)) => Ok(UploadSlot {
            asset: asset.to_string(),
            upload_url: upload_url.to_string(),
        }),
        _ => Err(RedatorError::upstream(
            "registerUpload response lacks asset or uploadUrl",
            raw,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_bytes, body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn register_response(upload_url: &str) -> serde_json::Value {
        serde_json::json!({
            "value": {
                "asset": "urn:li:digitalmediaAsset:C4D",
                "uploadMechanism": {
                    UPLOAD_MECHANISM: {"uploadUrl": upload_url, "headers": {}}
                }
            }
        })
    }

    #[test]
    fn parse_upload_slot_reads_nested_fields() {
        let raw = register_response("https://upload.example/x").to_string();
        let slot = parse_upload_slot(&raw).unwrap();
        assert_eq!(slot.asset, "urn:li:digitalmediaAsset:C4D");
        assert_eq!(slot.upload_url, "https://upload.example/x");
    }

    #[test]
    fn parse_upload_slot_rejects_missing_fields() {
        let err = parse_upload_slot(r#"{"value": {"asset": "a"}}"#).unwrap_err();
        assert_eq!(err.payload(), Some(r#"{"value": {"asset": "a"}}"#));
        assert!(parse_upload_slot("not json").is_err());
    }

    #[tokio::test]
    async fn full_upload_and_post_flow() {
        let server = MockServer::start().await;
        let upload_url = format!("{}/upload/abc", server.uri());

        Mock::given(method("POST"))
            .and(path("/assets"))
            .and(query_param("action", "registerUpload"))
            .and(header("authorization", "Bearer li-token"))
            .and(body_partial_json(serde_json::json!({
                "registerUploadRequest": {"owner": "urn:li:organization:42"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(register_response(&upload_url)))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/upload/abc"))
            .and(body_bytes(b"jpeg-bytes".to_vec()))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/ugcPosts"))
            .and(header("x-restli-protocol-version", "2.0.0"))
            .and(body_partial_json(serde_json::json!({
                "author": "urn:li:organization:42",
                "lifecycleState": "PUBLISHED",
                "specificContent": {"com.linkedin.ugc.ShareContent": {
                    "shareCommentary": {"text": "Olá"},
                    "shareMediaCategory": "IMAGE"
                }},
                "visibility": {"com.linkedin.ugc.MemberNetworkVisibility": "PUBLIC"}
            })))
            .respond_with(
                ResponseTemplate::new(201)
                    .insert_header("x-restli-id", "urn:li:share:99")
                    .set_body_json(serde_json::json!({"id": "urn:li:share:99"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = LinkedInClient::new(Client::new(), &server.uri(), "li-token".into());
        let slot = client
            .register_image_upload("urn:li:organization:42")
            .await
            .unwrap();
        client.upload_image(&slot, b"jpeg-bytes".to_vec()).await.unwrap();
        let id = client
            .create_image_post("urn:li:organization:42", "Olá", &slot.asset, "Título")
            .await
            .unwrap();
        assert_eq!(id.as_deref(), Some("urn:li:share:99"));
    }

    #[tokio::test]
    async fn register_requires_exactly_200() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/assets"))
            .respond_with(ResponseTemplate::new(201).set_body_json(register_response("u")))
            .mount(&server)
            .await;

        let client = LinkedInClient::new(Client::new(), &server.uri(), "t".into());
        let err = client.register_image_upload("urn:li:person:1").await.unwrap_err();
        assert!(matches!(err, RedatorError::Http { service: "LinkedIn", status: 201, .. }));
    }

    #[tokio::test]
    async fn rejected_post_keeps_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ugcPosts"))
            .respond_with(ResponseTemplate::new(422).set_body_string("duplicate"))
            .mount(&server)
            .await;

        let client = LinkedInClient::new(Client::new(), &server.uri(), "t".into());
        let err = client
            .create_image_post("urn:li:person:1", "x", "urn:li:digitalmediaAsset:1", "T")
            .await
            .unwrap_err();
        match err {
            RedatorError::Http { status, body, .. } => {
                assert_eq!(status, 422);
                assert_eq!(body, "duplicate");
            }
            other => panic!("expected Http, got {other:?}"),
        }
    }
}
