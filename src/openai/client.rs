use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use super::error::OpenAiError;
use super::types::{ChatRequest, ChatResponse, ImageRequest, ImageResponse};

pub const API_URL: &str = "https://api.openai.com/v1";

/// Anything that can answer a chat completion request.
pub trait ChatSender {
    async fn send_chat(&self, req: &ChatRequest) -> Result<ChatResponse, OpenAiError>;
}

/// Anything that can turn a prompt into a hosted image URL.
pub trait ImageGenerator {
    async fn generate_image(&self, req: &ImageRequest) -> Result<ImageResponse, OpenAiError>;
}

/// Sends `req` and returns the trimmed text of the first choice.
pub async fn complete_text(
    client: &impl ChatSender,
    req: &ChatRequest,
) -> Result<String, OpenAiError> {
    let response = client.send_chat(req).await?;
    response
        .text()
        .map(str::to_string)
        .ok_or_else(|| OpenAiError::EmptyResponse {
            model: req.model.clone(),
        })
}

/// Generates one image and returns its URL.
pub async fn generate_image_url(
    client: &impl ImageGenerator,
    req: &ImageRequest,
) -> Result<String, OpenAiError> {
    let response = client.generate_image(req).await?;
    response
        .data
        .into_iter()
        .find_map(|d| d.url)
        .ok_or_else(|| OpenAiError::EmptyResponse {
            model: req.model.clone(),
        })
}

pub struct OpenAiClient {
    api_key: String,
    client: Client,
    base_url: String,
}

impl OpenAiClient {
    /// `base_url` is normally [`API_URL`]; proxies and tests point it elsewhere.
    pub fn with_base_url(api_key: String, base_url: String) -> Result<Self, OpenAiError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            api_key,
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R, OpenAiError>
    where
        B: serde::Serialize,
        R: serde::de::DeserializeOwned,
    {
        let url = format!("{}{path}", self.base_url);
        debug!(%url, "POST");
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(OpenAiError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json::<R>().await?)
    }
}

impl ChatSender for OpenAiClient {
    async fn send_chat(&self, req: &ChatRequest) -> Result<ChatResponse, OpenAiError> {
        self.post("/chat/completions", req).await
    }
}

impl ImageGenerator for OpenAiClient {
    async fn generate_image(&self, req: &ImageRequest) -> Result<ImageResponse, OpenAiError> {
        self.post("/images/generations", req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openai::types::ChatMessage;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn chat_body(text: &str) -> serde_json::Value {
        serde_json::json!({
            "id": "chatcmpl-1",
            "model": "gpt-4.1",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": text},
                "finish_reason": "stop"
            }]
        })
    }

    #[tokio::test]
    async fn complete_text_returns_trimmed_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({"model": "gpt-4.1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_body("\n  texto gerado  ")))
            .expect(1)
            .mount(&server)
            .await;

        let client = OpenAiClient::with_base_url("sk-test".into(), server.uri()).unwrap();
        let req = ChatRequest::new("gpt-4.1", vec![ChatMessage::user("escreva")]);
        let text = complete_text(&client, &req).await.unwrap();
        assert_eq!(text, "texto gerado");
    }

    #[tokio::test]
    async fn non_success_status_is_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let client = OpenAiClient::with_base_url("sk-test".into(), server.uri()).unwrap();
        let req = ChatRequest::new("gpt-4.1", vec![ChatMessage::user("x")]);
        let err = complete_text(&client, &req).await.unwrap_err();
        match err {
            OpenAiError::ApiError { status, message } => {
                assert_eq!(status, 429);
                assert_eq!(message, "slow down");
            }
            other => panic!("expected ApiError, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_choices_is_empty_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "x", "model": "gpt-4.1", "choices": []
            })))
            .mount(&server)
            .await;

        let client = OpenAiClient::with_base_url("sk-test".into(), server.uri()).unwrap();
        let req = ChatRequest::new("gpt-4.1", vec![ChatMessage::user("x")]);
        let err = complete_text(&client, &req).await.unwrap_err();
        assert!(matches!(err, OpenAiError::EmptyResponse { .. }));
    }

    #[tokio::test]
    async fn generate_image_url_reads_first_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/images/generations"))
            .and(body_partial_json(serde_json::json!({"size": "1792x1024", "n": 1})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "created": 1,
                "data": [{"url": "https://images.example/cover.png"}]
            })))
            .mount(&server)
            .await;

        let client = OpenAiClient::with_base_url("sk-test".into(), format!("{}/", server.uri())).unwrap();
        let req = ImageRequest {
            model: "dall-e-3".into(),
            prompt: "capa".into(),
            size: "1792x1024".into(),
            n: 1,
        };
        let url = generate_image_url(&client, &req).await.unwrap();
        assert_eq!(url, "https://images.example/cover.png");
    }
}
