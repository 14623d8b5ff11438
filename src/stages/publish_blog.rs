//! Publica o HTML mais recente no Blogger com uma capa gerada por IA.
//!
//! Não há registro do que já foi publicado: rodar duas vezes cria dois posts.

use reqwest::Client;
use tracing::info;

use crate::blogger::{BloggerClient, BloggerCredentials};
use crate::config::RedatorConfig;
use crate::error::{RedatorError, Result};
use crate::html;
use crate::openai::{ImageGenerator, ImageRequest, generate_image_url};
use crate::resolver::{latest, stem, with_extension};
use crate::storage::BlobStore;

use super::StageOutcome;

pub const COVER_SIZE: &str = "1792x1024";

pub fn cover_prompt(title: &str) -> String {
    format!(
        "Capa com estilo realista para artigo de blog intitulado '{title}', estilo moderno e minimalista com tamanho 1024x1792"
    )
}

async fn download(http: &Client, url: &str) -> Result<Vec<u8>> {
    let response = http.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(RedatorError::Http {
            service: "image host",
            status: status.as_u16(),
            body,
        });
    }
    Ok(response.bytes().await?.to_vec())
}

pub async fn run(
    config: &RedatorConfig,
    store: &impl BlobStore,
    images: &impl ImageGenerator,
    http: &Client,
) -> Result<StageOutcome> {
    let blog_id = config.require_blog_id()?;
    let token_file = config.require_blogger_token_file()?;
    store.check_access().await?;

    let folder = &config.folders.html;
    let htmls = with_extension(store.list(folder).await?, "html");
    let target = latest(&htmls)
        .ok_or_else(|| RedatorError::MissingArtifact(format!("no HTML found in '{folder}/'")))?
        .clone();
    info!("Found: {target}");

    let raw = store.read_text(&target).await?;
    let document = html::strip_doctype(&raw);
    let title = html::extract_title(&document)
        .ok_or_else(|| RedatorError::upstream(format!("{target} has no <title> tag"), raw.clone()))?;
    info!("Extracted title: '{title}'");
    let body = html::clean_body(&document, &title);

    let mut credentials = BloggerCredentials::load(token_file)?;
    let access_token = credentials.access_token(http).await?;

    info!("Generating cover image");
    let req = ImageRequest {
        model: config.models.image.clone(),
        prompt: cover_prompt(&title),
        size: COVER_SIZE.to_string(),
        n: 1,
    };
    let image_url = generate_image_url(images, &req).await?;
    let image = download(http, &image_url).await?;

    let cover = format!("{folder}/{}.jpg", stem(&target));
    store.write(&cover, &image, "image/jpeg").await?;
    let public_url = store.make_public(&cover).await?;
    info!("Cover published at: {public_url}");

    let content = format!("{}{body}", html::cover_tag(&public_url, &title));
    let blogger = BloggerClient::new(http.clone(), &config.blogger_base_url, blog_id, access_token);
    let post = blogger.insert_post(&title, &content, false).await?;

    let url = post.url.unwrap_or(post.id);
    info!("Post published: {url}");
    Ok(StageOutcome::Completed { output: url })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::testing::FixedImage;
    use crate::storage::LocalStore;
    use std::path::PathBuf;
    use tempfile::TempDir;
    use wiremock::matchers::{body_partial_json, body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PAGE: &str = "<!DOCTYPE html>\n<html lang=\"pt\"><head><title>Redes Bayesianas</title></head>\
        <body><h1>Redes Bayesianas</h1><p>Texto.</p></body></html>";

    struct Fixture {
        _tmp: TempDir,
        store: LocalStore,
        config: RedatorConfig,
        server: MockServer,
    }

    async fn fixture() -> Fixture {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("bucket")).unwrap();
        let store = LocalStore::new(tmp.path().join("bucket"));
        let token_file: PathBuf = tmp.path().join("token.json");
        std::fs::write(&token_file, r#"{"token": "blog-token"}"#).unwrap();

        let server = MockServer::start().await;
        let config = RedatorConfig {
            blog_id: Some("123".into()),
            blogger_token_file: Some(token_file),
            blogger_base_url: server.uri(),
            ..RedatorConfig::default()
        };
        Fixture {
            _tmp: tmp,
            store,
            config,
            server,
        }
    }

    #[test]
    fn cover_prompt_mentions_title() {
        assert!(cover_prompt("Bayes").contains("intitulado 'Bayes'"));
    }

    #[tokio::test]
    async fn publishes_latest_html_with_cover() {
        let fx = fixture().await;
        fx.store.write_text("htmlblog/20250101_000000-en.html", "<title>Old</title>", "text/html").await.unwrap();
        fx.store.write_text("htmlblog/20250102_000000-en.html", PAGE, "text/html").await.unwrap();

        Mock::given(method("GET"))
            .and(path("/img/cover.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"jpeg".to_vec()))
            .expect(1)
            .mount(&fx.server)
            .await;
        Mock::given(method("POST"))
            .and(path("/blogs/123/posts"))
            .and(query_param("isDraft", "false"))
            .and(body_partial_json(serde_json::json!({"title": "Redes Bayesianas"})))
            .and(body_string_contains("alt=\\\"Capa: Redes Bayesianas\\\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "9", "url": "https://blog.example/2025/redes.html"
            })))
            .expect(1)
            .mount(&fx.server)
            .await;

        let images = FixedImage::new(format!("{}/img/cover.png", fx.server.uri()));
        let outcome = run(&fx.config, &fx.store, &images, &Client::new()).await.unwrap();
        assert_eq!(
            outcome,
            StageOutcome::Completed {
                output: "https://blog.example/2025/redes.html".into()
            }
        );

        let cover = fx.store.read_bytes("htmlblog/20250102_000000-en.jpg").await.unwrap();
        assert_eq!(cover, b"jpeg");
        let requests = images.requests.lock().unwrap();
        assert_eq!(requests[0].size, "1792x1024");
        assert_eq!(requests[0].model, "dall-e-3");
    }

    #[tokio::test]
    async fn missing_title_fails_before_image_generation() {
        let fx = fixture().await;
        fx.store.write_text("htmlblog/20250101_000000-en.html", "<p>no title</p>", "text/html").await.unwrap();

        let images = FixedImage::new("http://unused");
        let err = run(&fx.config, &fx.store, &images, &Client::new()).await.unwrap_err();
        assert!(matches!(err, RedatorError::Upstream { .. }));
        assert!(images.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_html_folder_is_missing_artifact() {
        let fx = fixture().await;
        let images = FixedImage::new("http://unused");
        let err = run(&fx.config, &fx.store, &images, &Client::new()).await.unwrap_err();
        assert!(matches!(err, RedatorError::MissingArtifact(_)));
    }

    #[tokio::test]
    async fn missing_token_file_orphans_no_image() {
        let mut fx = fixture().await;
        fx.config.blogger_token_file = Some(PathBuf::from("/nonexistent/token.json"));
        fx.store.write_text("htmlblog/20250101_000000-en.html", PAGE, "text/html").await.unwrap();

        let images = FixedImage::new("http://unused");
        let err = run(&fx.config, &fx.store, &images, &Client::new()).await.unwrap_err();
        assert!(matches!(err, RedatorError::Config(_)));
        assert!(images.requests.lock().unwrap().is_empty());
        assert!(!fx.store.exists("htmlblog/20250101_000000-en.jpg").await.unwrap());
    }

    #[tokio::test]
    async fn unreachable_bucket_fails_before_image_generation() {
        let fx = fixture().await;
        let store = LocalStore::new(fx._tmp.path().join("missing-bucket"));

        let images = FixedImage::new("http://unused");
        let err = run(&fx.config, &store, &images, &Client::new()).await.unwrap_err();
        assert!(matches!(err, RedatorError::Storage(_)));
        assert!(images.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_blog_id_is_config_error() {
        let mut fx = fixture().await;
        fx.config.blog_id = None;
        let images = FixedImage::new("http://unused");
        let err = run(&fx.config, &fx.store, &images, &Client::new()).await.unwrap_err();
        assert!(err.to_string().contains("BLOG_ID"));
    }
}
