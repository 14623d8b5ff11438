//! Divulga no LinkedIn o último artigo publicado, com a mesma capa do blog.

use reqwest::Client;
use tracing::info;

use crate::blogger::{BloggerClient, BloggerCredentials};
use crate::config::RedatorConfig;
use crate::error::{RedatorError, Result};
use crate::html;
use crate::linkedin::LinkedInClient;
use crate::openai::{ChatMessage, ChatRequest, ChatSender, complete_text};
use crate::resolver::{latest, stem, with_extension};
use crate::storage::BlobStore;

use super::StageOutcome;

const TEMPERATURE: f32 = 0.7;

/// Prompt do texto promocional, em português e primeira pessoa.
pub fn build_prompt(persona: &str, title: &str, post_url: &str) -> String {
    format!(
        "Você é {persona}.
Seu estilo no LinkedIn é direto, confiante e didático: usa perguntas retóricas,
parágrafos curtos e listas marcadas por hífens, sem emojis ou formatação especial.

Escreva um post em português anunciando o artigo “{title}”.
Siga exatamente esta estrutura:

1. Gancho inicial (pergunta ou afirmação provocativa).
2. Dois a três parágrafos curtos explicando por que o tema é importante.
3. Lista de até cinco pontos-chave usando hífens (“- ”).
4. Chamada para ler o artigo completo no link {post_url}.
5. Bloco final com até 8 hashtags relevantes, todas em minúsculas, separadas por espaço.

Use tom informal, técnico-acessível, voz em primeira pessoa.
Retorne apenas o texto final do post, sem comentários extras."
    )
}

pub async fn run(
    config: &RedatorConfig,
    store: &impl BlobStore,
    llm: &impl ChatSender,
    http: &Client,
) -> Result<StageOutcome> {
    let linkedin_token = config.require_linkedin_token()?;
    let author = config.require_linkedin_author()?;
    let blog_id = config.require_blog_id()?;
    let token_file = config.require_blogger_token_file()?;
    store.check_access().await?;

    let folder = &config.folders.html;
    let htmls = with_extension(store.list(folder).await?, "html");
    let target = latest(&htmls)
        .ok_or_else(|| RedatorError::MissingArtifact(format!("no HTML found in '{folder}/'")))?
        .clone();
    let base = stem(&target);
    let raw = store.read_text(&target).await?;
    let title = html::extract_title(&raw).unwrap_or_else(|| base.to_string());

    let cover = format!("{folder}/{base}.jpg");
    if !store.exists(&cover).await? {
        return Err(RedatorError::MissingArtifact(format!("image not found: {cover}")));
    }
    let image = store.read_bytes(&cover).await?;
    info!("HTML: {target}, title: {title}");

    let mut credentials = BloggerCredentials::load(token_file)?;
    let access_token = credentials.access_token(http).await?;
    let blogger = BloggerClient::new(http.clone(), &config.blogger_base_url, blog_id, access_token);
    let post = blogger
        .latest_post()
        .await?
        .ok_or_else(|| RedatorError::MissingArtifact("the blog has no published post".into()))?;
    let post_url = post.url.ok_or_else(|| {
        RedatorError::upstream("latest blog post has no url", post.id.clone())
    })?;
    info!("Blog URL: {post_url}");

    let req = ChatRequest::new(
        &config.models.social,
        vec![ChatMessage::system(build_prompt(
            &config.linkedin_persona,
            &title,
            &post_url,
        ))],
    )
    .with_temperature(TEMPERATURE);
    let text = complete_text(llm, &req).await?;
    info!("Post text generated");

    let linkedin = LinkedInClient::new(
        http.clone(),
        &config.linkedin_base_url,
        linkedin_token.to_string(),
    );
    let slot = linkedin.register_image_upload(author).await?;
    linkedin.upload_image(&slot, image).await?;
    info!("Image uploaded: {}", slot.asset);

    let id = linkedin
        .create_image_post(author, &text, &slot.asset, &title)
        .await?;
    info!("Published on LinkedIn");
    Ok(StageOutcome::Completed {
        output: id.unwrap_or(slot.asset),
    })
}
