//! Estágio de rascunho: desenvolve um parágrafo por tópico da ficha pendente
//! mais antiga e grava o resultado em `rascunho/` com o mesmo nome-base.

use indexmap::IndexMap;
use serde::Deserialize;
use tracing::info;

use crate::config::{DraftStrategy, RedatorConfig};
use crate::error::{RedatorError, Result};
use crate::openai::{ChatMessage, ChatRequest, ChatSender, complete_text};
use crate::records::{Ficha, Rascunho, to_pretty_json};
use crate::resolver::{JoinKey, Resolution, resolve, stem, with_extension};
use crate::storage::BlobStore;

use super::StageOutcome;

const PARAGRAPH_SYSTEM: &str = "You are a specialist in technology, statistics, and AI. \
     Your writing should be informative, friendly, and suitable for a blog post. Write only the paragraph.";

const CARD_SYSTEM: &str = "You are a specialist in technology, statistics, and AI who writes blog drafts. \
     Answer with a single JSON object and nothing else.";

fn paragraph_prompt(topic: &str, theme: &str) -> String {
    format!(
        "Write a clear, engaging, and educational paragraph about the topic '{topic}' for a blog article. \
         The article's theme is '{theme}'. \
         Do not repeat the topic/title in the paragraph. \
         Keep the text approachable and focused on technology, statistics, or artificial intelligence as relevant."
    )
}

fn card_prompt(ficha_json: &str) -> String {
    format!(
        "Below is the outline of a blog article as JSON:\n\n{ficha_json}\n\n\
         For every entry of 'topics', write a clear, engaging, and educational paragraph that does not repeat the topic itself. \
         Return the same JSON object with an extra key 'draft': an object mapping each topic string, exactly as written, \
         to its paragraph. Respond ONLY with valid JSON, no markdown."
    )
}

/// Uma chamada por tópico, na ordem da ficha.
async fn draft_per_topic(
    config: &RedatorConfig,
    llm: &impl ChatSender,
    ficha: &Ficha,
) -> Result<IndexMap<String, String>> {
    let mut draft = IndexMap::with_capacity(ficha.topics.len());
    for topic in &ficha.topics {
        info!("Writing paragraph for topic: {topic}");
        let req = ChatRequest::new(
            &config.models.draft,
            vec![
                ChatMessage::system(PARAGRAPH_SYSTEM),
                ChatMessage::user(paragraph_prompt(topic, &ficha.theme)),
            ],
        );
        let paragraph = complete_text(llm, &req).await?;
        draft.insert(topic.clone(), paragraph);
    }
    Ok(draft)
}

#[derive(Debug, Deserialize)]
struct CardReply {
    draft: IndexMap<String, String>,
}

/// Interpreta a resposta da chamada única. Qualquer desvio de JSON puro,
/// ou um tópico sem parágrafo, é falha: nada é reparado.
pub fn parse_card_reply(ficha: &Ficha, raw: &str) -> Result<IndexMap<String, String>> {
    let reply: CardReply = serde_json::from_str(raw)
        .map_err(|e| RedatorError::upstream(format!("draft is not valid JSON: {e}"), raw))?;

    let mut draft = IndexMap::with_capacity(ficha.topics.len());
    for topic in &ficha.topics {
        // Tópicos repetidos compartilham o mesmo parágrafo.
        match reply.draft.get(topic).cloned() {
            Some(paragraph) => {
                draft.insert(topic.clone(), paragraph);
            }
            None => {
                return Err(RedatorError::upstream(
                    format!("draft has no paragraph for topic '{topic}'"),
                    raw,
                ));
            }
        }
    }
    Ok(draft)
}

async fn draft_single_call(
    config: &RedatorConfig,
    llm: &impl ChatSender,
    ficha: &Ficha,
) -> Result<IndexMap<String, String>> {
    let req = ChatRequest::new(
        &config.models.draft,
        vec![
            ChatMessage::system(CARD_SYSTEM),
            ChatMessage::user(card_prompt(&to_pretty_json(ficha)?)),
        ],
    );
    let raw = complete_text(llm, &req).await?;
    parse_card_reply(ficha, &raw)
}

pub async fn run(
    config: &RedatorConfig,
    store: &impl BlobStore,
    llm: &impl ChatSender,
) -> Result<StageOutcome> {
    let folders = &config.folders;
    let fichas = with_extension(store.list(&folders.ficha).await?, "json");
    let rascunhos = with_extension(store.list(&folders.rascunho).await?, "json");

    let target = match resolve(&fichas, &rascunhos, JoinKey::Exact) {
        Resolution::NothingToDo => {
            info!("No pending ficha to draft");
            return Ok(StageOutcome::NothingToDo);
        }
        Resolution::Next { next, pending } => {
            info!(pending = pending.len(), "Processing pending ficha: {next}");
            next
        }
    };

    let raw = store.read_text(&target).await?;
    let ficha: Ficha = serde_json::from_str(&raw)
        .map_err(|e| RedatorError::upstream(format!("{target} is not a valid ficha: {e}"), raw))?;
    let base = stem(&target);

    let draft = match config.draft_strategy {
        DraftStrategy::PerTopic => draft_per_topic(config, llm, &ficha).await?,
        DraftStrategy::SingleCall => draft_single_call(config, llm, &ficha).await?,
    };

    let rascunho = Rascunho::from_ficha(&ficha, base, draft);
    let name = format!("{}/{base}.json", folders.rascunho);
    store
        .write_text(&name, &to_pretty_json(&rascunho)?, "application/json")
        .await?;
    info!("Draft saved to {}", store.location(&name));
    Ok(StageOutcome::Completed { output: name })
}
