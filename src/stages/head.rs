//! Estágio inicial: propõe o tema e os tópicos do próximo artigo.
//!
//! Lê as últimas N fichas (da mais antiga para a mais nova) como contexto de
//! continuidade, pede ao modelo um novo tema com cinco tópicos e grava uma
//! nova ficha com o timestamp UTC atual como nome.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use tracing::{info, warn};

use crate::config::RedatorConfig;
use crate::error::{RedatorError, Result};
use crate::openai::{ChatMessage, ChatRequest, ChatSender, complete_text};
use crate::records::{Ficha, to_pretty_json};
use crate::resolver::{most_recent, with_extension};
use crate::storage::BlobStore;

use super::StageOutcome;

/// Marcador das posições vazias da janela de histórico.
pub const EMPTY_SLOT: &str = "vazio";

const EXPECTED_TOPICS: usize = 5;

const SYSTEM_PROMPT: &str = "You are an assistant that identifies the theme and topics of articles for a tech/statistics/AI blog.";

static FENCE_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^```[a-z]*\s*").expect("valid regex"));
static FENCE_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*```$").expect("valid regex"));

/// Lê as `n` fichas mais recentes, da mais antiga para a mais nova,
/// completando as posições que faltam com [`EMPTY_SLOT`].
pub async fn fetch_history(store: &impl BlobStore, folder: &str, n: usize) -> Result<Vec<String>> {
    let names = with_extension(store.list(folder).await?, "json");
    let recent = most_recent(&names, n);

    let mut texts = Vec::with_capacity(n);
    for name in &recent {
        texts.push(store.read_text(name).await?);
    }
    texts.resize(n, EMPTY_SLOT.to_string());
    Ok(texts)
}

/// Monta o prompt de "primeiro post" quando o histórico está vazio,
/// ou o de continuação embutindo as fichas anteriores.
pub fn build_prompt(history: &[String]) -> String {
    if history.iter().all(|t| t == EMPTY_SLOT) {
        return "You are creating the very first post of an educational blog focused on technology, statistics, and artificial intelligence. \
                Generate a main theme for the first article and suggest five topics that should be addressed in this opening post, \
                making sure the fifth topic is a clear conclusion summarizing the article. \
                Return ONLY a JSON object with keys 'theme' and 'topics' (a list of 5 items, where the last item is the conclusion). \
                No explanations or markdown, just valid JSON."
            .to_string();
    }

    let articles = history
        .iter()
        .enumerate()
        .filter(|(_, t)| t.as_str() != EMPTY_SLOT)
        .map(|(i, t)| format!("Article {}: {t}", i + 1))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "You are the editor of a technology, statistics, and AI blog. \
         Analyze the chronological order of the last articles (oldest to newest) below:\n\n\
         {articles}\n\n\
         Based on these, suggest a relevant new theme for the next article and propose five fresh and engaging topics, \
         ensuring the fifth topic serves as a conclusion summarizing the key points. \
         Respond ONLY with a JSON object containing 'theme' (string) and 'topics' (list of 5 strings, \
         with the last string being the conclusion). No markdown, just plain JSON."
    )
}

/// Remove cercas Markdown (```` ```json ```` ... ```` ``` ````) em volta da resposta.
pub fn strip_md_fence(text: &str) -> String {
    let text = text.trim();
    let text = FENCE_OPEN.replace(text, "");
    let text = FENCE_CLOSE.replace(&text, "");
    text.trim().to_string()
}

/// Interpreta a resposta do modelo como ficha. Falha com o texto cru anexado.
pub fn parse_ficha(raw: &str) -> Result<Ficha> {
    let cleaned = strip_md_fence(raw);
    serde_json::from_str(&cleaned)
        .map_err(|e| RedatorError::upstream(format!("ficha is not valid JSON: {e}"), cleaned))
}

/// Nome da nova ficha: `<pasta>/YYYYMMDD_HHMMSS.json` em UTC.
pub fn ficha_name(folder: &str, now: DateTime<Utc>) -> String {
    format!("{folder}/{}.json", now.format("%Y%m%d_%H%M%S"))
}

pub async fn run(
    config: &RedatorConfig,
    store: &impl BlobStore,
    llm: &impl ChatSender,
    now: DateTime<Utc>,
) -> Result<StageOutcome> {
    let folder = &config.folders.ficha;
    let history = fetch_history(store, folder, config.history_window).await?;
    let prompt = build_prompt(&history);
    info!("Prompt for the head stage built");

    let req = ChatRequest::new(
        &config.models.head,
        vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)],
    );
    let raw = complete_text(llm, &req).await?;
    let ficha = parse_ficha(&raw)?;
    if ficha.topics.len() != EXPECTED_TOPICS {
        warn!(
            count = ficha.topics.len(),
            "model proposed an unexpected number of topics"
        );
    }

    let name = ficha_name(folder, now);
    store
        .write_text(&name, &to_pretty_json(&ficha)?, "application/json")
        .await?;
    info!("New ficha saved to {}", store.location(&name));
    Ok(StageOutcome::Completed { output: name })
}
