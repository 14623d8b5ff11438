//! Estágio de design: transforma o rascunho pendente mais antigo em um
//! documento HTML5 completo para um idioma.
//!
//! O HTML devolvido pelo modelo não é validado; é gravado como veio
//! (apenas sem espaços nas bordas) em `htmlblog/<base>-<lang>.html`.

use tracing::info;

use crate::config::RedatorConfig;
use crate::error::{RedatorError, Result};
use crate::openai::{ChatMessage, ChatRequest, ChatSender, complete_text};
use crate::records::Rascunho;
use crate::resolver::{JoinKey, Resolution, resolve, stem, with_extension};
use crate::storage::BlobStore;

use super::StageOutcome;

pub const DEFAULT_LANG: &str = "en";

const SYSTEM_PROMPT: &str = "You are a highly precise HTML formater. Transform the content in a beaultiful blog article. Only output the requested HTML.";

/// Folha de estilo embutida literalmente em todo documento gerado.
pub const CSS: &str = concat!(
    ":root {",
    "  --max-width: 600px;",
    "  --padding: 16px;",
    "  --font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, Oxygen, Ubuntu, Cantarell, 'Open Sans', 'Helvetica Neue', sans-serif;",
    "  --line-height: 1.6;",
    "  --heading-color: #232323;",
    "  --text-color: #222;",
    "  --background-color: #f9f9f9;",
    "  --gap: 1em;",
    "}",
    "body {",
    "  margin: 0;",
    "  padding: 0;",
    "  font-family: var(--font-family);",
    "  line-height: var(--line-height);",
    "  color: var(--text-color);",
    "  background: var(--background-color);",
    "  padding: var(--padding);",
    "}",
    ".container {",
    "  max-width: var(--max-width);",
    "  margin: 0 auto;",
    "}",
    "h1, h2 {",
    "  color: var(--heading-color);",
    "  margin-bottom: calc(var(--gap) / 2);",
    "  text-align: left;",
    "}",
    "h1 { font-size: 1.75em; margin-top: var(--gap); }",
    "h2 { font-size: 1.25em; margin-top: var(--gap); }",
    "p { margin-bottom: var(--gap); text-align: left; }",
    "pre, code { background: #ededed; color: #333; border-radius: 8px; padding: 4px 8px; }",
    "@media (max-width: 600px) {",
    "  body { padding: 8px; }",
    "  h1 { font-size: 1.35em; }",
    "  h2 { font-size: 1.1em; }",
    "}",
);

const HEADER_START: &str = "CONTEXT:
You are a content formatter for educational blogs in Statistics, Machine Learning, and AI. Your task is to generate a complete, responsive HTML5 document with a minimalist, readable design on any device.

RULES:
1. Begin output with <!DOCTYPE html>.
2. Include <html>, <head>, and <body> tags.
3. In <head>, include:
   - <meta charset=\"UTF-8\">
   - <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">
   - <title> based on the theme
   - A <style> block with the provided CSS.
4. In <body>, wrap content in <div class=\"container\">.
5. Use <h1> for the main theme.
6. For each topic:
   - <h2> for the topic title.
   - <p> for the paragraph content.
";

const SHORT_PARAGRAPHS_RULE: &str = "   - Use short, clear paragraphs.\n";

const HEADER_END: &str = "7. Format any code or command examples with <pre><code>…</code></pre>.
8. Use <strong>, <em>, and lists (<ul><li>) to highlight key concepts.
9. Do not use code fences (```).

OUTPUT:
Only the complete HTML as specified above, with no extra text.
";

/// Cabeçalho de regras. `pt` gera conteúdo em português; qualquer outro
/// código gera em inglês com a regra extra de parágrafos curtos.
fn header(lang: &str) -> String {
    if lang == "pt" {
        format!("{HEADER_START}{HEADER_END}Write all content in Portuguese-BR.")
    } else {
        format!("{HEADER_START}{SHORT_PARAGRAPHS_RULE}{HEADER_END}Write all content in English.")
    }
}

pub fn build_prompt(rascunho: &Rascunho, lang: &str) -> String {
    let topics = rascunho
        .topics
        .iter()
        .map(|t| format!("- {t}"))
        .collect::<Vec<_>>()
        .join("\n");

    let paragraphs: String = rascunho
        .topics
        .iter()
        .map(|t| format!("\n<h2>{t}</h2>\n<p>{}</p>", rascunho.paragraph(t)))
        .collect();

    format!(
        "{}\nTheme: {}\nTopics to cover:\n{topics}\nEmbed this CSS exactly in the <style> tag:\n{CSS}\nParagraphs already generated (do NOT rephrase):\n{paragraphs}",
        header(lang),
        rascunho.theme,
    )
}

/// Códigos de idioma viram parte do nome do arquivo; só letras, dígitos e `_`.
pub fn validate_lang(lang: &str) -> Result<()> {
    if lang.is_empty() || !lang.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(RedatorError::Config(format!(
            "invalid language code '{lang}'"
        )));
    }
    Ok(())
}

pub async fn run(
    config: &RedatorConfig,
    store: &impl BlobStore,
    llm: &impl ChatSender,
    lang: &str,
) -> Result<StageOutcome> {
    validate_lang(lang)?;
    let folders = &config.folders;
    let rascunhos = with_extension(store.list(&folders.rascunho).await?, "json");
    let htmls = with_extension(store.list(&folders.html).await?, "html");

    let target = match resolve(&rascunhos, &htmls, JoinKey::LanguageSuffix(lang)) {
        Resolution::NothingToDo => {
            info!("No draft found for HTML generation in '{lang}'");
            return Ok(StageOutcome::NothingToDo);
        }
        Resolution::Next { next, .. } => next,
    };
    info!("Processing draft: {target}");

    let raw = store.read_text(&target).await?;
    let rascunho: Rascunho = serde_json::from_str(&raw)
        .map_err(|e| RedatorError::upstream(format!("{target} is not a valid draft: {e}"), raw))?;
    if rascunho.theme.trim().is_empty() || rascunho.topics.is_empty() {
        return Err(RedatorError::upstream(
            format!("{target} has no theme or topics"),
            serde_json::to_string(&rascunho)?,
        ));
    }

    let req = ChatRequest::new(
        &config.models.design,
        vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(build_prompt(&rascunho, lang)),
        ],
    );
    let html = complete_text(llm, &req).await?;

    let name = format!("{}/{}-{lang}.html", folders.html, stem(&target));
    store
        .write_text(&name, &html, "text/html; charset=utf-8")
        .await?;
    info!("HTML saved to {}", store.location(&name));
    Ok(StageOutcome::Completed { output: name })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::testing::ScriptedLlm;
    use crate::storage::LocalStore;
    use tempfile::TempDir;

    const DRAFT: &str = r#"{
  "timestamp": "20250101_000000",
  "theme": "Bayes",
  "topics": ["Prior", "Conclusão"],
  "draft": {"Prior": "Crenças iniciais.", "Conclusão": "Fim."}
}"#;

    fn rascunho() -> Rascunho {
        serde_json::from_str(DRAFT).unwrap()
    }

    #[test]
    fn english_prompt_has_short_paragraph_rule() {
        let prompt = build_prompt(&rascunho(), "en");
        assert!(prompt.contains("   - Use short, clear paragraphs.\n7. Format"));
        assert!(prompt.contains("Write all content in English.\nTheme: Bayes\n"));
    }

    #[test]
    fn portuguese_prompt_skips_short_paragraph_rule() {
        let prompt = build_prompt(&rascunho(), "pt");
        assert!(!prompt.contains("Use short, clear paragraphs."));
        assert!(prompt.contains("Write all content in Portuguese-BR."));
    }

    #[test]
    fn prompt_embeds_topics_css_and_paragraphs_in_order() {
        let prompt = build_prompt(&rascunho(), "en");
        assert!(prompt.contains("Topics to cover:\n- Prior\n- Conclusão\n"));
        assert!(prompt.contains(&format!("<style> tag:\n{CSS}\n")));
        assert!(prompt.ends_with(
            "(do NOT rephrase):\n\n<h2>Prior</h2>\n<p>Crenças iniciais.</p>\n<h2>Conclusão</h2>\n<p>Fim.</p>"
        ));
    }

    #[test]
    fn lang_validation() {
        assert!(validate_lang("en").is_ok());
        assert!(validate_lang("pt").is_ok());
        assert!(validate_lang("").is_err());
        assert!(validate_lang("../x").is_err());
        assert!(validate_lang("pt-BR").is_err());
    }

    async fn store_with_draft() -> (TempDir, LocalStore) {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path().to_path_buf());
        store
            .write_text("rascunho/20250101_000000.json", DRAFT, "application/json")
            .await
            .unwrap();
        (tmp, store)
    }

    #[tokio::test]
    async fn writes_language_suffixed_html() {
        let (_tmp, store) = store_with_draft().await;
        let llm = ScriptedLlm::new(&["\n<!DOCTYPE html><html></html>\n"]);

        let outcome = run(&RedatorConfig::default(), &store, &llm, "pt").await.unwrap();
        assert_eq!(
            outcome,
            StageOutcome::Completed {
                output: "htmlblog/20250101_000000-pt.html".into()
            }
        );
        let html = store.read_text("htmlblog/20250101_000000-pt.html").await.unwrap();
        assert_eq!(html, "<!DOCTYPE html><html></html>");
        assert_eq!(llm.requests()[0].messages[0].content, SYSTEM_PROMPT);
    }

    #[tokio::test]
    async fn suffix_for_other_language_does_not_satisfy() {
        let (_tmp, store) = store_with_draft().await;
        store
            .write_text("htmlblog/20250101_000000-en.html", "<html/>", "text/html")
            .await
            .unwrap();

        let llm = ScriptedLlm::new(&[]);
        let outcome = run(&RedatorConfig::default(), &store, &llm, "en").await.unwrap();
        assert_eq!(outcome, StageOutcome::NothingToDo);

        let llm = ScriptedLlm::new(&["<html/>"]);
        let outcome = run(&RedatorConfig::default(), &store, &llm, "pt").await.unwrap();
        assert!(matches!(outcome, StageOutcome::Completed { .. }));
    }

    #[tokio::test]
    async fn draft_without_topics_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path().to_path_buf());
        store
            .write_text(
                "rascunho/20250101_000000.json",
                r#"{"theme": "", "topics": [], "draft": {}}"#,
                "application/json",
            )
            .await
            .unwrap();

        let llm = ScriptedLlm::new(&[]);
        let err = run(&RedatorConfig::default(), &store, &llm, "en").await.unwrap_err();
        assert!(matches!(err, RedatorError::Upstream { .. }));
        assert!(llm.requests().is_empty());
        assert!(store.list("htmlblog").await.unwrap().is_empty());
    }
}
