//! Configuração do redator carregada de `redator.toml` e do ambiente.
//!
//! A struct [`RedatorConfig`] é construída uma vez no início do processo e
//! passada por referência a cada estágio. Precedência, da menor para a maior:
//! defaults embutidos, arquivo TOML, variáveis de ambiente (incluindo `.env`).
//! Valores obrigatórios só são verificados pelo estágio que precisa deles,
//! através dos métodos `require_*`.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::error::RedatorError;

/// Onde os blobs vivem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Google Cloud Storage (padrão).
    #[default]
    Gcs,
    /// Diretório local com a mesma estrutura de pastas.
    Local,
}

impl FromStr for StorageBackend {
    type Err = RedatorError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gcs" => Ok(StorageBackend::Gcs),
            "local" => Ok(StorageBackend::Local),
            other => Err(RedatorError::Config(format!(
                "STORAGE_BACKEND must be 'gcs' or 'local', got '{other}'"
            ))),
        }
    }
}

/// Como o estágio de rascunho pede os parágrafos ao modelo.
/// Escolhido por implantação; as duas estratégias nunca são encadeadas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DraftStrategy {
    /// Uma chamada por tópico, um parágrafo por chamada.
    #[default]
    PerTopic,
    /// Uma chamada para a ficha inteira, resposta em JSON estrito.
    SingleCall,
}

impl FromStr for DraftStrategy {
    type Err = RedatorError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "per-topic" => Ok(DraftStrategy::PerTopic),
            "single-call" => Ok(DraftStrategy::SingleCall),
            other => Err(RedatorError::Config(format!(
                "DRAFT_STRATEGY must be 'per-topic' or 'single-call', got '{other}'"
            ))),
        }
    }
}

/// Nomes das pastas de cada estágio dentro do bucket.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FolderConfig {
    pub ficha: String,
    pub rascunho: String,
    pub html: String,
}

impl Default for FolderConfig {
    fn default() -> Self {
        Self {
            ficha: "fichaum".into(),
            rascunho: "rascunho".into(),
            html: "htmlblog".into(),
        }
    }
}

/// Identificadores de modelo por estágio.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub head: String,
    pub draft: String,
    pub design: String,
    /// Modelo de chat do texto promocional.
    pub social: String,
    pub image: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            head: "o3-2025-04-16".into(),
            draft: "gpt-4.1".into(),
            design: "gpt-4.1".into(),
            social: "gpt-4o".into(),
            image: "dall-e-3".into(),
        }
    }
}

/// Configuração de nível superior.
#[derive(Debug, Clone, Deserialize)]
pub struct RedatorConfig {
    #[serde(default)]
    pub bucket_name: Option<String>,

    /// Arquivo de chave de conta de serviço do GCP.
    #[serde(default)]
    pub auth_json_path: Option<PathBuf>,

    /// Token de acesso já emitido; dispensa a chave de conta de serviço.
    #[serde(default)]
    pub gcs_access_token: Option<String>,

    #[serde(default)]
    pub storage_backend: StorageBackend,

    #[serde(default = "default_local_storage_dir")]
    pub local_storage_dir: PathBuf,

    #[serde(default)]
    pub folders: FolderConfig,

    #[serde(default)]
    pub openai_api_key: Option<String>,

    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: String,

    #[serde(default)]
    pub models: ModelConfig,

    #[serde(default)]
    pub draft_strategy: DraftStrategy,

    /// Quantas fichas anteriores o estágio inicial envia como contexto.
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    /// Arquivo de token OAuth do Blogger (reescrito a cada renovação).
    #[serde(default)]
    pub blogger_token_file: Option<PathBuf>,

    #[serde(default)]
    pub blog_id: Option<String>,

    #[serde(default = "default_blogger_base_url")]
    pub blogger_base_url: String,

    #[serde(default)]
    pub linkedin_access_token: Option<String>,

    #[serde(default)]
    pub linkedin_organization_urn: Option<String>,

    #[serde(default)]
    pub linkedin_person_urn: Option<String>,

    #[serde(default = "default_linkedin_base_url")]
    pub linkedin_base_url: String,

    /// Persona em primeira pessoa usada no texto do LinkedIn.
    #[serde(default = "default_linkedin_persona")]
    pub linkedin_persona: String,
}

fn default_local_storage_dir() -> PathBuf {
    PathBuf::from("bucket")
}

fn default_openai_base_url() -> String {
    crate::openai::client::API_URL.to_string()
}

// Cinco fichas anteriores como contexto.
fn default_history_window() -> usize {
    5
}

fn default_blogger_base_url() -> String {
    crate::blogger::API_URL.to_string()
}

fn default_linkedin_base_url() -> String {
    crate::linkedin::API_URL.to_string()
}

fn default_linkedin_persona() -> String {
    "o autor do blog, especialista em estatística, machine learning e IA generativa".to_string()
}

impl Default for RedatorConfig {
    fn default() -> Self {
        Self {
            bucket_name: None,
            auth_json_path: None,
            gcs_access_token: None,
            storage_backend: StorageBackend::default(),
            local_storage_dir: default_local_storage_dir(),
            folders: FolderConfig::default(),
            openai_api_key: None,
            openai_base_url: default_openai_base_url(),
            models: ModelConfig::default(),
            draft_strategy: DraftStrategy::default(),
            history_window: default_history_window(),
            blogger_token_file: None,
            blog_id: None,
            blogger_base_url: default_blogger_base_url(),
            linkedin_access_token: None,
            linkedin_organization_urn: None,
            linkedin_person_urn: None,
            linkedin_base_url: default_linkedin_base_url(),
            linkedin_persona: default_linkedin_persona(),
        }
    }
}

impl RedatorConfig {
    /// Carrega `path`, ou `redator.toml` no diretório atual se existir,
    /// e aplica as variáveis de ambiente por cima.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let default_path = Path::new("redator.toml");
        let file = match path {
            Some(p) => Some(p),
            None if default_path.exists() => Some(default_path),
            None => None,
        };

        let mut config = match file {
            Some(p) => {
                let contents = std::fs::read_to_string(p)
                    .with_context(|| format!("failed to read {}", p.display()))?;
                toml::from_str::<RedatorConfig>(&contents)
                    .with_context(|| format!("failed to parse {}", p.display()))?
            }
            None => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Sobrepõe os campos com as variáveis presentes. Valores vazios são ignorados.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> std::result::Result<(), RedatorError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("BUCKET_NAME") {
            self.bucket_name = Some(v);
        }
        if let Some(v) = get("AUTH_JSON_PATH") {
            self.auth_json_path = Some(PathBuf::from(v));
        }
        if let Some(v) = get("GCS_ACCESS_TOKEN") {
            self.gcs_access_token = Some(v);
        }
        if let Some(v) = get("STORAGE_BACKEND") {
            self.storage_backend = v.parse()?;
        }
        if let Some(v) = get("LOCAL_STORAGE_DIR") {
            self.local_storage_dir = PathBuf::from(v);
        }
        if let Some(v) = get("FICHAUM_FOLDER") {
            self.folders.ficha = v;
        }
        if let Some(v) = get("RASCUNHO_FOLDER") {
            self.folders.rascunho = v;
        }
        if let Some(v) = get("HTML_FOLDER") {
            self.folders.html = v;
        }
        if let Some(v) = get("OPENAI_API_KEY") {
            self.openai_api_key = Some(v);
        }
        if let Some(v) = get("OPENAI_BASE_URL") {
            self.openai_base_url = v;
        }
        // Um único OPENAI_MODEL vale para os três estágios de texto.
        if let Some(v) = get("OPENAI_MODEL") {
            self.models.head = v.clone();
            self.models.draft = v.clone();
            self.models.design = v;
        }
        if let Some(v) = get("OPENAI_CHAT_MODEL") {
            self.models.social = v;
        }
        if let Some(v) = get("OPENAI_IMAGE_MODEL") {
            self.models.image = v;
        }
        if let Some(v) = get("DRAFT_STRATEGY") {
            self.draft_strategy = v.parse()?;
        }
        if let Some(v) = get("BLOGGER_TOKEN_FILE") {
            self.blogger_token_file = Some(PathBuf::from(v));
        }
        if let Some(v) = get("BLOG_ID") {
            self.blog_id = Some(v);
        }
        if let Some(v) = get("LINKEDIN_ACCESS_TOKEN") {
            self.linkedin_access_token = Some(v);
        }
        if let Some(v) = get("LINKEDIN_ORGANIZATION_URN") {
            self.linkedin_organization_urn = Some(v);
        }
        if let Some(v) = get("LINKEDIN_PERSON_URN") {
            self.linkedin_person_urn = Some(v);
        }
        if let Some(v) = get("LINKEDIN_PERSONA") {
            self.linkedin_persona = v;
        }
        Ok(())
    }

    pub fn require_bucket(&self) -> std::result::Result<&str, RedatorError> {
        required(self.bucket_name.as_deref(), "BUCKET_NAME")
    }

    pub fn require_auth_json_path(&self) -> std::result::Result<&Path, RedatorError> {
        self.auth_json_path.as_deref().ok_or_else(|| {
            RedatorError::Config("AUTH_JSON_PATH is not set (or set GCS_ACCESS_TOKEN)".into())
        })
    }

    pub fn require_openai_key(&self) -> std::result::Result<&str, RedatorError> {
        required(self.openai_api_key.as_deref(), "OPENAI_API_KEY")
    }

    pub fn require_blogger_token_file(&self) -> std::result::Result<&Path, RedatorError> {
        self.blogger_token_file
            .as_deref()
            .ok_or_else(|| RedatorError::Config("BLOGGER_TOKEN_FILE is not set".into()))
    }

    pub fn require_blog_id(&self) -> std::result::Result<&str, RedatorError> {
        required(self.blog_id.as_deref(), "BLOG_ID")
    }

    pub fn require_linkedin_token(&self) -> std::result::Result<&str, RedatorError> {
        required(self.linkedin_access_token.as_deref(), "LINKEDIN_ACCESS_TOKEN")
    }

    /// URN do autor das publicações: organização, se houver, senão pessoa.
    pub fn require_linkedin_author(&self) -> std::result::Result<&str, RedatorError> {
        self.linkedin_organization_urn
            .as_deref()
            .or(self.linkedin_person_urn.as_deref())
            .ok_or_else(|| {
                RedatorError::Config(
                    "set LINKEDIN_ORGANIZATION_URN or LINKEDIN_PERSON_URN".into(),
                )
            })
    }
}

fn required<'a>(value: Option<&'a str>, key: &str) -> std::result::Result<&'a str, RedatorError> {
    value.ok_or_else(|| RedatorError::Config(format!("{key} is not set")))
}
