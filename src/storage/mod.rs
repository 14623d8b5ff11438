//! Armazenamento de blobs em "pastas" (prefixos) de um bucket.
//!
//! O trait [`BlobStore`] é a única superfície usada pelos estágios. Há duas
//! implementações: [`GcsStore`] (Google Cloud Storage via API JSON) e
//! [`LocalStore`] (um diretório local com a mesma convenção de nomes).
//! O enum [`Storage`] escolhe entre elas a partir da configuração.

mod auth;
mod gcs;
mod local;

use thiserror::Error;

use crate::config::{RedatorConfig, StorageBackend};
use crate::error::RedatorError;

pub use auth::TokenSource;
pub use gcs::GcsStore;
pub use local::LocalStore;

/// Erros do armazenamento de blobs.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("storage returned status {status}: {body}")]
    Http { status: u16, body: String },

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("object {0} is not valid UTF-8")]
    Encoding(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JWT signing error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Operações de blob usadas pelos estágios. Nomes são caminhos completos
/// dentro do bucket (`"pasta/arquivo.ext"`).
pub trait BlobStore {
    /// Lista os nomes sob `folder/`, sem ordem garantida.
    async fn list(&self, folder: &str) -> Result<Vec<String>, StorageError>;

    async fn read_bytes(&self, name: &str) -> Result<Vec<u8>, StorageError>;

    async fn read_text(&self, name: &str) -> Result<String, StorageError> {
        let bytes = self.read_bytes(name).await?;
        String::from_utf8(bytes).map_err(|_| StorageError::Encoding(name.to_string()))
    }

    /// Grava o conteúdo, sobrescrevendo qualquer objeto com o mesmo nome.
    async fn write(&self, name: &str, data: &[u8], content_type: &str)
    -> Result<(), StorageError>;

    async fn write_text(
        &self,
        name: &str,
        text: &str,
        content_type: &str,
    ) -> Result<(), StorageError> {
        self.write(name, text.as_bytes(), content_type).await
    }

    async fn exists(&self, name: &str) -> Result<bool, StorageError>;

    /// Falha se o bucket não estiver acessível com as credenciais atuais.
    async fn check_access(&self) -> Result<(), StorageError>;

    /// Torna o objeto legível publicamente e devolve sua URL pública.
    async fn make_public(&self, name: &str) -> Result<String, StorageError>;

    /// Descrição legível do local do objeto, usada apenas em logs.
    fn location(&self, name: &str) -> String;
}

/// Backend selecionado em tempo de execução.
pub enum Storage {
    Gcs(GcsStore),
    Local(LocalStore),
}

impl Storage {
    pub fn from_config(config: &RedatorConfig) -> Result<Self, RedatorError> {
        match config.storage_backend {
            StorageBackend::Local => Ok(Storage::Local(LocalStore::new(
                config.local_storage_dir.clone(),
            ))),
            StorageBackend::Gcs => {
                let bucket = config.require_bucket()?.to_string();
                let tokens = if let Some(token) = &config.gcs_access_token {
                    TokenSource::from_token(token.clone())
                } else {
                    let path = config.require_auth_json_path()?;
                    TokenSource::from_key_file(path)?
                };
                Ok(Storage::Gcs(GcsStore::new(bucket, tokens)?))
            }
        }
    }
}

impl BlobStore for Storage {
    async fn list(&self, folder: &str) -> Result<Vec<String>, StorageError> {
        match self {
            Storage::Gcs(s) => s.list(folder).await,
            Storage::Local(s) => s.list(folder).await,
        }
    }

    async fn read_bytes(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        match self {
            Storage::Gcs(s) => s.read_bytes(name).await,
            Storage::Local(s) => s.read_bytes(name).await,
        }
    }

    async fn write(
        &self,
        name: &str,
        data: &[u8],
        content_type: &str,
    ) -> Result<(), StorageError> {
        match self {
            Storage::Gcs(s) => s.write(name, data, content_type).await,
            Storage::Local(s) => s.write(name, data, content_type).await,
        }
    }

    async fn exists(&self, name: &str) -> Result<bool, StorageError> {
        match self {
            Storage::Gcs(s) => s.exists(name).await,
            Storage::Local(s) => s.exists(name).await,
        }
    }

    async fn check_access(&self) -> Result<(), StorageError> {
        match self {
            Storage::Gcs(s) => s.check_access().await,
            Storage::Local(s) => s.check_access().await,
        }
    }

    async fn make_public(&self, name: &str) -> Result<String, StorageError> {
        match self {
            Storage::Gcs(s) => s.make_public(name).await,
            Storage::Local(s) => s.make_public(name).await,
        }
    }

    fn location(&self, name: &str) -> String {
        match self {
            Storage::Gcs(s) => s.location(name),
            Storage::Local(s) => s.location(name),
        }
    }
}
