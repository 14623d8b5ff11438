//! Tipos de erro para o cliente da API OpenAI.
//!
//! Não há retentativas: qualquer uma destas variantes encerra o estágio atual.

use thiserror::Error;

/// Erros que podem ocorrer ao interagir com a API da OpenAI.
#[derive(Debug, Error)]
pub enum OpenAiError {
    /// Erro retornado pela API (ex.: 401 chave inválida, 429, 500).
    /// Contém o código de status HTTP e o corpo da resposta.
    #[error("API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    /// A API respondeu com sucesso mas sem texto ou sem URL de imagem.
    #[error("empty response from model {model}")]
    EmptyResponse { model: String },

    /// Falha de rede subjacente (DNS, conexão recusada, timeout) ou corpo ilegível.
    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}
