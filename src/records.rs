//! Registros JSON trocados entre os estágios.
//!
//! [`Ficha`] é criada pelo estágio inicial e consumida pelo rascunho;
//! [`Rascunho`] acrescenta o mapa tópico → parágrafo. Ambos são gravados
//! com indentação de 2 espaços e sem escapar caracteres não-ASCII.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Cartão de pauta: um tema e até cinco tópicos, o último sendo a conclusão.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ficha {
    /// Presente apenas em fichas antigas; o nome do arquivo é a fonte de verdade.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    pub theme: String,
    pub topics: Vec<String>,
}

/// Ficha acrescida de um parágrafo por tópico, na ordem dos tópicos.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rascunho {
    #[serde(default)]
    pub timestamp: String,
    pub theme: String,
    pub topics: Vec<String>,
    pub draft: IndexMap<String, String>,
}

impl Rascunho {
    /// Monta o rascunho preservando tema e tópicos da ficha de origem.
    /// `base_name` é usado como timestamp quando a ficha não traz o seu.
    pub fn from_ficha(ficha: &Ficha, base_name: &str, draft: IndexMap<String, String>) -> Self {
        Self {
            timestamp: ficha
                .timestamp
                .clone()
                .unwrap_or_else(|| base_name.to_string()),
            theme: ficha.theme.clone(),
            topics: ficha.topics.clone(),
            draft,
        }
    }

    /// Tópicos sem parágrafo correspondente em `draft`.
    pub fn missing_topics(&self) -> Vec<&str> {
        self.topics
            .iter()
            .filter(|t| !self.draft.contains_key(t.as_str()))
            .map(String::as_str)
            .collect()
    }

    /// Parágrafo de um tópico, vazio se ausente.
    pub fn paragraph(&self, topic: &str) -> &str {
        self.draft.get(topic).map(String::as_str).unwrap_or("")
    }
}

/// Serializa com indentação de 2 espaços; não-ASCII é mantido literal.
pub fn to_pretty_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(value)
}
