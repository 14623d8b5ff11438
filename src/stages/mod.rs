//! Os cinco estágios do pipeline. Cada um lê trabalho pendente de uma pasta,
//! transforma via LLM e grava em outra pasta (ou publica externamente).

pub mod design;
pub mod draft;
pub mod head;
pub mod publish_blog;
pub mod publish_social;

use std::fmt;

/// Resultado de um estágio que terminou sem erro.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    /// Algo foi gravado ou publicado; `output` descreve onde.
    Completed { output: String },
    /// Não havia item pendente. Não é um erro.
    NothingToDo,
}

impl fmt::Display for StageOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageOutcome::Completed { output } => write!(f, "completed: {output}"),
            StageOutcome::NothingToDo => write!(f, "nothing to do"),
        }
    }
}
