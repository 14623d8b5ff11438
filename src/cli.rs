//! Interface de linha de comando do redator baseada em clap.
//!
//! Um subcomando por estágio, mais `run`, que encadeia todos eles.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::stages::design::DEFAULT_LANG;

/// Redator: pipeline de geração e publicação de artigos de blog via LLM.
#[derive(Debug, Parser)]
#[command(name = "redator", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Arquivo TOML de configuração (padrão: ./redator.toml, se existir).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Habilita logs de depuração.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Propõe tema e tópicos do próximo artigo.
    Head,

    /// Escreve os parágrafos da ficha pendente mais antiga.
    Draft,

    /// Gera o HTML do rascunho pendente mais antigo.
    Design {
        /// Idioma do conteúdo (ex.: en, pt).
        #[arg(long, default_value = DEFAULT_LANG)]
        lang: String,
    },

    /// Publica o HTML mais recente no Blogger.
    PublishBlog,

    /// Divulga o último post do blog no LinkedIn.
    PublishSocial,

    /// Executa todos os estágios em sequência, cada um em seu próprio processo.
    Run {
        /// Idioma repassado ao estágio de design.
        #[arg(long, default_value = DEFAULT_LANG)]
        lang: String,

        /// Para após o design, sem publicar.
        #[arg(long, default_value_t = false)]
        skip_publish: bool,
    },
}
