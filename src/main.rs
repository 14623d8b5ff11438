mod blogger;
mod cli;
mod config;
mod error;
mod html;
mod linkedin;
mod openai;
mod pipeline;
mod records;
mod resolver;
mod stages;
mod storage;
mod ui;

use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command};
use config::RedatorConfig;
use error::{RedatorError, Result};
use openai::OpenAiClient;
use pipeline::{PipelineDriver, ProcessRunner, Stage, stage_sequence};
use stages::StageOutcome;
use storage::Storage;

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn openai_client(config: &RedatorConfig) -> Result<OpenAiClient> {
    let key = config.require_openai_key()?;
    Ok(OpenAiClient::with_base_url(
        key.to_string(),
        config.openai_base_url.clone(),
    )?)
}

fn http_client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .build()?)
}

async fn run_stage(config: &RedatorConfig, stage: Stage, lang: &str) -> Result<StageOutcome> {
    let store = Storage::from_config(config)?;
    match stage {
        Stage::Head => {
            let llm = openai_client(config)?;
            stages::head::run(config, &store, &llm, Utc::now()).await
        }
        Stage::Draft => {
            let llm = openai_client(config)?;
            stages::draft::run(config, &store, &llm).await
        }
        Stage::Design => {
            let llm = openai_client(config)?;
            stages::design::run(config, &store, &llm, lang).await
        }
        Stage::PublishBlog => {
            let images = openai_client(config)?;
            stages::publish_blog::run(config, &store, &images, &http_client()?).await
        }
        Stage::PublishSocial => {
            let llm = openai_client(config)?;
            stages::publish_social::run(config, &store, &llm, &http_client()?).await
        }
    }
}

/// Re-executa este binário uma vez por estágio, repassando as flags globais.
async fn run_pipeline(
    config_path: Option<&Path>,
    verbose: bool,
    lang: String,
    skip_publish: bool,
) -> Result<i32> {
    let mut base_args = Vec::new();
    if let Some(path) = config_path {
        base_args.push("--config".to_string());
        base_args.push(path.display().to_string());
    }
    if verbose {
        base_args.push("--verbose".to_string());
    }

    let runner = ProcessRunner::new(std::env::current_exe()?, base_args);
    let driver = PipelineDriver::new(runner, stage_sequence(!skip_publish), lang);
    let outcome = driver.run().await?;
    ui::print_report(&outcome);
    Ok(outcome.exit_code())
}

fn log_error(err: &RedatorError) {
    error!("{err}");
    if let Some(payload) = err.payload() {
        error!("Raw response:\n{payload}");
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match RedatorConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("{e:#}");
            return ExitCode::FAILURE;
        }
    };

    let (stage, lang) = match cli.command {
        Command::Run { lang, skip_publish } => {
            let result = run_pipeline(cli.config.as_deref(), cli.verbose, lang, skip_publish).await;
            return match result {
                Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
                Err(e) => {
                    log_error(&e);
                    ExitCode::FAILURE
                }
            };
        }
        Command::Head => (Stage::Head, String::new()),
        Command::Draft => (Stage::Draft, String::new()),
        Command::Design { lang } => (Stage::Design, lang),
        Command::PublishBlog => (Stage::PublishBlog, String::new()),
        Command::PublishSocial => (Stage::PublishSocial, String::new()),
    };

    match run_stage(&config, stage, &lang).await {
        Ok(outcome) => {
            info!("{stage}: {outcome}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            log_error(&e);
            ExitCode::FAILURE
        }
    }
}
