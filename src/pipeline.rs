//! Driver do pipeline: executa os estágios em ordem fixa, cada um como um
//! processo independente, e para no primeiro código de saída diferente de zero.

use std::fmt;
use std::io::Write;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::process::Command;
use tracing::{error, info};

use crate::error::Result;
use crate::ui::StageProgress;

/// Um estágio do pipeline, na ordem em que roda.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Head,
    Draft,
    Design,
    PublishBlog,
    PublishSocial,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.subcommand())
    }
}

impl Stage {
    /// Nome do subcomando que executa o estágio.
    pub fn subcommand(&self) -> &'static str {
        match self {
            Stage::Head => "head",
            Stage::Draft => "draft",
            Stage::Design => "design",
            Stage::PublishBlog => "publish-blog",
            Stage::PublishSocial => "publish-social",
        }
    }

    /// Argumentos da linha de comando do estágio. Só o design recebe o idioma.
    pub fn args(&self, lang: &str) -> Vec<String> {
        let mut args = vec![self.subcommand().to_string()];
        if *self == Stage::Design {
            args.push("--lang".into());
            args.push(lang.to_string());
        }
        args
    }
}

/// Sequência fixa; sem publicação, termina no design.
pub fn stage_sequence(include_publish: bool) -> Vec<Stage> {
    let mut stages = vec![Stage::Head, Stage::Draft, Stage::Design];
    if include_publish {
        stages.extend([Stage::PublishBlog, Stage::PublishSocial]);
    }
    stages
}

/// Um estágio já executado.
#[derive(Debug, Clone, Serialize)]
pub struct StageRun {
    pub stage: Stage,
    pub exit_code: i32,
    pub duration_ms: u64,
}

/// Relatório de uma execução do pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub lang: String,
    pub stages: Vec<StageRun>,
}

#[derive(Debug)]
pub enum PipelineOutcome {
    Completed(RunReport),
    /// `stage` saiu com `exit_code`; os estágios seguintes não rodaram.
    Failed {
        stage: Stage,
        exit_code: i32,
        report: RunReport,
    },
}

impl PipelineOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineOutcome::Completed(_) => 0,
            PipelineOutcome::Failed { exit_code, .. } => *exit_code,
        }
    }

    pub fn report(&self) -> &RunReport {
        match self {
            PipelineOutcome::Completed(report) => report,
            PipelineOutcome::Failed { report, .. } => report,
        }
    }
}

/// Executa um estágio e devolve seu código de saída.
pub trait StageRunner {
    async fn run_stage(&self, stage: Stage, args: &[String]) -> Result<i32>;
}

/// Executa cada estágio como processo filho (normalmente o próprio binário).
pub struct ProcessRunner {
    program: PathBuf,
    /// Argumentos repassados antes do subcomando (ex.: `--config`).
    base_args: Vec<String>,
}

impl ProcessRunner {
    pub fn new(program: PathBuf, base_args: Vec<String>) -> Self {
        Self { program, base_args }
    }
}

impl StageRunner for ProcessRunner {
    async fn run_stage(&self, stage: Stage, args: &[String]) -> Result<i32> {
        let progress = StageProgress::start(stage);
        let started = Instant::now();
        let output = Command::new(&self.program)
            .args(&self.base_args)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await;
        progress.clear();
        let output = output?;

        // A saída do filho só aparece depois que ele termina.
        std::io::stdout().write_all(&output.stdout)?;
        std::io::stderr().write_all(&output.stderr)?;

        // Sem código significa morto por sinal.
        let code = output.status.code().unwrap_or(1);
        progress.finish(stage, code, started.elapsed());
        Ok(code)
    }
}

pub struct PipelineDriver<R> {
    runner: R,
    stages: Vec<Stage>,
    lang: String,
}

impl<R: StageRunner> PipelineDriver<R> {
    pub fn new(runner: R, stages: Vec<Stage>, lang: impl Into<String>) -> Self {
        Self {
            runner,
            stages,
            lang: lang.into(),
        }
    }

    /// Roda os estágios em sequência. O primeiro código diferente de zero
    /// encerra a execução e é devolvido sem alteração.
    pub async fn run(&self) -> Result<PipelineOutcome> {
        let started_at = Utc::now();
        let mut runs = Vec::with_capacity(self.stages.len());

        for &stage in &self.stages {
            info!("Running stage: {stage}");
            let started = Instant::now();
            let exit_code = self
                .runner
                .run_stage(stage, &stage.args(&self.lang))
                .await?;
            runs.push(StageRun {
                stage,
                exit_code,
                duration_ms: started.elapsed().as_millis() as u64,
            });

            if exit_code != 0 {
                error!("Stage {stage} failed with exit code {exit_code}");
                return Ok(PipelineOutcome::Failed {
                    stage,
                    exit_code,
                    report: self.report(started_at, runs),
                });
            }
        }

        info!("Pipeline completed");
        Ok(PipelineOutcome::Completed(self.report(started_at, runs)))
    }

    fn report(&self, started_at: DateTime<Utc>, stages: Vec<StageRun>) -> RunReport {
        RunReport {
            started_at,
            completed_at: Utc::now(),
            lang: self.lang.clone(),
            stages,
        }
    }
}
