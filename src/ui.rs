//! Interface de terminal do driver do pipeline: spinners e saída colorida.
//!
//! Usa `indicatif` para o spinner de cada estágio e `console` para as
//! marcas de sucesso/falha e o relatório final.

use std::time::Duration;

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::pipeline::{PipelineOutcome, Stage};

/// Spinner exibido enquanto um estágio roda como processo filho.
pub struct StageProgress {
    pb: ProgressBar,
    green: Style,
    red: Style,
}

impl StageProgress {
    pub fn start(stage: Stage) -> Self {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(format!("{stage}..."));
        pb.enable_steady_tick(Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
        }
    }

    /// Remove o spinner antes de reproduzir a saída do filho.
    pub fn clear(&self) {
        self.pb.finish_and_clear();
    }

    /// Verde com ✓ para código zero; vermelho com ✗ e o código caso contrário.
    pub fn finish(&self, stage: Stage, exit_code: i32, elapsed: Duration) {
        self.pb.finish_and_clear();
        let secs = elapsed.as_secs_f64();
        if exit_code == 0 {
            eprintln!("  {} {stage} ({secs:.1}s)", self.green.apply_to("✓"));
        } else {
            eprintln!(
                "  {} {stage} exited with code {exit_code} ({secs:.1}s)",
                self.red.apply_to("✗")
            );
        }
    }
}

/// Imprime o relatório da execução em JSON, com o título colorido pelo resultado.
pub fn print_report(outcome: &PipelineOutcome) {
    let style = match outcome {
        PipelineOutcome::Completed(_) => Style::new().green().bold(),
        PipelineOutcome::Failed { .. } => Style::new().red().bold(),
    };
    eprintln!();
    eprintln!("{}", style.apply_to("─── Run Report ───"));
    eprintln!(
        "{}",
        serde_json::to_string_pretty(outcome.report()).unwrap_or_default()
    );
}
