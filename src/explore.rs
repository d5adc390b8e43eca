use crate::batch::BatchRunner;
use crate::config::HistoryLimits;
use crate::report::{BatchReport, GeneratorFeedback, IterationHistory};
use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Errors raised by a command source
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Command generation failed: {0}")]
    GenerationFailed(String),

    #[error("Invalid generator response: {0}")]
    InvalidResponse(String),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Anything that proposes the next batch of commands, typically a language
/// model prompted with the previous rounds.
#[async_trait]
pub trait CommandSource: Send + Sync {
    /// Propose raw commands for the next round. An empty batch ends the session.
    async fn propose(&self, feedback: &GeneratorFeedback) -> Result<Vec<String>, SourceError>;
}

/// Reports from every round plus the final history
#[derive(Debug, Clone)]
pub struct Exploration {
    pub reports: Vec<BatchReport>,
    pub history: IterationHistory,
}

/// Sequences batch rounds, feeding each round's history back to the source
pub struct Explorer {
    runner: BatchRunner,
    history_limits: HistoryLimits,
}

impl Explorer {
    pub fn new(runner: BatchRunner, history_limits: HistoryLimits) -> Self {
        Self {
            runner,
            history_limits,
        }
    }

    pub fn runner(&self) -> &BatchRunner {
        &self.runner
    }

    /// Run rounds until `max_iterations`, an empty proposal, or cancellation
    pub async fn explore(
        &self,
        source: &dyn CommandSource,
        max_iterations: usize,
        cancel: &CancellationToken,
    ) -> Result<Exploration, SourceError> {
        let mut history = IterationHistory::new();
        let mut reports = Vec::new();

        while history.should_continue(max_iterations) && !cancel.is_cancelled() {
            let feedback = history.feedback(&self.history_limits);
            let commands = source.propose(&feedback).await?;
            if commands.is_empty() {
                tracing::info!(iteration = history.iterations(), "source proposed no commands");
                break;
            }

            let (report, next) = self.runner.run(commands.as_slice(), &history, cancel).await;
            tracing::info!(
                iteration = next.iterations(),
                accepted = next.accepted().len(),
                rejected = next.rejected().len(),
                "exploration round finished"
            );
            reports.push(report);
            history = next;
        }

        Ok(Exploration { reports, history })
    }
}
