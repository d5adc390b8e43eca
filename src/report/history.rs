use crate::config::HistoryLimits;
use crate::report::model::BatchReport;
use crate::security::ValidationOutcome;
use serde::{Deserialize, Serialize};

/// A rejected command remembered across iterations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedCommand {
    pub command: String,
    pub reason: String,
}

/// Accepted and rejected commands across the rounds of one exploration session.
///
/// Owned by whoever sequences the rounds. Recording a batch returns a new
/// value; the original is left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationHistory {
    accepted: Vec<String>,
    rejected: Vec<RejectedCommand>,
    iterations: usize,
}

/// History rendered for the next round's command generator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GeneratorFeedback {
    pub iteration: usize,
    /// Most recent accepted commands, one per line
    pub accepted_commands: String,
    /// Most recent rejections as `- <command> (<reason>)` lines
    pub rejected_commands: String,
    pub accepted_count: usize,
}

impl IterationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of this history with `report` appended as the next iteration
    pub fn record(&self, report: &BatchReport) -> Self {
        let mut next = self.clone();
        for record in &report.records {
            match &record.outcome {
                ValidationOutcome::Accepted(_) => next.accepted.push(record.candidate.raw.clone()),
                ValidationOutcome::Rejected { reason, detail } => {
                    next.rejected.push(RejectedCommand {
                        command: record.candidate.raw.clone(),
                        reason: format!("{}: {}", reason, detail),
                    })
                }
            }
        }
        next.iterations += 1;
        next
    }

    pub fn accepted(&self) -> &[String] {
        &self.accepted
    }

    pub fn rejected(&self) -> &[RejectedCommand] {
        &self.rejected
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn should_continue(&self, max_iterations: usize) -> bool {
        self.iterations < max_iterations
    }

    pub fn feedback(&self, limits: &HistoryLimits) -> GeneratorFeedback {
        let accepted = tail(&self.accepted, limits.max_accepted);
        let rejected = tail(&self.rejected, limits.max_rejected);

        GeneratorFeedback {
            iteration: self.iterations,
            accepted_commands: accepted.join("\n"),
            rejected_commands: rejected
                .iter()
                .map(|r| format!("- {} ({})", r.command, r.reason))
                .collect::<Vec<_>>()
                .join("\n"),
            accepted_count: self.accepted.len(),
        }
    }
}

impl GeneratorFeedback {
    /// Plain-text form for a generator prompt or a terminal
    pub fn render(&self) -> String {
        let mut out = format!(
            "iteration {} ({} accepted so far)\n",
            self.iteration, self.accepted_count
        );
        if !self.accepted_commands.is_empty() {
            out.push_str("accepted:\n");
            out.push_str(&self.accepted_commands);
            out.push('\n');
        }
        if !self.rejected_commands.is_empty() {
            out.push_str("rejected:\n");
            out.push_str(&self.rejected_commands);
            out.push('\n');
        }
        out
    }
}

fn tail<T>(items: &[T], n: usize) -> &[T] {
    &items[items.len().saturating_sub(n)..]
}
