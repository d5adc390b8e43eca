use crate::audit::AuditLogger;
use crate::config::Limits;
use crate::error::{ExecError, ExecResult};
use crate::exec::{Executor, Job, Scheduler};
use crate::report::{BatchReport, CandidateCommand, IterationHistory, aggregate};
use crate::security::{CommandValidator, Policy, ValidationOutcome};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Byte cap applied to each seed command's output in the initial context
pub const MAX_INITIAL_CONTEXT_OUTPUT: usize = 2000;

const README_FILES: &[&str] = &["README.md", "README.rst", "README.txt", "README"];

const MANIFEST_FILES: &[&str] = &[
    "pyproject.toml",
    "package.json",
    "Cargo.toml",
    "go.mod",
    "setup.py",
];

/// Validates, schedules and aggregates one batch of generated commands
/// against a fixed exploration root.
#[derive(Debug, Clone)]
pub struct BatchRunner {
    validator: CommandValidator,
    limits: Limits,
    root: PathBuf,
    audit: Option<AuditLogger>,
}

impl BatchRunner {
    pub fn new<P: AsRef<Path>>(policy: Arc<Policy>, limits: Limits, root: P) -> ExecResult<Self> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(ExecError::InvalidRoot(root.to_path_buf()));
        }
        let root = root.canonicalize()?;

        Ok(Self {
            validator: CommandValidator::new(policy),
            limits,
            root,
            audit: None,
        })
    }

    /// Record executions and rejections in an audit log
    pub fn with_audit(mut self, audit: AuditLogger) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    pub fn validator(&self) -> &CommandValidator {
        &self.validator
    }

    /// Cap the batch at `max_commands`, index the candidates and validate each.
    ///
    /// Returns the validated candidates and the number of strings dropped by
    /// the cap.
    pub fn validate_batch<S: AsRef<str>>(
        &self,
        raw: &[S],
    ) -> (Vec<(CandidateCommand, ValidationOutcome)>, usize) {
        let dropped = raw.len().saturating_sub(self.limits.max_commands);
        if dropped > 0 {
            tracing::warn!(
                dropped,
                max = self.limits.max_commands,
                "batch exceeds command limit, dropping extra commands"
            );
        }

        let validated = raw
            .iter()
            .take(self.limits.max_commands)
            .enumerate()
            .map(|(index, raw)| {
                let raw = raw.as_ref();
                let outcome = self.validator.validate(raw);
                if let ValidationOutcome::Rejected { reason, detail } = &outcome {
                    tracing::debug!(index, command = raw, %reason, "command rejected");
                    if let Some(audit) = &self.audit
                        && let Err(e) =
                            audit.log_rejection(raw, &reason.to_string(), detail, &self.root)
                    {
                        tracing::warn!(error = %e, "failed to write audit log");
                    }
                }
                (
                    CandidateCommand {
                        index,
                        raw: raw.to_string(),
                    },
                    outcome,
                )
            })
            .collect();

        (validated, dropped)
    }

    /// Validate, run and aggregate one batch
    pub async fn execute<S: AsRef<str>>(&self, raw: &[S], cancel: &CancellationToken) -> BatchReport {
        let (validated, dropped) = self.validate_batch(raw);

        let jobs: Vec<Job> = validated
            .iter()
            .filter_map(|(candidate, outcome)| match outcome {
                ValidationOutcome::Accepted(cmd) => Some(Job {
                    index: candidate.index,
                    argv: cmd.argv.clone(),
                }),
                ValidationOutcome::Rejected { .. } => None,
            })
            .collect();

        tracing::info!(
            candidates = validated.len(),
            accepted = jobs.len(),
            dropped,
            root = %self.root.display(),
            "running batch"
        );

        let scheduler = Scheduler::new(
            Executor::new(
                &self.root,
                self.limits.command_timeout(),
                self.limits.max_output_per_command,
            ),
            self.limits.max_parallel,
            self.limits.max_total_output,
        );
        let slots = scheduler.run(jobs, validated.len(), cancel).await;
        let report = aggregate(validated, slots, dropped, self.limits.max_total_output);

        if let Some(audit) = &self.audit {
            for (record, result) in report.executed() {
                if let Err(e) = audit.log_execution(&record.candidate.raw, &self.root, result) {
                    tracing::warn!(error = %e, "failed to write audit log");
                }
            }
        }

        tracing::info!(
            valid = report.summary.valid,
            rejected = report.summary.rejected,
            timed_out = report.summary.timed_out,
            budget_skipped = report.summary.budget_skipped,
            total_bytes = report.summary.total_bytes,
            "batch finished"
        );

        report
    }

    /// Run one round and fold it into a copy of `history`
    pub async fn run<S: AsRef<str>>(
        &self,
        raw: &[S],
        history: &IterationHistory,
        cancel: &CancellationToken,
    ) -> (BatchReport, IterationHistory) {
        let report = self.execute(raw, cancel).await;
        let history = history.record(&report);
        (report, history)
    }

    /// Run the seed commands and render them as `$ <command>` blocks.
    ///
    /// Each output is capped at [`MAX_INITIAL_CONTEXT_OUTPUT`] bytes. Commands
    /// that failed to start are left out of the text but kept in the report.
    pub async fn initial_context(&self, cancel: &CancellationToken) -> (String, BatchReport) {
        let commands = seed_commands(&self.root);
        let report = self.execute(&commands, cancel).await;

        let mut lines = Vec::new();
        for (record, result) in report.executed() {
            if result.error.is_some() {
                continue;
            }
            lines.push(format!("$ {}", record.candidate.raw));
            let output = result.display_output();
            lines.push(truncate_at_char_boundary(&output, MAX_INITIAL_CONTEXT_OUTPUT).to_string());
            lines.push(String::new());
        }

        (lines.join("\n"), report)
    }
}

/// Commands run before the first generated batch: the directory layout, the
/// first README found and the first project manifest found.
pub fn seed_commands(root: &Path) -> Vec<String> {
    let mut commands = vec![
        "tree -L 2 --noreport".to_string(),
        "tree -L 3 -d --noreport".to_string(),
    ];

    if let Some(readme) = README_FILES.iter().find(|f| root.join(f).exists()) {
        commands.push(format!("head -n 200 {}", readme));
    }

    if let Some(manifest) = MANIFEST_FILES.iter().find(|f| root.join(f).exists()) {
        commands.push(format!("cat {}", manifest));
    }

    commands
}

fn truncate_at_char_boundary(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
