use crate::security::ValidationOutcome;
use serde::{Serialize, Serializer};
use std::time::Duration;

/// One raw command proposed for execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateCommand {
    pub index: usize,
    pub raw: String,
}

/// Outcome of running one accepted command
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecutionResult {
    /// `None` when the process was killed by a signal or never started
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
    pub duration: Duration,
    pub timed_out: bool,
    pub cancelled: bool,
    pub truncated: bool,
    /// Spawn or I/O failure, recorded per command
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionResult {
    /// Captured bytes counted against the batch budget
    pub fn emitted_bytes(&self) -> usize {
        self.stdout.len() + self.stderr.len()
    }

    pub fn success(&self) -> bool {
        self.exit_code == Some(0) && !self.timed_out && !self.cancelled
    }

    /// Text shown for this command in the aggregated report
    pub fn display_output(&self) -> String {
        let body = if !self.stdout.is_empty() {
            self.stdout.as_str()
        } else if !self.stderr.is_empty() {
            self.stderr.as_str()
        } else {
            ""
        };

        let mut text = if self.timed_out {
            String::from("(timeout)")
        } else if self.cancelled {
            String::from("(cancelled)")
        } else if let Some(ref error) = self.error {
            format!("(error: {})", error)
        } else if body.is_empty() {
            String::from("(no output)")
        } else {
            return body.to_string();
        };

        if !body.is_empty() {
            text.push('\n');
            text.push_str(body);
        }
        text
    }
}

fn serialize_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}

/// Why an accepted command was never run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    BudgetExceeded,
    Cancelled,
}

/// Everything known about one candidate after the batch finished
#[derive(Debug, Clone, Serialize)]
pub struct CommandRecord {
    pub candidate: CandidateCommand,
    pub outcome: ValidationOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution: Option<ExecutionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<SkipReason>,
}

/// Counters for observability
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    /// Candidates validated (after the batch size cap)
    pub generated: usize,
    /// Candidates beyond the batch size cap
    pub dropped: usize,
    pub valid: usize,
    pub rejected: usize,
    pub timed_out: usize,
    pub budget_skipped: usize,
    pub cancelled: usize,
    pub total_bytes: usize,
    /// Captured output reached `max_total_output`
    pub budget_reached: bool,
}

/// Ordered per-command outcomes for one batch
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub records: Vec<CommandRecord>,
    pub summary: BatchSummary,
}

impl BatchReport {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn executed(&self) -> impl Iterator<Item = (&CommandRecord, &ExecutionResult)> {
        self.records
            .iter()
            .filter_map(|r| r.execution.as_ref().map(|e| (r, e)))
    }

    /// Aggregated text for the downstream extraction step
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (record, result) in self.executed() {
            out.push_str(&format_section(&record.candidate.raw, &result.display_output()));
        }
        out
    }
}

pub(crate) fn format_section(command: &str, output: &str) -> String {
    format!("\n### {}\n```\n{}\n```\n", command, output)
}
