use crate::exec::SlotResult;
use crate::report::model::{
    BatchReport, BatchSummary, CandidateCommand, CommandRecord, SkipReason,
};
use crate::security::ValidationOutcome;

/// Merges validation outcomes and scheduler slots into a [`BatchReport`].
///
/// Records must be pushed in index order; a record whose index does not follow
/// the previous one is logged and dropped. Output already captured is always
/// kept, even when it carries the running total past the budget.
#[derive(Debug)]
pub struct Aggregator {
    max_total_output: usize,
    records: Vec<CommandRecord>,
    summary: BatchSummary,
}

impl Aggregator {
    pub fn new(max_total_output: usize) -> Self {
        Self {
            max_total_output,
            records: Vec::new(),
            summary: BatchSummary::default(),
        }
    }

    pub fn push(
        &mut self,
        candidate: CandidateCommand,
        outcome: ValidationOutcome,
        slot: Option<SlotResult>,
    ) {
        if candidate.index != self.records.len() {
            tracing::error!(
                index = candidate.index,
                expected = self.records.len(),
                "record pushed out of order"
            );
            return;
        }
        self.summary.generated += 1;

        let (execution, skipped) = match (&outcome, slot) {
            (ValidationOutcome::Rejected { .. }, _) => {
                self.summary.rejected += 1;
                (None, None)
            }
            (ValidationOutcome::Accepted(_), Some(SlotResult::Ran(result))) => {
                self.summary.valid += 1;
                if result.timed_out {
                    self.summary.timed_out += 1;
                }
                if result.cancelled {
                    self.summary.cancelled += 1;
                }
                self.summary.total_bytes += result.emitted_bytes();
                if !self.summary.budget_reached && self.summary.total_bytes >= self.max_total_output {
                    self.summary.budget_reached = true;
                    tracing::debug!(
                        index = candidate.index,
                        total = self.summary.total_bytes,
                        "output budget reached"
                    );
                }
                (Some(result), None)
            }
            (ValidationOutcome::Accepted(_), Some(SlotResult::Skipped(reason))) => {
                self.summary.valid += 1;
                self.count_skip(reason);
                (None, Some(reason))
            }
            // Accepted but never handed to the scheduler: treat as cancelled
            (ValidationOutcome::Accepted(_), None) => {
                self.summary.valid += 1;
                self.count_skip(SkipReason::Cancelled);
                (None, Some(SkipReason::Cancelled))
            }
        };

        self.records.push(CommandRecord {
            candidate,
            outcome,
            execution,
            skipped,
        });
    }

    fn count_skip(&mut self, reason: SkipReason) {
        match reason {
            SkipReason::BudgetExceeded => {
                self.summary.budget_skipped += 1;
                self.summary.budget_reached = true;
            }
            SkipReason::Cancelled => self.summary.cancelled += 1,
        }
    }

    /// Finish the batch; `dropped` counts candidates beyond the batch size cap
    pub fn finish(mut self, dropped: usize) -> BatchReport {
        self.summary.dropped = dropped;
        BatchReport {
            records: self.records,
            summary: self.summary,
        }
    }
}

/// Build a report from parallel vectors of validation outcomes and slots
pub fn aggregate(
    validated: Vec<(CandidateCommand, ValidationOutcome)>,
    slots: Vec<Option<SlotResult>>,
    dropped: usize,
    max_total_output: usize,
) -> BatchReport {
    let mut aggregator = Aggregator::new(max_total_output);
    let mut slots = slots.into_iter();
    for (candidate, outcome) in validated {
        let slot = slots.next().flatten();
        aggregator.push(candidate, outcome, slot);
    }
    aggregator.finish(dropped)
}
