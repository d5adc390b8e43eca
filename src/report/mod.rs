pub mod aggregator;
pub mod history;
pub mod model;

pub use aggregator::{Aggregator, aggregate};
pub use history::{GeneratorFeedback, IterationHistory, RejectedCommand};
pub use model::{
    BatchReport, BatchSummary, CandidateCommand, CommandRecord, ExecutionResult, SkipReason,
};
