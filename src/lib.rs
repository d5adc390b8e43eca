pub mod audit;
pub mod batch;
pub mod config;
pub mod error;
pub mod exec;
pub mod explore;
pub mod generator;
pub mod report;
pub mod security;
pub mod utils;

// Re-export commonly used types for convenience
pub use batch::{BatchRunner, seed_commands};
pub use config::{Config, Limits};
pub use error::{AppError, AppResult, ExecError};
pub use explore::{CommandSource, Exploration, Explorer, SourceError};
pub use report::{BatchReport, BatchSummary, ExecutionResult, IterationHistory};
pub use security::{CommandValidator, Policy, RejectReason, ValidationOutcome};
