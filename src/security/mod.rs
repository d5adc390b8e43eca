pub mod policy;
pub mod tokenizer;
pub mod validator;

pub use policy::{BlockedPattern, CommandRule, GitRules, PatternScope, Policy, PolicyConfig, PolicyError};
pub use tokenizer::{ParseError, tokenize};
pub use validator::{CommandValidator, RejectReason, ValidatedCommand, ValidationOutcome};
