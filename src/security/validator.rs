use crate::security::policy::{CommandRule, Policy};
use crate::security::tokenizer::tokenize;
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::Arc;

/// Why a candidate command was refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    ParseError,
    BlockedPattern(String),
    CommandNotAllowlisted,
    FlagNotAllowed,
    GitSubcommandNotAllowed,
    GitSubcommandRequiresFlagsOnly,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::ParseError => f.write_str("parse_error"),
            RejectReason::BlockedPattern(name) => write!(f, "blocked_pattern:{}", name),
            RejectReason::CommandNotAllowlisted => f.write_str("command_not_allowlisted"),
            RejectReason::FlagNotAllowed => f.write_str("flag_not_allowed"),
            RejectReason::GitSubcommandNotAllowed => f.write_str("git_subcommand_not_allowed"),
            RejectReason::GitSubcommandRequiresFlagsOnly => {
                f.write_str("git_subcommand_requires_flags_only")
            }
        }
    }
}

impl Serialize for RejectReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A command that passed every rule, ready to spawn without a shell
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidatedCommand {
    pub command: String,
    pub argv: Vec<String>,
}

impl ValidatedCommand {
    pub fn program(&self) -> &str {
        &self.argv[0]
    }

    pub fn args(&self) -> &[String] {
        &self.argv[1..]
    }
}

/// Result of validating one candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ValidationOutcome {
    Accepted(ValidatedCommand),
    Rejected { reason: RejectReason, detail: String },
}

impl ValidationOutcome {
    fn rejected(reason: RejectReason, detail: impl Into<String>) -> Self {
        ValidationOutcome::Rejected {
            reason,
            detail: detail.into(),
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, ValidationOutcome::Accepted(_))
    }

    pub fn reason(&self) -> Option<&RejectReason> {
        match self {
            ValidationOutcome::Accepted(_) => None,
            ValidationOutcome::Rejected { reason, .. } => Some(reason),
        }
    }
}

/// Validates candidate commands against a [`Policy`].
///
/// Validation is a pure function of the command string and the policy: no I/O,
/// no clock, so it can run ahead of and independently from execution.
#[derive(Debug, Clone)]
pub struct CommandValidator {
    policy: Arc<Policy>,
}

impl CommandValidator {
    pub fn new(policy: Arc<Policy>) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// Validate a raw command string, short-circuiting on the first failing rule
    pub fn validate(&self, raw: &str) -> ValidationOutcome {
        let tokens = match tokenize(raw) {
            Ok(tokens) => tokens,
            Err(e) => return ValidationOutcome::rejected(RejectReason::ParseError, e.to_string()),
        };

        if let Some(pattern) = self
            .policy
            .blocked_patterns()
            .iter()
            .find(|p| p.matches(raw, &tokens))
        {
            return ValidationOutcome::rejected(
                RejectReason::BlockedPattern(pattern.name.clone()),
                pattern.description.clone(),
            );
        }

        let base = tokens[0].as_str();
        let Some(rule) = self.policy.command(base) else {
            return ValidationOutcome::rejected(
                RejectReason::CommandNotAllowlisted,
                format!("command not in allowlist: {}", base),
            );
        };

        let checked = if base == "git" {
            self.check_git(rule, &tokens)
        } else {
            check_flags(rule, &tokens[1..])
        };

        match checked {
            Ok(()) => ValidationOutcome::Accepted(ValidatedCommand {
                command: raw.trim().to_string(),
                argv: tokens,
            }),
            Err(rejected) => rejected,
        }
    }

    fn check_git(&self, rule: &CommandRule, tokens: &[String]) -> Result<(), ValidationOutcome> {
        let git = self.policy.git();
        let Some(subcommand) = tokens.get(1) else {
            return Err(ValidationOutcome::rejected(
                RejectReason::GitSubcommandNotAllowed,
                "git command requires a subcommand",
            ));
        };
        let rest = &tokens[2..];

        if git.list_only.contains(subcommand) {
            for token in rest {
                if !token.starts_with('-') {
                    return Err(ValidationOutcome::rejected(
                        RejectReason::GitSubcommandRequiresFlagsOnly,
                        format!("git {}: only listing allowed, no arguments ({})", subcommand, token),
                    ));
                }
                if !rule.allows_flag(token) {
                    return Err(ValidationOutcome::rejected(
                        RejectReason::GitSubcommandRequiresFlagsOnly,
                        format!("git {}: unrecognized flag {}", subcommand, token),
                    ));
                }
            }
            return Ok(());
        }

        if git.full.contains(subcommand) {
            return check_flags(rule, rest);
        }

        Err(ValidationOutcome::rejected(
            RejectReason::GitSubcommandNotAllowed,
            format!("git subcommand not allowed: {}", subcommand),
        ))
    }
}

/// Every flag-looking token must be permitted by the rule; positional
/// arguments already passed the blocklist scan.
fn check_flags(rule: &CommandRule, args: &[String]) -> Result<(), ValidationOutcome> {
    for arg in args {
        if arg == "--" {
            break;
        }
        if arg.len() > 1 && arg.starts_with('-') && !rule.allows_flag(arg) {
            return Err(ValidationOutcome::rejected(
                RejectReason::FlagNotAllowed,
                format!("flag not allowed: {}", arg),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> CommandValidator {
        CommandValidator::new(Arc::new(Policy::read_only_default().unwrap()))
    }

    fn reason(raw: &str) -> Option<String> {
        validator().validate(raw).reason().map(|r| r.to_string())
    }

    #[test]
    fn test_validate_simple_command() {
        let outcome = validator().validate("rg -i TODO src/");
        match outcome {
            ValidationOutcome::Accepted(cmd) => {
                assert_eq!(cmd.command, "rg -i TODO src/");
                assert_eq!(cmd.program(), "rg");
                assert_eq!(cmd.args(), ["-i", "TODO", "src/"]);
            }
            other => panic!("expected accepted, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_error_short_circuits() {
        // Would also match the pipe rule, but tokenizing fails first
        assert_eq!(reason("cat 'a | b").as_deref(), Some("parse_error"));
        assert_eq!(reason("").as_deref(), Some("parse_error"));
        assert_eq!(reason("   ").as_deref(), Some("parse_error"));
    }

    #[test]
    fn test_pipe() {
        assert_eq!(
            reason("cat file.txt | grep foo").as_deref(),
            Some("blocked_pattern:pipe")
        );
    }

    #[test]
    fn test_chaining() {
        for raw in ["ls; id", "ls && id", "ls || id"] {
            assert_eq!(reason(raw).as_deref(), Some("blocked_pattern:chaining"), "{}", raw);
        }
    }

    #[test]
    fn test_substitution() {
        assert_eq!(
            reason("git log $(whoami)").as_deref(),
            Some("blocked_pattern:command_substitution")
        );
        assert_eq!(reason("git log `whoami`").as_deref(), Some("blocked_pattern:backtick"));
    }

    #[test]
    fn test_redirection() {
        assert_eq!(
            reason("git log > /tmp/out").as_deref(),
            Some("blocked_pattern:redirection")
        );
        assert_eq!(reason("cat < secrets").as_deref(), Some("blocked_pattern:redirection"));
    }

    #[test]
    fn test_dangerous_command() {
        assert_eq!(
            reason("rm -rf /").as_deref(),
            Some("blocked_pattern:dangerous_command")
        );
        assert_eq!(
            reason("sudo ls").as_deref(),
            Some("blocked_pattern:dangerous_command")
        );
    }

    #[test]
    fn test_environment() {
        assert_eq!(reason("export FOO=1").as_deref(), Some("blocked_pattern:environment"));
        assert_eq!(reason("source .env").as_deref(), Some("blocked_pattern:environment"));
    }

    #[test]
    fn test_path_escape() {
        assert_eq!(
            reason("ls ../../etc").as_deref(),
            Some("blocked_pattern:path_escape")
        );
        assert_eq!(
            reason("cat ../../../etc/passwd").as_deref(),
            Some("blocked_pattern:path_escape")
        );
    }

    #[test]
    fn test_home_escape_carve_out() {
        assert_eq!(reason("cat ~/file.txt").as_deref(), Some("blocked_pattern:home_escape"));
        assert_eq!(reason("ls ~").as_deref(), Some("blocked_pattern:home_escape"));
        assert_eq!(reason("cat '~/quoted'").as_deref(), Some("blocked_pattern:home_escape"));
        assert_eq!(
            reason("cat /~user/file.txt").as_deref(),
            Some("blocked_pattern:user_home")
        );
        assert_eq!(reason("git diff HEAD~1"), None);
        assert_eq!(reason("git show HEAD~1:file.py"), None);
    }

    #[test]
    fn test_variable_expansion() {
        assert_eq!(
            reason("git log $HOME").as_deref(),
            Some("blocked_pattern:variable_expansion")
        );
        assert_eq!(
            reason("git log ${HOME}").as_deref(),
            Some("blocked_pattern:variable_expansion")
        );
        // Regex anchors are fine
        assert_eq!(reason("rg 'fn main$' src"), None);
    }

    #[test]
    fn test_not_allowlisted() {
        assert_eq!(reason("python script.py").as_deref(), Some("command_not_allowlisted"));
        assert_eq!(reason("grep foo bar").as_deref(), Some("command_not_allowlisted"));
    }

    #[test]
    fn test_flag_not_allowed() {
        assert_eq!(reason("rg --pre ./x foo").as_deref(), Some("flag_not_allowed"));
        assert_eq!(reason("ls -laZ").as_deref(), Some("flag_not_allowed"));
        assert_eq!(reason("cat -v file").as_deref(), Some("flag_not_allowed"));
    }

    #[test]
    fn test_flag_families() {
        assert_eq!(reason("head -n50 README.md"), None);
        assert_eq!(reason("head -n 50 README.md"), None);
        assert_eq!(reason("head -50 README.md"), None);
        assert_eq!(reason("ls -la src/"), None);
        assert_eq!(reason("rg -tpy foo"), None);
    }

    #[test]
    fn test_double_dash_ends_flags() {
        assert_eq!(reason("rg -- -weird-pattern src"), None);
        assert_eq!(reason("cat -"), None);
    }

    #[test]
    fn test_git_full_subcommands() {
        assert_eq!(reason("git blame -L 1,30 src/core.py"), None);
        assert_eq!(reason("git log --oneline -20"), None);
        assert_eq!(reason("git log --since=2.weeks --stat"), None);
        assert_eq!(reason("git rev-parse --abbrev-ref HEAD"), None);
    }

    #[test]
    fn test_git_format_flags_rejected() {
        assert_eq!(reason("git log --format='%s'").as_deref(), Some("flag_not_allowed"));
        assert_eq!(reason("git log --pretty=oneline").as_deref(), Some("flag_not_allowed"));
    }

    #[test]
    fn test_git_list_only() {
        assert_eq!(reason("git branch -a"), None);
        assert_eq!(reason("git remote -v"), None);
        assert_eq!(
            reason("git branch --list-arg").as_deref(),
            Some("git_subcommand_requires_flags_only")
        );
        assert_eq!(
            reason("git branch newbranch").as_deref(),
            Some("git_subcommand_requires_flags_only")
        );
        assert_eq!(
            reason("git tag -l 'v1.*'").as_deref(),
            Some("git_subcommand_requires_flags_only")
        );
    }

    #[test]
    fn test_git_list_only_bundled_flags() {
        assert_eq!(reason("git branch -av"), None);
        assert_eq!(reason("git branch -vv"), None);
        assert_eq!(reason("git tag -l --merged"), None);
        assert_eq!(
            reason("git branch -dv").as_deref(),
            Some("git_subcommand_requires_flags_only")
        );
    }

    #[test]
    fn test_quote_split_traversal_rejected() {
        for raw in ["ls .'.'", "cat .\"\"./file.txt", "ls .\\./", "cat \".\".\"/etc/passwd\""] {
            assert_eq!(
                reason(raw).as_deref(),
                Some("blocked_pattern:path_escape"),
                "{}",
                raw
            );
        }
    }

    #[test]
    fn test_quote_split_home_and_variables_rejected() {
        assert_eq!(
            reason("cat /'~'root/.bashrc").as_deref(),
            Some("blocked_pattern:user_home")
        );
        assert_eq!(reason("ls '~'").as_deref(), Some("blocked_pattern:home_escape"));
        assert_eq!(
            reason("rg x r''m").as_deref(),
            Some("blocked_pattern:dangerous_command")
        );
    }

    #[test]
    fn test_git_subcommand_not_allowed() {
        assert_eq!(reason("git").as_deref(), Some("git_subcommand_not_allowed"));
        assert_eq!(reason("git commit -m x").as_deref(), Some("git_subcommand_not_allowed"));
        assert_eq!(reason("git -C /etc status").as_deref(), Some("git_subcommand_not_allowed"));
    }

    #[test]
    fn test_deterministic() {
        let v = validator();
        for raw in ["rg -i TODO src/", "git branch x", "ls ../", "tree -L 2"] {
            assert_eq!(v.validate(raw), v.validate(raw));
        }
    }

    #[test]
    fn test_reason_strings() {
        assert_eq!(
            RejectReason::BlockedPattern("pipe".to_string()).to_string(),
            "blocked_pattern:pipe"
        );
        assert_eq!(
            serde_json::to_string(&RejectReason::FlagNotAllowed).unwrap(),
            "\"flag_not_allowed\""
        );
    }
}
