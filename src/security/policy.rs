use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Built-in read-only exploration policy
const DEFAULT_POLICY_TOML: &str = include_str!("default_policy.toml");

/// Errors raised while loading or compiling a policy.
///
/// These are the only fatal validation-side errors: a policy that fails to
/// load aborts the run before any command is looked at.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("Failed to read policy file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse policy file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid pattern '{name}': {source}")]
    InvalidPattern {
        name: String,
        #[source]
        source: regex::Error,
    },

    #[error("Duplicate blocked pattern name: {0}")]
    DuplicatePattern(String),

    #[error("Invalid policy: {0}")]
    Invalid(String),
}

/// Where a blocked pattern is evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternScope {
    /// Against the raw command string
    #[default]
    Raw,
    /// Against every token after quote removal
    Token,
    /// Against the raw string and every token; catches forms that quoting
    /// splits in the raw text (`.'.'` becomes `..`)
    Both,
}

/// Serialized form of one allowlisted command
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CommandRuleConfig {
    pub description: String,
    pub syntax: String,
    pub flags: Vec<String>,
    pub value_flags: Vec<String>,
    pub count_shorthand: bool,
    pub examples: Vec<String>,
}

/// Serialized form of the git subcommand rules
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct GitRulesConfig {
    pub full: Vec<String>,
    pub list_only: Vec<String>,
}

/// Serialized form of one blocked pattern
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BlockedPatternConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub pattern: String,
    #[serde(default)]
    pub scope: PatternScope,
}

/// Serialization-agnostic policy description.
///
/// Anything that can produce this struct can feed [`Policy::from_config`];
/// TOML is only the format used by the bundled loader.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PolicyConfig {
    #[serde(default)]
    pub commands: BTreeMap<String, CommandRuleConfig>,
    #[serde(default)]
    pub git: Option<GitRulesConfig>,
    #[serde(default)]
    pub blocked: Vec<BlockedPatternConfig>,
}

/// Flags permitted for one base command
#[derive(Debug, Clone, Default)]
pub struct CommandRule {
    pub description: String,
    pub syntax: String,
    /// Flags that stand alone (`-l`, `--oneline`)
    pub flags: BTreeSet<String>,
    /// Flags that take a value, attached (`-n50`, `--since=2.weeks`) or as the next token
    pub value_flags: BTreeSet<String>,
    /// Accept numeric count flags such as `-20`
    pub count_shorthand: bool,
    pub examples: Vec<String>,
}

impl CommandRule {
    /// Whether `token` (which starts with `-`) is an allowed flag for this command.
    pub fn allows_flag(&self, token: &str) -> bool {
        if self.flags.contains(token) || self.value_flags.contains(token) {
            return true;
        }

        if let Some(long) = token.strip_prefix("--") {
            return match long.split_once('=') {
                Some((name, _)) => self.value_flags.contains(&format!("--{}", name)),
                None => false,
            };
        }

        let Some(short) = token.strip_prefix('-') else {
            return false;
        };

        if short.is_empty() {
            return false;
        }

        if self.count_shorthand && short.bytes().all(|b| b.is_ascii_digit()) {
            return true;
        }

        // Bundled short flags: every letter must be allowed, and a value flag
        // swallows the remainder as its attached value.
        let mut buf = [0u8; 4];
        for ch in short.chars() {
            let flag = format!("-{}", ch.encode_utf8(&mut buf));
            if self.value_flags.contains(&flag) {
                return true;
            }
            if !self.flags.contains(&flag) {
                return false;
            }
        }
        true
    }
}

/// Git subcommand rules
#[derive(Debug, Clone, Default)]
pub struct GitRules {
    /// Subcommands allowed with any safe arguments
    pub full: BTreeSet<String>,
    /// Subcommands allowed with flags only
    pub list_only: BTreeSet<String>,
}

/// A named rule rejecting commands of a dangerous lexical shape
#[derive(Debug, Clone)]
pub struct BlockedPattern {
    pub name: String,
    pub description: String,
    pub scope: PatternScope,
    pub matcher: Regex,
}

impl BlockedPattern {
    /// Evaluate the rule against a command and its tokens
    pub fn matches(&self, raw: &str, tokens: &[String]) -> bool {
        match self.scope {
            PatternScope::Raw => self.matcher.is_match(raw),
            PatternScope::Token => tokens.iter().any(|t| self.matcher.is_match(t)),
            PatternScope::Both => {
                self.matcher.is_match(raw) || tokens.iter().any(|t| self.matcher.is_match(t))
            }
        }
    }
}

/// Immutable security policy shared by every validation in a run
#[derive(Debug, Clone)]
pub struct Policy {
    allowlist: BTreeMap<String, CommandRule>,
    git: GitRules,
    blocked_patterns: Vec<BlockedPattern>,
}

impl Policy {
    /// Compile a policy description, rejecting inconsistent configurations
    pub fn from_config(config: PolicyConfig) -> Result<Self, PolicyError> {
        if config.commands.is_empty() {
            return Err(PolicyError::Invalid(
                "allowlist must contain at least one command".to_string(),
            ));
        }

        let mut allowlist = BTreeMap::new();
        for (name, rule) in config.commands {
            if name.trim().is_empty() || name.chars().any(char::is_whitespace) {
                return Err(PolicyError::Invalid(format!(
                    "invalid command name: '{}'",
                    name
                )));
            }
            for flag in rule.flags.iter().chain(rule.value_flags.iter()) {
                if !flag.starts_with('-') || flag.len() < 2 {
                    return Err(PolicyError::Invalid(format!(
                        "flag '{}' for '{}' must start with '-'",
                        flag, name
                    )));
                }
            }
            allowlist.insert(
                name,
                CommandRule {
                    description: rule.description,
                    syntax: rule.syntax,
                    flags: rule.flags.into_iter().collect(),
                    value_flags: rule.value_flags.into_iter().collect(),
                    count_shorthand: rule.count_shorthand,
                    examples: rule.examples,
                },
            );
        }

        let git = match config.git {
            Some(git) => {
                if !allowlist.contains_key("git") {
                    return Err(PolicyError::Invalid(
                        "git subcommand rules given but 'git' is not allowlisted".to_string(),
                    ));
                }
                let full: BTreeSet<String> = git.full.into_iter().collect();
                let list_only: BTreeSet<String> = git.list_only.into_iter().collect();
                if let Some(both) = full.intersection(&list_only).next() {
                    return Err(PolicyError::Invalid(format!(
                        "git subcommand '{}' is both full and list_only",
                        both
                    )));
                }
                GitRules { full, list_only }
            }
            None => GitRules::default(),
        };

        let mut seen = HashSet::new();
        let mut blocked_patterns = Vec::with_capacity(config.blocked.len());
        for pattern in config.blocked {
            if pattern.name.trim().is_empty() {
                return Err(PolicyError::Invalid(
                    "blocked pattern name must not be empty".to_string(),
                ));
            }
            if !seen.insert(pattern.name.clone()) {
                return Err(PolicyError::DuplicatePattern(pattern.name));
            }
            let matcher =
                Regex::new(&pattern.pattern).map_err(|source| PolicyError::InvalidPattern {
                    name: pattern.name.clone(),
                    source,
                })?;
            blocked_patterns.push(BlockedPattern {
                name: pattern.name,
                description: pattern.description,
                scope: pattern.scope,
                matcher,
            });
        }

        Ok(Self {
            allowlist,
            git,
            blocked_patterns,
        })
    }

    /// Parse and compile a TOML policy
    pub fn from_toml_str(contents: &str) -> Result<Self, PolicyError> {
        let config: PolicyConfig = toml::from_str(contents)?;
        Self::from_config(config)
    }

    /// Load a TOML policy file
    pub fn load(path: &Path) -> Result<Self, PolicyError> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// The built-in read-only exploration policy
    pub fn read_only_default() -> Result<Self, PolicyError> {
        Self::from_toml_str(DEFAULT_POLICY_TOML)
    }

    pub fn command(&self, name: &str) -> Option<&CommandRule> {
        self.allowlist.get(name)
    }

    pub fn commands(&self) -> impl Iterator<Item = (&str, &CommandRule)> {
        self.allowlist.iter().map(|(name, rule)| (name.as_str(), rule))
    }

    pub fn git(&self) -> &GitRules {
        &self.git
    }

    pub fn blocked_patterns(&self) -> &[BlockedPattern] {
        &self.blocked_patterns
    }
}
