use crate::security::Policy;

/// Describe every allowlisted command for the generator prompt
pub fn allowlist_prompt(policy: &Policy) -> String {
    let mut lines = vec!["## Allowed Commands\n".to_string()];

    for (name, rule) in policy.commands() {
        lines.push(format!("### {}", name));
        lines.push(rule.description.clone());
        lines.push(format!("Syntax: `{}`", rule.syntax));

        if name == "git" {
            let git = policy.git();
            if !git.full.is_empty() {
                lines.push(format!(
                    "Allowed subcommands: {}",
                    git.full.iter().cloned().collect::<Vec<_>>().join(", ")
                ));
            }
            if !git.list_only.is_empty() {
                lines.push(format!(
                    "Flags-only subcommands: {}",
                    git.list_only.iter().cloned().collect::<Vec<_>>().join(", ")
                ));
            }
        }

        let flags: Vec<&str> = rule
            .flags
            .iter()
            .chain(rule.value_flags.iter())
            .map(String::as_str)
            .collect();
        lines.push(format!("Allowed flags: {}", flags.join(", ")));

        if !rule.examples.is_empty() {
            lines.push("Examples:".to_string());
            for example in &rule.examples {
                lines.push(format!("  - `{}`", example));
            }
        }
        lines.push(String::new());
    }

    lines.join("\n")
}

/// List the blocklist rules for the generator prompt
pub fn blocked_patterns_prompt(policy: &Policy) -> String {
    let mut lines =
        vec!["The following patterns are BLOCKED and will cause command rejection:".to_string()];
    for pattern in policy.blocked_patterns() {
        let description = if pattern.description.is_empty() {
            pattern.name.as_str()
        } else {
            pattern.description.as_str()
        };
        lines.push(format!("- {}", description));
    }
    lines.join("\n")
}
