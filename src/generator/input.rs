/// Extract candidate commands from raw generator output.
///
/// A JSON array of strings is taken as-is. Anything else is read line by line:
/// blank lines and `#` comments are skipped, a leading `- ` list marker and
/// surrounding backticks are stripped.
pub fn parse_generated_commands(text: &str) -> Vec<String> {
    if let Ok(commands) = serde_json::from_str::<Vec<String>>(text.trim()) {
        return commands;
    }

    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| {
            let line = line.strip_prefix("- ").unwrap_or(line).trim_start();
            line.trim_matches('`').to_string()
        })
        .filter(|line| !line.is_empty())
        .collect()
}
