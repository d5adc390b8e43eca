use thiserror::Error;

/// Errors produced while splitting a command string into argv tokens
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Empty command")]
    Empty,

    #[error("Unterminated single quote starting at byte {0}")]
    UnterminatedSingleQuote(usize),

    #[error("Unterminated double quote starting at byte {0}")]
    UnterminatedDoubleQuote(usize),

    #[error("Trailing backslash with nothing to escape")]
    TrailingBackslash,
}

/// Split a raw command string into argv-like tokens.
///
/// Word splitting follows POSIX shell quoting rules, but nothing is ever
/// expanded: `$VAR`, `$(...)`, backticks, globs and `~` survive verbatim so the
/// validator can see them. Shell operators such as `|` or `;` are ordinary
/// characters here.
pub fn tokenize(input: &str) -> Result<Vec<String>, ParseError> {
    if input.trim().is_empty() {
        return Err(ParseError::Empty);
    }

    let mut tokens = Vec::new();
    let mut current = String::new();
    // A quoted empty string ('' or "") still produces a token
    let mut in_word = false;
    let mut chars = input.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        match c {
            c if c.is_whitespace() => {
                if in_word {
                    tokens.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            '\'' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some((_, '\'')) => break,
                        Some((_, ch)) => current.push(ch),
                        None => return Err(ParseError::UnterminatedSingleQuote(pos)),
                    }
                }
            }
            '"' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some((_, '"')) => break,
                        Some((_, '\\')) => match chars.next() {
                            Some((_, '\n')) => {}
                            Some((_, esc @ ('"' | '\\' | '$' | '`'))) => current.push(esc),
                            Some((_, other)) => {
                                current.push('\\');
                                current.push(other);
                            }
                            None => return Err(ParseError::UnterminatedDoubleQuote(pos)),
                        },
                        Some((_, ch)) => current.push(ch),
                        None => return Err(ParseError::UnterminatedDoubleQuote(pos)),
                    }
                }
            }
            '\\' => match chars.next() {
                // Line continuation
                Some((_, '\n')) => {}
                Some((_, ch)) => {
                    in_word = true;
                    current.push(ch);
                }
                None => return Err(ParseError::TrailingBackslash),
            },
            other => {
                in_word = true;
                current.push(other);
            }
        }
    }

    if in_word {
        tokens.push(current);
    }

    if tokens.is_empty() {
        return Err(ParseError::Empty);
    }

    Ok(tokens)
}
