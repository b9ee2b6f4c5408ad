//! Command-string parsing for subprocess nodes
//!
//! Two behaviors, matching the engine's command contract:
//!
//! - [`needs_shell`] detects shell metacharacters. A command containing any
//!   of `| > < && || ; ` $ ( )` is handed to `sh -c` verbatim.
//! - [`split_command`] tokenizes everything else on whitespace, honoring
//!   single and double quotes. There is no backslash-escape support - a
//!   command that needs escapes also needs a shell.

/// Whether `command` must be interpreted by `sh -c`.
pub fn needs_shell(command: &str) -> bool {
    command.contains("&&")
        || command.contains("||")
        || command
            .chars()
            .any(|c| matches!(c, '|' | '>' | '<' | ';' | '`' | '$' | '(' | ')'))
}

/// Split a plain command string into an argument vector.
///
/// Whitespace separates tokens; single- and double-quoted spans keep their
/// content (quotes stripped) including embedded whitespace. An unclosed
/// quote runs to the end of the string.
pub fn split_command(command: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quote: Option<char> = None;

    for c in command.chars() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                } else {
                    current.push(c);
                }
            }
            None => match c {
                '\'' | '"' => {
                    quote = Some(c);
                    in_token = true;
                }
                c if c.is_whitespace() => {
                    if in_token {
                        tokens.push(std::mem::take(&mut current));
                        in_token = false;
                    }
                }
                c => {
                    current.push(c);
                    in_token = true;
                }
            },
        }
    }
    if in_token {
        tokens.push(current);
    }
    tokens
}
