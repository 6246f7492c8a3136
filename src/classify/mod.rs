//! Statement Classification
//!
//! Decides whether a raw SQL string is a read statement or a mutating statement.
//!
//! # Strategy
//! - Textual heuristic, not a parse: only the leading keyword is inspected
//! - Leading whitespace and SQL comments are skipped first
//! - `SELECT`, `WITH`, `SHOW`, `DESCRIBE` and `EXPLAIN` are reads, everything else mutates
//!
//! Callers go through [`classify`] only, so the heuristic can be swapped for a real
//! parser without touching the executor's control flow.

/// Leading keywords that mark a read statement
const READ_KEYWORDS: &[&str] = &["SELECT", "WITH", "SHOW", "DESCRIBE", "EXPLAIN"];

/// Statement kind as seen by the query executor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// Returns rows; materialized into the tabular envelope
    Read,
    /// Everything else; reported as affected rows and last insert id
    Mutating,
}

/// Classify a SQL string by its leading keyword
#[must_use]
pub fn classify(sql: &str) -> StatementKind {
    let stripped = strip_comments(sql);
    let keyword = leading_keyword(&stripped).to_ascii_uppercase();

    if READ_KEYWORDS.contains(&keyword.as_str()) {
        StatementKind::Read
    } else {
        StatementKind::Mutating
    }
}

/// Detect a second statement after a `;`
///
/// Quoted strings, quoted identifiers and comments are skipped, so a `;`
/// inside them does not count. A trailing `;` followed only by whitespace is fine.
#[must_use]
pub fn has_trailing_statement(sql: &str) -> bool {
    let bytes = sql.as_bytes();
    let len = bytes.len();
    let mut i = 0;
    let mut found_semicolon = false;

    while i < len {
        match bytes[i] {
            quote @ (b'\'' | b'"' | b'`') => {
                if found_semicolon {
                    return true;
                }
                i += 1;
                while i < len {
                    if bytes[i] == quote {
                        i += 1;
                        // Doubled quote is an escaped quote
                        if i < len && bytes[i] == quote {
                            i += 1;
                        } else {
                            break;
                        }
                    } else {
                        i += 1;
                    }
                }
            }
            b'-' if i + 1 < len && bytes[i + 1] == b'-' => {
                i += 2;
                while i < len && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if i + 1 < len && bytes[i + 1] == b'*' => {
                i += 2;
                while i < len {
                    if i + 1 < len && bytes[i] == b'*' && bytes[i + 1] == b'/' {
                        i += 2;
                        break;
                    }
                    i += 1;
                }
            }
            b';' => {
                found_semicolon = true;
                i += 1;
            }
            b if b.is_ascii_whitespace() => i += 1,
            _ => {
                if found_semicolon {
                    return true;
                }
                i += 1;
            }
        }
    }

    false
}

/// Strip SQL comments from query
///
/// Handles:
/// - Line comments: -- comment
/// - Block comments: /* comment */
fn strip_comments(sql: &str) -> String {
    let mut result = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '-' if chars.peek() == Some(&'-') => {
                chars.next();
                for ch in chars.by_ref() {
                    if ch == '\n' {
                        result.push('\n');
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = ' ';
                for ch in chars.by_ref() {
                    if prev == '*' && ch == '/' {
                        break;
                    }
                    prev = ch;
                }
                result.push(' ');
            }
            _ => result.push(ch),
        }
    }

    result
}

/// First run of ASCII letters after leading whitespace (and an optional opening paren)
fn leading_keyword(sql: &str) -> &str {
    let trimmed = sql.trim_start().trim_start_matches('(').trim_start();
    let end = trimmed.find(|c: char| !c.is_ascii_alphabetic()).unwrap_or(trimmed.len());
    &trimmed[..end]
}
