//! Identifier Guard
//!
//! Table and column names cannot be bound as parameters, so they are
//! interpolated into generated SQL. Every identifier goes through [`quote`] first;
//! this is the only place raw string interpolation is allowed.

use crate::error::{DeskError, Result};

/// `SQLite` identifier delimiter
pub const DELIMITER: char = '"';

/// Validate an identifier and return its delimited form
///
/// Rejects empty identifiers, identifiers containing the delimiter, and
/// identifiers containing control characters (including NUL).
pub fn quote(identifier: &str) -> Result<String> {
    if identifier.is_empty() {
        return Err(DeskError::invalid_identifier("identifier cannot be empty"));
    }

    if identifier.contains(DELIMITER) {
        return Err(DeskError::invalid_identifier(format!(
            "{identifier:?} contains the identifier delimiter"
        )));
    }

    if identifier.chars().any(char::is_control) {
        return Err(DeskError::invalid_identifier(format!(
            "{identifier:?} contains a control character"
        )));
    }

    Ok(format!("{DELIMITER}{identifier}{DELIMITER}"))
}

/// Quote every identifier, joined by `", "`
pub fn quote_list<'a>(identifiers: impl IntoIterator<Item = &'a str>) -> Result<String> {
    let quoted = identifiers.into_iter().map(quote).collect::<Result<Vec<_>>>()?;
    Ok(quoted.join(", "))
}
