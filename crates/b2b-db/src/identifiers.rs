//! SQL identifier validation for names that end up interpolated into queries.
//!
//! Table names cannot be bound as parameters, so anything coming from the
//! command line or environment goes through [`validate_identifier`] first.

use b2b_core::{Error, Result};

/// PostgreSQL truncates identifiers beyond this many bytes.
pub const MAX_IDENTIFIER_LEN: usize = 63;

const RESERVED: &[&str] = &[
    "pg_catalog",
    "information_schema",
    "select",
    "insert",
    "update",
    "delete",
    "drop",
    "create",
    "alter",
    "table",
    "truncate",
    "user",
];

/// Accept only `[A-Za-z_][A-Za-z0-9_]*` names of at most 63 bytes that are
/// not reserved words.
///
/// ```
/// use b2b_db::validate_identifier;
///
/// assert!(validate_identifier("customer").is_ok());
/// assert!(validate_identifier("customer; drop table x").is_err());
/// ```
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidInput("identifier cannot be empty".to_string()));
    }
    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(Error::InvalidInput(format!(
            "identifier exceeds {} character limit: {} characters",
            MAX_IDENTIFIER_LEN,
            name.len()
        )));
    }

    let mut chars = name.chars();
    if let Some(first) = chars.next() {
        if !first.is_ascii_alphabetic() && first != '_' {
            return Err(Error::InvalidInput(format!(
                "identifier must start with a letter or underscore, found: '{}'",
                first
            )));
        }
    }
    if let Some(bad) = name.chars().find(|c| !c.is_ascii_alphanumeric() && *c != '_') {
        return Err(Error::InvalidInput(format!(
            "identifier contains invalid character: '{}'",
            bad
        )));
    }

    if RESERVED.contains(&name.to_ascii_lowercase().as_str()) {
        return Err(Error::InvalidInput(format!(
            "identifier '{}' is a reserved word",
            name
        )));
    }
    Ok(())
}
