//! Object name rules.

use std::collections::BTreeSet;

use thiserror::Error;

use crate::tracking::CANDIDATE_KEY;

/// Characters allowed in an object name (compared case-insensitively).
pub const VALID_CHARS: &str = "0123456789abcdefghijklmnopqrstuvwxyz- ";

/// Names that can never be used for an object.
pub const RESERVED_NAMES: [&str; 2] = [CANDIDATE_KEY, "Robot Marker"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    #[error("please enter a name")]
    Empty,
    #[error("You cannot have the following characters in your object name: {0}")]
    InvalidChars(String),
    #[error("There is already an object named {0}!")]
    Taken(String),
}

/// Normalize a user-entered name and check it against the rules.
///
/// The first letter is upper-cased and underscores become spaces. Returns the
/// normalized name.
pub fn validate_name<S: AsRef<str>>(raw: &str, existing: &[S]) -> Result<String, NameError> {
    let raw = raw.trim();
    let mut chars = raw.chars();
    let Some(first) = chars.next() else {
        return Err(NameError::Empty);
    };
    let name: String = first
        .to_uppercase()
        .chain(chars)
        .map(|c| if c == '_' { ' ' } else { c })
        .collect();

    let invalid: BTreeSet<char> = name
        .chars()
        .filter(|c| !c.is_ascii() || !VALID_CHARS.contains(c.to_ascii_lowercase()))
        .collect();
    if !invalid.is_empty() {
        return Err(NameError::InvalidChars(invalid.into_iter().collect()));
    }

    let taken = RESERVED_NAMES.iter().any(|r| *r == name)
        || existing.iter().any(|e| e.as_ref() == name);
    if taken {
        return Err(NameError::Taken(name));
    }
    Ok(name)
}
