//! NATS subject patterns.
//!
//! Subjects are `.`-separated tokens. In patterns, `*` matches exactly one
//! token and `>` matches one or more trailing tokens.

use crate::error::{PermsError, Result};

pub const SINGLE_WILDCARD: &str = "*";
pub const FULL_WILDCARD: &str = ">";

/// Check that `subject` is a well formed subject or pattern.
pub fn validate_subject(subject: &str) -> Result<()> {
    let invalid = |reason| PermsError::InvalidSubject {
        subject: subject.to_string(),
        reason,
    };

    if subject.is_empty() {
        return Err(invalid("empty subject"));
    }
    if subject.chars().any(char::is_whitespace) {
        return Err(invalid("contains whitespace"));
    }

    let tokens: Vec<&str> = subject.split('.').collect();
    for (i, token) in tokens.iter().enumerate() {
        if token.is_empty() {
            return Err(invalid("empty token"));
        }
        if token.contains('>') && *token != FULL_WILDCARD {
            return Err(invalid("'>' must be a whole token"));
        }
        if *token == FULL_WILDCARD && i != tokens.len() - 1 {
            return Err(invalid("'>' must be the last token"));
        }
        if token.contains('*') && *token != SINGLE_WILDCARD {
            return Err(invalid("'*' must be a whole token"));
        }
    }
    Ok(())
}

/// One subject per line; blank lines and `#` comments are dropped.
pub fn parse_subject_lines(text: &str) -> Result<Vec<String>> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| {
            validate_subject(line)?;
            Ok(line.to_string())
        })
        .collect()
}

/// Does `pattern` cover `subject`?
///
/// `subject` may itself contain wildcards (a subscription); it is covered only
/// if every subject it can match is matched by `pattern`.
pub fn subject_matches(pattern: &str, subject: &str) -> bool {
    let mut pattern_tokens = pattern.split('.');
    let mut subject_tokens = subject.split('.');

    loop {
        match (pattern_tokens.next(), subject_tokens.next()) {
            (Some(FULL_WILDCARD), Some(_)) => return true,
            (Some(SINGLE_WILDCARD), Some(s)) => {
                if s == FULL_WILDCARD {
                    return false;
                }
            }
            (Some(p), Some(s)) => {
                if p != s {
                    return false;
                }
            }
            (None, None) => return true,
            _ => return false,
        }
    }
}
