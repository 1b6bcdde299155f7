//! Hostmask pattern matching.
//!
//! A pattern has the same `nick!user@host` shape as a mask. Fields are
//! compared one by one, ignoring ASCII case. Inside a field, `*` matches
//! any run of characters (including none); every other character is
//! literal. A pattern never matches a mask with a different field count.

use std::fmt;

use quizzer_protocol::{Hostmask, split_mask_fields};
use serde::{Deserialize, Serialize};

use crate::CredentialError;

/// A validated `nick!user@host` pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HostmaskPattern(String);

impl HostmaskPattern {
    /// Parses a pattern, requiring exactly three non-empty fields.
    pub fn parse(raw: &str) -> Result<Self, CredentialError> {
        let fields = split_mask_fields(raw);
        if fields.len() != 3 || fields.iter().any(|f| f.is_empty()) {
            return Err(CredentialError::InvalidPattern(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    /// Whether `mask` is allowed by this pattern.
    pub fn matches(&self, mask: &Hostmask) -> bool {
        mask_matches(&self.0, mask.as_str())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HostmaskPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for HostmaskPattern {
    type Error = CredentialError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<HostmaskPattern> for String {
    fn from(p: HostmaskPattern) -> Self {
        p.0
    }
}

/// Field-wise match of a raw pattern against a raw mask.
pub fn mask_matches(pattern: &str, mask: &str) -> bool {
    let pattern_fields = split_mask_fields(pattern);
    let mask_fields = split_mask_fields(mask);
    pattern_fields.len() == mask_fields.len()
        && pattern_fields
            .iter()
            .zip(&mask_fields)
            .all(|(p, m)| field_matches(p, m))
}

fn field_matches(pattern: &str, value: &str) -> bool {
    let pattern = pattern.to_ascii_lowercase();
    let value = value.to_ascii_lowercase();

    if !pattern.contains('*') {
        return pattern == value;
    }

    let pieces: Vec<&str> = pattern.split('*').collect();
    let (first, rest) = match pieces.split_first() {
        Some(split) => split,
        None => return true,
    };
    let Some(mut remaining) = value.strip_prefix(first) else {
        return false;
    };
    let Some((last, middle)) = rest.split_last() else {
        return remaining.is_empty();
    };
    for piece in middle {
        match remaining.find(piece) {
            Some(at) => remaining = &remaining[at + piece.len()..],
            None => return false,
        }
    }
    remaining.len() >= last.len() && remaining.ends_with(last)
}
