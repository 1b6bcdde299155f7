//! Core vocabulary shared by every Quizzer crate.
//!
//! These are the values that cross layer boundaries: who is talking
//! ([`Identity`], [`Hostmask`]), what is being asked ([`Question`]), and
//! what the bot says back ([`Outbound`]).

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// A case-insensitive chat handle.
///
/// Chat networks treat `Alice`, `alice` and `ALICE` as the same person, so
/// equality, hashing and ordering all use the lower-cased *canonical* form.
/// The spelling the user actually typed is kept as the *display* form for
/// announcements ("Alice has joined the quiz!").
///
/// Serialization writes the canonical form, which is what persisted
/// credential and score records are keyed by.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity {
    canonical: String,
    display: String,
}

impl Identity {
    /// Builds an identity from a raw handle.
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidIdentity`] if the handle is empty
    /// or contains whitespace.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, ProtocolError> {
        let raw = raw.as_ref().trim();
        if raw.is_empty() || raw.chars().any(char::is_whitespace) {
            return Err(ProtocolError::InvalidIdentity(raw.to_string()));
        }
        Ok(Self {
            canonical: raw.to_lowercase(),
            display: raw.to_string(),
        })
    }

    /// The lower-cased form used for comparisons and storage keys.
    pub fn as_str(&self) -> &str {
        &self.canonical
    }

    /// The handle as the user typed it.
    pub fn display_name(&self) -> &str {
        &self.display
    }
}

impl PartialEq for Identity {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }
}

impl Eq for Identity {}

impl Hash for Identity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical.hash(state);
    }
}

impl PartialOrd for Identity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Identity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.canonical.cmp(&other.canonical)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display)
    }
}

impl TryFrom<String> for Identity {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Identity> for String {
    fn from(id: Identity) -> Self {
        id.canonical
    }
}

impl std::str::FromStr for Identity {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

// ---------------------------------------------------------------------------
// Hostmask
// ---------------------------------------------------------------------------

/// The `nick!user@host` string the chat server reports for a sender.
///
/// The transport vouches for it; Quizzer only compares it against
/// configured patterns. It is kept as the raw string so a malformed mask
/// simply fails to match instead of failing to parse.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Hostmask(String);

impl Hostmask {
    /// Formats a mask from its three parts.
    pub fn new(nick: &str, user: &str, host: &str) -> Self {
        Self(format!("{nick}!{user}@{host}"))
    }

    /// The raw mask text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Hostmask {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl From<String> for Hostmask {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl fmt::Display for Hostmask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Splits a mask or mask pattern on the `!` and `@` delimiters.
///
/// Shared by [`Hostmask::fields`] and the pattern matcher so both sides
/// agree on what a "field" is.
pub fn split_mask_fields(raw: &str) -> Vec<&str> {
    raw.split(['!', '@']).collect()
}

// ---------------------------------------------------------------------------
// Question
// ---------------------------------------------------------------------------

/// One multiple-choice trivia question.
///
/// Answer labels are normalised to upper case on construction (`a` and `A`
/// are the same label), must be unique, and the designated correct label
/// must be one of them. The JSON shape matches the category files the bot
/// has always used:
///
/// ```json
/// { "category": "Science", "question": "H2O is?",
///   "answers": { "A": "Water", "B": "Salt" }, "correct": "A" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawQuestion")]
pub struct Question {
    category: String,
    #[serde(rename = "question")]
    prompt: String,
    answers: BTreeMap<String, String>,
    correct: String,
}

/// Unvalidated question as it appears in a JSON file.
#[derive(Deserialize)]
struct RawQuestion {
    category: String,
    question: String,
    answers: BTreeMap<String, String>,
    correct: String,
}

impl TryFrom<RawQuestion> for Question {
    type Error = ProtocolError;

    fn try_from(raw: RawQuestion) -> Result<Self, Self::Error> {
        Question::new(raw.category, raw.question, raw.answers, raw.correct)
    }
}

impl Question {
    /// Builds a validated question.
    ///
    /// # Errors
    /// [`ProtocolError::InvalidQuestion`] when there are no answers, two
    /// labels collide after upper-casing, or `correct` names no answer.
    pub fn new(
        category: impl Into<String>,
        prompt: impl Into<String>,
        answers: impl IntoIterator<Item = (String, String)>,
        correct: impl AsRef<str>,
    ) -> Result<Self, ProtocolError> {
        let prompt = prompt.into();
        let mut normalised = BTreeMap::new();
        for (label, text) in answers {
            let label = normalise_label(&label);
            if label.is_empty() {
                return Err(ProtocolError::InvalidQuestion(format!(
                    "empty answer label in {prompt:?}"
                )));
            }
            if normalised.insert(label.clone(), text).is_some() {
                return Err(ProtocolError::InvalidQuestion(format!(
                    "duplicate answer label {label} in {prompt:?}"
                )));
            }
        }
        if normalised.is_empty() {
            return Err(ProtocolError::InvalidQuestion(format!(
                "no answers for {prompt:?}"
            )));
        }
        let correct = normalise_label(correct.as_ref());
        if !normalised.contains_key(&correct) {
            return Err(ProtocolError::InvalidQuestion(format!(
                "correct label {correct} is not an answer of {prompt:?}"
            )));
        }
        Ok(Self {
            category: category.into(),
            prompt,
            answers: normalised,
            correct,
        })
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Answers in label order (`A`, `B`, `C`, ...).
    pub fn answers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.answers.iter().map(|(l, t)| (l.as_str(), t.as_str()))
    }

    /// The designated correct label, upper-cased.
    pub fn correct_label(&self) -> &str {
        &self.correct
    }

    /// The text of the correct answer.
    pub fn correct_text(&self) -> &str {
        self.answers
            .get(&self.correct)
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// Case-insensitive check of a submitted label.
    pub fn is_correct(&self, label: &str) -> bool {
        normalise_label(label) == self.correct
    }
}

fn normalise_label(label: &str) -> String {
    label.trim().to_uppercase()
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

/// A line of text the bot wants delivered.
///
/// The core never talks to the network; it produces `Outbound` values and
/// hands them to an outbox after releasing its locks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// A private notice to one identity.
    Notice { to: Identity, text: String },
    /// A message to the quiz channel.
    Channel { text: String },
}

impl Outbound {
    pub fn notice(to: &Identity, text: impl Into<String>) -> Self {
        Self::Notice {
            to: to.clone(),
            text: text.into(),
        }
    }

    pub fn channel(text: impl Into<String>) -> Self {
        Self::Channel { text: text.into() }
    }

    /// The message text regardless of recipient.
    pub fn text(&self) -> &str {
        match self {
            Self::Notice { text, .. } | Self::Channel { text } => text,
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
