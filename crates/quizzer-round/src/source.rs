//! Question lookup.

use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use std::path::Path;

use quizzer_protocol::{DEFAULT_CATEGORY, Question};

use crate::RoundError;

/// Where a round gets its questions from.
pub trait QuestionSource: Send + Sync + 'static {
    /// Every question available for `name`.
    ///
    /// Returns [`RoundError::UnknownCategory`] when the name matches
    /// nothing. Never returns an empty list on success.
    fn resolve_category(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Vec<Question>, RoundError>> + Send;

    /// Category names for `!categories`, sorted.
    fn categories(&self) -> impl Future<Output = Vec<String>> + Send;
}

struct Category {
    name: String,
    questions: Vec<Question>,
}

/// In-memory question store keyed by case-insensitive category name.
///
/// `random` resolves to every question of every category. Within a
/// category, a question whose prompt is already present is skipped.
#[derive(Default)]
pub struct QuestionBank {
    categories: BTreeMap<String, Category>,
}

impl QuestionBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON array of questions in the bot's file format.
    pub fn from_json_str(json: &str) -> Result<Self, RoundError> {
        let questions: Vec<Question> = serde_json::from_str(json)?;
        let mut bank = Self::new();
        bank.extend(questions);
        Ok(bank)
    }

    /// Reads and parses a question file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, RoundError> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path).await?;
        let bank = Self::from_json_str(&raw)?;
        tracing::info!(
            path = %path.display(),
            categories = bank.categories.len(),
            questions = bank.len(),
            "question bank loaded"
        );
        Ok(bank)
    }

    /// Adds one question. Returns `false` if its category already holds
    /// the same prompt.
    pub fn add(&mut self, question: Question) -> bool {
        let key = question.category().to_lowercase();
        let category = self.categories.entry(key).or_insert_with(|| Category {
            name: question.category().to_owned(),
            questions: Vec::new(),
        });
        if category
            .questions
            .iter()
            .any(|q| q.prompt() == question.prompt())
        {
            return false;
        }
        category.questions.push(question);
        true
    }

    pub fn extend(&mut self, questions: impl IntoIterator<Item = Question>) {
        for question in questions {
            if !self.add(question) {
                tracing::debug!("duplicate question skipped");
            }
        }
    }

    /// Total questions across all categories.
    pub fn len(&self) -> usize {
        self.categories.values().map(|c| c.questions.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    fn everything(&self) -> Vec<Question> {
        let mut seen = HashSet::new();
        self.categories
            .values()
            .flat_map(|c| c.questions.iter())
            .filter(|q| seen.insert(q.prompt().to_owned()))
            .cloned()
            .collect()
    }
}

impl QuestionSource for QuestionBank {
    async fn resolve_category(&self, name: &str) -> Result<Vec<Question>, RoundError> {
        let key = name.trim().to_lowercase();
        let questions = if key == DEFAULT_CATEGORY {
            self.everything()
        } else {
            self.categories
                .get(&key)
                .map(|c| c.questions.clone())
                .unwrap_or_default()
        };
        if questions.is_empty() {
            return Err(RoundError::UnknownCategory(name.trim().to_owned()));
        }
        Ok(questions)
    }

    async fn categories(&self) -> Vec<String> {
        self.categories.values().map(|c| c.name.clone()).collect()
    }
}
