//! Durable score storage.

use std::collections::HashMap;
use std::future::Future;

use quizzer_protocol::Identity;
use tokio::sync::Mutex;

use crate::RoundError;

/// Where concluded rounds record their results.
pub trait ScoreStore: Send + Sync + 'static {
    /// Records one participant's final score for one round.
    fn persist_score(
        &self,
        identity: &Identity,
        score: u32,
    ) -> impl Future<Output = Result<(), RoundError>> + Send;

    /// All-time totals, highest first.
    fn read_leaderboard(
        &self,
    ) -> impl Future<Output = Result<Vec<(Identity, u64)>, RoundError>> + Send;
}

/// Keeps every persisted score in memory.
#[derive(Default)]
pub struct MemoryScores {
    records: Mutex<Vec<(Identity, u32)>>,
}

impl MemoryScores {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `persist_score` call so far, in order.
    pub async fn records(&self) -> Vec<(Identity, u32)> {
        self.records.lock().await.clone()
    }
}

impl ScoreStore for MemoryScores {
    async fn persist_score(&self, identity: &Identity, score: u32) -> Result<(), RoundError> {
        self.records.lock().await.push((identity.clone(), score));
        Ok(())
    }

    async fn read_leaderboard(&self) -> Result<Vec<(Identity, u64)>, RoundError> {
        let records = self.records.lock().await;
        let mut totals: HashMap<&Identity, u64> = HashMap::new();
        for (identity, score) in records.iter() {
            *totals.entry(identity).or_default() += u64::from(*score);
        }
        let mut board: Vec<(Identity, u64)> = totals
            .into_iter()
            .map(|(identity, total)| (identity.clone(), total))
            .collect();
        board.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Ok(board)
    }
}
