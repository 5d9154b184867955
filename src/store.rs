use std::cmp::Ordering;

use async_trait::async_trait;
use itertools::Itertools;
use mongodb::error::Error as MongoError;
use thiserror::Error as ThisError;
use tokio::sync::RwLock;

use crate::model::{Player, PlayerId, Score};

#[derive(ThisError, Debug)]
pub enum StoreError {
    #[error("[MONGO] {0}")]
    Mongo(#[from] MongoError),
    #[error("[STORE] Duplicate player {0}")]
    Duplicate(&'static str),
}

#[async_trait]
pub trait PlayerStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<Player>, StoreError>;

    /// Fails with [`StoreError::Duplicate`] when the email or the player
    /// name is already taken.
    async fn insert(&self, player: &Player) -> Result<(), StoreError>;
}

#[async_trait]
pub trait ScoreStore: Send + Sync {
    async fn find_by_player(&self, player_id: &PlayerId) -> Result<Option<Score>, StoreError>;

    /// Inserts the record, or replaces the one with the same id.
    async fn save(&self, score: &Score) -> Result<(), StoreError>;

    /// Scores by descending value, ties oldest first. `None` returns all.
    async fn ranked(&self, limit: Option<usize>) -> Result<Vec<Score>, StoreError>;
}

/// Ranking order shared by every store.
pub fn by_rank(a: &Score, b: &Score) -> Ordering {
    b.points()
        .total_cmp(&a.points())
        .then_with(|| a.id.cmp(&b.id))
}

/// Process-local store, for tests and `--store memory`.
#[derive(Default)]
pub struct MemoryStore {
    players: RwLock<Vec<Player>>,
    scores: RwLock<Vec<Score>>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }
}

#[async_trait]
impl PlayerStore for MemoryStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Player>, StoreError> {
        let players = self.players.read().await;
        Ok(players.iter().find(|p| p.email == email).cloned())
    }

    async fn insert(&self, player: &Player) -> Result<(), StoreError> {
        let mut players = self.players.write().await;
        if players.iter().any(|p| p.email == player.email) {
            return Err(StoreError::Duplicate("email"));
        }
        if players.iter().any(|p| p.player_name == player.player_name) {
            return Err(StoreError::Duplicate("name"));
        }
        players.push(player.clone());
        Ok(())
    }
}

#[async_trait]
impl ScoreStore for MemoryStore {
    async fn find_by_player(&self, player_id: &PlayerId) -> Result<Option<Score>, StoreError> {
        let scores = self.scores.read().await;
        Ok(scores.iter().find(|s| &s.player_id == player_id).cloned())
    }

    async fn save(&self, score: &Score) -> Result<(), StoreError> {
        let mut scores = self.scores.write().await;
        match scores.iter_mut().find(|s| s.id == score.id) {
            Some(existing) => *existing = score.clone(),
            None => scores.push(score.clone()),
        }
        Ok(())
    }

    async fn ranked(&self, limit: Option<usize>) -> Result<Vec<Score>, StoreError> {
        let scores = self.scores.read().await;
        Ok(scores
            .iter()
            .sorted_by(|a, b| by_rank(a, b))
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }
}
