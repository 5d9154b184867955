//! Best score per player, a cached podium and on-demand ranks.
//!
//! The podium lives in the rank cache under [`TOP_SCORES_KEY`] and is only
//! ever refreshed by a read that misses. Submitting a score does not touch
//! the cache, so the podium may trail the store by up to the cache ttl.
//! Ranks always come from a full sorted scan of the store.

use std::{sync::Arc, time::Duration};

use chrono::NaiveTime;
use itertools::Itertools;
use log::{debug, info};
use serde_json::Number;

use crate::{
    cache::RankCache,
    error::Error,
    model::{PlayerView, Podium, Score, PODIUM_SIZE},
    store::ScoreStore,
};

pub const TOP_SCORES_KEY: &str = "topScores";
pub const TOP_SCORES_TTL: Duration = Duration::from_secs(300);

#[derive(Debug)]
pub enum Submission {
    Created(Score),
    Updated(Score),
}

impl Submission {
    pub fn score(&self) -> &Score {
        match self {
            Submission::Created(score) | Submission::Updated(score) => score,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Submission::Created(_) => "Score added successfully! 🎈",
            Submission::Updated(_) => "Score updated successfully! 🎉",
        }
    }
}

#[derive(Debug)]
pub enum TopScores {
    /// Served from the cache, possibly stale.
    Cached(Podium),
    /// Read from the store and written to the cache by this call.
    Fetched(Podium),
}

impl TopScores {
    pub fn scores(&self) -> &Podium {
        match self {
            TopScores::Cached(podium) | TopScores::Fetched(podium) => podium,
        }
    }

    /// `now` is the time of the response, not of the cache fill.
    pub fn message(&self, now: NaiveTime) -> String {
        let time = now.format("%H:%M");
        match self {
            TopScores::Cached(_) => format!(
                "Scores last updated before {}. Data may be up to 5 minutes old. ⏰",
                time
            ),
            TopScores::Fetched(_) => format!(
                "Scores fetched at {}. They may remain unchanged for up to 5 minutes. ✨",
                time
            ),
        }
    }
}

pub fn rank_message(player: &PlayerView, rank: usize) -> String {
    format!("Player {}'s rank is {} 🪄", player.player_name, rank)
}

pub struct Leaderboard {
    scores: Arc<dyn ScoreStore>,
    cache: Arc<dyn RankCache>,
    ttl: Duration,
}

impl Leaderboard {
    pub fn new(scores: Arc<dyn ScoreStore>, cache: Arc<dyn RankCache>) -> Leaderboard {
        Leaderboard {
            scores,
            cache,
            ttl: TOP_SCORES_TTL,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Leaderboard {
        self.ttl = ttl;
        self
    }

    /// Overwrites the player's score, whatever its value. Two concurrent
    /// submissions for one player race and the later save wins.
    pub async fn submit_score(
        &self,
        player: &PlayerView,
        score: Option<Number>,
    ) -> Result<Submission, Error> {
        let score = score.ok_or(Error::MissingField("Score"))?;

        match self.scores.find_by_player(&player.id).await? {
            Some(mut existing) => {
                existing.score = score;
                self.scores.save(&existing).await?;
                info!("Updated score of {} to {}", player.player_name, existing.score);
                Ok(Submission::Updated(existing))
            }
            None => {
                let created = Score::new(player, score);
                self.scores.save(&created).await?;
                info!("Added score {} for {}", created.score, player.player_name);
                Ok(Submission::Created(created))
            }
        }
    }

    pub async fn top_scores(&self) -> Result<TopScores, Error> {
        if let Some(cached) = self.cache.get(TOP_SCORES_KEY).await? {
            debug!("Top scores cache hit");
            return Ok(TopScores::Cached(serde_json::from_str(&cached)?));
        }

        debug!("Top scores cache miss, reading store");
        let podium: Podium = self
            .scores
            .ranked(Some(PODIUM_SIZE))
            .await?
            .into_iter()
            .take(PODIUM_SIZE)
            .collect();
        let serialized = serde_json::to_string(&podium)?;
        self.cache.set(TOP_SCORES_KEY, serialized, self.ttl).await?;
        Ok(TopScores::Fetched(podium))
    }

    /// 1-based position in the full ranking. Never served from the cache.
    pub async fn player_rank(&self, player: &PlayerView) -> Result<usize, Error> {
        self.scores
            .ranked(None)
            .await?
            .iter()
            .find_position(|score| score.player_id == player.id)
            .map(|(index, _)| index + 1)
            .ok_or_else(|| Error::NotInScoreboard(player.player_name.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{cache::MemoryCache, model::Player, store::MemoryStore};

    struct Fixture {
        store: Arc<MemoryStore>,
        cache: Arc<MemoryCache>,
        leaderboard: Leaderboard,
    }

    fn fixture(ttl: Duration) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(MemoryCache::new());
        let leaderboard = Leaderboard::new(store.clone(), cache.clone()).with_ttl(ttl);
        Fixture {
            store,
            cache,
            leaderboard,
        }
    }

    fn player(name: &str) -> PlayerView {
        Player::new(name.into(), format!("{name}@example.com"), "pw".into()).view()
    }

    fn names(scores: &Podium) -> Vec<&str> {
        scores.iter().map(|s| s.player_name.as_str()).collect()
    }

    #[tokio::test]
    async fn second_submission_overwrites() {
        let f = fixture(TOP_SCORES_TTL);
        let ann = player("ann");

        let first = f.leaderboard.submit_score(&ann, Some(10u64.into())).await.unwrap();
        assert!(matches!(first, Submission::Created(_)));
        let second = f.leaderboard.submit_score(&ann, Some(7u64.into())).await.unwrap();
        assert!(matches!(second, Submission::Updated(_)));
        assert_eq!(second.score().id, first.score().id);

        let all = f.store.ranked(None).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].points(), 7.0);
    }

    #[tokio::test]
    async fn missing_score_is_rejected() {
        let f = fixture(TOP_SCORES_TTL);
        let err = f.leaderboard.submit_score(&player("ann"), None).await.unwrap_err();
        assert_eq!(err.message(), "Score is required");
    }

    #[tokio::test]
    async fn zero_is_a_score() {
        let f = fixture(TOP_SCORES_TTL);
        let ann = player("ann");
        f.leaderboard.submit_score(&ann, Some(0u64.into())).await.unwrap();
        assert_eq!(f.leaderboard.player_rank(&ann).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn cold_podium_and_rank() {
        let f = fixture(TOP_SCORES_TTL);
        let (a, b, c) = (player("a"), player("b"), player("c"));
        for (p, s) in [(&a, 100u64), (&b, 200), (&c, 150)] {
            f.leaderboard.submit_score(p, Some(s.into())).await.unwrap();
        }

        let top = f.leaderboard.top_scores().await.unwrap();
        assert!(matches!(top, TopScores::Fetched(_)));
        assert_eq!(names(top.scores()), ["b", "c", "a"]);

        assert_eq!(f.leaderboard.player_rank(&a).await.unwrap(), 3);
        assert_eq!(f.leaderboard.player_rank(&b).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn podium_keeps_only_three() {
        let f = fixture(TOP_SCORES_TTL);
        for (i, name) in ["a", "b", "c", "d", "e"].into_iter().enumerate() {
            f.leaderboard
                .submit_score(&player(name), Some((i as u64).into()))
                .await
                .unwrap();
        }
        let top = f.leaderboard.top_scores().await.unwrap();
        assert_eq!(names(top.scores()), ["e", "d", "c"]);
    }

    #[tokio::test]
    async fn podium_is_stale_within_ttl() {
        let f = fixture(TOP_SCORES_TTL);
        f.leaderboard
            .submit_score(&player("a"), Some(100u64.into()))
            .await
            .unwrap();
        let first = f.leaderboard.top_scores().await.unwrap();

        let b = player("b");
        f.leaderboard.submit_score(&b, Some(500u64.into())).await.unwrap();
        let second = f.leaderboard.top_scores().await.unwrap();

        assert!(matches!(second, TopScores::Cached(_)));
        assert_eq!(
            serde_json::to_string(first.scores()).unwrap(),
            serde_json::to_string(second.scores()).unwrap()
        );
        // ranks skip the cache
        assert_eq!(f.leaderboard.player_rank(&b).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn podium_refreshes_after_ttl() {
        let f = fixture(Duration::from_millis(100));
        f.leaderboard
            .submit_score(&player("a"), Some(100u64.into()))
            .await
            .unwrap();
        f.leaderboard.top_scores().await.unwrap();
        f.leaderboard
            .submit_score(&player("b"), Some(500u64.into()))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(250)).await;
        let top = f.leaderboard.top_scores().await.unwrap();
        assert!(matches!(top, TopScores::Fetched(_)));
        assert_eq!(names(top.scores()), ["b", "a"]);
    }

    #[tokio::test]
    async fn podium_is_written_under_the_shared_key() {
        let f = fixture(TOP_SCORES_TTL);
        f.leaderboard
            .submit_score(&player("a"), Some(100u64.into()))
            .await
            .unwrap();
        f.leaderboard.top_scores().await.unwrap();

        let cached = f.cache.get(TOP_SCORES_KEY).await.unwrap().unwrap();
        let podium: Podium = serde_json::from_str(&cached).unwrap();
        assert_eq!(names(&podium), ["a"]);
    }

    #[tokio::test]
    async fn ties_keep_submission_order() {
        let f = fixture(TOP_SCORES_TTL);
        let (first, second) = (player("first"), player("second"));
        f.leaderboard.submit_score(&first, Some(50u64.into())).await.unwrap();
        f.leaderboard.submit_score(&second, Some(50u64.into())).await.unwrap();

        assert_eq!(f.leaderboard.player_rank(&first).await.unwrap(), 1);
        assert_eq!(f.leaderboard.player_rank(&second).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn rank_of_unscored_player_names_them() {
        let f = fixture(TOP_SCORES_TTL);
        let err = f.leaderboard.player_rank(&player("ghost")).await.unwrap_err();
        assert_eq!(err.message(), "Player ghost not found in the scoreboard");
    }

    #[test]
    fn messages_render_hours_and_minutes() {
        let now = NaiveTime::from_hms_opt(9, 5, 42).unwrap();
        assert_eq!(
            TopScores::Cached(Podium::new()).message(now),
            "Scores last updated before 09:05. Data may be up to 5 minutes old. ⏰"
        );
        assert_eq!(
            TopScores::Fetched(Podium::new()).message(now),
            "Scores fetched at 09:05. They may remain unchanged for up to 5 minutes. ✨"
        );
        assert_eq!(rank_message(&player("ann"), 2), "Player ann's rank is 2 🪄");
    }
}
