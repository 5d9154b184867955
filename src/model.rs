use arrayvec::ArrayVec;
use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use serde_json::Number;

/// Number of entries served by the top scores endpoint.
pub const PODIUM_SIZE: usize = 3;

/// Best scores, highest first.
pub type Podium = ArrayVec<Score, PODIUM_SIZE>;

/// Hex object id, also used as the `_id` of stored documents.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScoreId(pub String);

fn fresh_id() -> String {
    ObjectId::new().to_hex()
}

impl PlayerId {
    pub fn generate() -> PlayerId {
        PlayerId(fresh_id())
    }
}

impl ScoreId {
    /// Ids grow with creation time, so ordering by id is ordering by age.
    pub fn generate() -> ScoreId {
        ScoreId(fresh_id())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    #[serde(rename = "_id")]
    pub id: PlayerId,
    pub player_name: String,
    pub email: String,
    // TODO: store an argon2 hash here and compare hashes on login.
    pub password: String,
    pub created_on: DateTime<Utc>,
}

impl Player {
    pub fn new(player_name: String, email: String, password: String) -> Player {
        Player {
            id: PlayerId::generate(),
            player_name,
            email,
            password,
            created_on: Utc::now(),
        }
    }

    pub fn view(&self) -> PlayerView {
        PlayerView {
            id: self.id.clone(),
            player_name: self.player_name.clone(),
            email: self.email.clone(),
            created_on: self.created_on,
        }
    }
}

/// What clients and bearer tokens get to see of a player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    #[serde(rename = "_id")]
    pub id: PlayerId,
    pub player_name: String,
    pub email: String,
    pub created_on: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Score {
    #[serde(rename = "_id")]
    pub id: ScoreId,
    pub player_id: PlayerId,
    pub player_name: String,
    pub score: Number,
    pub created_on: DateTime<Utc>,
}

impl Score {
    pub fn new(player: &PlayerView, score: Number) -> Score {
        Score {
            id: ScoreId::generate(),
            player_id: player.id.clone(),
            player_name: player.player_name.clone(),
            score,
            created_on: Utc::now(),
        }
    }

    pub fn points(&self) -> f64 {
        self.score.as_f64().unwrap_or_default()
    }
}
