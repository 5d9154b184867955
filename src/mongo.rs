use async_trait::async_trait;
use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, Utc};
use futures::stream::TryStreamExt;
use log::info;
use mongodb::{
    bson::doc,
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::{ClientOptions, FindOptions, IndexOptions, ReplaceOptions},
    Client, Collection, IndexModel,
};
use serde::{Deserialize, Serialize};
use serde_json::Number;

use crate::{
    model::{Player, PlayerId, Score, ScoreId},
    store::{PlayerStore, ScoreStore, StoreError},
};

const DUPLICATE_KEY: i32 = 11000;

// Stored shapes. Same fields as the model, with `createdOn` as a BSON date.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayerDoc {
    #[serde(rename = "_id")]
    id: PlayerId,
    player_name: String,
    email: String,
    password: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    created_on: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScoreDoc {
    #[serde(rename = "_id")]
    id: ScoreId,
    player_id: PlayerId,
    player_name: String,
    score: Number,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    created_on: DateTime<Utc>,
}

impl From<&Player> for PlayerDoc {
    fn from(player: &Player) -> PlayerDoc {
        PlayerDoc {
            id: player.id.clone(),
            player_name: player.player_name.clone(),
            email: player.email.clone(),
            password: player.password.clone(),
            created_on: player.created_on,
        }
    }
}

impl From<PlayerDoc> for Player {
    fn from(doc: PlayerDoc) -> Player {
        Player {
            id: doc.id,
            player_name: doc.player_name,
            email: doc.email,
            password: doc.password,
            created_on: doc.created_on,
        }
    }
}

impl From<&Score> for ScoreDoc {
    fn from(score: &Score) -> ScoreDoc {
        ScoreDoc {
            id: score.id.clone(),
            player_id: score.player_id.clone(),
            player_name: score.player_name.clone(),
            score: score.score.clone(),
            created_on: score.created_on,
        }
    }
}

impl From<ScoreDoc> for Score {
    fn from(doc: ScoreDoc) -> Score {
        Score {
            id: doc.id,
            player_id: doc.player_id,
            player_name: doc.player_name,
            score: doc.score,
            created_on: doc.created_on,
        }
    }
}

pub struct MongoStore {
    players: Collection<PlayerDoc>,
    scores: Collection<ScoreDoc>,
}

impl MongoStore {
    pub async fn new(url: &str, db_name: &str) -> Result<MongoStore, StoreError> {
        let client = Client::with_options(ClientOptions::parse(url).await?)?;
        let db = client.database(db_name);
        let store = MongoStore {
            players: db.collection::<PlayerDoc>("players"),
            scores: db.collection::<ScoreDoc>("scores"),
        };
        store.ensure_indexes().await?;
        info!("Connected to mongo database {}", db_name);
        Ok(store)
    }

    async fn ensure_indexes(&self) -> Result<(), StoreError> {
        let unique = || IndexOptions::builder().unique(true).build();
        self.players
            .create_indexes(
                [
                    IndexModel::builder()
                        .keys(doc! { "email": 1 })
                        .options(unique())
                        .build(),
                    IndexModel::builder()
                        .keys(doc! { "playerName": 1 })
                        .options(unique())
                        .build(),
                ],
                None,
            )
            .await?;
        self.scores
            .create_index(IndexModel::builder().keys(doc! { "playerId": 1 }).build(), None)
            .await?;
        Ok(())
    }
}

fn is_duplicate_key(err: &MongoError) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write)) if write.code == DUPLICATE_KEY
    )
}

#[async_trait]
impl PlayerStore for MongoStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Player>, StoreError> {
        let found = self.players.find_one(doc! { "email": email }, None).await?;
        Ok(found.map(Player::from))
    }

    async fn insert(&self, player: &Player) -> Result<(), StoreError> {
        match self.players.insert_one(PlayerDoc::from(player), None).await {
            Ok(_) => Ok(()),
            Err(err) if is_duplicate_key(&err) => Err(StoreError::Duplicate("email or name")),
            Err(err) => Err(err.into()),
        }
    }
}

#[async_trait]
impl ScoreStore for MongoStore {
    async fn find_by_player(&self, player_id: &PlayerId) -> Result<Option<Score>, StoreError> {
        let filter = doc! { "playerId": player_id.0.as_str() };
        Ok(self.scores.find_one(filter, None).await?.map(Score::from))
    }

    async fn save(&self, score: &Score) -> Result<(), StoreError> {
        let options = ReplaceOptions::builder().upsert(true).build();
        self.scores
            .replace_one(doc! { "_id": score.id.0.as_str() }, ScoreDoc::from(score), options)
            .await?;
        Ok(())
    }

    async fn ranked(&self, limit: Option<usize>) -> Result<Vec<Score>, StoreError> {
        // `_id` grows with creation time, which keeps ties in insertion order
        let options = FindOptions::builder()
            .sort(doc! { "score": -1, "_id": 1 })
            .limit(limit.map(|l| l as i64))
            .build();
        let cursor = self.scores.find(None, options).await?;
        let docs: Vec<ScoreDoc> = cursor.try_collect().await?;
        Ok(docs.into_iter().map(Score::from).collect())
    }
}
