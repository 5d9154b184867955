use std::sync::Arc;

use log::info;
use serde::{Deserialize, Serialize};

use crate::{
    auth::Authenticator,
    error::Error,
    model::{Player, PlayerView},
    store::{PlayerStore, StoreError},
};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUp {
    pub player_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Credentials {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub player: PlayerView,
    pub access_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub email: String,
    pub access_token: String,
}

/// Empty strings count as missing.
pub fn required(value: Option<String>, field: &'static str) -> Result<String, Error> {
    value
        .filter(|v| !v.is_empty())
        .ok_or(Error::MissingField(field))
}

pub struct Accounts {
    players: Arc<dyn PlayerStore>,
    auth: Arc<Authenticator>,
}

impl Accounts {
    pub fn new(players: Arc<dyn PlayerStore>, auth: Arc<Authenticator>) -> Accounts {
        Accounts { players, auth }
    }

    pub async fn create_account(&self, form: SignUp) -> Result<Registration, Error> {
        let player_name = required(form.player_name, "Player name")?;
        let email = required(form.email, "Email")?;
        let password = required(form.password, "Password")?;

        if self.players.find_by_email(&email).await?.is_some() {
            return Err(Error::PlayerExists);
        }

        let player = Player::new(player_name, email, password);
        match self.players.insert(&player).await {
            Err(StoreError::Duplicate(_)) => return Err(Error::PlayerExists),
            other => other?,
        }
        info!("Registered player {}", player.player_name);

        let player = player.view();
        let access_token = self.auth.issue(&player)?;
        Ok(Registration {
            player,
            access_token,
        })
    }

    pub async fn login(&self, credentials: Credentials) -> Result<Session, Error> {
        let email = required(credentials.email, "Email")?;
        let password = required(credentials.password, "Password")?;

        let player = self
            .players
            .find_by_email(&email)
            .await?
            .ok_or(Error::PlayerNotFound)?;
        if player.password != password {
            return Err(Error::InvalidCredentials);
        }

        let access_token = self.auth.issue(&player.view())?;
        Ok(Session {
            email,
            access_token,
        })
    }
}
