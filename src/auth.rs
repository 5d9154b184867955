use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::Error as JwtError, Algorithm, DecodingKey, EncodingKey, Header,
    Validation,
};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{error::Error, model::PlayerView};

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    player: PlayerView,
    iat: i64,
    exp: i64,
}

/// Signs and checks HS256 bearer tokens carrying the player identity.
pub struct Authenticator {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl Authenticator {
    pub fn new(secret: &str, ttl: Duration) -> Authenticator {
        Authenticator {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
            ttl,
        }
    }

    pub fn issue(&self, player: &PlayerView) -> Result<String, JwtError> {
        let now = Utc::now();
        let claims = Claims {
            player: player.clone(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
    }

    pub fn verify(&self, token: &str) -> Result<PlayerView, JwtError> {
        decode::<Claims>(token, &self.decoding, &self.validation).map(|data| data.claims.player)
    }
}

/// The player a request's bearer token was issued to.
#[derive(Debug, Clone)]
pub struct AuthPlayer(pub PlayerView);

/// Second space separated word of the header, whatever the scheme.
fn bearer(header: &str) -> Option<&str> {
    header.split(' ').nth(1).filter(|token| !token.is_empty())
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthPlayer
where
    Arc<Authenticator>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(bearer)
            .ok_or(Error::MissingToken)?;

        let authenticator = Arc::<Authenticator>::from_ref(state);
        authenticator.verify(token).map(AuthPlayer).map_err(|err| {
            debug!("Rejected bearer token: {}", err);
            Error::InvalidToken
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Player;

    fn ann() -> PlayerView {
        Player::new("ann".into(), "ann@example.com".into(), "pw".into()).view()
    }

    #[test]
    fn issued_token_verifies_to_the_same_player() {
        let auth = Authenticator::new("secret", Duration::minutes(10));
        let player = ann();
        let token = auth.issue(&player).unwrap();
        assert_eq!(auth.verify(&token).unwrap(), player);
    }

    #[test]
    fn rejects_foreign_and_expired_tokens() {
        let auth = Authenticator::new("secret", Duration::minutes(10));
        let other = Authenticator::new("other", Duration::minutes(10));
        let token = other.issue(&ann()).unwrap();
        assert!(auth.verify(&token).is_err());

        let stale = Authenticator::new("secret", Duration::hours(-2));
        let token = stale.issue(&ann()).unwrap();
        assert!(auth.verify(&token).is_err());

        assert!(auth.verify("not-a-token").is_err());
    }

    #[test]
    fn bearer_takes_second_word() {
        assert_eq!(bearer("Bearer abc"), Some("abc"));
        assert_eq!(bearer("Token abc"), Some("abc"));
        assert_eq!(bearer("Bearer "), None);
        assert_eq!(bearer("abc"), None);
    }
}
