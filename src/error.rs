use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use log::error;
use serde_json::{json, Error as SerdeJsonError};
use thiserror::Error as ThisError;

use crate::{cache::CacheError, store::StoreError};

#[derive(ThisError, Debug)]
pub enum Error {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("Malformed request body")]
    MalformedBody,
    #[error("No token provided")]
    MissingToken,
    #[error("Invalid token")]
    InvalidToken,
    #[error("Player not found")]
    PlayerNotFound,
    #[error("Invalid Credentials")]
    InvalidCredentials,
    #[error("Player already exist")]
    PlayerExists,
    #[error("Player {0} not found in the scoreboard")]
    NotInScoreboard(String),
    #[error("Too many requests, please try again later.")]
    RateLimited,
    #[error("{0}")]
    Store(#[from] StoreError),
    #[error("{0}")]
    Cache(#[from] CacheError),
    #[error("[SERDE] JSON Error: {0}")]
    SerdeJson(#[from] SerdeJsonError),
    #[error("[JWT] Error signing token: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
}

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Error::MissingField(_)
            | Error::MalformedBody
            | Error::PlayerNotFound
            | Error::InvalidCredentials => StatusCode::BAD_REQUEST,
            Error::MissingToken | Error::InvalidToken => StatusCode::UNAUTHORIZED,
            // duplicate registrations are reported in the body only
            Error::PlayerExists => StatusCode::OK,
            Error::NotInScoreboard(_) => StatusCode::NOT_FOUND,
            Error::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Error::Store(_) | Error::Cache(_) | Error::SerdeJson(_) | Error::Token(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Text sent to the client. Internal faults never leak their detail.
    pub fn message(&self) -> String {
        match self.status() {
            StatusCode::INTERNAL_SERVER_ERROR => "Internal Server Error".to_owned(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("{}", self);
        }
        let body = json!({ "error": true, "message": self.message() });
        (status, Json(body)).into_response()
    }
}
