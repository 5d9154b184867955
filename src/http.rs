use std::sync::Arc;

use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRef, FromRequest, Request, State},
    middleware,
    routing::{get, post},
    Router,
};
use axum_extra::response::ErasedJson;
use chrono::Local;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Number, Value};
use tower_http::cors::{Any, CorsLayer};

use crate::{
    accounts::{Accounts, Credentials, Registration, Session, SignUp},
    auth::{AuthPlayer, Authenticator},
    error::Error,
    leaderboard::{rank_message, Leaderboard},
    model::{Podium, Score},
    ratelimit::{self, RateLimiter},
};

#[derive(Clone)]
pub struct AppState {
    pub accounts: Arc<Accounts>,
    pub leaderboard: Arc<Leaderboard>,
    pub auth: Arc<Authenticator>,
}

impl FromRef<AppState> for Arc<Authenticator> {
    fn from_ref(state: &AppState) -> Arc<Authenticator> {
        state.auth.clone()
    }
}

/// JSON request body. An empty body reads as `T::default()`, so absent
/// fields get reported one by one instead of as a parse failure.
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Default,
{
    type Rejection = Error;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|_| Error::MalformedBody)?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(JsonBody(T::default()));
        }
        serde_json::from_slice(&bytes)
            .map(JsonBody)
            .map_err(|_| Error::MalformedBody)
    }
}

/// Every success body carries `error: false` and a message.
#[derive(Serialize)]
struct Reply<T> {
    error: bool,
    #[serde(flatten)]
    body: T,
    message: String,
}

fn reply<T: Serialize>(body: T, message: impl Into<String>) -> ErasedJson {
    ErasedJson::new(Reply {
        error: false,
        body,
        message: message.into(),
    })
}

#[derive(Debug, Default, Deserialize)]
pub struct NewScore {
    score: Option<Value>,
}

/// Scores are cast like a loose JSON client expects: numbers pass through,
/// numeric strings are parsed, `null` and `""` count as absent.
pub fn cast_score(value: Option<Value>) -> Result<Option<Number>, Error> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(number)) => Ok(Some(number)),
        Some(Value::String(text)) => {
            let text = text.trim();
            if text.is_empty() {
                return Ok(None);
            }
            text.parse::<i64>()
                .map(Number::from)
                .ok()
                .or_else(|| text.parse::<f64>().ok().and_then(Number::from_f64))
                .map(Some)
                .ok_or(Error::MalformedBody)
        }
        Some(_) => Err(Error::MalformedBody),
    }
}

#[derive(Serialize)]
struct ScoreBody<'a> {
    score: &'a Score,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TopScoresBody<'a> {
    top_scores: &'a Podium,
}

#[derive(Serialize)]
struct RankBody {
    rank: usize,
}

async fn root() -> ErasedJson {
    ErasedJson::new(json!({ "data": "hello" }))
}

async fn create_account(
    State(state): State<AppState>,
    JsonBody(form): JsonBody<SignUp>,
) -> Result<ErasedJson, Error> {
    let registration: Registration = state.accounts.create_account(form).await?;
    Ok(reply(registration, "Registration Successful! 🎉"))
}

async fn login(
    State(state): State<AppState>,
    JsonBody(credentials): JsonBody<Credentials>,
) -> Result<ErasedJson, Error> {
    let session: Session = state.accounts.login(credentials).await?;
    Ok(reply(session, "Login Successful! 🎊"))
}

async fn add_score(
    State(state): State<AppState>,
    AuthPlayer(player): AuthPlayer,
    JsonBody(body): JsonBody<NewScore>,
) -> Result<ErasedJson, Error> {
    let score = cast_score(body.score)?;
    let submission = state.leaderboard.submit_score(&player, score).await?;
    Ok(reply(
        ScoreBody {
            score: submission.score(),
        },
        submission.message(),
    ))
}

async fn top_scores(State(state): State<AppState>) -> Result<ErasedJson, Error> {
    let top = state.leaderboard.top_scores().await?;
    let message = top.message(Local::now().time());
    Ok(reply(
        TopScoresBody {
            top_scores: top.scores(),
        },
        message,
    ))
}

async fn player_rank(
    State(state): State<AppState>,
    AuthPlayer(player): AuthPlayer,
) -> Result<ErasedJson, Error> {
    let rank = state.leaderboard.player_rank(&player).await?;
    Ok(reply(RankBody { rank }, rank_message(&player, rank)))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/create-account", post(create_account))
        .route("/login", post(login))
        .route("/add-score", post(add_score))
        .route("/top-scores", get(top_scores))
        .route("/player-rank", get(player_rank))
        .with_state(state)
}

/// Rate limiting runs ahead of every route, CORS ahead of that.
pub fn app(state: AppState, cors: bool, limiter: Option<RateLimiter>) -> Router {
    let mut app = router(state);
    if let Some(limiter) = limiter {
        app = app.layer(middleware::from_fn_with_state(limiter, ratelimit::limit));
    }
    if cors {
        app = app.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }
    app
}
