use clap::{Parser, ValueEnum};
use std::net::SocketAddr;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// MongoDB for records, Redis for the top scores cache.
    Mongo,
    /// Everything in process memory. Lost on restart.
    Memory,
}

#[derive(Parser, Debug, Clone)]
pub struct Opt {
    /// Binding address.
    #[clap(long, env = "LEADERBOARD_BIND", default_value = "127.0.0.1:8000")]
    pub bind: SocketAddr,
    /// Disable access from all origins.
    #[clap(long)]
    pub nocors: bool,
    /// Where players, scores and the cache live.
    #[clap(long, value_enum, default_value = "mongo")]
    pub store: Backend,
    #[clap(long, env = "MONGO_URL", default_value = "mongodb://127.0.0.1:27017")]
    pub mongo_url: String,
    #[clap(long, env = "MONGO_DB_NAME", default_value = "leaderboard")]
    pub mongo_db_name: String,
    #[clap(long, env = "REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    pub redis_url: String,
    /// Secret used to sign and verify bearer tokens.
    #[clap(long, env = "ACCESS_TOKEN_SECRET", hide_env_values = true)]
    pub access_token_secret: String,
    #[clap(long, default_value = "36000")]
    pub token_ttl_minutes: i64,
    /// How long a computed top scores list is served from the cache.
    #[clap(long, default_value = "300")]
    pub top_scores_ttl_secs: u64,
    /// Requests allowed per client and window, 0 to disable.
    #[clap(long, default_value = "10")]
    pub rate_limit_requests: u32,
    #[clap(long, default_value = "60")]
    pub rate_limit_window_secs: u64,
}
