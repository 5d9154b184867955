pub mod accounts;
pub mod auth;
pub mod cache;
pub mod error;
pub mod http;
pub mod leaderboard;
pub mod model;
pub mod mongo;
pub mod opt;
pub mod ratelimit;
pub mod redis;
pub mod store;
