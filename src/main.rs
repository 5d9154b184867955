use std::{error::Error as StdError, net::SocketAddr, sync::Arc, time::Duration};

use clap::Parser;
use leaderboard_http::{
    accounts::Accounts,
    auth::Authenticator,
    cache::{MemoryCache, RankCache},
    http::{self, AppState},
    leaderboard::Leaderboard,
    mongo::MongoStore,
    opt::{Backend, Opt},
    ratelimit::RateLimiter,
    redis::RedisCache,
    store::{MemoryStore, PlayerStore, ScoreStore},
};
use log::{error, info};
use tokio::{net::TcpListener, signal};

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(
        env_logger::Env::new()
            .filter("LEADERBOARD_LOG")
            .write_style("LEADERBOARD_LOG_STYLE"),
    )
    .format_timestamp(None)
    .format_module_path(false)
    .format_target(false)
    .init();

    let opt = Opt::parse();
    if let Err(err) = serve(opt).await {
        error!("{}", err);
        std::process::exit(1);
    }
}

type Backends = (Arc<dyn PlayerStore>, Arc<dyn ScoreStore>, Arc<dyn RankCache>);

async fn backends(opt: &Opt) -> Result<Backends, Box<dyn StdError>> {
    let backends: Backends = match opt.store {
        Backend::Mongo => {
            let mongo = Arc::new(MongoStore::new(&opt.mongo_url, &opt.mongo_db_name).await?);
            let redis = Arc::new(RedisCache::new(&opt.redis_url).await?);
            (mongo.clone(), mongo, redis)
        }
        Backend::Memory => {
            info!("Using the in-memory store, nothing survives a restart");
            let memory = Arc::new(MemoryStore::new());
            (memory.clone(), memory, Arc::new(MemoryCache::new()))
        }
    };
    Ok(backends)
}

async fn serve(opt: Opt) -> Result<(), Box<dyn StdError>> {
    info!(
        "Starting leaderboard-http {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("VERGEN_GIT_SHA")
    );

    let (players, scores, cache) = backends(&opt).await?;
    let auth = Arc::new(Authenticator::new(
        &opt.access_token_secret,
        chrono::Duration::minutes(opt.token_ttl_minutes),
    ));
    let state = AppState {
        accounts: Arc::new(Accounts::new(players, auth.clone())),
        leaderboard: Arc::new(
            Leaderboard::new(scores, cache)
                .with_ttl(Duration::from_secs(opt.top_scores_ttl_secs)),
        ),
        auth,
    };

    let limiter = (opt.rate_limit_requests > 0).then(|| {
        RateLimiter::new(
            opt.rate_limit_requests,
            Duration::from_secs(opt.rate_limit_window_secs),
        )
    });
    let app = http::app(state, !opt.nocors, limiter);

    let listener = TcpListener::bind(opt.bind).await?;
    info!("Listening on {}", opt.bind);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", err);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!("Failed to listen for SIGTERM: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}
