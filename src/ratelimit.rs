use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
    time::Duration,
};

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use log::warn;
use moka::future::{Cache, CacheBuilder};

use crate::error::Error;

/// Fixed window request counter per client address. A window opens on a
/// client's first request and the counter is dropped when it closes.
#[derive(Clone)]
pub struct RateLimiter {
    hits: Cache<IpAddr, Arc<AtomicU32>>,
    max: u32,
}

impl RateLimiter {
    pub fn new(max: u32, window: Duration) -> RateLimiter {
        RateLimiter {
            hits: CacheBuilder::new(100_000).time_to_live(window).build(),
            max,
        }
    }

    pub async fn check(&self, client: IpAddr) -> bool {
        let counter = self
            .hits
            .get_with(client, async { Arc::new(AtomicU32::new(0)) })
            .await;
        counter.fetch_add(1, Ordering::Relaxed) < self.max
    }
}

/// Rejects with 429 and the usual `{error, message}` JSON body, where the
/// express limiter answered with the bare message as plain text.
pub async fn limit(
    State(limiter): State<RateLimiter>,
    request: Request,
    next: Next,
) -> Result<Response, Error> {
    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

    if !limiter.check(client).await {
        warn!("Rate limited {}", client);
        return Err(Error::RateLimited);
    }
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::StatusCode,
        middleware,
        routing::get,
        Router,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt; // for `oneshot`

    fn limited_app(max: u32) -> Router {
        Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(middleware::from_fn_with_state(
                RateLimiter::new(max, Duration::from_secs(60)),
                limit,
            ))
    }

    fn request_from(addr: [u8; 4]) -> axum::http::Request<Body> {
        let mut request = axum::http::Request::builder()
            .uri("/")
            .body(Body::empty())
            .unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from((addr, 4000))));
        request
    }

    #[tokio::test]
    async fn middleware_answers_429_once_the_window_is_used_up() {
        let app = limited_app(2);

        for _ in 0..2 {
            let response = app.clone().oneshot(request_from([10, 0, 0, 1])).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = app.clone().oneshot(request_from([10, 0, 0, 1])).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            body,
            json!({ "error": true, "message": "Too many requests, please try again later." })
        );

        let response = app.oneshot(request_from([10, 0, 0, 2])).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn blocks_after_max_within_window() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        let ann = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
        let bob = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2));

        assert!(limiter.check(ann).await);
        assert!(limiter.check(ann).await);
        assert!(!limiter.check(ann).await);
        assert!(limiter.check(bob).await);
    }

    #[tokio::test]
    async fn window_reopens() {
        let limiter = RateLimiter::new(1, Duration::from_millis(100));
        let ann = IpAddr::V4(Ipv4Addr::LOCALHOST);

        assert!(limiter.check(ann).await);
        assert!(!limiter.check(ann).await);
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(limiter.check(ann).await);
    }
}
