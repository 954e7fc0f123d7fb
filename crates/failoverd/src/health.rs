//! Liveness probe
//!
//! `GET /health` answers `200 OK` while the engine keeps completing cycles
//! and `503` once the heartbeat is older than two poll intervals. Probe
//! requests are not logged.

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use failover_core::Heartbeat;
use std::future::Future;
use std::time::Duration;
use tokio::net::TcpListener;

#[derive(Clone)]
struct ProbeState {
    heartbeat: Heartbeat,
    poll_interval: Duration,
}

/// Build the probe router
pub fn router(heartbeat: Heartbeat, poll_interval: Duration) -> Router {
    Router::new()
        .route("/health", get(health))
        .with_state(ProbeState {
            heartbeat,
            poll_interval,
        })
}

async fn health(State(state): State<ProbeState>) -> (StatusCode, &'static str) {
    if state.heartbeat.is_alive(state.poll_interval) {
        (StatusCode::OK, "OK")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "STALE")
    }
}

/// Serve the probe until `shutdown` resolves
pub async fn serve(
    listener: TcpListener,
    router: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{self, Body};
    use axum::http::Request;
    use chrono::Utc;
    use tower::ServiceExt; // for `oneshot`

    /// A heartbeat last recorded `minutes` ago
    fn minutes_ago(minutes: i64) -> Heartbeat {
        Heartbeat::starting_at(Utc::now() - chrono::Duration::minutes(minutes))
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_fresh_heartbeat_is_healthy() {
        let app = router(Heartbeat::new(), Duration::from_secs(30));

        let resp = app.oneshot(get_request("/health")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"OK");
    }

    #[tokio::test]
    async fn test_stale_heartbeat_is_unavailable() {
        let app = router(minutes_ago(5), Duration::from_secs(30));

        let resp = app.oneshot(get_request("/health")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_heartbeat_within_two_intervals_is_healthy() {
        // Last beat one minute ago, interval 45s: 60s < 90s.
        let app = router(minutes_ago(1), Duration::from_secs(45));

        let resp = app.oneshot(get_request("/health")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_other_paths_are_not_found() {
        let app = router(Heartbeat::new(), Duration::from_secs(30));

        let resp = app.clone().oneshot(get_request("/")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = app.oneshot(get_request("/metrics")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_serve_stops_on_shutdown() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        let server = tokio::spawn(serve(
            listener,
            router(Heartbeat::new(), Duration::from_secs(30)),
            async move {
                let _ = rx.await;
            },
        ));

        tx.send(()).unwrap();
        let result = tokio::time::timeout(Duration::from_secs(5), server).await;
        assert!(result.is_ok(), "Probe should stop within 5 seconds");
    }
}
