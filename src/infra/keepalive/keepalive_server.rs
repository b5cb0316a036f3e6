// Liveness endpoint for external uptime monitors.
//
// A single `GET /` that answers 200 while the process is up. It knows
// nothing about Discord and runs on its own tokio task.

use axum::{http::StatusCode, routing::get, Router};
use std::net::SocketAddr;
use tokio::net::TcpListener;

const ALIVE_BODY: &str = "Bot is alive!";

async fn alive() -> (StatusCode, &'static str) {
    (StatusCode::OK, ALIVE_BODY)
}

/// Build the keepalive router.
pub fn router() -> Router {
    Router::new().route("/", get(alive))
}

/// Bind and serve until the process exits.
pub async fn run(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;

    tracing::info!("Keepalive endpoint listening on http://{}", addr);

    axum::serve(listener, router()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_root_reports_alive() {
        let response = router()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], ALIVE_BODY.as_bytes());
    }

    #[tokio::test]
    async fn test_other_routes_are_not_served() {
        let response = router()
            .oneshot(
                Request::builder()
                    .uri("/status")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
