use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::AppState;

/// Header the provider echoes the registered secret in.
pub const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

/// `POST /webhook`: acknowledge as soon as the update is queued.
///
/// Deliveries without the registered secret are refused before the payload
/// is even parsed.
pub async fn webhook_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let presented = headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok());
    if presented != Some(&*state.webhook_secret) {
        state.metrics.unauthorized_delivery();
        warn!(
            "Refusing webhook delivery with {} secret",
            if presented.is_some() { "a wrong" } else { "no" }
        );
        return StatusCode::UNAUTHORIZED.into_response();
    }

    match state.bridge.ingest(&body) {
        StatusCode::OK => (StatusCode::OK, "OK").into_response(),
        status => status.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::TEST_WEBHOOK_SECRET;
    use axum::{Router, body::Body, http::Request, routing::post};
    use std::time::Duration;
    use tower::ServiceExt;

    fn post_update_with(secret: Option<&str>, body: &str) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/webhook")
            .header("content-type", "application/json");
        if let Some(secret) = secret {
            builder = builder.header(SECRET_HEADER, secret);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn post_update(body: &str) -> Request<Body> {
        post_update_with(Some(TEST_WEBHOOK_SECRET), body)
    }

    const SAVE_UPDATE: &str = r#"{
        "update_id": 900,
        "message": {
            "message_id": 31,
            "chat": {"id": -1001918569531, "type": "supergroup"},
            "from": {"id": 42, "is_bot": false},
            "text": "/save Atomic Habits"
        }
    }"#;

    #[tokio::test]
    async fn test_malformed_payload_is_bad_request() {
        let (state, _transport) = crate::test_helpers::test_app_state().await;
        let app = Router::new()
            .route("/webhook", post(webhook_handler))
            .with_state(state.clone());

        let resp = app.oneshot(post_update("{\"update_id\":")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(state.metrics.snapshot().ingress.queued, 0);
    }

    #[tokio::test]
    async fn test_delivery_without_secret_never_reaches_queue() {
        let (state, transport) = crate::test_helpers::test_app_state().await;
        state.runtime.initialize().unwrap();
        state
            .runtime
            .start("https://bot.example.com/webhook")
            .await
            .unwrap();
        let app = Router::new()
            .route("/webhook", post(webhook_handler))
            .with_state(state.clone());

        for secret in [None, Some("guessed-token"), Some("")] {
            let resp = app
                .clone()
                .oneshot(post_update_with(secret, SAVE_UPDATE))
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        }

        let snapshot = state.metrics.snapshot();
        assert_eq!(snapshot.ingress.unauthorized, 3);
        assert_eq!(snapshot.ingress.received, 0);
        assert_eq!(snapshot.ingress.queued, 0);

        state.runtime.shutdown().await;
        assert!(transport.replies().is_empty());
        assert_eq!(state.db.get_stats().await.unwrap().records, 0);
    }

    #[tokio::test]
    async fn test_unavailable_until_started() {
        let (state, _transport) = crate::test_helpers::test_app_state().await;
        let app = Router::new()
            .route("/webhook", post(webhook_handler))
            .with_state(state);

        let resp = app.oneshot(post_update(SAVE_UPDATE)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_update_is_acknowledged_and_handled() {
        let (state, transport) = crate::test_helpers::test_app_state().await;
        state.runtime.initialize().unwrap();
        state
            .runtime
            .start("https://bot.example.com/webhook")
            .await
            .unwrap();
        let app = Router::new()
            .route("/webhook", post(webhook_handler))
            .with_state(state.clone());

        let resp = app.clone().oneshot(post_update(SAVE_UPDATE)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"OK");

        // Redelivery of the same update must not store a second record
        let resp = app.oneshot(post_update(SAVE_UPDATE)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        for _ in 0..500 {
            if transport.replies().len() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let replies = transport.replies();
        assert_eq!(replies.len(), 2);
        assert!(replies[0].text.starts_with("Saved as #"));
        assert!(replies[1].text.starts_with("Already saved as #"));
        assert_eq!(state.db.get_stats().await.unwrap().records, 1);

        state.runtime.shutdown().await;
    }
}
