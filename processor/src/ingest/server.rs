//! HTTP delivery surface
//!
//! # Endpoints
//!
//! - `POST /{service_route}` - push invocation; echoes the body on success
//! - `POST /{stream_route}` - topic delivery; answers `{"status": ...}`
//! - `GET /dapr/subscribe` - subscriptions for the configured streams
//! - `GET /health` - liveness
//!
//! Topic deliveries always get a 200 with a status the sidecar acts on:
//! `SUCCESS`, `RETRY` (queue full, redeliver later) or `DROP` (undecodable).

use super::{EventSender, IngestError, InvocationEvent, decode_invocation};
use crate::config::StreamInfo;
use crate::metrics;
use axum::extract::{RawQuery, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use rivulet_core::CONTENT_TYPE_CLOUDEVENTS;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Builder for a processor's HTTP router
///
/// # Example
///
/// ```ignore
/// let app = IngestServer::new(sender)
///     .invocation("channel-1", "event")
///     .stream(info)
///     .router();
/// ```
pub struct IngestServer {
    sender: EventSender,
    invocation: Option<(String, String)>,
    streams: Vec<StreamInfo>,
}

impl IngestServer {
    pub fn new(sender: EventSender) -> Self {
        Self {
            sender,
            invocation: None,
            streams: Vec::new(),
        }
    }

    /// Accept push invocations on `/{route}`, attributing events to `topic`
    pub fn invocation(mut self, route: impl Into<String>, topic: impl Into<String>) -> Self {
        self.invocation = Some((route.into(), topic.into()));
        self
    }

    /// Accept topic deliveries for a subscribed stream
    pub fn stream(mut self, info: StreamInfo) -> Self {
        self.streams.push(info);
        self
    }

    pub fn router(&self) -> Router {
        let subscriptions: Arc<Vec<Subscription>> = Arc::new(
            self.streams
                .iter()
                .map(|s| Subscription {
                    pubsubname: s.pubsub.clone(),
                    topic: s.topic.clone(),
                    route: s.path(),
                })
                .collect(),
        );

        let mut app = Router::new()
            .route("/health", get(health_handler))
            .merge(
                Router::new()
                    .route("/dapr/subscribe", get(subscribe_handler))
                    .with_state(subscriptions),
            );

        if let Some((route, topic)) = &self.invocation {
            let state = RouteState {
                sender: self.sender.clone(),
                topic: topic.clone(),
            };
            app = app.merge(
                Router::new()
                    .route(&format!("/{route}"), post(invocation_handler))
                    .with_state(state),
            );
        }

        for stream in &self.streams {
            let state = RouteState {
                sender: self.sender.clone(),
                topic: stream.topic.clone(),
            };
            app = app.merge(
                Router::new()
                    .route(&stream.path(), post(delivery_handler))
                    .with_state(state),
            );
        }

        app
    }
}

#[derive(Clone)]
struct RouteState {
    sender: EventSender,
    topic: String,
}

#[derive(Debug, Serialize)]
struct Subscription {
    pubsubname: String,
    topic: String,
    route: String,
}

#[derive(Debug, Serialize)]
struct DeliveryStatus {
    status: &'static str,
}

fn content_type(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
}

fn status_code(err: &IngestError) -> StatusCode {
    match err {
        IngestError::UnsupportedType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        IngestError::QueueFull | IngestError::Closed => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::BAD_REQUEST,
    }
}

async fn invocation_handler(
    State(state): State<RouteState>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let invocation = InvocationEvent {
        content_type: content_type(&headers).unwrap_or_default().to_string(),
        data: body.clone(),
        data_type_url: String::new(),
        query_string: query.unwrap_or_default(),
    };

    match decode_invocation(&state.topic, &invocation).and_then(|e| state.sender.try_send(e)) {
        Ok(()) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, invocation.content_type)],
            body,
        )
            .into_response(),
        Err(e) => {
            warn!(stream = %state.topic, error = %e, "Invocation rejected");
            metrics::try_record_dropped(e.reason(), 1);
            (status_code(&e), e.to_string()).into_response()
        }
    }
}

async fn delivery_handler(
    State(state): State<RouteState>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<DeliveryStatus> {
    let invocation = InvocationEvent {
        content_type: content_type(&headers)
            .unwrap_or(CONTENT_TYPE_CLOUDEVENTS)
            .to_string(),
        data: body,
        ..Default::default()
    };

    let status = match decode_invocation(&state.topic, &invocation)
        .and_then(|e| state.sender.try_send(e))
    {
        Ok(()) => {
            debug!(stream = %state.topic, "Delivery accepted");
            "SUCCESS"
        }
        Err(e) => {
            metrics::try_record_dropped(e.reason(), 1);
            if e.is_retryable() {
                warn!(stream = %state.topic, error = %e, "Delivery deferred");
                "RETRY"
            } else {
                warn!(stream = %state.topic, error = %e, "Delivery dropped");
                "DROP"
            }
        }
    };
    Json(DeliveryStatus { status })
}

async fn subscribe_handler(State(subscriptions): State<Arc<Vec<Subscription>>>) -> Response {
    Json(subscriptions.as_slice()).into_response()
}

async fn health_handler() -> StatusCode {
    StatusCode::OK
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::StreamInfo;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn post_json(path: &str, content_type: &str, body: &str) -> Request<Body> {
        Request::post(path)
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn channel_app(capacity: usize) -> (Router, tokio::sync::mpsc::Receiver<rivulet_core::Event>) {
        let (sender, rx) = EventSender::channel(capacity);
        let app = IngestServer::new(sender)
            .invocation("channel-1", "event")
            .stream(StreamInfo::parse("k", "pubsub|orders|/orders-in").unwrap())
            .router();
        (app, rx)
    }

    // ==========================================================================
    // Invocation
    // ==========================================================================

    #[tokio::test]
    async fn test_invocation_enqueues_and_echoes() {
        let (app, mut rx) = channel_app(8);

        let response = app
            .oneshot(post_json("/channel-1", "application/json", r#"{"x":1}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, serde_json::json!({"x": 1}));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.source_topic(), "event");
        assert_eq!(event.json().unwrap()["x"], 1);
    }

    #[tokio::test]
    async fn test_invocation_unsupported_type() {
        let (app, mut rx) = channel_app(8);
        let response = app
            .oneshot(post_json("/channel-1", "text/plain", "hello"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_invocation_bad_json() {
        let (app, _rx) = channel_app(8);
        let response = app
            .oneshot(post_json("/channel-1", "application/json", "[1,2]"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_invocation_queue_full() {
        let (app, _rx) = channel_app(1);
        let first = app
            .clone()
            .oneshot(post_json("/channel-1", "application/json", "{}"))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app
            .oneshot(post_json("/channel-1", "application/json", "{}"))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    // ==========================================================================
    // Topic delivery
    // ==========================================================================

    #[tokio::test]
    async fn test_delivery_success() {
        let (app, mut rx) = channel_app(8);
        let response = app
            .oneshot(post_json(
                "/orders-in",
                "application/cloudevents+json",
                r#"{"id":"1","topic":"orders","data":{"x":3}}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "SUCCESS");

        let event = rx.recv().await.unwrap();
        assert_eq!(event.source_topic(), "orders");
        assert_eq!(event.id(), "1");
    }

    #[tokio::test]
    async fn test_delivery_without_content_type_is_cloudevent() {
        let (app, mut rx) = channel_app(8);
        let request = Request::post("/orders-in")
            .body(Body::from(r#"{"data":{"x":4}}"#))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(body_json(response).await["status"], "SUCCESS");
        assert_eq!(rx.recv().await.unwrap().json().unwrap()["x"], 4);
    }

    #[tokio::test]
    async fn test_delivery_drop_and_retry() {
        let (app, _rx) = channel_app(1);

        let response = app
            .clone()
            .oneshot(post_json("/orders-in", "application/cloudevents+json", "{}"))
            .await
            .unwrap();
        assert_eq!(body_json(response).await["status"], "DROP");

        let ok = r#"{"data":{"x":1}}"#;
        let response = app
            .clone()
            .oneshot(post_json("/orders-in", "application/cloudevents+json", ok))
            .await
            .unwrap();
        assert_eq!(body_json(response).await["status"], "SUCCESS");

        let response = app
            .oneshot(post_json("/orders-in", "application/cloudevents+json", ok))
            .await
            .unwrap();
        assert_eq!(body_json(response).await["status"], "RETRY");
    }

    // ==========================================================================
    // Discovery
    // ==========================================================================

    #[tokio::test]
    async fn test_subscribe_lists_streams() {
        let (app, _rx) = channel_app(8);
        let response = app
            .oneshot(Request::get("/dapr/subscribe").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(
            body_json(response).await,
            serde_json::json!([{"pubsubname": "pubsub", "topic": "orders", "route": "/orders-in"}])
        );
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _rx) = channel_app(8);
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
