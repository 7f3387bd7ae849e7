//! End-to-end channel tests
//!
//! HTTP delivery ──► EventSender ──► ChannelProcessor ──► output_loop ──► transport

#![allow(clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use parking_lot::Mutex;
use rivulet_processor::{
    output_loop, ChannelConfig, ChannelProcessor, EventSender, IngestServer, OutputEnvelope,
    OutputRouter, Target, Transport, TransportError,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tower::ServiceExt;

// ============================================================================
// Capture transport
// ============================================================================

#[derive(Default)]
struct CaptureTransport {
    calls: Mutex<Vec<(&'static str, Target, serde_json::Value)>>,
}

impl CaptureTransport {
    fn calls(&self) -> Vec<(&'static str, Target, serde_json::Value)> {
        self.calls.lock().clone()
    }

    fn record(&self, kind: &'static str, target: &Target, payload: &OutputEnvelope) {
        let json = serde_json::from_slice(payload.bytes()).unwrap();
        self.calls.lock().push((kind, target.clone(), json));
    }

    async fn wait_for(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.calls.lock().len() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("dispatch did not arrive");
    }
}

#[async_trait]
impl Transport for CaptureTransport {
    fn name(&self) -> &'static str {
        "capture"
    }

    async fn publish(&self, target: &Target, payload: &OutputEnvelope) -> Result<(), TransportError> {
        self.record("publish", target, payload);
        Ok(())
    }

    async fn invoke(&self, target: &Target, payload: &OutputEnvelope) -> Result<(), TransportError> {
        self.record("invoke", target, payload);
        Ok(())
    }

    async fn health(&self) -> bool {
        true
    }
}

// ============================================================================
// Harness
// ============================================================================

struct Pipeline {
    app: Router,
    transport: Arc<CaptureTransport>,
    shutdown: watch::Sender<bool>,
    processor: JoinHandle<()>,
    output: JoinHandle<()>,
}

fn start(vars: &[(&str, &str)]) -> Pipeline {
    let mut map: HashMap<&str, &str> = HashMap::from([
        ("APP_ID", "channel-1"),
        ("CHANNEL_STREAM_INFO", "pubsub|orders"),
        ("CHANNEL_TARGET", "pricing/compute"),
    ]);
    map.extend(vars.iter().copied());
    let config = ChannelConfig::from_lookup(|k| map.get(k).map(|v| v.to_string())).unwrap();

    let transport = Arc::new(CaptureTransport::default());
    let dyn_transport: Arc<dyn Transport> = transport.clone();
    let router = OutputRouter::new(dyn_transport, config.targets.clone());

    let (sender, input) = EventSender::channel(64);
    let (out_tx, out_rx) = mpsc::channel(64);
    let (shutdown, shutdown_rx) = watch::channel(false);

    let processor = ChannelProcessor::new(&config)
        .unwrap()
        .spawn(input, out_tx, shutdown_rx);
    let output = tokio::spawn(output_loop(router, out_rx));

    let mut server = IngestServer::new(sender).invocation(&config.service_route, &config.binding_name);
    if let Some(source) = &config.source {
        server = server.stream(source.clone());
    }

    Pipeline {
        app: server.router(),
        transport,
        shutdown,
        processor,
        output,
    }
}

fn delivery(topic: &str, data: &str) -> Request<Body> {
    let envelope = format!(
        r#"{{"id":"evt","topic":"{topic}","pubsubname":"pubsub","datacontenttype":"application/json","data":{data}}}"#
    );
    Request::builder()
        .method("POST")
        .uri(format!("/{topic}"))
        .header(header::CONTENT_TYPE, "application/cloudevents+json")
        .body(Body::from(envelope))
        .unwrap()
}

async fn deliver(app: &Router, topic: &str, data: &str) {
    let response = app.clone().oneshot(delivery(topic, data)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

async fn stop(pipeline: Pipeline) -> Arc<CaptureTransport> {
    let Pipeline {
        app,
        transport,
        shutdown,
        processor,
        output,
    } = pipeline;
    drop(app);
    shutdown.send(true).unwrap();
    processor.await.unwrap();
    output.await.unwrap();
    transport
}

// ============================================================================
// Stream mode
// ============================================================================

#[tokio::test]
async fn passthrough_invokes_component_target() {
    let pipeline = start(&[]);

    deliver(&pipeline.app, "orders", r#"{"x":1}"#).await;
    pipeline.transport.wait_for(1).await;

    let transport = stop(pipeline).await;
    assert_eq!(
        transport.calls(),
        vec![(
            "invoke",
            Target::new("pricing", "compute"),
            serde_json::json!({"x": 1})
        )]
    );
}

#[tokio::test]
async fn filter_drops_non_matching_events() {
    let pipeline = start(&[("CHANNEL_SELECT_FILTER_EXPRESSION", "orders.x > 0")]);

    deliver(&pipeline.app, "orders", r#"{"x":-1}"#).await;
    deliver(&pipeline.app, "orders", r#"{"x":5}"#).await;
    pipeline.transport.wait_for(1).await;

    let transport = stop(pipeline).await;
    let calls = transport.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].2, serde_json::json!({"x": 5}));
}

#[tokio::test]
async fn select_and_both_targets() {
    let pipeline = start(&[
        ("CHANNEL_STREAM_TARGET", "pubsub/priced"),
        (
            "CHANNEL_SELECT_DATA_EXPRESSION",
            r#"{"sku": orders.sku, "total": orders.qty * orders.price}"#,
        ),
    ]);

    deliver(&pipeline.app, "orders", r#"{"sku":"a","qty":3,"price":2.5}"#).await;
    pipeline.transport.wait_for(2).await;

    let transport = stop(pipeline).await;
    let mut calls = transport.calls();
    calls.sort_by_key(|(kind, _, _)| *kind);
    let expected = serde_json::json!({"sku": "a", "total": 7.5});
    assert_eq!(
        calls,
        vec![
            ("invoke", Target::new("pricing", "compute"), expected.clone()),
            ("publish", Target::new("pubsub", "priced"), expected),
        ]
    );
}

#[tokio::test]
async fn invocation_route_feeds_the_same_pipeline() {
    let pipeline = start(&[]);

    let response = pipeline
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/channel-1")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"y":2}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    pipeline.transport.wait_for(1).await;

    let transport = stop(pipeline).await;
    assert_eq!(transport.calls()[0].2, serde_json::json!({"y": 2}));
}

// ============================================================================
// Aggregate mode
// ============================================================================

#[tokio::test]
async fn aggregate_releases_batch_on_trigger() {
    let pipeline = start(&[
        ("CHANNEL_MODE", "aggregate"),
        ("CHANNEL_AGGREGATE_TRIGGER", "trigger.count >= 3"),
        ("CHANNEL_SELECT_DATA_EXPRESSION", "orders.x"),
    ]);

    for x in 1..=4 {
        deliver(&pipeline.app, "orders", &format!(r#"{{"x":{x}}}"#)).await;
    }
    pipeline.transport.wait_for(1).await;

    let transport = stop(pipeline).await;
    let calls = transport.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].2, serde_json::json!([1, 2, 3]));
}
