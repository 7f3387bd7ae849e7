//! Output routing
//!
//! Every payload produced by a processor goes to up to two targets:
//!
//! ```text
//!                         ┌─► publish(stream.endpoint, stream.route)      ─┐
//! payload ──► OutputRouter┤                                                ├─► RouteReport
//!                         └─► invoke(component.endpoint, component.route) ─┘
//! ```
//!
//! Both dispatches run concurrently and independently. A failure is logged
//! and counted; it never blocks or undoes the other dispatch and is never
//! retried here.

use crate::metrics;
use rivulet_core::{OutputEnvelope, Target, Transport, TransportError};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// The configured output destinations
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Targets {
    /// Topic publish destination (`pubsub/topic`)
    pub stream: Option<Target>,
    /// Remote invocation destination (`app-id/method`)
    pub component: Option<Target>,
}

impl Targets {
    /// True when nothing would be sent
    pub fn is_empty(&self) -> bool {
        self.stream.is_none() && self.component.is_none()
    }
}

/// Outcome of routing one payload
///
/// `None` means that target is not configured.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteReport {
    pub published: Option<Result<(), TransportError>>,
    pub invoked: Option<Result<(), TransportError>>,
}

impl RouteReport {
    /// True when every attempted dispatch succeeded
    pub fn is_ok(&self) -> bool {
        self.published.as_ref().map_or(true, Result::is_ok)
            && self.invoked.as_ref().map_or(true, Result::is_ok)
    }
}

#[derive(Debug, Clone, Copy)]
enum DispatchKind {
    Publish,
    Invoke,
}

impl DispatchKind {
    fn as_str(self) -> &'static str {
        match self {
            DispatchKind::Publish => "publish",
            DispatchKind::Invoke => "invoke",
        }
    }
}

/// Dispatches payloads to the configured targets through a [`Transport`]
#[derive(Clone)]
pub struct OutputRouter {
    transport: Arc<dyn Transport>,
    targets: Targets,
}

impl OutputRouter {
    pub fn new(transport: Arc<dyn Transport>, targets: Targets) -> Self {
        Self { transport, targets }
    }

    pub fn targets(&self) -> &Targets {
        &self.targets
    }

    pub fn transport_name(&self) -> &'static str {
        self.transport.name()
    }

    /// Send `payload` to every configured target
    pub async fn route(&self, payload: &OutputEnvelope) -> RouteReport {
        let publish = async {
            match &self.targets.stream {
                Some(target) => Some(self.dispatch(DispatchKind::Publish, target, payload).await),
                None => None,
            }
        };
        let invoke = async {
            match &self.targets.component {
                Some(target) => Some(self.dispatch(DispatchKind::Invoke, target, payload).await),
                None => None,
            }
        };

        let (published, invoked) = tokio::join!(publish, invoke);
        RouteReport { published, invoked }
    }

    async fn dispatch(
        &self,
        kind: DispatchKind,
        target: &Target,
        payload: &OutputEnvelope,
    ) -> Result<(), TransportError> {
        let start = Instant::now();
        let result = match kind {
            DispatchKind::Publish => self.transport.publish(target, payload).await,
            DispatchKind::Invoke => self.transport.invoke(target, payload).await,
        };
        metrics::try_record_dispatch(kind.as_str(), result.is_ok(), start.elapsed());

        match &result {
            Ok(()) => debug!(
                kind = kind.as_str(),
                target = %target,
                bytes = payload.len(),
                "Dispatched"
            ),
            Err(e) => error!(
                kind = kind.as_str(),
                target = %target,
                error = %e,
                "Dispatch failed"
            ),
        }
        result
    }
}

/// Output task: routes payloads until every producer has dropped its sender
///
/// Payloads already queued when the producers stop are still delivered.
pub async fn output_loop(router: OutputRouter, mut rx: mpsc::Receiver<OutputEnvelope>) {
    info!(
        transport = router.transport_name(),
        stream_target = ?router.targets().stream,
        component_target = ?router.targets().component,
        "Output loop started"
    );

    let mut routed = 0u64;
    while let Some(payload) = rx.recv().await {
        router.route(&payload).await;
        routed += 1;
    }

    info!(routed, "Output loop stopped");
}
