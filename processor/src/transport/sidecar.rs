//! Sidecar HTTP transport
//!
//! | Operation | Request                                        |
//! |-----------|------------------------------------------------|
//! | publish   | `POST {base}/v1.0/publish/{pubsub}/{topic}`    |
//! | invoke    | `POST {base}/v1.0/invoke/{app_id}/method/{method}` |
//! | health    | `GET  {base}/v1.0/healthz/outbound`            |
//!
//! One attempt per call; the sidecar owns retries and resiliency policy.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use rivulet_core::{OutputEnvelope, Target, Transport, TransportError};
use std::time::Duration;
use tracing::debug;

/// Longest error body kept in a `Rejected` error
const MAX_ERROR_BODY: usize = 512;

pub struct SidecarTransport {
    base_url: String,
    client: reqwest::Client,
}

impl SidecarTransport {
    /// Create a transport for the sidecar at `base_url` (e.g. `http://127.0.0.1:3500`)
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Init(e.to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn publish_url(&self, target: &Target) -> String {
        format!(
            "{}/v1.0/publish/{}/{}",
            self.base_url,
            target.endpoint(),
            target.route()
        )
    }

    fn invoke_url(&self, target: &Target) -> String {
        format!(
            "{}/v1.0/invoke/{}/method/{}",
            self.base_url,
            target.endpoint(),
            target.route()
        )
    }

    async fn post(
        &self,
        url: String,
        payload: &OutputEnvelope,
        failed: fn(String) -> TransportError,
    ) -> Result<(), TransportError> {
        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, payload.content_type())
            .body(payload.bytes().clone())
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    TransportError::Connection(e.to_string())
                } else {
                    failed(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Rejected {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY).collect(),
            });
        }

        debug!(url = %url, status = status.as_u16(), bytes = payload.len(), "Sidecar accepted");
        Ok(())
    }
}

#[async_trait]
impl Transport for SidecarTransport {
    fn name(&self) -> &'static str {
        "sidecar"
    }

    async fn publish(
        &self,
        target: &Target,
        payload: &OutputEnvelope,
    ) -> Result<(), TransportError> {
        self.post(self.publish_url(target), payload, TransportError::Publish)
            .await
    }

    async fn invoke(
        &self,
        target: &Target,
        payload: &OutputEnvelope,
    ) -> Result<(), TransportError> {
        self.post(self.invoke_url(target), payload, TransportError::Invoke)
            .await
    }

    async fn health(&self) -> bool {
        let url = format!("{}/v1.0/healthz/outbound", self.base_url);
        match self.client.get(url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}
