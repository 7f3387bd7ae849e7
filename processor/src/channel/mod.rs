//! Channel processor: single-stream filter, select, trigger, route
//!
//! ```text
//! Event ──► should_collect ──false──► dropped (filtered)
//!               │ true
//!               ▼
//!            collect ──► [aggregate: TriggerGate] ──► OutputEnvelope
//! ```
//!
//! Events are processed one at a time by a single task, in arrival order.
//! A failed evaluation drops that event only; the processor keeps running.

mod trigger;

pub use trigger::{TRIGGER_VARIABLE, TriggerGate};

use crate::config::{ChannelConfig, ChannelMode};
use crate::error::{ProcessorError, Result};
use crate::expr::{self, Bindings, Program, Value};
use crate::metrics;
use bytes::Bytes;
use rivulet_core::{Event, OutputEnvelope};
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Result of processing one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Ready for the output router
    Emit(OutputEnvelope),
    /// Rejected by the filter
    Filtered,
    /// Held by the trigger gate
    Held,
}

/// Compiled single-stream pipeline
#[derive(Debug)]
pub struct ChannelProcessor {
    binding: String,
    filter: Option<Program>,
    select: Option<Program>,
    gate: Option<TriggerGate>,
}

impl ChannelProcessor {
    /// Compile every configured expression
    ///
    /// Any compile error is returned here, before the processor starts.
    pub fn new(config: &ChannelConfig) -> Result<Self> {
        let binding = config.binding_name.clone();
        let compile = |name: &'static str, source: &Option<String>| -> Result<Option<Program>> {
            source
                .as_deref()
                .map(|s| expr::compile(s, &[binding.as_str()]))
                .transpose()
                .map_err(|e| ProcessorError::compile(name, e))
        };

        let filter = compile("filter", &config.filter_expr)?;
        let select = compile("select", &config.select_expr)?;

        let gate = match config.mode {
            ChannelMode::Stream => {
                if config.trigger_expr.is_some() {
                    warn!("CHANNEL_AGGREGATE_TRIGGER is ignored in stream mode");
                }
                None
            }
            ChannelMode::Aggregate => Some(match &config.trigger_expr {
                Some(source) => TriggerGate::compile(source)?,
                None => TriggerGate::new(None),
            }),
        };

        Ok(Self {
            binding,
            filter,
            select,
            gate,
        })
    }

    /// Variable name the event is bound to
    pub fn binding(&self) -> &str {
        &self.binding
    }

    /// Whether the event passes the filter
    ///
    /// Always `true` without a filter. A non-boolean filter result is a
    /// `TypeMismatch` error.
    pub fn should_collect(&self, event: &Event) -> Result<bool> {
        let Some(filter) = &self.filter else {
            return Ok(true);
        };
        let value = Value::from(event.json()?);
        let result = filter.evaluate(&Bindings::new().with(&self.binding, &value))?;
        Ok(expr::as_bool(&result)?)
    }

    /// Output payload for an event
    ///
    /// The select result as JSON, or the event's raw JSON without a select.
    pub fn collect(&self, event: &Event) -> Result<Bytes> {
        let json = event.json()?;
        match &self.select {
            None => Ok(event.raw().clone()),
            Some(select) => {
                let value = Value::from(json);
                let result = select.evaluate(&Bindings::new().with(&self.binding, &value))?;
                Ok(expr::as_json_bytes(&result)?)
            }
        }
    }

    /// Run the full pipeline for one event
    pub fn process(&mut self, event: &Event, now: Instant) -> Result<Outcome> {
        if !self.should_collect(event)? {
            return Ok(Outcome::Filtered);
        }

        let payload = self.collect(event)?;

        let payload = match &mut self.gate {
            None => Some(payload),
            Some(gate) => gate.offer(payload, now)?,
        };

        Ok(match payload {
            Some(bytes) => Outcome::Emit(OutputEnvelope::json(bytes)),
            None => Outcome::Held,
        })
    }

    /// Payloads waiting in the trigger gate
    pub fn pending(&self) -> usize {
        self.gate.as_ref().map_or(0, TriggerGate::pending)
    }

    /// Spawn the processing task
    ///
    /// The task stops when `input` closes or shutdown is signaled, including
    /// while it waits on a full output queue. Payloads still held by the
    /// trigger gate are discarded.
    pub fn spawn(
        self,
        input: mpsc::Receiver<Event>,
        output: mpsc::Sender<OutputEnvelope>,
        shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(self.run(input, output, shutdown))
    }

    async fn run(
        mut self,
        mut input: mpsc::Receiver<Event>,
        output: mpsc::Sender<OutputEnvelope>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(
            binding = %self.binding,
            filter = self.filter.as_ref().map(Program::source),
            select = self.select.as_ref().map(Program::source),
            aggregate = self.gate.is_some(),
            "Channel processor started"
        );

        loop {
            let event = tokio::select! {
                maybe = input.recv() => match maybe {
                    Some(event) => event,
                    None => break,
                },
                _ = shutdown.changed() => break,
            };
            metrics::try_set_queue_depth(input.len());

            match self.process(&event, Instant::now()) {
                Ok(Outcome::Emit(payload)) => {
                    debug!(event_id = %event.id(), bytes = payload.len(), "Event collected");
                    tokio::select! {
                        sent = output.send(payload) => if sent.is_err() {
                            warn!("Output queue closed, stopping");
                            break;
                        },
                        _ = shutdown.changed() => {
                            warn!("Shutdown while output queue full, payload discarded");
                            break;
                        }
                    }
                }
                Ok(Outcome::Filtered) => {
                    debug!(event_id = %event.id(), "Event filtered");
                    metrics::try_record_dropped("filtered", 1);
                }
                Ok(Outcome::Held) => {
                    debug!(event_id = %event.id(), pending = self.pending(), "Event held");
                }
                Err(e) => {
                    warn!(event_id = %event.id(), error = %e, "Event dropped");
                    metrics::try_record_dropped(e.reason(), 1);
                }
            }
        }

        if self.pending() > 0 {
            warn!(pending = self.pending(), "Discarding payloads held by trigger");
        }
        info!("Channel processor stopped");
    }
}
