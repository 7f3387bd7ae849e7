//! Joiner: windowed cross-join of two streams
//!
//! Events from both topics collect in a [`WindowStore`]. When the window
//! closes the buckets are joined and reset in one step, and any output goes
//! to the router queue.
//!
//! ```text
//! input ──► WindowStore.append ─┐
//!                               ├─► tick ──► flush_with(JoinEngine::join) ──► output
//! WindowScheduler ──────────────┘
//! ```

mod join;
mod store;
mod window;

pub use join::{JoinEngine, JoinOutput};
pub use store::{WindowBucket, WindowStore};
pub use window::WindowScheduler;

use crate::config::JoinerConfig;
use crate::error::{EmptyWindowError, Result};
use crate::metrics;
use rivulet_core::{Event, OutputEnvelope};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub struct Joiner {
    engine: JoinEngine,
    store: Arc<WindowStore>,
    window: Duration,
}

impl Joiner {
    /// Compile the join expressions and prepare an empty store
    pub fn new(config: &JoinerConfig) -> Result<Self> {
        let engine = JoinEngine::new(config)?;
        let store = Arc::new(WindowStore::new(engine.topics()));
        Ok(Self {
            engine,
            store,
            window: config.window,
        })
    }

    pub fn store(&self) -> Arc<WindowStore> {
        Arc::clone(&self.store)
    }

    pub fn engine(&self) -> &JoinEngine {
        &self.engine
    }

    /// Close the current window
    ///
    /// Joins and resets the store. Returns the output payload, if any.
    pub fn flush(&self) -> Option<OutputEnvelope> {
        let result = self.store.flush_with(|bucket| self.engine.join(bucket));
        match result {
            Ok(out) => {
                debug!(
                    matched = out.matched,
                    candidates = out.candidates,
                    errors = out.errors,
                    "Window joined"
                );
                metrics::try_record_window("emitted");
                metrics::try_record_pairs_matched(out.matched);
                Some(out.payload)
            }
            Err(EmptyWindowError::EmptyBucket(topic)) => {
                debug!(stream = %topic, "Window skipped, stream had no events");
                metrics::try_record_window("empty");
                None
            }
            Err(EmptyWindowError::NoMatches { candidates }) => {
                debug!(candidates, "Window closed without matches");
                metrics::try_record_window("no_match");
                None
            }
        }
    }

    /// Spawn the joiner task
    ///
    /// Appends events as they arrive and closes a window on every tick. The
    /// open window is discarded when `input` closes or shutdown is signaled.
    /// Shutdown is also observed while waiting on a full output queue.
    pub fn spawn(
        self,
        input: mpsc::Receiver<Event>,
        output: mpsc::Sender<OutputEnvelope>,
        shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(self.run(input, output, shutdown))
    }

    async fn run(
        self,
        mut input: mpsc::Receiver<Event>,
        output: mpsc::Sender<OutputEnvelope>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut scheduler = WindowScheduler::new(self.window);
        let [first, second] = self.engine.topics();
        info!(
            streams = %format!("{first},{second}"),
            window_ms = self.window.as_millis() as u64,
            "Joiner started"
        );

        loop {
            tokio::select! {
                maybe = input.recv() => match maybe {
                    Some(event) => {
                        metrics::try_set_queue_depth(input.len());
                        self.store.append(event);
                    }
                    None => break,
                },
                _ = scheduler.tick() => {
                    if let Some(payload) = self.flush() {
                        tokio::select! {
                            sent = output.send(payload) => if sent.is_err() {
                                warn!("Output queue closed, stopping");
                                break;
                            },
                            _ = shutdown.changed() => {
                                warn!("Shutdown while output queue full, window output discarded");
                                break;
                            }
                        }
                    }
                }
                _ = shutdown.changed() => break,
            }
        }

        let discarded: usize = self
            .store
            .snapshot_and_reset()
            .values()
            .map(Vec::len)
            .sum();
        if discarded > 0 {
            warn!(discarded, "Discarding events in open window");
        }
        info!("Joiner stopped");
    }
}
