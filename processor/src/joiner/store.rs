//! Windowed per-topic event store
//!
//! # Concurrency
//!
//! One `RwLock` guards every bucket. `append` takes it for writing per call;
//! a flush takes it for the whole join pass, so appends wait while a window
//! is being joined. The lock is never held across an `.await`.
//!
//! ```text
//!           append(A, e) ─┐
//!           append(B, e) ─┼─► RwLock<{A: [..], B: [..]}> ─► flush_with(join) ─► {A: [], B: []}
//!           append(A, e) ─┘
//! ```

use parking_lot::RwLock;
use rivulet_core::Event;
use std::collections::HashMap;

/// Per-topic events accumulated during one window
pub type WindowBucket = HashMap<String, Vec<Event>>;

#[derive(Debug, Default)]
pub struct WindowStore {
    buckets: RwLock<WindowBucket>,
}

impl WindowStore {
    /// Store with an empty list for each known topic
    pub fn new<S: AsRef<str>>(topics: &[S]) -> Self {
        let buckets = topics
            .iter()
            .map(|t| (t.as_ref().to_string(), Vec::new()))
            .collect();
        Self {
            buckets: RwLock::new(buckets),
        }
    }

    /// Append an event to its topic's list
    pub fn append(&self, event: Event) {
        let mut buckets = self.buckets.write();
        match buckets.get_mut(event.source_topic()) {
            Some(list) => list.push(event),
            None => {
                buckets.insert(event.source_topic().to_string(), vec![event]);
            }
        }
    }

    /// Take the current contents and leave every topic list empty
    pub fn snapshot_and_reset(&self) -> WindowBucket {
        let mut buckets = self.buckets.write();
        buckets
            .iter_mut()
            .map(|(topic, events)| (topic.clone(), std::mem::take(events)))
            .collect()
    }

    /// Run `f` over the current contents, then reset, under one write lock
    ///
    /// No append can land between the pass and the reset.
    pub fn flush_with<R>(&self, f: impl FnOnce(&WindowBucket) -> R) -> R {
        let mut buckets = self.buckets.write();
        let result = f(&buckets);
        for events in buckets.values_mut() {
            events.clear();
        }
        result
    }

    /// Events buffered for `topic`
    pub fn len(&self, topic: &str) -> usize {
        self.buckets.read().get(topic).map_or(0, Vec::len)
    }

    /// Events buffered across all topics
    pub fn total(&self) -> usize {
        self.buckets.read().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}
