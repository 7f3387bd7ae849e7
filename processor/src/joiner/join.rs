//! Cross-join of two topic buckets
//!
//! For topics `A` and `B` every ordered pair `(a, b)` is checked against the
//! filter with bindings `{A: a, B: b}`; matching pairs go through the select
//! (or become `{"A": a, "B": b}`) and the window's output is one JSON array.
//!
//! | Situation                          | Result                    |
//! |------------------------------------|---------------------------|
//! | either bucket empty                | `EmptyBucket`             |
//! | no filter, `require_filter = true` | `NoMatches` (no pairs)    |
//! | no filter, `require_filter = false`| every pair                |
//! | filter errors on a pair            | pair skipped and counted  |
//! | zero pairs matched                 | `NoMatches`               |

use super::store::WindowBucket;
use crate::config::JoinerConfig;
use crate::error::{EmptyWindowError, ProcessorError, Result};
use crate::expr::{self, Bindings, Program, Value};
use crate::{metrics, payload};
use bytes::Bytes;
use rivulet_core::{Event, OutputEnvelope};
use tracing::warn;

/// A window that produced output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutput {
    /// JSON array of matched entries
    pub payload: OutputEnvelope,
    pub matched: usize,
    pub candidates: usize,
    /// Events or pairs dropped by evaluation errors
    pub errors: usize,
}

#[derive(Debug)]
pub struct JoinEngine {
    topics: [String; 2],
    bindings: [String; 2],
    filter: Option<Program>,
    select: Option<Program>,
    require_filter: bool,
}

impl JoinEngine {
    /// Compile the filter and select against both stream bindings
    pub fn new(config: &JoinerConfig) -> Result<Self> {
        let topics = [
            config.streams[0].topic.clone(),
            config.streams[1].topic.clone(),
        ];
        let bindings = [
            config.streams[0].binding_name(),
            config.streams[1].binding_name(),
        ];
        let variables = [bindings[0].as_str(), bindings[1].as_str()];

        let compile = |name: &'static str, source: &Option<String>| -> Result<Option<Program>> {
            source
                .as_deref()
                .map(|s| expr::compile(s, &variables))
                .transpose()
                .map_err(|e| ProcessorError::compile(name, e))
        };
        let filter = compile("filter", &config.filter_expr)?;
        let select = compile("select", &config.select_expr)?;

        if filter.is_none() && config.require_filter {
            warn!("No join filter configured; every window will be empty (JOINER_REQUIRE_FILTER=true)");
        }

        Ok(Self {
            topics,
            bindings,
            filter,
            select,
            require_filter: config.require_filter,
        })
    }

    pub fn topics(&self) -> &[String; 2] {
        &self.topics
    }

    /// Join one window's buckets
    pub fn join(&self, bucket: &WindowBucket) -> std::result::Result<JoinOutput, EmptyWindowError> {
        let left = self.side(bucket, 0)?;
        let right = self.side(bucket, 1)?;

        let candidates = left.events.len() * right.events.len();
        let mut errors = left.errors + right.errors;

        if self.filter.is_none() && self.require_filter {
            return Err(EmptyWindowError::NoMatches { candidates });
        }

        let mut entries: Vec<Bytes> = Vec::new();
        for (event_a, value_a) in &left.events {
            for (event_b, value_b) in &right.events {
                let bindings = Bindings::new()
                    .with(&self.bindings[0], value_a)
                    .with(&self.bindings[1], value_b);

                match self.entry(&bindings, event_a, event_b) {
                    Ok(Some(entry)) => entries.push(entry),
                    Ok(None) => {}
                    Err(e) => {
                        warn!(
                            left = %event_a.id(),
                            right = %event_b.id(),
                            error = %e,
                            "Pair dropped"
                        );
                        metrics::try_record_dropped(e.reason(), 1);
                        errors += 1;
                    }
                }
            }
        }

        if entries.is_empty() {
            return Err(EmptyWindowError::NoMatches { candidates });
        }

        Ok(JoinOutput {
            payload: OutputEnvelope::json(payload::json_array(entries.iter().map(|e| &e[..]))),
            matched: entries.len(),
            candidates,
            errors,
        })
    }

    /// Filter then select one pair; `None` when the filter rejects it
    fn entry(&self, bindings: &Bindings<'_>, a: &Event, b: &Event) -> Result<Option<Bytes>> {
        if let Some(filter) = &self.filter {
            if !expr::as_bool(&filter.evaluate(bindings)?)? {
                return Ok(None);
            }
        }

        let entry = match &self.select {
            Some(select) => expr::as_json_bytes(&select.evaluate(bindings)?)?,
            None => payload::pair_object(&self.topics[0], a.raw(), &self.topics[1], b.raw()),
        };
        Ok(Some(entry))
    }

    /// One topic's events with their expression values
    ///
    /// Events whose payload is not a JSON object are dropped here.
    fn side<'a>(
        &self,
        bucket: &'a WindowBucket,
        index: usize,
    ) -> std::result::Result<Side<'a>, EmptyWindowError> {
        let topic = &self.topics[index];
        let events = bucket
            .get(topic)
            .filter(|events| !events.is_empty())
            .ok_or_else(|| EmptyWindowError::EmptyBucket(topic.clone()))?;

        let mut side = Side {
            events: Vec::with_capacity(events.len()),
            errors: 0,
        };
        for event in events {
            match event.json() {
                Ok(object) => side.events.push((event, Value::from(object))),
                Err(e) => {
                    warn!(event_id = %event.id(), stream = %topic, error = %e, "Event dropped");
                    metrics::try_record_dropped("invalid_payload", 1);
                    side.errors += 1;
                }
            }
        }
        if side.events.is_empty() {
            return Err(EmptyWindowError::EmptyBucket(topic.clone()));
        }
        Ok(side)
    }
}

struct Side<'a> {
    events: Vec<(&'a Event, Value)>,
    errors: usize,
}
