//! Aggregate-mode trigger gate
//!
//! Selected payloads wait in the gate until the trigger expression says to
//! release them. The expression sees one variable:
//!
//! ```text
//! trigger = {"count": <pending payloads>, "duration": <ms since first pending>}
//! ```
//!
//! Without an expression the gate fires on every payload and passes it
//! through unchanged. With one, released payloads are sent as a single JSON
//! array and the gate starts over.
//!
//! The trigger is only evaluated when a payload is offered. An idle input
//! never releases held payloads, even once `trigger.duration` would be met.
//!
//! A payload is held only after the trigger evaluated cleanly against the
//! state that includes it. When evaluation fails the payload is rejected and
//! the pending batch is left as it was.

use crate::error::ProcessorError;
use crate::expr::{self, Bindings, Program, Value};
use crate::payload;
use bytes::Bytes;
use indexmap::IndexMap;
use std::time::Instant;

/// Variable the trigger expression is compiled against
pub const TRIGGER_VARIABLE: &str = "trigger";

/// Holds selected payloads until the trigger expression fires
///
/// Evaluated only from [`TriggerGate::offer`]; a `trigger.duration`
/// condition never fires while the input is idle.
#[derive(Debug)]
pub struct TriggerGate {
    program: Option<Program>,
    pending: Vec<Bytes>,
    first_pending_at: Option<Instant>,
}

impl TriggerGate {
    /// Gate with an optional compiled trigger expression
    pub fn new(program: Option<Program>) -> Self {
        Self {
            program,
            pending: Vec::new(),
            first_pending_at: None,
        }
    }

    /// Compile `source` as a trigger expression
    pub fn compile(source: &str) -> Result<Self, ProcessorError> {
        let program = expr::compile(source, &[TRIGGER_VARIABLE])
            .map_err(|e| ProcessorError::compile("trigger", e))?;
        Ok(Self::new(Some(program)))
    }

    /// Add a payload; returns the payload to route if the gate fires
    ///
    /// On an evaluation error the payload is not held and the error is
    /// returned; earlier pending payloads are untouched.
    pub fn offer(&mut self, payload: Bytes, now: Instant) -> Result<Option<Bytes>, ProcessorError> {
        let Some(program) = &self.program else {
            return Ok(Some(payload));
        };

        let first_pending_at = self.first_pending_at.unwrap_or(now);
        let fire = evaluate(program, self.pending.len() + 1, first_pending_at, now)?;

        self.first_pending_at = Some(first_pending_at);
        self.pending.push(payload);

        if fire {
            Ok(Some(self.release()))
        } else {
            Ok(None)
        }
    }

    /// Evaluate the trigger against the current pending state
    ///
    /// Always `true` when no expression is configured.
    pub fn should_trigger(&self, now: Instant) -> Result<bool, ProcessorError> {
        match &self.program {
            None => Ok(true),
            Some(program) => evaluate(
                program,
                self.pending.len(),
                self.first_pending_at.unwrap_or(now),
                now,
            ),
        }
    }

    /// Payloads waiting for the trigger
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    fn release(&mut self) -> Bytes {
        self.first_pending_at = None;
        let batch = std::mem::take(&mut self.pending);
        payload::json_array(batch.iter().map(|b| &b[..]))
    }
}

fn evaluate(
    program: &Program,
    count: usize,
    first_pending_at: Instant,
    now: Instant,
) -> Result<bool, ProcessorError> {
    let elapsed_ms = now.saturating_duration_since(first_pending_at).as_millis();
    let mut state = IndexMap::with_capacity(2);
    state.insert(
        "count".to_string(),
        Value::Int(i64::try_from(count).unwrap_or(i64::MAX)),
    );
    state.insert(
        "duration".to_string(),
        Value::Int(i64::try_from(elapsed_ms).unwrap_or(i64::MAX)),
    );
    let state = Value::Map(state);

    let result = program.evaluate(&Bindings::new().with(TRIGGER_VARIABLE, &state))?;
    Ok(expr::as_bool(&result)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_no_expression_fires_every_payload() {
        let mut gate = TriggerGate::new(None);
        let now = Instant::now();
        let out = gate.offer(Bytes::from(r#"{"x":1}"#), now).unwrap();
        assert_eq!(out, Some(Bytes::from(r#"{"x":1}"#)));
        assert_eq!(gate.pending(), 0);
        assert!(gate.should_trigger(now).unwrap());
    }

    #[test]
    fn test_count_trigger_releases_array() {
        let mut gate = TriggerGate::compile("trigger.count >= 3").unwrap();
        let now = Instant::now();

        assert_eq!(gate.offer(Bytes::from("1"), now).unwrap(), None);
        assert_eq!(gate.offer(Bytes::from("2"), now).unwrap(), None);
        assert_eq!(gate.pending(), 2);

        let out = gate.offer(Bytes::from(r#"{"n":3}"#), now).unwrap().unwrap();
        assert_eq!(&out[..], br#"[1,2,{"n":3}]"#);
        assert_eq!(gate.pending(), 0);

        // Starts over
        assert_eq!(gate.offer(Bytes::from("4"), now).unwrap(), None);
    }

    #[test]
    fn test_duration_trigger() {
        let mut gate = TriggerGate::compile("trigger.duration >= 100").unwrap();
        let start = Instant::now();

        assert_eq!(gate.offer(Bytes::from("1"), start).unwrap(), None);
        assert_eq!(
            gate.offer(Bytes::from("2"), start + Duration::from_millis(50))
                .unwrap(),
            None
        );

        // Due, but nothing is released until the next payload arrives
        assert!(gate.should_trigger(start + Duration::from_millis(150)).unwrap());
        assert_eq!(gate.pending(), 2);

        let out = gate
            .offer(Bytes::from("3"), start + Duration::from_millis(150))
            .unwrap()
            .unwrap();
        assert_eq!(&out[..], b"[1,2,3]");
    }

    #[test]
    fn test_failing_trigger_holds_nothing() {
        let mut gate = TriggerGate::compile("trigger.count").unwrap();
        let now = Instant::now();
        for i in 0..10_000 {
            let err = gate.offer(Bytes::from(i.to_string()), now).unwrap_err();
            assert!(matches!(err, ProcessorError::TypeMismatch(_)));
        }
        assert_eq!(gate.pending(), 0);
    }

    #[test]
    fn test_failing_offer_keeps_earlier_payloads() {
        let mut gate = TriggerGate::compile("trigger.count < 3 ? false : trigger.nope").unwrap();
        let start = Instant::now();

        assert_eq!(gate.offer(Bytes::from("1"), start).unwrap(), None);
        assert_eq!(gate.offer(Bytes::from("2"), start).unwrap(), None);

        let err = gate
            .offer(Bytes::from("3"), start + Duration::from_millis(10))
            .unwrap_err();
        assert!(matches!(err, ProcessorError::Eval(_)));
        assert_eq!(gate.pending(), 2);
        assert!(!gate.should_trigger(start).unwrap());
    }

    #[test]
    fn test_trigger_must_only_reference_trigger() {
        assert!(matches!(
            TriggerGate::compile("event.x > 1"),
            Err(ProcessorError::Compile { name: "trigger", .. })
        ));
    }
}
