//! Port for structured conversation logging.
//!
//! Defines the [`ConversationLogger`] trait for recording discussion events
//! (round start, member turns, failures, compactions) to a structured log.
//!
//! This is separate from `tracing`-based operation logs: tracing handles
//! human-readable diagnostic messages, while this port captures the full
//! discussion transcript in a machine-readable format (JSONL).

use chorus_domain::SessionId;
use serde_json::Value;

/// One transcript record: a type tag plus a JSON payload. The logger adds
/// the timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationEvent {
    /// `round_started`, `turn_completed`, `turn_failed`, `compaction`, ...
    pub event_type: &'static str,
    pub payload: Value,
}

impl ConversationEvent {
    pub fn new(event_type: &'static str, payload: Value) -> Self {
        Self {
            event_type,
            payload,
        }
    }

    /// Event tagged with the session it belongs to.
    ///
    /// Object payloads gain a `session` field; any other payload is wrapped
    /// as `{"session": .., "data": ..}`.
    pub fn in_session(event_type: &'static str, session: &SessionId, payload: Value) -> Self {
        let session = Value::String(session.as_str().to_string());
        let payload = match payload {
            Value::Object(mut fields) => {
                fields.insert("session".to_string(), session);
                Value::Object(fields)
            }
            other => serde_json::json!({ "session": session, "data": other }),
        };
        Self::new(event_type, payload)
    }
}

/// Port for logging conversation events to a structured log.
///
/// `log` is synchronous and infallible so a broken log file never disturbs
/// a running round.
pub trait ConversationLogger: Send + Sync {
    /// Record a conversation event.
    fn log(&self, event: ConversationEvent);
}

/// Logger used when no transcript is configured.
pub struct NoConversationLogger;

impl ConversationLogger for NoConversationLogger {
    fn log(&self, _event: ConversationEvent) {}
}
