//! # Message shapes crossing unit boundaries.
//!
//! Shapes are parsed once at the boundary into these types instead of being
//! inspected field by field at each call site.
//!
//! | Shape                                   | Carried on      | Type              |
//! |-----------------------------------------|-----------------|-------------------|
//! | `{ name, data }`                        | channel, port   | [`Envelope`]      |
//! | `{ cmd: "saveCommand", id, pid, name, data }` | cluster bus | [`ControlMessage`] |
//! | `{ signal: "worker-up" }`               | control port    | [`Signal`]        |
//! | bare value / `{ok}` / `{error}`         | channel, port   | [`ReplyMode`]     |

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RuntimeError;

/// Marker carried by the one-time readiness signal.
pub const READY_MARKER: &str = "worker-up";

/// Event, command or service invocation: `{ name, data }`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Event, command or operation name.
    pub name: String,
    /// Plain-data argument; absent means `null`.
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    pub fn new(name: impl Into<String>, data: Value) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }
}

/// Process-wide control message.
///
/// Only `saveCommand` exists today; any other `cmd` fails to parse and is
/// treated as not addressed to the cluster sync handler.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd")]
pub enum ControlMessage {
    /// A unit committed a write of record `id` of model `name`.
    #[serde(rename = "saveCommand")]
    Save {
        /// Affected record.
        id: String,
        /// Unit that performed the write.
        pid: u32,
        /// Model name.
        name: String,
        /// Plain-data model state after the write.
        #[serde(default)]
        data: Value,
    },
}

impl ControlMessage {
    /// Builds a save notification.
    pub fn save(id: impl Into<String>, pid: u32, name: impl Into<String>, data: Value) -> Self {
        ControlMessage::Save {
            id: id.into(),
            pid,
            name: name.into(),
            data,
        }
    }

    /// Identifier of the originating unit.
    pub fn pid(&self) -> u32 {
        match self {
            ControlMessage::Save { pid, .. } => *pid,
        }
    }

    /// Parses a raw process-wide message; `None` if it is not a control message.
    pub fn parse(raw: &Value) -> Option<Self> {
        serde_json::from_value(raw.clone()).ok()
    }
}

/// Lifecycle signal from worker to supervisor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signal {
    pub signal: String,
}

impl Signal {
    /// The one-time readiness signal.
    pub fn ready() -> Self {
        Self {
            signal: READY_MARKER.to_string(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.signal == READY_MARKER
    }
}

/// How replies are shaped on the wire.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReplyMode {
    /// The serialized return value with no envelope; failures produce no reply.
    #[default]
    Bare,
    /// `{"ok": value}` on success, `{"error": {"label", "message"}}` on failure.
    Enveloped,
}

impl ReplyMode {
    /// Shapes a successful result.
    pub fn ok(&self, value: Value) -> Value {
        match self {
            ReplyMode::Bare => value,
            ReplyMode::Enveloped => serde_json::json!({ "ok": value }),
        }
    }

    /// Shapes a failure; `None` when the mode sends nothing for failures.
    pub fn error(&self, err: &RuntimeError) -> Option<Value> {
        match self {
            ReplyMode::Bare => None,
            ReplyMode::Enveloped => Some(serde_json::json!({
                "error": { "label": err.as_label(), "message": err.as_message() }
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn save_command_wire_shape() {
        let msg = ControlMessage::save("42", 100, "Customer", json!({"name": "Ada"}));
        let v = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            v,
            json!({"cmd": "saveCommand", "id": "42", "pid": 100, "name": "Customer", "data": {"name": "Ada"}})
        );
        assert_eq!(ControlMessage::parse(&v), Some(msg));
    }

    #[test]
    fn foreign_process_messages_are_not_control_messages() {
        assert!(ControlMessage::parse(&json!({"cmd": "reloadCommand", "id": "1"})).is_none());
        assert!(ControlMessage::parse(&json!({"hello": "world"})).is_none());
        assert!(ControlMessage::parse(&json!({"cmd": "saveCommand", "id": "1"})).is_none());
    }

    #[test]
    fn envelope_data_defaults_to_null() {
        let env: Envelope = serde_json::from_value(json!({"name": "showEvents"})).unwrap();
        assert_eq!(env, Envelope::new("showEvents", Value::Null));
    }

    #[test]
    fn ready_signal_shape() {
        let v = serde_json::to_value(Signal::ready()).unwrap();
        assert_eq!(v, json!({"signal": READY_MARKER}));
    }

    #[test]
    fn reply_modes() {
        assert_eq!(ReplyMode::Bare.ok(json!([1])), json!([1]));
        assert_eq!(ReplyMode::Enveloped.ok(json!(false)), json!({"ok": false}));

        let err = RuntimeError::UnknownOperation { name: "x".into() };
        assert!(ReplyMode::Bare.error(&err).is_none());
        let shaped = ReplyMode::Enveloped.error(&err).unwrap();
        assert_eq!(shaped["error"]["label"], "runtime_unknown_operation");
    }
}
