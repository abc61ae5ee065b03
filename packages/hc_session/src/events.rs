//! Server-pushed event taxonomy.
//!
//! Every frame on the event stream is a JSON envelope `{"type": ..., "data": ...}`.
//! The `type` string is decoded once, here, into [`EventKind`]; the payload is
//! validated against what that kind requires and turned into a typed [`Event`].
//! Nothing past this module looks at raw type strings.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::EventError;

/// Closed set of event types the teamserver can push.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    UserLogin,
    UserLogout,
    UserMessage,
    ListenerAdd,
    ListenerStart,
    ListenerEdit,
    ListenerStop,
    ListenerStatus,
    ListenerLog,
    AgentAdd,
    AgentInitialize,
    AgentCallback,
    AgentConsole,
    AgentInput,
    AgentStatus,
    AgentRemove,
}

impl EventKind {
    pub const ALL: [EventKind; 16] = [
        EventKind::UserLogin,
        EventKind::UserLogout,
        EventKind::UserMessage,
        EventKind::ListenerAdd,
        EventKind::ListenerStart,
        EventKind::ListenerEdit,
        EventKind::ListenerStop,
        EventKind::ListenerStatus,
        EventKind::ListenerLog,
        EventKind::AgentAdd,
        EventKind::AgentInitialize,
        EventKind::AgentCallback,
        EventKind::AgentConsole,
        EventKind::AgentInput,
        EventKind::AgentStatus,
        EventKind::AgentRemove,
    ];

    /// Wire name used in the envelope's `type` field.
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::UserLogin => "user.login",
            EventKind::UserLogout => "user.logout",
            EventKind::UserMessage => "user.message",
            EventKind::ListenerAdd => "listener.add",
            EventKind::ListenerStart => "listener.start",
            EventKind::ListenerEdit => "listener.edit",
            EventKind::ListenerStop => "listener.stop",
            EventKind::ListenerStatus => "listener.status",
            EventKind::ListenerLog => "listener.log",
            EventKind::AgentAdd => "agent.add",
            EventKind::AgentInitialize => "agent.initialize",
            EventKind::AgentCallback => "agent.callback",
            EventKind::AgentConsole => "agent.console",
            EventKind::AgentInput => "agent.input",
            EventKind::AgentStatus => "agent.status",
            EventKind::AgentRemove => "agent.remove",
        }
    }

    pub fn from_wire(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Untyped wire envelope. Both fields must be present.
#[derive(Clone, Debug, PartialEq)]
pub struct EventEnvelope {
    pub kind: String,
    pub data: Value,
}

impl EventEnvelope {
    /// Parse a raw frame into an envelope without looking at the payload.
    pub fn parse(frame: &[u8]) -> Result<Self, EventError> {
        let mut envelope: Value = serde_json::from_slice(frame)?;

        let kind = match envelope.get("type") {
            None => return Err(EventError::MissingField("type")),
            Some(Value::String(kind)) => kind.clone(),
            Some(_) => return Err(EventError::TypeNotString),
        };
        let data = envelope
            .get_mut("data")
            .map(Value::take)
            .ok_or(EventError::MissingField("data"))?;

        Ok(Self { kind, data })
    }
}

/// Listener protocol metadata advertised by the teamserver. Opaque apart
/// from its name; kept as sent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProtocolDescriptor(pub Value);

impl ProtocolDescriptor {
    pub fn name(&self) -> Option<&str> {
        self.0.get("name").and_then(Value::as_str)
    }
}

/// A running listener as announced by `listener.start`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ListenerDescriptor {
    pub name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub protocol: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub host: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub port: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub status: String,
}

/// Teamservers are not consistent about sending ports as strings or numbers.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, found {other}"
        ))),
    }
}

/// A decoded, validated event.
///
/// Variants whose behaviour is not implemented yet still carry their raw
/// payload so the taxonomy stays exhaustive.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    UserLogin(Value),
    UserLogout(Value),
    UserMessage(Value),
    ListenerAdd(ProtocolDescriptor),
    ListenerStart(ListenerDescriptor),
    ListenerEdit(Value),
    ListenerStop(Value),
    ListenerStatus(Value),
    ListenerLog { name: String, log: String },
    AgentAdd(Value),
    AgentInitialize(Value),
    AgentCallback(Value),
    AgentConsole(Value),
    AgentInput(Value),
    AgentStatus(Value),
    AgentRemove(Value),
}

impl Event {
    /// Full decode pipeline: JSON → envelope → known kind → validated payload.
    pub fn decode(frame: &[u8]) -> Result<Self, EventError> {
        Self::from_envelope(EventEnvelope::parse(frame)?)
    }

    pub fn from_envelope(envelope: EventEnvelope) -> Result<Self, EventError> {
        let kind = EventKind::from_wire(&envelope.kind)
            .ok_or(EventError::UnknownType(envelope.kind))?;
        let data = envelope.data;

        let event = match kind {
            EventKind::UserLogin => Event::UserLogin(non_empty(kind, data)?),
            EventKind::UserLogout => Event::UserLogout(non_empty(kind, data)?),
            EventKind::UserMessage => Event::UserMessage(data),
            EventKind::ListenerAdd => {
                Event::ListenerAdd(ProtocolDescriptor(non_empty(kind, data)?))
            }
            EventKind::ListenerStart => {
                let data = non_empty(kind, data)?;
                string_field(kind, &data, "name")?;
                let descriptor = serde_json::from_value(data).map_err(|e| {
                    EventError::InvalidPayload {
                        kind,
                        reason: e.to_string(),
                    }
                })?;
                Event::ListenerStart(descriptor)
            }
            EventKind::ListenerEdit => Event::ListenerEdit(data),
            EventKind::ListenerStop => Event::ListenerStop(data),
            EventKind::ListenerStatus => Event::ListenerStatus(data),
            EventKind::ListenerLog => {
                let data = non_empty(kind, data)?;
                let name = string_field(kind, &data, "name")?;
                let log = string_field(kind, &data, "log")?;
                Event::ListenerLog { name, log }
            }
            EventKind::AgentAdd => Event::AgentAdd(data),
            EventKind::AgentInitialize => Event::AgentInitialize(data),
            EventKind::AgentCallback => Event::AgentCallback(data),
            EventKind::AgentConsole => Event::AgentConsole(data),
            EventKind::AgentInput => Event::AgentInput(data),
            EventKind::AgentStatus => Event::AgentStatus(data),
            EventKind::AgentRemove => Event::AgentRemove(data),
        };
        Ok(event)
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Event::UserLogin(_) => EventKind::UserLogin,
            Event::UserLogout(_) => EventKind::UserLogout,
            Event::UserMessage(_) => EventKind::UserMessage,
            Event::ListenerAdd(_) => EventKind::ListenerAdd,
            Event::ListenerStart(_) => EventKind::ListenerStart,
            Event::ListenerEdit(_) => EventKind::ListenerEdit,
            Event::ListenerStop(_) => EventKind::ListenerStop,
            Event::ListenerStatus(_) => EventKind::ListenerStatus,
            Event::ListenerLog { .. } => EventKind::ListenerLog,
            Event::AgentAdd(_) => EventKind::AgentAdd,
            Event::AgentInitialize(_) => EventKind::AgentInitialize,
            Event::AgentCallback(_) => EventKind::AgentCallback,
            Event::AgentConsole(_) => EventKind::AgentConsole,
            Event::AgentInput(_) => EventKind::AgentInput,
            Event::AgentStatus(_) => EventKind::AgentStatus,
            Event::AgentRemove(_) => EventKind::AgentRemove,
        }
    }
}

/// Payloads that carry a record must be a JSON object with at least one
/// member. Null and `{}` are empty; anything that is not an object is
/// rejected outright.
fn non_empty(kind: EventKind, data: Value) -> Result<Value, EventError> {
    let empty = match &data {
        Value::Object(map) => map.is_empty(),
        Value::Null => true,
        _ => return Err(EventError::DataNotObject(kind)),
    };
    if empty {
        Err(EventError::EmptyData(kind))
    } else {
        Ok(data)
    }
}

fn string_field(kind: EventKind, data: &Value, field: &'static str) -> Result<String, EventError> {
    match data.get(field) {
        None => Err(EventError::MissingPayloadField { kind, field }),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(EventError::PayloadFieldNotString { kind, field }),
    }
}
