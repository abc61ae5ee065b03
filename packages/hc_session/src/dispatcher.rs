//! Turns event-stream frames into listener state changes.
//!
//! The dispatcher is driven by a single consumer, one frame at a time, so the
//! state it owns needs no locking. Any frame that fails validation is logged
//! once and dropped without touching state.

use tracing::{debug, error, warn};

use crate::error::EventError;
use crate::events::{Event, EventKind};
use crate::listeners::{ListenerRecord, ListenerTable, Registration};

/// Presentation side of the listener table.
pub trait ListenerView {
    fn register_listener(&mut self, listener: &ListenerRecord);
    fn append_log(&mut self, name: &str, line: &str);
    fn set_status(&mut self, name: &str, status: &str);
}

/// What happened to a single frame.
#[derive(Debug)]
pub enum Dispatch {
    /// Valid event that changed state
    Applied(EventKind),
    /// Valid event with no behaviour attached yet
    Validated(EventKind),
    /// Dropped; state untouched
    Discarded(EventError),
}

impl Dispatch {
    pub fn is_discarded(&self) -> bool {
        matches!(self, Dispatch::Discarded(_))
    }
}

pub struct EventDispatcher<V> {
    listeners: ListenerTable,
    view: V,
}

impl<V: ListenerView> EventDispatcher<V> {
    pub fn new(view: V) -> Self {
        Self {
            listeners: ListenerTable::new(),
            view,
        }
    }

    /// Decode, validate and apply one frame.
    pub fn handle(&mut self, frame: &[u8]) -> Dispatch {
        let result = Event::decode(frame).and_then(|event| self.apply(event));
        match result {
            Ok(outcome) => outcome,
            Err(err @ EventError::UnknownType(_)) => {
                debug!(error = %err, "ignoring event");
                Dispatch::Discarded(err)
            }
            Err(err) => {
                error!(error = %err, frame_len = frame.len(), "discarding event");
                Dispatch::Discarded(err)
            }
        }
    }

    fn apply(&mut self, event: Event) -> Result<Dispatch, EventError> {
        let kind = event.kind();
        match event {
            Event::ListenerAdd(protocol) => {
                debug!(protocol = protocol.name().unwrap_or("<unnamed>"), "listener protocol added");
                self.listeners.add_protocol(protocol);
                Ok(Dispatch::Applied(kind))
            }
            Event::ListenerStart(descriptor) => {
                let (registration, record) = self.listeners.register(descriptor);
                match registration {
                    Registration::Registered => {
                        debug!(name = %record.name, protocol = %record.protocol, "listener started");
                        self.view.register_listener(record);
                    }
                    Registration::Restarted => {
                        warn!(name = %record.name, "listener started again, refreshing record");
                        self.view.set_status(&record.name, &record.status);
                    }
                }
                Ok(Dispatch::Applied(kind))
            }
            Event::ListenerLog { name, log } => {
                if !self.listeners.append_log(&name, &log) {
                    return Err(EventError::UnknownListener(name));
                }
                self.view.append_log(&name, &log);
                Ok(Dispatch::Applied(kind))
            }
            Event::UserLogin(_)
            | Event::UserLogout(_)
            | Event::UserMessage(_)
            | Event::ListenerEdit(_)
            | Event::ListenerStop(_)
            | Event::ListenerStatus(_)
            | Event::AgentAdd(_)
            | Event::AgentInitialize(_)
            | Event::AgentCallback(_)
            | Event::AgentConsole(_)
            | Event::AgentInput(_)
            | Event::AgentStatus(_)
            | Event::AgentRemove(_) => Ok(Dispatch::Validated(kind)),
        }
    }

    pub fn listeners(&self) -> &ListenerTable {
        &self.listeners
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn into_view(self) -> V {
        self.view
    }
}
