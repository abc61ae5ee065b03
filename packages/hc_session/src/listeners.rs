use crate::events::{ListenerDescriptor, ProtocolDescriptor};

/// Client-side mirror of a teamserver listener.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListenerRecord {
    pub name: String,
    pub protocol: String,
    pub host: String,
    pub port: String,
    pub status: String,
    /// Log lines in arrival order. Append-only.
    pub log: Vec<String>,
}

impl ListenerRecord {
    fn from_descriptor(descriptor: ListenerDescriptor) -> Self {
        Self {
            name: descriptor.name,
            protocol: descriptor.protocol,
            host: descriptor.host,
            port: descriptor.port,
            status: descriptor.status,
            log: Vec::new(),
        }
    }
}

/// Outcome of [`ListenerTable::register`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Registration {
    /// First time this listener name was seen
    Registered,
    /// The name was already known; its fields were refreshed and its log kept
    Restarted,
}

/// Listener and protocol state fed by the event stream.
#[derive(Debug, Default)]
pub struct ListenerTable {
    protocols: Vec<ProtocolDescriptor>,
    records: Vec<ListenerRecord>,
}

impl ListenerTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_protocol(&mut self, protocol: ProtocolDescriptor) {
        self.protocols.push(protocol);
    }

    /// Advertised protocols, in the order they arrived.
    pub fn protocols(&self) -> &[ProtocolDescriptor] {
        &self.protocols
    }

    pub fn register(&mut self, descriptor: ListenerDescriptor) -> (Registration, &ListenerRecord) {
        if let Some(idx) = self.position(&descriptor.name) {
            let record = &mut self.records[idx];
            record.protocol = descriptor.protocol;
            record.host = descriptor.host;
            record.port = descriptor.port;
            record.status = descriptor.status;
            return (Registration::Restarted, &self.records[idx]);
        }

        self.records.push(ListenerRecord::from_descriptor(descriptor));
        let idx = self.records.len() - 1;
        (Registration::Registered, &self.records[idx])
    }

    /// Append a log line to the named listener. Returns false if no such
    /// listener is registered.
    pub fn append_log(&mut self, name: &str, line: &str) -> bool {
        match self.records.iter_mut().find(|r| r.name == name) {
            Some(record) => {
                record.log.push(line.to_string());
                true
            }
            None => false,
        }
    }

    pub fn get(&self, name: &str) -> Option<&ListenerRecord> {
        self.records.iter().find(|r| r.name == name)
    }

    /// Listeners in registration order.
    pub fn listeners(&self) -> &[ListenerRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.records.iter().position(|r| r.name == name)
    }
}
