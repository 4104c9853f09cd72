//! In-process pub/sub bus.
//!
//! Every [`LoopbackTransport`] cloned from the same bus shares its topic table,
//! so one handle can be given to a publisher while another subscribes.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard,
    },
};

use tracing::trace;

use crate::{
    error::{ConnectError, RegistrationError, TransportError},
    msg::{Message, SchemaTag},
    transport::{Connection, Transport},
};

const PEER: &str = "loopback";

#[derive(Debug, Default)]
struct Topic {
    /// `None` while only subscribers know about the topic.
    schema: Option<SchemaTag>,
    subscribers: Vec<flume::Sender<Message>>,
}

#[derive(Debug, Default)]
struct Shared {
    topics: Mutex<HashMap<String, Topic>>,
    offline: AtomicBool,
}

#[derive(Debug, Clone, Default)]
pub struct LoopbackTransport {
    shared: Arc<Shared>,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Receives every message later published on `topic`.
    ///
    /// The topic does not have to be registered yet.
    pub fn subscribe(&self, topic: &str) -> flume::Receiver<Message> {
        let (tx, rx) = flume::unbounded();
        self.topics()
            .entry(topic.to_string())
            .or_default()
            .subscribers
            .push(tx);
        rx
    }

    /// Simulates the bus going away and coming back.
    pub fn set_online(&self, online: bool) {
        self.shared.offline.store(!online, Ordering::SeqCst);
    }

    pub fn is_online(&self) -> bool {
        !self.shared.offline.load(Ordering::SeqCst)
    }

    pub fn schema_of(&self, topic: &str) -> Option<SchemaTag> {
        self.topics().get(topic).and_then(|entry| entry.schema)
    }

    fn topics(&self) -> MutexGuard<'_, HashMap<String, Topic>> {
        self.shared
            .topics
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Transport for LoopbackTransport {
    fn connect(&mut self) -> Result<Connection, ConnectError> {
        if !self.is_online() {
            return Err(ConnectError::Unreachable(format!("{PEER} bus is offline")));
        }
        Ok(Connection {
            peer: PEER.to_string(),
        })
    }

    fn register_topic(&mut self, name: &str, schema: SchemaTag) -> Result<(), RegistrationError> {
        if !self.is_online() {
            return Err(ConnectError::Unreachable(format!("{PEER} bus is offline")).into());
        }

        let mut topics = self.topics();
        let entry = topics.entry(name.to_string()).or_default();
        match entry.schema {
            Some(registered) if registered != schema => Err(RegistrationError::SchemaMismatch {
                topic: name.to_string(),
                registered,
                requested: schema,
            }),
            _ => {
                entry.schema = Some(schema);
                Ok(())
            }
        }
    }

    fn publish(&mut self, name: &str, message: Message) -> Result<(), TransportError> {
        if !self.is_online() {
            return Err(TransportError::disconnected(format!("{PEER} bus is offline")));
        }

        let mut topics = self.topics();
        let Some(entry) = topics.get_mut(name) else {
            return Err(TransportError::UnknownTopic(name.to_string()));
        };
        let Some(expected) = entry.schema else {
            return Err(TransportError::UnknownTopic(name.to_string()));
        };
        let actual = message.schema();
        if actual != expected {
            return Err(TransportError::SchemaMismatch {
                topic: name.to_string(),
                expected,
                actual,
            });
        }

        entry
            .subscribers
            .retain(|tx| tx.send(message.clone()).is_ok());
        trace!(
            "Delivered {} on '{}' to {} subscriber(s)",
            actual,
            name,
            entry.subscribers.len()
        );
        Ok(())
    }
}
