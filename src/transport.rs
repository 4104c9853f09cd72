//! Contract between a publisher and whatever moves its messages.
//!
//! The publisher never talks to the network itself. It is handed a
//! [`Transport`] at construction and calls it synchronously from `tick`, so an
//! implementation must return in bounded time. Wrap slow transports in
//! [`QueuedTransport`](crate::queued::QueuedTransport).

use crate::{
    error::{ConnectError, RegistrationError, TransportError},
    msg::{Message, SchemaTag},
};

/// Descriptor of an established connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub peer: String,
}

pub trait Transport {
    fn connect(&mut self) -> Result<Connection, ConnectError>;

    fn register_topic(&mut self, name: &str, schema: SchemaTag) -> Result<(), RegistrationError>;

    fn publish(&mut self, name: &str, message: Message) -> Result<(), TransportError>;
}
