//! Publishes a fixed message on a pub/sub topic once per interval.
//!
//! An [`IntervalPublisher`] is ticked by an external loop with the time that
//! passed since the previous tick. It owns its [`Transport`], connects and
//! registers its topic on construction, and makes at most one publish attempt
//! per interval no matter how the transport behaves.

pub mod driver;
pub mod error;
pub mod loopback;
pub mod msg;
pub mod params;
pub mod publisher;
pub mod queued;
pub mod time;
pub mod topic;
pub mod transport;

pub use error::{ConnectError, RegistrationError, TransportError};
pub use publisher::{IntervalPublisher, PublishStats, TickOutcome};
pub use transport::{Connection, Transport};
