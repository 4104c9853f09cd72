//! Fixed-interval publishing driven by externally supplied time deltas.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::{
    error::{RegistrationError, TransportError},
    msg::{Message, SchemaTag, StringMsg},
    topic::TopicBinding,
    transport::Transport,
};

pub const DEFAULT_TOPIC_NAME: &str = "unity_chatter";
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(2);
pub const DEFAULT_MESSAGE: &str = "Hello from Unity!";

/// Result of a single `tick`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// The interval has not elapsed yet.
    Waiting,
    Published,
    Failed(TransportError),
}

impl TickOutcome {
    pub fn attempted(&self) -> bool {
        !matches!(self, Self::Waiting)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishStats {
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
    pub consecutive_failures: u64,
}

pub struct IntervalPublisher<T>
where
    T: Transport,
{
    transport: T,
    binding: TopicBinding,
    interval: Duration,
    elapsed: Duration,
    connected: bool,
    payload: String,
    stats: PublishStats,
}

impl<T> IntervalPublisher<T>
where
    T: Transport,
{
    /// Connects `transport` and registers `topic_name` for the string schema.
    pub fn initialize(
        transport: T,
        topic_name: &str,
        interval: Duration,
    ) -> Result<Self, RegistrationError> {
        Self::with_message(transport, topic_name, interval, DEFAULT_MESSAGE)
    }

    pub fn with_message(
        mut transport: T,
        topic_name: &str,
        interval: Duration,
        message: impl Into<String>,
    ) -> Result<Self, RegistrationError> {
        if interval.is_zero() {
            return Err(RegistrationError::InvalidInterval(interval));
        }
        let binding = TopicBinding::new(topic_name, SchemaTag::StdString)?;

        let conn = transport.connect()?;
        transport.register_topic(binding.name(), binding.schema())?;
        info!(
            "Registered publisher on '{}' ({}) via {}, interval {:?}",
            binding.name(),
            binding.schema(),
            conn.peer,
            interval
        );

        Ok(Self {
            transport,
            binding,
            interval,
            elapsed: Duration::ZERO,
            connected: true,
            payload: message.into(),
            stats: PublishStats::default(),
        })
    }

    /// Advances the timer and publishes once if the interval has elapsed.
    ///
    /// The timer restarts from zero after every attempt, successful or not,
    /// and any overshoot past the interval is discarded.
    pub fn tick(&mut self, delta: Duration) -> TickOutcome {
        self.elapsed = self.elapsed.saturating_add(delta);
        if self.elapsed < self.interval {
            return TickOutcome::Waiting;
        }
        self.elapsed = Duration::ZERO;

        match self.attempt() {
            Ok(()) => {
                self.stats.attempts += 1;
                self.stats.successes += 1;
                self.stats.consecutive_failures = 0;
                debug!("Published periodic message to '{}'", self.binding.name());
                TickOutcome::Published
            }
            Err(err) => {
                self.stats.attempts += 1;
                self.stats.failures += 1;
                self.stats.consecutive_failures += 1;
                if err.is_disconnect() {
                    self.connected = false;
                }
                warn!(
                    "Missed publish on '{}' ({} in a row): {}",
                    self.binding.name(),
                    self.stats.consecutive_failures,
                    err
                );
                TickOutcome::Failed(err)
            }
        }
    }

    fn attempt(&mut self) -> Result<(), TransportError> {
        if !self.connected {
            self.reconnect().map_err(TransportError::Reconnect)?;
        }
        let msg = Message::from(StringMsg::new(self.payload.as_str()));
        self.transport.publish(self.binding.name(), msg)
    }

    fn reconnect(&mut self) -> Result<(), RegistrationError> {
        let conn = self.transport.connect()?;
        self.transport
            .register_topic(self.binding.name(), self.binding.schema())?;
        self.connected = true;
        info!("Reconnected to {} for '{}'", conn.peer, self.binding.name());
        Ok(())
    }

    pub fn topic(&self) -> &TopicBinding {
        &self.binding
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn stats(&self) -> PublishStats {
        self.stats
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }
}
