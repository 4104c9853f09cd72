//! Fire-and-forget wrapper that moves a slow transport off the ticking thread.
//!
//! Requests travel over a bounded `flume` queue to a worker on tokio's
//! blocking pool that owns the inner transport. `publish` never waits; a full
//! queue is reported as [`TransportError::QueueFull`]. `connect` and
//! `register_topic` wait for the worker's answer, but never longer than the
//! configured timeout.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use flume::{RecvTimeoutError, SendTimeoutError, TrySendError};
use tokio::task::{spawn_blocking, JoinHandle};
use tracing::{debug, warn};

use crate::{
    error::{ConnectError, RegistrationError, TransportError},
    msg::{Message, SchemaTag},
    transport::{Connection, Transport},
};

enum Request {
    Connect {
        reply: flume::Sender<Result<Connection, ConnectError>>,
    },
    Register {
        name: String,
        schema: SchemaTag,
        reply: flume::Sender<Result<(), RegistrationError>>,
    },
    Publish {
        name: String,
        message: Message,
    },
}

pub struct QueuedTransport {
    tx: flume::Sender<Request>,
    timeout: Duration,
    /// Cleared by the worker when the inner transport reports a disconnect.
    link_up: Arc<AtomicBool>,
}

impl QueuedTransport {
    /// Moves `inner` onto a blocking worker. The handle yields `inner` back
    /// once every `QueuedTransport` for it has been dropped.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<T>(inner: T, depth: usize, timeout: Duration) -> (Self, JoinHandle<T>)
    where
        T: Transport + Send + 'static,
    {
        let (tx, rx) = flume::bounded(depth.max(1));
        let link_up = Arc::new(AtomicBool::new(true));
        let worker = spawn_blocking({
            let link_up = link_up.clone();
            move || serve(inner, rx, link_up)
        });

        let queued = Self {
            tx,
            timeout,
            link_up,
        };
        (queued, worker)
    }

    /// Number of requests waiting for the worker.
    pub fn backlog(&self) -> usize {
        self.tx.len()
    }

    /// Queues a request and waits for its reply. Queueing and answering
    /// share one deadline.
    fn request<R>(
        &self,
        make: impl FnOnce(flume::Sender<R>) -> Request,
    ) -> Result<R, RequestError> {
        let deadline = Instant::now() + self.timeout;
        let (reply_tx, reply_rx) = flume::bounded(1);
        self.tx
            .send_deadline(make(reply_tx), deadline)
            .map_err(|err| match err {
                SendTimeoutError::Timeout(_) => RequestError::Timeout,
                SendTimeoutError::Disconnected(_) => RequestError::Closed,
            })?;
        reply_rx
            .recv_deadline(deadline)
            .map_err(|err| match err {
                RecvTimeoutError::Timeout => RequestError::Timeout,
                RecvTimeoutError::Disconnected => RequestError::Closed,
            })
    }
}

enum RequestError {
    Timeout,
    Closed,
}

impl Transport for QueuedTransport {
    fn connect(&mut self) -> Result<Connection, ConnectError> {
        match self.request(|reply| Request::Connect { reply }) {
            Ok(result) => result,
            Err(RequestError::Timeout) => Err(ConnectError::Timeout(self.timeout)),
            Err(RequestError::Closed) => Err(ConnectError::Closed),
        }
    }

    fn register_topic(&mut self, name: &str, schema: SchemaTag) -> Result<(), RegistrationError> {
        let request = |reply| Request::Register {
            name: name.to_string(),
            schema,
            reply,
        };
        match self.request(request) {
            Ok(result) => result,
            Err(RequestError::Timeout) => Err(RegistrationError::Timeout(self.timeout)),
            Err(RequestError::Closed) => Err(ConnectError::Closed.into()),
        }
    }

    fn publish(&mut self, name: &str, message: Message) -> Result<(), TransportError> {
        if !self.link_up.load(Ordering::SeqCst) {
            return Err(TransportError::disconnected("queued transport lost its link"));
        }

        let request = Request::Publish {
            name: name.to_string(),
            message,
        };
        self.tx.try_send(request).map_err(|err| match err {
            TrySendError::Full(_) => TransportError::QueueFull,
            TrySendError::Disconnected(_) => TransportError::Closed,
        })
    }
}

fn serve<T>(mut inner: T, rx: flume::Receiver<Request>, link_up: Arc<AtomicBool>) -> T
where
    T: Transport,
{
    for request in rx.iter() {
        match request {
            Request::Connect { reply } => {
                let result = inner.connect();
                if result.is_ok() {
                    link_up.store(true, Ordering::SeqCst);
                }
                let _ = reply.send(result);
            }
            Request::Register {
                name,
                schema,
                reply,
            } => {
                let _ = reply.send(inner.register_topic(&name, schema));
            }
            Request::Publish { name, message } => {
                if let Err(err) = inner.publish(&name, message) {
                    if err.is_disconnect() {
                        link_up.store(false, Ordering::SeqCst);
                    }
                    warn!("Queued publish on '{}' failed: {}", name, err);
                }
            }
        }
    }

    debug!("Publish queue closed, worker exiting");
    inner
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{loopback::LoopbackTransport, msg::StringMsg};

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn hello() -> Message {
        StringMsg::new("hello").into()
    }

    #[tokio::test]
    async fn forwards_to_inner_transport() {
        let bus = LoopbackTransport::new();
        let rx = bus.subscribe("chatter");
        let (mut queued, worker) = QueuedTransport::spawn(bus.clone(), 4, TIMEOUT);

        assert_eq!(queued.connect().unwrap().peer, "loopback");
        queued
            .register_topic("chatter", SchemaTag::StdString)
            .unwrap();
        queued.publish("chatter", hello()).unwrap();

        assert_eq!(rx.recv_async().await.unwrap(), hello());
        drop(queued);
        worker.await.unwrap();
    }

    #[tokio::test]
    async fn register_errors_come_back() {
        let bus = LoopbackTransport::new();
        let (mut queued, _worker) = QueuedTransport::spawn(bus, 4, TIMEOUT);
        queued
            .register_topic("chatter", SchemaTag::StdString)
            .unwrap();

        let err = queued
            .register_topic("chatter", SchemaTag::StdEmpty)
            .unwrap_err();
        assert!(matches!(err, RegistrationError::SchemaMismatch { .. }));
    }

    /// Parks inside `publish` until released.
    struct Stalled {
        entered: flume::Sender<()>,
        release: flume::Receiver<()>,
        published: usize,
    }

    impl Transport for Stalled {
        fn connect(&mut self) -> Result<Connection, ConnectError> {
            Ok(Connection {
                peer: "stalled".to_string(),
            })
        }

        fn register_topic(&mut self, _: &str, _: SchemaTag) -> Result<(), RegistrationError> {
            Ok(())
        }

        fn publish(&mut self, _: &str, _: Message) -> Result<(), TransportError> {
            let _ = self.entered.send(());
            let _ = self.release.recv();
            self.published += 1;
            Ok(())
        }
    }

    #[tokio::test]
    async fn full_queue_is_reported_without_blocking() {
        let (entered_tx, entered_rx) = flume::unbounded();
        let (release_tx, release_rx) = flume::unbounded();
        let stalled = Stalled {
            entered: entered_tx,
            release: release_rx,
            published: 0,
        };
        let (mut queued, worker) = QueuedTransport::spawn(stalled, 1, TIMEOUT);

        queued.publish("chatter", hello()).unwrap();
        entered_rx.recv_async().await.unwrap();
        // worker is parked, the queue holds exactly one more
        queued.publish("chatter", hello()).unwrap();
        assert_eq!(queued.backlog(), 1);
        assert_eq!(
            queued.publish("chatter", hello()),
            Err(TransportError::QueueFull)
        );

        release_tx.send(()).unwrap();
        release_tx.send(()).unwrap();
        drop(queued);
        let stalled = worker.await.unwrap();
        assert_eq!(stalled.published, 2);
    }

    fn stalled(
        depth: usize,
        timeout: Duration,
    ) -> (QueuedTransport, flume::Receiver<()>, flume::Sender<()>) {
        let (entered_tx, entered_rx) = flume::unbounded();
        let (release_tx, release_rx) = flume::unbounded();
        let stalled = Stalled {
            entered: entered_tx,
            release: release_rx,
            published: 0,
        };
        let (queued, _worker) = QueuedTransport::spawn(stalled, depth, timeout);
        (queued, entered_rx, release_tx)
    }

    #[tokio::test]
    async fn unanswered_requests_time_out() {
        let timeout = Duration::from_millis(200);
        let (mut queued, entered, release) = stalled(4, timeout);
        queued.publish("chatter", hello()).unwrap();
        entered.recv_async().await.unwrap();

        assert_eq!(queued.connect(), Err(ConnectError::Timeout(timeout)));
        assert_eq!(
            queued.register_topic("chatter", SchemaTag::StdString),
            Err(RegistrationError::Timeout(timeout))
        );

        drop(queued);
        let _ = release.send(());
    }

    #[tokio::test]
    async fn queueing_and_reply_share_one_deadline() {
        let timeout = Duration::from_millis(500);
        let (mut queued, entered, release) = stalled(1, timeout);
        queued.publish("chatter", hello()).unwrap();
        entered.recv_async().await.unwrap();
        // the queue is now full behind the parked worker
        queued.publish("chatter", hello()).unwrap();

        // frees one slot part way through the budget; the worker then parks
        // on the second publish and never answers
        let releaser = std::thread::spawn({
            let release = release.clone();
            move || {
                std::thread::sleep(Duration::from_millis(300));
                let _ = release.send(());
            }
        });

        let start = Instant::now();
        assert_eq!(queued.connect(), Err(ConnectError::Timeout(timeout)));
        let waited = start.elapsed();
        assert!(waited >= timeout, "returned early after {waited:?}");
        assert!(waited < Duration::from_millis(750), "waited {waited:?}");

        releaser.join().unwrap();
        drop(queued);
        for _ in 0..3 {
            let _ = release.send(());
        }
    }

    #[tokio::test]
    async fn disconnect_surfaces_on_next_publish() {
        let mut bus = LoopbackTransport::new();
        bus.register_topic("chatter", SchemaTag::StdString).unwrap();
        let (mut queued, _worker) = QueuedTransport::spawn(bus.clone(), 4, TIMEOUT);

        bus.set_online(false);
        queued.publish("chatter", hello()).unwrap();
        // a round trip guarantees the worker has handled the publish
        assert!(queued.connect().is_err());
        assert!(queued.publish("chatter", hello()).unwrap_err().is_disconnect());

        bus.set_online(true);
        queued.connect().unwrap();
        queued.publish("chatter", hello()).unwrap();
    }

    #[tokio::test]
    async fn closed_worker_is_reported() {
        let (mut queued, _worker) =
            QueuedTransport::spawn(LoopbackTransport::new(), 4, TIMEOUT);
        // swap in a sender whose receiver is already gone
        let (tx, _) = flume::bounded(1);
        queued.tx = tx;
        assert_eq!(
            queued.publish("chatter", hello()),
            Err(TransportError::Closed)
        );
        assert_eq!(queued.connect(), Err(ConnectError::Closed));
    }
}
