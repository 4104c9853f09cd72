use std::{future::Future, time::Duration};

use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::{
    publisher::{IntervalPublisher, TickOutcome},
    time::FrameClock,
    transport::Transport,
};

/// Ticks `publisher` every `tick_period` until `shutdown` resolves.
///
/// Each tick carries the real time since the previous one, so a late frame
/// still advances the publisher by the time that actually passed.
pub async fn run<T>(
    mut publisher: IntervalPublisher<T>,
    tick_period: Duration,
    shutdown: impl Future<Output = ()>,
) -> IntervalPublisher<T>
where
    T: Transport,
{
    let mut ticker = interval(tick_period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut clock = FrameClock::default();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            now = ticker.tick() => {
                let delta = clock.step(now);
                let outcome = publisher.tick(delta.time_delta);
                if outcome.attempted() {
                    debug!("frame {} at {:?}: {:?}", delta.frame, delta.time, outcome);
                }
            }
        }
    }

    let stats = publisher.stats();
    info!(
        "Stopped publishing on '{}': {} sent, {} failed",
        publisher.topic().name(),
        stats.successes,
        stats.failures
    );
    publisher
}

/// Resolves on Ctrl-C. If the handler cannot be installed, never resolves.
pub async fn ctrl_c() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Unable to listen for Ctrl-C: {}", err);
        futures::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        loopback::LoopbackTransport,
        msg::{Message, StringMsg},
        publisher::DEFAULT_MESSAGE,
    };
    use tokio::time::sleep;

    #[tokio::test(start_paused = true)]
    async fn publishes_once_per_interval() {
        let bus = LoopbackTransport::new();
        let rx = bus.subscribe("unity_chatter");
        let publisher =
            IntervalPublisher::initialize(bus, "unity_chatter", Duration::from_secs(2)).unwrap();

        let publisher = run(
            publisher,
            Duration::from_millis(100),
            sleep(Duration::from_millis(5050)),
        )
        .await;

        assert_eq!(publisher.stats().successes, 2);
        let received: Vec<Message> = rx.drain().collect();
        assert_eq!(
            received,
            vec![Message::String(StringMsg::new(DEFAULT_MESSAGE)); 2]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn outage_costs_one_attempt_per_interval() {
        let bus = LoopbackTransport::new();
        let rx = bus.subscribe("unity_chatter");
        let publisher =
            IntervalPublisher::initialize(bus.clone(), "unity_chatter", Duration::from_secs(1))
                .unwrap();
        bus.set_online(false);

        let publisher = run(
            publisher,
            Duration::from_millis(100),
            sleep(Duration::from_millis(3050)),
        )
        .await;
        assert_eq!(publisher.stats().attempts, 3);
        assert_eq!(publisher.stats().failures, 3);
        assert!(!publisher.is_connected());
        assert!(rx.is_empty());

        bus.set_online(true);
        let publisher = run(
            publisher,
            Duration::from_millis(100),
            sleep(Duration::from_millis(1050)),
        )
        .await;
        assert!(publisher.is_connected());
        assert_eq!(publisher.stats().successes, 1);
        assert_eq!(rx.len(), 1);
    }
}
