use std::time::Duration;

use tokio::time::Instant;

/// Turns successive instants into per-frame deltas.
#[derive(Debug)]
pub struct FrameClock {
    start: Option<Instant>,
    prev: Option<Time>,
}

#[derive(Debug)]
struct Time {
    frame: usize,
    time: Duration,
}

impl FrameClock {
    pub fn step(&mut self, now: Instant) -> TimeDelta {
        let start = *self.start.get_or_insert(now);
        let curr_time = now.saturating_duration_since(start);

        let delta = match &self.prev {
            Some(prev) => TimeDelta {
                frame: prev.frame + 1,
                frame_delta: 1,
                time: curr_time,
                time_delta: curr_time.saturating_sub(prev.time),
            },
            None => TimeDelta {
                frame: 0,
                frame_delta: 0,
                time: curr_time,
                time_delta: Duration::ZERO,
            },
        };
        self.prev = Some(Time {
            frame: delta.frame,
            time: curr_time,
        });

        delta
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self {
            start: None,
            prev: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TimeDelta {
    pub frame: usize,
    pub frame_delta: usize,
    pub time: Duration,
    pub time_delta: Duration,
}
