//! Simulated time and the discrete-event queue.
//!
//! Time is kept in integer nanoseconds so that repeated `0.1 s` steps land
//! exactly on multiples of the interval instead of drifting.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A point (or span) on the simulation clock, in nanoseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SimTime(u64);

impl SimTime {
    pub const ZERO: SimTime = SimTime(0);

    pub const fn from_nanos(nanos: u64) -> Self {
        SimTime(nanos)
    }

    pub const fn from_millis(millis: u64) -> Self {
        SimTime(millis * 1_000_000)
    }

    /// Rounds to the nearest nanosecond. Negative and non-finite inputs map
    /// to zero.
    pub fn from_secs_f64(secs: f64) -> Self {
        if !secs.is_finite() || secs <= 0.0 {
            return SimTime::ZERO;
        }
        SimTime((secs * 1e9).round() as u64)
    }

    pub const fn as_nanos(self) -> u64 {
        self.0
    }

    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / 1e9
    }

    pub fn saturating_add(self, rhs: SimTime) -> SimTime {
        SimTime(self.0.saturating_add(rhs.0))
    }

    pub fn saturating_sub(self, rhs: SimTime) -> SimTime {
        SimTime(self.0.saturating_sub(rhs.0))
    }

    pub fn as_duration(self) -> Duration {
        Duration::from_nanos(self.0)
    }
}

impl From<Duration> for SimTime {
    fn from(d: Duration) -> Self {
        SimTime(d.as_nanos().min(u64::MAX as u128) as u64)
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}s", self.as_secs_f64())
    }
}

// ---------------------------------------------------------------------------
// Event queue
// ---------------------------------------------------------------------------

/// Identifier handed back by [`Simulator::schedule`]; also the FIFO
/// tie-breaker for events due at the same instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventId(u64);

struct Scheduled<E> {
    at: SimTime,
    id: EventId,
    event: E,
}

impl<E> PartialEq for Scheduled<E> {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.id == other.id
    }
}

impl<E> Eq for Scheduled<E> {}

impl<E> PartialOrd for Scheduled<E> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<E> Ord for Scheduled<E> {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.at, self.id).cmp(&(other.at, other.id))
    }
}

/// Single-threaded discrete-event clock.
///
/// Events are popped in `(time, insertion order)` order. Once a stop time is
/// set, no event due at or after it is delivered, and the clock parks at the
/// stop time, also when the queue simply runs dry.
pub struct Simulator<E> {
    now: SimTime,
    queue: BinaryHeap<Reverse<Scheduled<E>>>,
    next_id: u64,
    stop_at: Option<SimTime>,
    stopped: bool,
}

impl<E> Default for Simulator<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Simulator<E> {
    pub fn new() -> Self {
        Self {
            now: SimTime::ZERO,
            queue: BinaryHeap::new(),
            next_id: 0,
            stop_at: None,
            stopped: false,
        }
    }

    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Schedule `event` to fire `delay` after the current time.
    pub fn schedule(&mut self, delay: SimTime, event: E) -> EventId {
        let at = self.now.saturating_add(delay);
        self.schedule_at(at, event)
    }

    /// Schedule `event` at an absolute time. Times in the past fire "now".
    pub fn schedule_at(&mut self, at: SimTime, event: E) -> EventId {
        let id = EventId(self.next_id);
        self.next_id += 1;
        let at = at.max(self.now);
        self.queue.push(Reverse(Scheduled { at, id, event }));
        id
    }

    /// Stop the run at `at`; events due at or after it never fire.
    pub fn stop_at(&mut self, at: SimTime) {
        self.stop_at = Some(at);
    }

    /// Stop immediately: the next [`pop`](Self::pop) returns `None`.
    pub fn stop_now(&mut self) {
        self.stopped = true;
    }

    pub fn stop_time(&self) -> Option<SimTime> {
        self.stop_at
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Advance the clock to the next due event and return it.
    pub fn pop(&mut self) -> Option<(SimTime, E)> {
        if self.stopped {
            return None;
        }
        let due = self.queue.peek().map(|Reverse(s)| s.at);
        if let Some(stop) = self.stop_at {
            if due.map_or(true, |at| at >= stop) {
                self.now = stop.max(self.now);
                self.stopped = true;
                return None;
            }
        }
        let Reverse(next) = self.queue.pop()?;
        self.now = next.at;
        Some((next.at, next.event))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
