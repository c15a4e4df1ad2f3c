//! Cancellable debounce timers.
//!
//! Timers never sleep on their own. Callers pass the current `Instant` in
//! and ask for due timers, which keeps every transition testable without a
//! runtime. The async driver sleeps until [`DebounceSet::next_deadline`].
//!
//! ```text
//! schedule(t0) ──► pending(t0 + window)
//! schedule(t1) ──► pending(t1 + window)     (t0 timer superseded)
//! poll_due(now >= t1 + window) ──► fired, no longer pending
//! ```

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// A single one-shot timer that restarts on every `schedule`.
#[derive(Debug, Clone)]
pub struct Debounce {
    window: Duration,
    deadline: Option<Instant>,
}

impl Debounce {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
        }
    }

    /// Arm the timer at `now + window`.
    ///
    /// Returns `true` if a pending timer was superseded.
    pub fn schedule(&mut self, now: Instant) -> bool {
        self.deadline.replace(now + self.window).is_some()
    }

    /// Cancel the pending timer, if any.
    pub fn cancel(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Fire the timer if its deadline has passed. A fired timer is disarmed.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// Independent debounce timers, one per key.
///
/// Scheduling one key never touches another key's timer.
#[derive(Debug, Clone)]
pub struct DebounceSet<K> {
    window: Duration,
    pending: HashMap<K, Instant>,
}

impl<K: Copy + Eq + Hash> DebounceSet<K> {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: HashMap::new(),
        }
    }

    /// Arm (or re-arm) the timer for `key`.
    ///
    /// Returns `true` if a pending timer for the same key was superseded.
    pub fn schedule(&mut self, key: K, now: Instant) -> bool {
        self.pending.insert(key, now + self.window).is_some()
    }

    /// Cancel the timer for `key` if it is pending.
    pub fn cancel(&mut self, key: K) -> bool {
        self.pending.remove(&key).is_some()
    }

    /// Cancel every pending timer. Returns how many were cancelled.
    pub fn cancel_all(&mut self) -> usize {
        let count = self.pending.len();
        self.pending.clear();
        count
    }

    pub fn is_pending(&self, key: K) -> bool {
        self.pending.contains_key(&key)
    }

    /// Earliest pending deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().min().copied()
    }

    /// Fire every timer whose deadline is at or before `now`.
    ///
    /// Fired keys are returned in deadline order and disarmed.
    pub fn poll_due(&mut self, now: Instant) -> Vec<K> {
        let mut due: Vec<(K, Instant)> = self
            .pending
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(&key, &deadline)| (key, deadline))
            .collect();
        due.sort_by_key(|&(_, deadline)| deadline);

        for (key, _) in &due {
            self.pending.remove(key);
        }
        due.into_iter().map(|(key, _)| key).collect()
    }

    /// Disarm and return every pending key regardless of its deadline.
    pub fn drain(&mut self) -> Vec<K> {
        let mut all: Vec<(K, Instant)> = self.pending.drain().collect();
        all.sort_by_key(|&(_, deadline)| deadline);
        all.into_iter().map(|(key, _)| key).collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}
