//! Deadline-ordered timer events.
//!
//! Devices schedule a payload at an absolute guest-time deadline; the
//! platform pops due events after advancing the clock and routes each payload
//! back to its device's `handle_timer_event` method. Scheduling a payload
//! that is already queued moves its deadline (the timer-mod idiom), so a
//! device's periodic timer occupies at most one slot.

/// A scheduled event: the deadline it was due at and the device payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimerEventEntry<T> {
    pub deadline_ns: u64,
    pub payload: T,
}

/// A queue of pending timer events ordered by deadline.
///
/// The queue is small (a handful of device timers), so it is a plain sorted
/// vector; ties pop in scheduling order.
#[derive(Clone, Debug, Default)]
pub struct TimerQueue<T> {
    events: Vec<TimerEventEntry<T>>,
}

impl<T: PartialEq> TimerQueue<T> {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Schedule `payload` at `deadline_ns`, replacing any pending event with
    /// an equal payload.
    pub fn schedule(&mut self, deadline_ns: u64, payload: T) {
        self.cancel(&payload);
        let at = self
            .events
            .iter()
            .position(|e| e.deadline_ns > deadline_ns)
            .unwrap_or(self.events.len());
        self.events.insert(
            at,
            TimerEventEntry {
                deadline_ns,
                payload,
            },
        );
    }

    /// Remove a pending event with an equal payload, if any. Idempotent.
    pub fn cancel(&mut self, payload: &T) {
        self.events.retain(|e| e.payload != *payload);
    }

    /// Pop the earliest event whose deadline has passed.
    pub fn pop_due(&mut self, now_ns: u64) -> Option<TimerEventEntry<T>> {
        if self.events.first()?.deadline_ns <= now_ns {
            Some(self.events.remove(0))
        } else {
            None
        }
    }

    /// Deadline of the earliest pending event.
    pub fn next_deadline(&self) -> Option<u64> {
        self.events.first().map(|e| e.deadline_ns)
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
