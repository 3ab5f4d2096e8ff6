use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use log::{debug, trace, warn};
use tokio_util::time::delay_queue::{DelayQueue, Key};

use super::{ContactSet, ScheduledContactEntry};
use crate::utils::datetime_to_millis;

/// Longest delay handed to the timer wheel at once, longer ones are re-armed
pub const MAX_TIMER_DELAY: Duration = Duration::from_secs(365 * 24 * 60 * 60);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Boundary {
    Begin,
    End,
}

impl fmt::Display for Boundary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let word = match self {
            Boundary::Begin => "begin",
            Boundary::End => "end",
        };
        write!(f, "{}", word)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum ContactPhase {
    Registered,
    BeginFired,
}

/// A timer placed in the queue by `register`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredTimer {
    pub entry: ScheduledContactEntry,
    pub boundary: Boundary,
    /// Absolute fire time (ms since the Unix epoch)
    pub at: u64,
    /// Delay from the registration instant
    pub delay: Duration,
}

/// A contact boundary that has been reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContactEvent {
    pub entry: ScheduledContactEntry,
    pub boundary: Boundary,
}

impl fmt::Display for ContactEvent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}", self.boundary, self.entry)
    }
}

// Queued timer, `remaining` is the delay still to wait once it expires
#[derive(Debug, Clone, Copy)]
struct Timer {
    entry: ScheduledContactEntry,
    boundary: Boundary,
    remaining: Duration,
}

impl Timer {
    fn new(entry: ScheduledContactEntry, boundary: Boundary, delay: Duration) -> (Self, Duration) {
        let step = delay.min(MAX_TIMER_DELAY);
        let timer = Self {
            entry,
            boundary,
            remaining: delay - step,
        };
        (timer, step)
    }
}

// Lives from registration until the end event is handed out
#[derive(Debug)]
struct ContactContext {
    phase: ContactPhase,
    // Set until the begin timer fires
    begin_key: Option<Key>,
}

/// Turns contact boundaries into timer events
///
/// Each registered contact gets a begin and an end timer. The scheduler owns the
/// contact's context until its end event is returned from `next_event`; there is
/// no way to cancel a registered contact.
pub struct ContactScheduler {
    queue: DelayQueue<Timer>,
    contexts: HashMap<ScheduledContactEntry, ContactContext>,
}

impl ContactScheduler {
    pub fn new() -> Self {
        Self {
            queue: DelayQueue::new(),
            contexts: HashMap::new(),
        }
    }

    /// Contacts whose end event has not fired yet
    pub fn pending(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_idle(&self) -> bool {
        self.queue.is_empty()
    }

    /// Register begin/end timers for every valid contact in `set`
    pub fn register(&mut self, set: &ContactSet, now: DateTime<Utc>) -> Vec<RegisteredTimer> {
        let now_ms = datetime_to_millis(&now);
        set.iter()
            .filter_map(|entry| self.register_entry(*entry, now_ms))
            .flatten()
            .collect()
    }

    /// Register both timers of one contact, relative to `now_ms`
    /// Boundaries already in the past fire immediately.
    pub fn register_entry(
        &mut self,
        entry: ScheduledContactEntry,
        now_ms: u64,
    ) -> Option<[RegisteredTimer; 2]> {
        if !entry.is_valid() {
            debug!("Not scheduling invalid contact {}", entry);
            return None;
        }
        if self.contexts.contains_key(&entry) {
            warn!("Contact already scheduled: {}", entry);
            return None;
        }
        let begin = RegisteredTimer {
            entry,
            boundary: Boundary::Begin,
            at: entry.start_time,
            delay: delay_until(entry.start_time, now_ms),
        };
        let end = RegisteredTimer {
            entry,
            boundary: Boundary::End,
            at: entry.end_time(),
            delay: delay_until(entry.end_time(), now_ms),
        };
        let begin_key = self.arm(entry, Boundary::Begin, begin.delay);
        self.arm(entry, Boundary::End, end.delay);
        self.contexts.insert(
            entry,
            ContactContext {
                phase: ContactPhase::Registered,
                begin_key: Some(begin_key),
            },
        );
        debug!(
            "Scheduled {} (begin in {:?}, end in {:?})",
            entry, begin.delay, end.delay
        );
        Some([begin, end])
    }

    fn arm(&mut self, entry: ScheduledContactEntry, boundary: Boundary, delay: Duration) -> Key {
        let (timer, delay) = Timer::new(entry, boundary, delay);
        self.queue.insert(timer, delay)
    }

    /// Wait for the next contact boundary
    ///
    /// Returns `None` when nothing is scheduled. A contact's begin event is always
    /// returned before its end event, even when both are already due.
    pub async fn next_event(&mut self) -> Option<ContactEvent> {
        loop {
            let Timer {
                entry,
                boundary,
                remaining,
            } = self.queue.next().await?.into_inner();
            if !remaining.is_zero() {
                trace!("Re-arming {} timer of {} ({:?} left)", boundary, entry, remaining);
                let key = self.arm(entry, boundary, remaining);
                if boundary == Boundary::Begin {
                    if let Some(context) = self.contexts.get_mut(&entry) {
                        context.begin_key = Some(key);
                    }
                }
                continue;
            }
            trace!("Timer fired: {} {}", boundary, entry);
            match boundary {
                Boundary::Begin => {
                    if let Some(context) = self.contexts.get_mut(&entry) {
                        context.phase = ContactPhase::BeginFired;
                        context.begin_key = None;
                    }
                }
                Boundary::End => {
                    let context = match self.contexts.remove(&entry) {
                        Some(context) => context,
                        None => {
                            warn!("End timer fired for untracked contact {}", entry);
                            continue;
                        }
                    };
                    if let Some(begin_key) = context.begin_key {
                        // Both timers were due at once and the end popped first
                        self.queue.remove(&begin_key);
                        self.arm(entry, Boundary::End, Duration::ZERO);
                        self.contexts.insert(
                            entry,
                            ContactContext {
                                phase: ContactPhase::BeginFired,
                                begin_key: None,
                            },
                        );
                        return Some(ContactEvent {
                            entry,
                            boundary: Boundary::Begin,
                        });
                    }
                    debug!("Released contact {} ({:?})", entry, context.phase);
                }
            }
            return Some(ContactEvent { entry, boundary });
        }
    }
}

impl Default for ContactScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ContactScheduler {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "<ContactScheduler contacts={} timers={}>",
            self.contexts.len(),
            self.queue.len()
        )
    }
}

/// Relative delay until `at_ms`, zero if it has already passed
pub fn delay_until(at_ms: u64, now_ms: u64) -> Duration {
    Duration::from_millis(at_ms.saturating_sub(now_ms))
}
