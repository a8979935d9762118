//! Event calendar.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashSet};
use std::fmt;

use crate::process::ProcessId;
use crate::resource::{RequestId, ResourceId};
use crate::time::SimTime;

/// Creation-order sequence number of an event.
///
/// Sequence numbers are strictly increasing within an environment and break
/// ties between events scheduled for the same time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EventSeq(u64);

impl EventSeq {
    /// Returns the raw sequence number.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EventSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E#{}", self.0)
    }
}

/// What a dispatched event means to the process it resumes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EventKind {
    /// A timeout requested by the process has elapsed.
    Timeout,
    /// A queued resource request has been granted a slot.
    ResourceGrant {
        /// The resource providing the slot.
        resource: ResourceId,
        /// The request being granted.
        request: RequestId,
    },
}

/// A scheduled event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Event {
    pub(crate) time: SimTime,
    pub(crate) seq: EventSeq,
    pub(crate) kind: EventKind,
    pub(crate) target: ProcessId,
}

impl Event {
    fn key(&self) -> (SimTime, EventSeq) {
        (self.time, self.seq)
    }
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// An attempt to schedule an event before the current simulation time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("cannot schedule an event at t={requested} when the clock is at t={current}")]
pub struct CausalityError {
    /// The requested event time.
    pub requested: SimTime,
    /// The simulation time at the moment of the request.
    pub current: SimTime,
}

/// Pending events ordered by `(time, seq)`.
///
/// Cancellation is lazy: cancelled sequence numbers are remembered and the
/// corresponding events are discarded when they reach the head of the queue.
#[derive(Debug, Default)]
pub(crate) struct EventQueue {
    heap: BinaryHeap<Reverse<Event>>,
    cancelled: HashSet<EventSeq>,
    next_seq: u64,
}

impl EventQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Inserts an event, assigning it the next sequence number.
    pub(crate) fn insert(
        &mut self,
        now: SimTime,
        time: SimTime,
        kind: EventKind,
        target: ProcessId,
    ) -> Result<Event, CausalityError> {
        if time < now {
            return Err(CausalityError {
                requested: time,
                current: now,
            });
        }

        let seq = EventSeq(self.next_seq);
        self.next_seq += 1;

        let event = Event {
            time,
            seq,
            kind,
            target,
        };
        self.heap.push(Reverse(event));
        tracing::trace!(%seq, %time, ?kind, process = %target, "event scheduled");

        Ok(event)
    }

    /// Removes and returns the earliest live event.
    pub(crate) fn pop_min(&mut self) -> Option<Event> {
        self.discard_cancelled();

        self.heap.pop().map(|Reverse(event)| event)
    }

    /// Returns the time of the earliest live event.
    pub(crate) fn peek_time(&mut self) -> Option<SimTime> {
        self.discard_cancelled();

        self.heap.peek().map(|Reverse(event)| event.time)
    }

    /// Marks a scheduled event as cancelled.
    ///
    /// Cancelling an event that was already dispatched has no effect.
    pub(crate) fn cancel(&mut self, seq: EventSeq) {
        if seq.0 < self.next_seq {
            self.cancelled.insert(seq);
        }
    }

    /// Number of live events.
    pub(crate) fn len(&self) -> usize {
        self.heap
            .iter()
            .filter(|Reverse(event)| !self.cancelled.contains(&event.seq))
            .count()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn discard_cancelled(&mut self) {
        while let Some(Reverse(head)) = self.heap.peek() {
            if !self.cancelled.remove(&head.seq) {
                break;
            }
            self.heap.pop();
        }
    }
}
