//! Sinks for simulation records.
//!
//! A monitor is any [`EventSink`] connected to an environment with
//! [`Environment::add_monitor`](crate::simulation::Environment::add_monitor).
//! The environment obtains a writer from the sink and pushes one
//! [`DispatchRecord`](crate::simulation::DispatchRecord) per dispatched event,
//! in dispatch order.
//!
//! [`EventBuffer`] is a ready-made sink which stores records until they are
//! consumed through its [`Iterator`] implementation:
//!
//! ```
//! use procsim::monitor::EventBuffer;
//! use procsim::simulation::Environment;
//!
//! let mut env = Environment::new();
//! let mut trace = EventBuffer::new();
//! env.add_monitor(&trace);
//!
//! env.spawn("sleeper", |cx| async move { cx.timeout(2.5).await });
//! env.run_unbounded()?;
//!
//! let record = trace.next().unwrap();
//! assert_eq!(record.time.as_f64(), 2.5);
//! assert!(trace.next().is_none());
//! # Ok::<(), procsim::simulation::SimulationError>(())
//! ```

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

/// A simulation endpoint that can receive records.
pub trait EventSink<T> {
    /// Writer handle to the sink.
    type Writer: EventSinkWriter<T>;

    /// Returns a writer handle.
    fn writer(&self) -> Self::Writer;
}

/// A writer handle of a sink.
pub trait EventSinkWriter<T>: 'static {
    /// Writes a record.
    fn write(&self, record: T);
}

struct Inner<T> {
    queue: VecDeque<T>,
    capacity: Option<usize>,
    dropped: u64,
}

/// A buffer of records with an optional capacity.
///
/// When a bounded buffer is full, the oldest record is dropped to make room
/// for the new one.
pub struct EventBuffer<T> {
    inner: Rc<RefCell<Inner<T>>>,
}

impl<T> EventBuffer<T> {
    /// Creates an unbounded buffer.
    pub fn new() -> Self {
        Self::from_capacity(None)
    }

    /// Creates a buffer keeping at most the `capacity` latest records.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::from_capacity(Some(capacity))
    }

    fn from_capacity(capacity: Option<usize>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                queue: VecDeque::new(),
                capacity,
                dropped: 0,
            })),
        }
    }

    /// Number of buffered records.
    pub fn len(&self) -> usize {
        self.inner.borrow().queue.len()
    }

    /// Returns `true` if no record is buffered.
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().queue.is_empty()
    }

    /// Number of records dropped because the buffer was full.
    pub fn dropped(&self) -> u64 {
        self.inner.borrow().dropped
    }

    /// Removes all buffered records.
    pub fn clear(&mut self) {
        self.inner.borrow_mut().queue.clear();
    }
}

impl<T: 'static> EventSink<T> for EventBuffer<T> {
    type Writer = EventBufferWriter<T>;

    fn writer(&self) -> Self::Writer {
        EventBufferWriter {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Iterator for EventBuffer<T> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.borrow_mut().queue.pop_front()
    }
}

impl<T> Default for EventBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for EventBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBuffer")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

/// Writer handle of an [`EventBuffer`].
pub struct EventBufferWriter<T> {
    inner: Rc<RefCell<Inner<T>>>,
}

impl<T: 'static> EventSinkWriter<T> for EventBufferWriter<T> {
    fn write(&self, record: T) {
        let mut inner = self.inner.borrow_mut();
        if inner.capacity == Some(0) {
            inner.dropped += 1;
            return;
        }
        if inner.capacity == Some(inner.queue.len()) {
            inner.queue.pop_front();
            inner.dropped += 1;
        }
        inner.queue.push_back(record);
    }
}

impl<T> Clone for EventBufferWriter<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> fmt::Debug for EventBufferWriter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBufferWriter").finish_non_exhaustive()
    }
}
