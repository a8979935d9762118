//! Engine state shared by the environment, process contexts and resources.

use std::cell::RefCell;
use std::rc::Rc;

use slab::Slab;

use crate::executor::Task;
use crate::monitor::EventSinkWriter;
use crate::process::{ProcessId, ProcessState};
use crate::resource::{RequestId, ResourceId};
use crate::time::SimTime;

use super::event_queue::{CausalityError, Event, EventKind, EventQueue, EventSeq};
use super::{DispatchRecord, SimulationError};

pub(crate) type SharedKernel = Rc<RefCell<Kernel>>;

/// The event being delivered to the process currently polled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Delivery {
    pub(crate) seq: EventSeq,
    pub(crate) kind: EventKind,
}

impl From<&Event> for Delivery {
    fn from(event: &Event) -> Self {
        Delivery {
            seq: event.seq,
            kind: event.kind,
        }
    }
}

pub(crate) struct Kernel {
    pub(crate) clock: SimTime,
    pub(crate) queue: EventQueue,
    pub(crate) tasks: Slab<Task>,
    /// Process whose future is being polled, if any.
    pub(crate) running: Option<ProcessId>,
    /// Event that triggered the current poll, until consumed.
    pub(crate) delivery: Option<Delivery>,
    /// First fatal error, reported by the next run-control call.
    pub(crate) failure: Option<SimulationError>,
    /// Set once a failure has been returned to the caller.
    pub(crate) halted: bool,
    pub(crate) monitors: Vec<Box<dyn EventSinkWriter<DispatchRecord>>>,
    pub(crate) events_processed: u64,
    next_process_serial: u64,
    next_resource_id: u64,
    next_request_id: u64,
}

impl Kernel {
    pub(crate) fn new(start_time: SimTime) -> Self {
        Self {
            clock: start_time,
            queue: EventQueue::new(),
            tasks: Slab::new(),
            running: None,
            delivery: None,
            failure: None,
            halted: false,
            monitors: Vec::new(),
            events_processed: 0,
            next_process_serial: 0,
            next_resource_id: 0,
            next_request_id: 0,
        }
    }

    pub(crate) fn into_shared(self) -> SharedKernel {
        Rc::new(RefCell::new(self))
    }

    /// Schedules an event, recording a causality violation as fatal.
    pub(crate) fn schedule(
        &mut self,
        time: SimTime,
        kind: EventKind,
        target: ProcessId,
    ) -> Result<Event, CausalityError> {
        self.queue
            .insert(self.clock, time, kind, target)
            .inspect_err(|&err| {
                tracing::error!(%err, process = %target, "non-causal event");
                self.record_failure(err.into());
            })
    }

    /// Schedules a zero-delay event.
    pub(crate) fn schedule_now(&mut self, kind: EventKind, target: ProcessId) -> Event {
        let now = self.clock;
        match self.queue.insert(now, now, kind, target) {
            Ok(event) => event,
            Err(_) => unreachable!("an event at the current time is always causal"),
        }
    }

    pub(crate) fn record_failure(&mut self, err: SimulationError) {
        if self.failure.is_none() {
            self.failure = Some(err);
        }
    }

    /// Consumes the current delivery if it is the event `seq`.
    pub(crate) fn take_delivery(&mut self, seq: EventSeq) -> bool {
        match self.delivery {
            Some(delivery) if delivery.seq == seq => {
                self.delivery = None;
                true
            }
            _ => false,
        }
    }

    /// Consumes the current delivery if it grants `request`.
    pub(crate) fn take_grant(&mut self, request: RequestId) -> bool {
        match self.delivery {
            Some(Delivery {
                kind: EventKind::ResourceGrant { request: granted, .. },
                ..
            }) if granted == request => {
                self.delivery = None;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn task(&self, id: ProcessId) -> Option<&Task> {
        self.tasks
            .get(id.key())
            .filter(|task| task.serial == id.serial())
    }

    pub(crate) fn task_mut(&mut self, id: ProcessId) -> Option<&mut Task> {
        self.tasks
            .get_mut(id.key())
            .filter(|task| task.serial == id.serial())
    }

    pub(crate) fn set_state(&mut self, id: ProcessId, state: ProcessState) {
        if let Some(task) = self.task_mut(id) {
            task.state = state;
        }
    }

    /// Reserves a slab entry and a serial for a new process.
    pub(crate) fn register_task(&mut self, name: String) -> ProcessId {
        let serial = self.next_process_serial;
        self.next_process_serial += 1;
        let key = self.tasks.insert(Task::new(name, serial));

        ProcessId::new(key, serial)
    }

    /// Issues an identifier for a process that is never started.
    pub(crate) fn register_terminated(&mut self) -> ProcessId {
        let serial = self.next_process_serial;
        self.next_process_serial += 1;

        ProcessId::new(usize::MAX, serial)
    }

    /// Whether new processes may still be started.
    pub(crate) fn is_healthy(&self) -> bool {
        !self.halted && self.failure.is_none()
    }

    pub(crate) fn is_issued(&self, id: ProcessId) -> bool {
        id.serial() < self.next_process_serial
    }

    pub(crate) fn next_resource_id(&mut self) -> ResourceId {
        let id = ResourceId::new(self.next_resource_id);
        self.next_resource_id += 1;
        id
    }

    pub(crate) fn next_request_id(&mut self) -> RequestId {
        let id = RequestId::new(self.next_request_id);
        self.next_request_id += 1;
        id
    }
}

impl std::fmt::Debug for Kernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Kernel")
            .field("clock", &self.clock)
            .field("pending_events", &self.queue.len())
            .field("processes", &self.tasks.len())
            .field("running", &self.running)
            .field("halted", &self.halted)
            .finish_non_exhaustive()
    }
}
