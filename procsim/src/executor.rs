//! Single-threaded cooperative executor for process bodies.
//!
//! Every process is a boxed future stored in the kernel's task slab. A process
//! is polled exactly when:
//!
//! * it is spawned, so that it runs up to its first suspension point before
//!   `spawn` returns,
//! * an event targeting it is dispatched by the scheduler.
//!
//! Wakers play no part in this: suspension points register their own wake-up
//! event in the calendar, so the executor polls with a no-op waker. Futures
//! that rely on a waker to make progress will therefore never be resumed.
//!
//! The future is moved out of the slab for the duration of the poll so that
//! no `RefCell` borrow of the kernel is held while user code runs.

use std::future::Future;
use std::pin::Pin;
use std::task::{self, Poll};

use crate::process::{Context, ProcessError, ProcessId, ProcessState};
use crate::simulation::kernel::{Delivery, SharedKernel};
use crate::simulation::SimulationError;

pub(crate) type ProcessFuture = Pin<Box<dyn Future<Output = Result<(), ProcessError>>>>;

/// A process entry in the task slab.
pub(crate) struct Task {
    pub(crate) serial: u64,
    pub(crate) name: String,
    pub(crate) state: ProcessState,
    /// `None` while the process is being polled, or before its body is built.
    pub(crate) future: Option<ProcessFuture>,
}

impl Task {
    pub(crate) fn new(name: String, serial: u64) -> Self {
        Self {
            serial,
            name,
            state: ProcessState::Runnable,
            future: None,
        }
    }
}

/// Creates a process and runs it until its first suspension point.
///
/// Once a failure is pending or the simulation is halted, the process is
/// issued an identifier but its body is never polled.
pub(crate) fn spawn<F, Fut>(kernel: &SharedKernel, name: String, body: F) -> ProcessId
where
    F: FnOnce(Context) -> Fut,
    Fut: Future<Output = Result<(), ProcessError>> + 'static,
{
    let id = {
        let mut k = kernel.borrow_mut();
        if !k.is_healthy() {
            let id = k.register_terminated();
            tracing::warn!(process = %id, %name, "simulation halted, process not started");
            return id;
        }
        k.register_task(name)
    };
    let future: ProcessFuture = Box::pin(body(Context::new(id, kernel.clone())));

    {
        let mut k = kernel.borrow_mut();
        tracing::debug!(process = %id, name = %k.tasks[id.key()].name, time = %k.clock, "process spawned");
        k.tasks[id.key()].future = Some(future);
    }
    resume(kernel, id, None);

    id
}

/// Polls a process once, optionally delivering the event that woke it up.
///
/// Failures are recorded in the kernel rather than returned: a process may
/// be resumed from within another process (nested spawn), where the failure
/// cannot be propagated to the run loop directly.
pub(crate) fn resume(kernel: &SharedKernel, id: ProcessId, delivery: Option<Delivery>) {
    let (mut future, outer_running, outer_delivery) = {
        let mut k = kernel.borrow_mut();
        let Some(task) = k.task_mut(id) else {
            tracing::debug!(process = %id, "discarding wake-up of a terminated process");
            return;
        };
        let Some(future) = task.future.take() else {
            tracing::warn!(process = %id, "process is already running and cannot be resumed");
            return;
        };
        task.state = ProcessState::Runnable;
        let outer_running = k.running.replace(id);
        let outer_delivery = std::mem::replace(&mut k.delivery, delivery);

        (future, outer_running, outer_delivery)
    };

    #[cfg(feature = "tracing")]
    crate::tracing::set_current_time(kernel.borrow().clock);

    let mut cx = task::Context::from_waker(futures_task::noop_waker_ref());
    let poll = future.as_mut().poll(&mut cx);

    let mut k = kernel.borrow_mut();
    k.running = outer_running;
    let unconsumed = std::mem::replace(&mut k.delivery, outer_delivery);

    match poll {
        Poll::Pending => {
            if let Some(delivery) = unconsumed {
                tracing::warn!(process = %id, seq = %delivery.seq, "wake-up event was not awaited by the process");
            }
            let orphan = if let Some(task) = k.task_mut(id) {
                if task.state == ProcessState::Runnable {
                    tracing::warn!(process = %id, name = %task.name, "process suspended without awaiting a simulation event");
                }
                task.future = Some(future);
                None
            } else {
                Some(future)
            };
            drop(k);
            drop(orphan);
        }
        Poll::Ready(result) => {
            let task = k.tasks.remove(id.key());
            let time = k.clock;
            match result {
                Ok(()) => {
                    tracing::debug!(process = %id, name = %task.name, %time, "process terminated");
                }
                Err(source) => {
                    tracing::error!(process = %id, name = %task.name, %time, error = %source, "process failed");
                    k.record_failure(SimulationError::ProcessFailed {
                        process: id,
                        name: task.name,
                        time,
                        source,
                    });
                }
            }
            // Dropping the body may release resources, which needs the kernel.
            drop(k);
            drop(future);
        }
    }
}
