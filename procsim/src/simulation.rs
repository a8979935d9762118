//! Simulation environment and run control.
//!
//! An [`Environment`] owns the simulation clock and the calendar of pending
//! events. Processes are added with [`Environment::spawn`] and the simulation
//! is advanced with one of the run-control methods:
//!
//! * [`Environment::run`] processes all events up to and including a horizon,
//! * [`Environment::run_unbounded`] processes events until none is left,
//! * [`Environment::step`] processes exactly one event.
//!
//! Events are processed in increasing time order; events scheduled for the
//! same time are processed in the order in which they were scheduled. Given
//! the same process bodies and the same random samples, a simulation
//! therefore always produces the same sequence of events.
//!
//! # Failures
//!
//! A process body returning an error halts the simulation: the run-control
//! method that processed the failing event returns
//! [`SimulationError::ProcessFailed`], and every subsequent call returns
//! [`SimulationError::Halted`].
//!
//! ```
//! use procsim::process::{Context, ProcessError};
//! use procsim::simulation::{Environment, SimulationError};
//!
//! async fn faulty(cx: Context) -> Result<(), ProcessError> {
//!     cx.timeout(3.0).await?;
//!     Err(ProcessError::failed("out of stock"))
//! }
//!
//! let mut env = Environment::new();
//! env.spawn("faulty", faulty);
//!
//! let err = env.run(10.0).unwrap_err();
//! assert!(matches!(err, SimulationError::ProcessFailed { .. }));
//! assert_eq!(env.now().as_f64(), 3.0);
//! assert!(matches!(env.run(10.0), Err(SimulationError::Halted)));
//! ```

mod event_queue;
pub(crate) mod kernel;

use std::fmt;
use std::future::Future;

use crate::executor;
use crate::monitor::EventSink;
use crate::process::{Context, ProcessError, ProcessId, ProcessState};
use crate::time::SimTime;

use kernel::{Delivery, Kernel, SharedKernel};

pub use event_queue::{CausalityError, EventKind, EventSeq};

/// An error that halts a simulation.
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    /// The horizon passed to [`Environment::run`] is negative or NaN.
    #[error("invalid simulation horizon {0}: the horizon must be non-negative")]
    InvalidHorizon(f64),
    /// An event was scheduled before the current simulation time.
    #[error("non-causal event: {0}")]
    NonCausalEvent(#[from] CausalityError),
    /// A process body returned an error.
    #[error("process {process} ({name}) failed at t={time}: {source}")]
    ProcessFailed {
        /// The failing process.
        process: ProcessId,
        /// Name of the failing process.
        name: String,
        /// Simulation time of the failure.
        time: SimTime,
        /// The error returned by the body.
        source: ProcessError,
    },
    /// The simulation was halted by an earlier failure.
    #[error("the simulation was halted by an earlier failure")]
    Halted,
}

/// Description of a dispatched event, as passed to monitors.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DispatchRecord {
    /// Simulation time of the event.
    pub time: SimTime,
    /// Scheduling rank of the event.
    pub sequence: EventSeq,
    /// What the event does.
    pub kind: EventKind,
    /// The process resumed by the event.
    pub process: ProcessId,
}

/// A discrete-event simulation environment.
pub struct Environment {
    kernel: SharedKernel,
}

impl Environment {
    /// Creates an environment with its clock at zero.
    pub fn new() -> Self {
        Self::with_start_time(SimTime::ZERO)
    }

    /// Creates an environment with its clock at `start`.
    pub fn with_start_time(start: SimTime) -> Self {
        #[cfg(feature = "tracing")]
        crate::tracing::set_current_time(start);

        Self {
            kernel: Kernel::new(start).into_shared(),
        }
    }

    pub(crate) fn kernel(&self) -> &SharedKernel {
        &self.kernel
    }

    /// Current simulation time.
    ///
    /// After a run this is the time of the last processed event, which may be
    /// earlier than the horizon.
    pub fn now(&self) -> SimTime {
        self.kernel.borrow().clock
    }

    /// Spawns a process.
    ///
    /// The body runs up to its first suspension point before this method
    /// returns. A failure during that first step is reported by the next
    /// run-control call.
    ///
    /// Once a process has failed, spawned processes are registered as
    /// terminated and their body is never run.
    pub fn spawn<F, Fut>(&mut self, name: impl Into<String>, body: F) -> ProcessId
    where
        F: FnOnce(Context) -> Fut,
        Fut: Future<Output = Result<(), ProcessError>> + 'static,
    {
        executor::spawn(&self.kernel, name.into(), body)
    }

    /// Processes all events scheduled up to and including `until`.
    ///
    /// Events scheduled after the horizon are left pending and the processes
    /// waiting for them remain suspended; a later call can resume the
    /// simulation. `until` may be infinite.
    pub fn run(&mut self, until: f64) -> Result<(), SimulationError> {
        self.check_health()?;
        if until.is_nan() || until < 0.0 {
            return Err(SimulationError::InvalidHorizon(until));
        }
        tracing::info!(time = %self.now(), until, "running simulation");

        loop {
            let next = self.kernel.borrow_mut().queue.peek_time();
            match next {
                Some(time) if time.as_f64() <= until => {
                    self.dispatch_next()?;
                }
                _ => break,
            }
        }
        tracing::info!(time = %self.now(), pending = self.pending_events(), "simulation paused");

        Ok(())
    }

    /// Processes events until the calendar is empty.
    ///
    /// This does not return if processes keep scheduling events forever.
    pub fn run_unbounded(&mut self) -> Result<(), SimulationError> {
        self.run(f64::INFINITY)
    }

    /// Processes the next event, if any.
    pub fn step(&mut self) -> Result<Option<DispatchRecord>, SimulationError> {
        self.check_health()?;

        self.dispatch_next()
    }

    /// Number of events waiting to be processed.
    pub fn pending_events(&self) -> usize {
        self.kernel.borrow().queue.len()
    }

    /// Number of events processed since the creation of the environment.
    pub fn events_processed(&self) -> u64 {
        self.kernel.borrow().events_processed
    }

    /// State of a process, or `None` if `id` was not issued by this
    /// environment.
    pub fn process_state(&self, id: ProcessId) -> Option<ProcessState> {
        let kernel = self.kernel.borrow();
        match kernel.task(id) {
            Some(task) => Some(task.state),
            None if kernel.is_issued(id) => Some(ProcessState::Terminated),
            None => None,
        }
    }

    /// Number of processes that have not terminated.
    pub fn live_processes(&self) -> usize {
        self.kernel.borrow().tasks.len()
    }

    /// Connects a sink receiving a record of every dispatched event.
    pub fn add_monitor<S>(&mut self, sink: &S)
    where
        S: EventSink<DispatchRecord>,
    {
        self.kernel.borrow_mut().monitors.push(Box::new(sink.writer()));
    }

    /// Returns the pending failure, if any, and halts the environment.
    fn check_health(&mut self) -> Result<(), SimulationError> {
        let mut kernel = self.kernel.borrow_mut();
        if kernel.halted {
            return Err(SimulationError::Halted);
        }
        if let Some(err) = kernel.failure.take() {
            kernel.halted = true;
            return Err(err);
        }

        Ok(())
    }

    fn dispatch_next(&mut self) -> Result<Option<DispatchRecord>, SimulationError> {
        let (record, delivery) = {
            let mut kernel = self.kernel.borrow_mut();
            let Some(event) = kernel.queue.pop_min() else {
                return Ok(None);
            };
            if event.time < kernel.clock {
                let err = CausalityError {
                    requested: event.time,
                    current: kernel.clock,
                };
                kernel.halted = true;
                return Err(err.into());
            }

            kernel.clock = event.time;
            kernel.events_processed += 1;
            let record = DispatchRecord {
                time: event.time,
                sequence: event.seq,
                kind: event.kind,
                process: event.target,
            };
            for monitor in &kernel.monitors {
                monitor.write(record);
            }

            (record, Delivery::from(&event))
        };

        #[cfg(feature = "tracing")]
        crate::tracing::set_current_time(record.time);
        tracing::debug!(
            seq = %record.sequence,
            time = %record.time,
            kind = ?record.kind,
            process = %record.process,
            "dispatching event"
        );

        executor::resume(&self.kernel, record.process, Some(delivery));
        self.check_health()?;

        Ok(Some(record))
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Environment {
    fn drop(&mut self) {
        // Process bodies hold handles to the kernel: dropping them outside of
        // any borrow breaks the reference cycle and lets guards release.
        let tasks = std::mem::take(&mut self.kernel.borrow_mut().tasks);
        drop(tasks);
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("kernel", &*self.kernel.borrow())
            .finish()
    }
}
