//! Processes and their execution context.
//!
//! A process is the behavior of a simulated entity written as an ordinary
//! `async` block or `async fn`. It runs until it awaits one of the engine's
//! suspension points, and is resumed by the scheduler when the awaited event
//! fires:
//!
//! * [`Context::timeout`] suspends the process for a simulated duration,
//! * [`Context::request`] and [`Context::acquire`] suspend it until a
//!   [`Resource`] slot is granted.
//!
//! Everything between two suspension points executes atomically with respect
//! to other processes.
//!
//! # Process bodies
//!
//! A body is a closure that takes a [`Context`] and returns a future
//! resolving to `Result<(), ProcessError>`. Returning an error is an
//! unrecovered failure which halts the simulation, see
//! [`SimulationError::ProcessFailed`](crate::simulation::SimulationError::ProcessFailed).
//!
//! ```
//! use procsim::process::{Context, ProcessError};
//! use procsim::resource::Resource;
//! use procsim::simulation::Environment;
//!
//! async fn customer(cx: Context, counter: Resource) -> Result<(), ProcessError> {
//!     let arrival = cx.now();
//!     let guard = cx.acquire(&counter).await?;
//!     println!("waited {}", cx.now().saturating_duration_since(arrival));
//!     cx.timeout(4.0).await?;
//!     guard.release()?;
//!
//!     Ok(())
//! }
//!
//! let mut env = Environment::new();
//! let counter = Resource::new(&env, 1)?;
//! for n in 0..3 {
//!     let counter = counter.clone();
//!     env.spawn(format!("customer-{n}"), move |cx| customer(cx, counter));
//! }
//! env.run_unbounded()?;
//! assert_eq!(env.now().as_f64(), 12.0);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod timeout;

use std::error::Error;
use std::fmt;
use std::future::Future;

use crate::random::RandomSource;
use crate::resource::{Acquire, Request, RequestToken, Resource, ResourceError};
use crate::simulation::kernel::SharedKernel;
use crate::simulation::CausalityError;
use crate::time::SimTime;

pub use timeout::Timeout;

/// Unique identifier of a process.
///
/// Identifiers are never reused within an environment, even after the
/// process has terminated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProcessId {
    key: usize,
    serial: u64,
}

impl ProcessId {
    pub(crate) fn new(key: usize, serial: u64) -> Self {
        Self { key, serial }
    }

    pub(crate) fn key(self) -> usize {
        self.key
    }

    /// Returns the creation rank of the process in its environment.
    pub fn serial(self) -> u64 {
        self.serial
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.serial)
    }
}

/// Life-cycle state of a process.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ProcessState {
    /// The process is executing, or about to be.
    Runnable,
    /// The process waits for a timeout to elapse.
    AwaitingTimer,
    /// The process waits in the queue of a resource.
    AwaitingResource,
    /// The process body has completed, successfully or not.
    Terminated,
}

/// An error raised inside a process body.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    /// A timeout was requested with a negative, NaN or infinite duration.
    #[error("invalid duration {0}: durations must be finite and non-negative")]
    InvalidDuration(f64),
    /// A resource operation failed.
    #[error(transparent)]
    Resource(#[from] ResourceError),
    /// The engine attempted to schedule an event in the past.
    #[error(transparent)]
    Causality(#[from] CausalityError),
    /// A suspension point was polled outside of any process.
    #[error("simulation primitives can only be awaited from within a process")]
    OutsideProcess,
    /// A failure specific to the model.
    #[error("{0}")]
    Failed(Box<dyn Error>),
}

impl ProcessError {
    /// Wraps a model-specific failure.
    ///
    /// ```
    /// use procsim::process::ProcessError;
    ///
    /// let err = ProcessError::failed("patient record missing");
    /// assert_eq!(err.to_string(), "patient record missing");
    /// ```
    pub fn failed(err: impl Into<Box<dyn Error>>) -> Self {
        ProcessError::Failed(err.into())
    }
}

/// Handle given to a process body.
///
/// The context provides the current simulation time and creates the futures
/// at which the process suspends. It is cheap to clone.
#[derive(Clone)]
pub struct Context {
    id: ProcessId,
    kernel: SharedKernel,
}

impl Context {
    pub(crate) fn new(id: ProcessId, kernel: SharedKernel) -> Self {
        Self { id, kernel }
    }

    /// Identifier of this process.
    pub fn id(&self) -> ProcessId {
        self.id
    }

    /// Current simulation time.
    pub fn now(&self) -> SimTime {
        self.kernel.borrow().clock
    }

    /// Returns a future that completes `duration` time units from now.
    ///
    /// The future resolves to [`ProcessError::InvalidDuration`] without
    /// suspending if `duration` is negative, NaN or infinite. Zero-duration
    /// timeouts are valid: the process resumes at the current time, after the
    /// events already scheduled for that time.
    pub fn timeout(&self, duration: f64) -> Timeout {
        Timeout::new(self.kernel.clone(), duration)
    }

    /// Returns a timeout whose duration is drawn from `source`.
    pub fn sampled_timeout<R>(&self, source: &mut R) -> Timeout
    where
        R: RandomSource + ?Sized,
    {
        self.timeout(source.sample())
    }

    /// Requests a slot of `resource`.
    ///
    /// The future completes immediately if a slot is free and otherwise
    /// suspends the process in the FIFO queue of the resource. The returned
    /// token must be handed back with [`Context::release`]; prefer
    /// [`Context::acquire`] which does so automatically.
    pub fn request(&self, resource: &Resource) -> Request {
        resource.request()
    }

    /// Requests a slot of `resource` and returns a guard that releases it
    /// when dropped.
    pub fn acquire(&self, resource: &Resource) -> Acquire {
        resource.acquire()
    }

    /// Releases a slot obtained with [`Context::request`].
    pub fn release(&self, resource: &Resource, token: RequestToken) -> Result<(), ResourceError> {
        resource.release(token)
    }

    /// Spawns a new process.
    ///
    /// The new process runs up to its first suspension point before this
    /// method returns; the calling process resumes afterwards, at the same
    /// simulation time.
    pub fn spawn<F, Fut>(&self, name: impl Into<String>, body: F) -> ProcessId
    where
        F: FnOnce(Context) -> Fut,
        Fut: Future<Output = Result<(), ProcessError>> + 'static,
    {
        crate::executor::spawn(&self.kernel, name.into(), body)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context").field("id", &self.id).finish_non_exhaustive()
    }
}
