//! Support for structured logging.
//!
//! # Overview
//!
//! The engine logs through the [`tracing`](https://docs.rs/tracing/latest/tracing/)
//! crate: scheduling of individual events at the `TRACE` level, spawning,
//! dispatching and resource grants at the `DEBUG` level, run boundaries at
//! the `INFO` level and anomalies such as unbalanced releases at the `WARN`
//! level. Process failures are logged at the `ERROR` level before being
//! returned by the run-control method.
//!
//! Logging is active whenever a subscriber is installed. This module only
//! adds a timer that stamps log lines with the simulation time rather than
//! the wall clock time.
//!
//! # Time-stamping
//!
//! [`SimulationTime`] implements
//! [`FormatTime`](tracing_subscriber::fmt::time::FormatTime) and can be
//! installed on a `tracing-subscriber` formatter:
//!
//! ```
//! use procsim::tracing::SimulationTime;
//!
//! tracing_subscriber::fmt()
//!     .with_timer(SimulationTime::with_precision(3))
//!     .init();
//! ```
//!
//! The stamp is the clock of the environment most recently created or
//! driven on the current thread. Lines logged before any environment exists
//! are stamped with a dash.
//!
//! Processes can log with the same macros; their messages are then
//! stamped with the time at which they are executed:
//!
//! ```
//! use procsim::process::Context;
//!
//! async fn patient(cx: Context) -> Result<(), procsim::process::ProcessError> {
//!     cx.timeout(2.0).await?;
//!     tracing::info!("patient leaves");
//!
//!     Ok(())
//! }
//! ```

use std::cell::Cell;
use std::fmt;

use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;

use crate::time::SimTime;

thread_local! {
    static CURRENT_TIME: Cell<Option<SimTime>> = const { Cell::new(None) };
}

/// Records the simulation time in effect on this thread.
pub(crate) fn set_current_time(time: SimTime) {
    CURRENT_TIME.with(|current| current.set(Some(time)));
}

/// A timer printing the simulation time of the event being processed.
#[derive(Clone, Copy, Debug, Default)]
pub struct SimulationTime {
    precision: Option<usize>,
}

impl SimulationTime {
    /// Prints times with the shortest exact representation.
    pub fn new() -> Self {
        Self { precision: None }
    }

    /// Prints times with a fixed number of decimals.
    pub fn with_precision(decimals: usize) -> Self {
        Self {
            precision: Some(decimals),
        }
    }
}

impl FormatTime for SimulationTime {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        match (CURRENT_TIME.with(Cell::get), self.precision) {
            (Some(time), Some(decimals)) => write!(w, "t={time:.decimals$}"),
            (Some(time), None) => write!(w, "t={time}"),
            (None, _) => write!(w, "t=-"),
        }
    }
}
