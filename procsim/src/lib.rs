//! A process-oriented discrete-event simulation engine.
//!
//! Procsim models a system as a set of *processes*, i.e. simulated entities
//! whose behavior is written as ordinary sequential `async` code: a customer
//! who arrives, queues for a counter, is served for some time and leaves. The
//! points where a process waits for simulated time to pass, or for a shared
//! resource to become available, are expressed with `.await`.
//!
//! Under the hood, a single-threaded executor drives the processes from a
//! calendar of time-stamped events. Simulated time jumps from one event to
//! the next, so a simulation runs as fast as its processes can compute.
//!
//! # A practical overview
//!
//! Simulating a system typically involves three activities:
//!
//! 1. describing the behavior of each kind of entity as a process body,
//! 2. creating the environment, its shared resources and its initial
//!    processes,
//! 3. running the simulation and collecting results.
//!
//! ## Process bodies
//!
//! A process body is a closure or `async fn` taking a
//! [`Context`](process::Context) and returning `Result<(), ProcessError>`.
//! The context provides the current time and the suspension points:
//!
//! * [`Context::timeout`](process::Context::timeout) waits for a simulated
//!   duration,
//! * [`Context::acquire`](process::Context::acquire) waits for a slot of a
//!   [`Resource`](resource::Resource) and returns a guard which releases the
//!   slot when dropped,
//! * [`Context::request`](process::Context::request) and
//!   [`Context::release`](process::Context::release) are the unscoped
//!   equivalent of `acquire`.
//!
//! A process runs without interruption between two suspension points. No
//! other process can observe or modify the simulation state in the meantime,
//! so process bodies need no synchronization.
//!
//! ```
//! use procsim::process::{Context, ProcessError};
//! use procsim::resource::Resource;
//!
//! /// A patient who sees the nurse for `consultation` time units.
//! async fn patient(cx: Context, nurse: Resource, consultation: f64) -> Result<(), ProcessError> {
//!     let _nurse = cx.acquire(&nurse).await?;
//!     cx.timeout(consultation).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Bench assembly and execution
//!
//! An [`Environment`](simulation::Environment) holds the clock and the event
//! calendar. Resources are created within an environment and processes are
//! spawned on it; a spawned process runs immediately up to its first
//! suspension point.
//!
//! ```
//! use procsim::process::{Context, ProcessError};
//! use procsim::resource::Resource;
//! use procsim::simulation::Environment;
//!
//! # async fn patient(cx: Context, nurse: Resource, consultation: f64) -> Result<(), ProcessError> {
//! #     let _nurse = cx.acquire(&nurse).await?;
//! #     cx.timeout(consultation).await?;
//! #     Ok(())
//! # }
//! let mut env = Environment::new();
//! let nurse = Resource::new(&env, 1)?;
//!
//! for consultation in [6.0, 4.0, 5.0] {
//!     let nurse = nurse.clone();
//!     env.spawn("patient", move |cx| patient(cx, nurse, consultation));
//! }
//! env.run(100.0)?;
//!
//! assert_eq!(env.now().as_f64(), 15.0);
//! assert_eq!(nurse.stats().total_wait, 6.0 + 10.0);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! The run-control methods of the environment are
//! [`run`](simulation::Environment::run), which stops at a horizon,
//! [`run_unbounded`](simulation::Environment::run_unbounded) and
//! [`step`](simulation::Environment::step). Dispatched events can be recorded
//! with a [monitor](monitor).
//!
//! ## Ordering guarantees
//!
//! Events are dispatched by increasing time, and events scheduled for the
//! same time are dispatched in the order in which they were scheduled. In
//! particular, a slot released at time `t` is handed to the longest waiting
//! process, which resumes at time `t` after all events already scheduled for
//! `t`. A simulation fed with the same random samples is thus exactly
//! reproducible.
//!
//!
//! # Cargo feature flags
//!
//! ## Tracing
//!
//! The engine always logs through the
//! [`tracing`](https://docs.rs/tracing/latest/tracing/) crate. The `tracing`
//! feature flag additionally provides a `tracing-subscriber` timer printing
//! the simulation time, and can be activated in `Cargo.toml` with:
//!
//! ```toml
//! [dependencies]
//! procsim = { version = "0.1.0", features = ["tracing"] }
//! ```
//!
//! See the `tracing` module for more information.
//!
//! ## Serde
//!
//! The `serde` feature flag implements `Serialize` and `Deserialize` for
//! simulation times, identifiers, dispatch records and resource statistics.
//!
//!
//! # Other resources
//!
//! Random durations are drawn from a [`RandomSource`](random::RandomSource).
//! Seeded samplers and an arrival generator are provided by the companion
//! `procsim-util` crate, together with a fleshed-out clinic example.
#![warn(missing_docs, missing_debug_implementations, unreachable_pub)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub(crate) mod executor;
pub mod monitor;
pub mod process;
pub mod random;
pub mod resource;
pub mod simulation;
pub mod time;

#[cfg(feature = "tracing")]
pub mod tracing;
