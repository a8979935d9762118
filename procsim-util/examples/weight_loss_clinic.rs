//! Example: a weight-loss clinic with a single nurse.
//!
//! Patients arrive on average every 5 minutes and see the nurse for 6 minutes
//! on average, so a queue builds up over the 2 hours of the clinic session.
//!
//! This example demonstrates in particular:
//!
//! * an arrival generator,
//! * scoped resource acquisition,
//! * seeded random sources,
//! * simulation-time stamped logs,
//! * resource statistics.
//!
//! ```text
//!                   ┌──────────────┐
//!  patients ───────►│ nurse queue  ├──────► consultation ──────► exit
//!  (every ~5 min)   └──────────────┘        (~6 min)
//! ```
//!
//! Set `RUST_LOG=debug` to also see the engine's dispatch log.

use procsim::process::{Context, ProcessError};
use procsim::resource::Resource;
use procsim::simulation::Environment;
use procsim::tracing::SimulationTime;
use procsim_util::generator::generate;
use procsim_util::samplers::Exponential;
use tracing_subscriber::EnvFilter;

/// Mean time between patient arrivals.
const WL_INTER: f64 = 5.0;
/// Mean duration of a consultation.
const MEAN_CONSULT: f64 = 6.0;
/// Number of nurses.
const NURSES: usize = 1;
/// Duration of the clinic session.
const SESSION: f64 = 120.0;
/// Seed of all random sources.
const SEED: u64 = 2020;

/// The journey of a patient through the clinic.
async fn patient(
    cx: Context,
    nurse: Resource,
    mut consultation: Exponential,
    id: usize,
) -> Result<(), ProcessError> {
    let joined = cx.now();
    tracing::info!("patient {id} joined queue");

    let _nurse = cx.acquire(&nurse).await?;
    let waited = cx.now().saturating_duration_since(joined);
    tracing::info!("patient {id} left queue after {waited:.1} min");

    cx.sampled_timeout(&mut consultation).await?;
    tracing::info!("*** patient {id} finished");

    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_timer(SimulationTime::with_precision(1))
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // ---------------
    // Bench assembly.
    // ---------------

    let mut env = Environment::new();
    let nurse = Resource::new(&env, NURSES)?;

    let mut arrivals = Exponential::new(WL_INTER, SEED)?;
    let mut consultations = arrivals.fork_with_mean(MEAN_CONSULT)?;

    env.spawn("patient-generator", {
        let nurse = nurse.clone();
        move |cx| {
            generate(cx, "patient", arrivals, None, move |cx, id| {
                patient(cx, nurse.clone(), consultations.fork(), id)
            })
        }
    });

    // ----------------
    // Simulation.
    // ----------------

    env.run(SESSION)?;

    let stats = nurse.stats();
    println!("clinic closed at t={:.1}", env.now());
    println!("patients seen or in consultation: {}", stats.grants);
    println!("patients still queuing: {}", nurse.queue_len());
    println!(
        "mean wait: {:.1} min, longest wait: {:.1} min, longest queue: {}",
        stats.mean_wait().unwrap_or(0.0),
        stats.max_wait,
        stats.max_queue_len
    );

    Ok(())
}
