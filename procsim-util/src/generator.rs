//! Arrival generators.
//!
//! An arrival generator is a process which brings new entities into the
//! simulation: it spawns an entity process, waits for a sampled inter-arrival
//! time, and starts over.

use std::future::Future;

use procsim::process::{Context, ProcessError};
use procsim::random::RandomSource;

/// Runs an arrival generator within the calling process.
///
/// Each iteration spawns a process named `{prefix}-{n}` whose body is
/// `make(cx, n)`, with `n` counting from 0, then waits for a duration drawn
/// from `interarrival`. The first entity arrives immediately.
///
/// The generator returns after `limit` entities have been created, or never if
/// `limit` is `None`. A sampled inter-arrival time that is not a valid
/// duration makes it fail with [`ProcessError::InvalidDuration`].
///
/// ```
/// use procsim::process::{Context, ProcessError};
/// use procsim::simulation::Environment;
/// use procsim_util::generator::generate;
///
/// async fn visitor(cx: Context, _n: usize) -> Result<(), ProcessError> {
///     cx.timeout(1.0).await
/// }
///
/// let mut env = Environment::new();
/// env.spawn("arrivals", |cx| async move {
///     generate(cx, "visitor", || 2.0, Some(3), visitor).await
/// });
/// env.run_unbounded()?;
///
/// // Visitors arrive at 0, 2 and 4 and leave one time unit later.
/// assert_eq!(env.now().as_f64(), 5.0);
/// # Ok::<(), procsim::simulation::SimulationError>(())
/// ```
pub async fn generate<S, F, Fut>(
    cx: Context,
    prefix: impl Into<String>,
    mut interarrival: S,
    limit: Option<usize>,
    mut make: F,
) -> Result<(), ProcessError>
where
    S: RandomSource,
    F: FnMut(Context, usize) -> Fut,
    Fut: Future<Output = Result<(), ProcessError>> + 'static,
{
    let prefix = prefix.into();

    for n in 0.. {
        if limit.is_some_and(|limit| n >= limit) {
            break;
        }
        let id = cx.spawn(format!("{prefix}-{n}"), |entity| make(entity, n));
        tracing::debug!(process = %id, arrival = n, time = %cx.now(), "entity created");

        // No need to wait once the last entity is out.
        if limit == Some(n + 1) {
            break;
        }
        cx.sampled_timeout(&mut interarrival).await?;
    }

    Ok(())
}
