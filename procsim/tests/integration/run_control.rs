//! Horizons, stepping and introspection.

use procsim::monitor::EventBuffer;
use procsim::process::{Context, ProcessError, ProcessState};
use procsim::simulation::Environment;
use procsim::time::SimTime;

async fn periodic(cx: Context, period: f64, count: usize) -> Result<(), ProcessError> {
    for _ in 0..count {
        cx.timeout(period).await?;
    }

    Ok(())
}

#[test]
fn run_stops_at_horizon() {
    let mut env = Environment::new();
    let id = env.spawn("periodic", |cx| periodic(cx, 3.0, 5));

    env.run(10.0).unwrap();

    // The clock stays at the last processed event.
    assert_eq!(env.now().as_f64(), 9.0);
    assert_eq!(env.events_processed(), 3);
    assert_eq!(env.pending_events(), 1);
    assert_eq!(env.process_state(id), Some(ProcessState::AwaitingTimer));
    assert_eq!(env.live_processes(), 1);
}

#[test]
fn events_at_horizon_are_processed() {
    let mut env = Environment::new();
    env.spawn("periodic", |cx| periodic(cx, 2.0, 3));

    env.run(4.0).unwrap();

    assert_eq!(env.now().as_f64(), 4.0);
    assert_eq!(env.events_processed(), 2);
}

#[test]
fn truncated_run_can_be_resumed() {
    let mut env = Environment::new();
    let trace = EventBuffer::new();
    env.add_monitor(&trace);
    let id = env.spawn("periodic", |cx| periodic(cx, 3.0, 5));

    env.run(7.0).unwrap();
    env.run(7.0).unwrap();
    assert_eq!(env.events_processed(), 2);

    env.run(100.0).unwrap();
    assert_eq!(env.now().as_f64(), 15.0);
    assert_eq!(env.pending_events(), 0);
    assert_eq!(env.process_state(id), Some(ProcessState::Terminated));

    let times: Vec<f64> = trace.map(|record| record.time.as_f64()).collect();
    assert_eq!(times, [3.0, 6.0, 9.0, 12.0, 15.0]);
}

#[test]
fn horizon_before_first_event_processes_nothing() {
    let mut env = Environment::new();
    env.spawn("periodic", |cx| periodic(cx, 3.0, 1));

    env.run(0.0).unwrap();

    assert_eq!(env.now(), SimTime::ZERO);
    assert_eq!(env.events_processed(), 0);
    assert_eq!(env.pending_events(), 1);
}

#[test]
fn run_unbounded_drains_calendar() {
    let mut env = Environment::new();
    for n in 1..=4 {
        env.spawn(format!("periodic-{n}"), move |cx| periodic(cx, n as f64, n));
    }

    env.run_unbounded().unwrap();

    assert_eq!(env.now().as_f64(), 16.0);
    assert_eq!(env.events_processed(), 1 + 2 + 3 + 4);
    assert_eq!(env.live_processes(), 0);
}

#[test]
fn step_by_step_execution() {
    let mut env = Environment::new();
    let fast = env.spawn("fast", |cx| periodic(cx, 1.0, 2));
    let slow = env.spawn("slow", |cx| periodic(cx, 1.5, 1));

    let processes: Vec<_> = std::iter::from_fn(|| env.step().unwrap())
        .map(|record| (record.time.as_f64(), record.process))
        .collect();

    assert_eq!(processes, [(1.0, fast), (1.5, slow), (2.0, fast)]);
    assert!(env.step().unwrap().is_none());
}

#[test]
fn empty_environment_runs_to_completion() {
    let mut env = Environment::default();

    env.run_unbounded().unwrap();
    env.run(5.0).unwrap();

    assert_eq!(env.now(), SimTime::ZERO);
    assert!(env.step().unwrap().is_none());
}

#[test]
fn suspended_processes_are_dropped_with_environment() {
    use procsim::resource::Resource;

    async fn holder(cx: Context, resource: Resource) -> Result<(), ProcessError> {
        let _slot = cx.acquire(&resource).await?;
        cx.timeout(100.0).await
    }

    let mut env = Environment::new();
    let resource = Resource::new(&env, 1).unwrap();
    for n in 0..3 {
        let resource = resource.clone();
        env.spawn(format!("holder-{n}"), move |cx| holder(cx, resource));
    }
    env.run(10.0).unwrap();
    assert_eq!(resource.in_use(), 1);
    assert_eq!(resource.queue_len(), 2);

    drop(env);

    assert_eq!(resource.queue_len(), 0);
    assert_eq!(resource.in_use(), 0);
}
