//! Failure propagation and fail-fast behavior.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use procsim::process::{Context, ProcessError, ProcessState};
use procsim::resource::Resource;
use procsim::simulation::{Environment, SimulationError};

#[derive(Debug)]
struct OutOfStock {
    item: &'static str,
}

impl fmt::Display for OutOfStock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} is out of stock", self.item)
    }
}

impl std::error::Error for OutOfStock {}

async fn shopper(cx: Context, delay: f64) -> Result<(), ProcessError> {
    cx.timeout(delay).await?;

    Err(ProcessError::failed(OutOfStock { item: "flour" }))
}

async fn bystander(cx: Context) -> Result<(), ProcessError> {
    loop {
        cx.timeout(1.0).await?;
    }
}

#[test]
fn failing_process_halts_simulation() {
    let mut env = Environment::new();
    env.spawn("bystander", bystander);
    let id = env.spawn("shopper", |cx| shopper(cx, 2.5));

    let err = env.run(100.0).unwrap_err();

    match &err {
        SimulationError::ProcessFailed {
            process,
            name,
            time,
            source,
        } => {
            assert_eq!(*process, id);
            assert_eq!(name, "shopper");
            assert_eq!(time.as_f64(), 2.5);
            assert_eq!(source.to_string(), "flour is out of stock");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains("shopper"));
    assert_eq!(env.now().as_f64(), 2.5);
    assert_eq!(env.process_state(id), Some(ProcessState::Terminated));
}

#[test]
fn halted_simulation_rejects_run_control() {
    let mut env = Environment::new();
    env.spawn("bystander", bystander);
    env.spawn("shopper", |cx| shopper(cx, 1.0));

    assert!(matches!(
        env.run(10.0),
        Err(SimulationError::ProcessFailed { .. })
    ));
    let processed = env.events_processed();

    assert!(matches!(env.run(10.0), Err(SimulationError::Halted)));
    assert!(matches!(env.run_unbounded(), Err(SimulationError::Halted)));
    assert!(matches!(env.step(), Err(SimulationError::Halted)));
    assert_eq!(env.events_processed(), processed);
}

#[test]
fn halted_simulation_does_not_start_processes() {
    async fn late_shopper(
        cx: Context,
        resource: Resource,
        started: Rc<Cell<bool>>,
    ) -> Result<(), ProcessError> {
        started.set(true);
        let _guard = cx.acquire(&resource).await?;
        cx.timeout(1.0).await
    }

    let mut env = Environment::new();
    let resource = Resource::new(&env, 1).unwrap();
    env.spawn("shopper", |cx| shopper(cx, 1.0));
    assert!(env.run(10.0).is_err());

    let started = Rc::new(Cell::new(false));
    let late = env.spawn("late", {
        let started = started.clone();
        let resource = resource.clone();
        move |cx| late_shopper(cx, resource, started)
    });

    assert!(!started.get());
    assert_eq!(resource.in_use(), 0);
    assert_eq!(env.process_state(late), Some(ProcessState::Terminated));
    assert_eq!(env.live_processes(), 0);
    assert!(matches!(env.run(10.0), Err(SimulationError::Halted)));
}

#[test]
fn pending_failure_prevents_new_processes() {
    let mut env = Environment::new();
    env.spawn("broken", |_cx| async { Err(ProcessError::failed("no appointment")) });

    let started = Rc::new(Cell::new(false));
    env.spawn("late", {
        let started = started.clone();
        move |_cx| async move {
            started.set(true);
            Ok(())
        }
    });

    assert!(!started.get());
    assert!(matches!(
        env.run(1.0),
        Err(SimulationError::ProcessFailed { ref name, .. }) if name == "broken"
    ));
}

#[test]
fn failure_takes_precedence_over_invalid_horizon() {
    let mut env = Environment::new();
    env.spawn("broken", |_cx| async { Err(ProcessError::failed("no appointment")) });

    assert!(matches!(
        env.run(f64::NAN),
        Err(SimulationError::ProcessFailed { .. })
    ));
    assert!(matches!(env.run(-1.0), Err(SimulationError::Halted)));
}

#[test]
fn failure_before_first_suspension_is_reported_by_next_run() {
    let mut env = Environment::new();
    env.spawn("broken", |_cx| async { Err(ProcessError::failed("no appointment")) });

    assert_eq!(env.live_processes(), 0);
    let err = env.run(1.0).unwrap_err();

    assert!(matches!(
        err,
        SimulationError::ProcessFailed { ref name, .. } if name == "broken"
    ));
    assert_eq!(env.events_processed(), 0);
}

#[test]
fn failure_of_nested_process_halts_after_parent_suspends() {
    async fn parent(cx: Context) -> Result<(), ProcessError> {
        cx.timeout(1.0).await?;
        cx.spawn("child", |_cx| async { Err(ProcessError::failed("refused")) });
        cx.timeout(1.0).await?;

        Ok(())
    }

    let mut env = Environment::new();
    let parent_id = env.spawn("parent", parent);

    let err = env.run_unbounded().unwrap_err();

    assert!(matches!(
        err,
        SimulationError::ProcessFailed { ref name, time, .. } if name == "child" && time.as_f64() == 1.0
    ));
    // The parent was not affected by the failure of its child.
    assert_eq!(env.process_state(parent_id), Some(ProcessState::AwaitingTimer));
}

#[test]
fn propagated_invalid_duration_is_attributed() {
    async fn negative(cx: Context) -> Result<(), ProcessError> {
        cx.timeout(1.0).await?;
        cx.timeout(-1.0).await?;

        Ok(())
    }

    let mut env = Environment::new();
    env.spawn("negative", negative);

    let err = env.run_unbounded().unwrap_err();

    assert!(matches!(
        err,
        SimulationError::ProcessFailed {
            source: ProcessError::InvalidDuration(d),
            ..
        } if d == -1.0
    ));
}

#[test]
fn resource_error_converts_into_process_error() {
    async fn sloppy(cx: Context, resource: Resource) -> Result<(), ProcessError> {
        let token = cx.request(&resource).await?;
        cx.release(&resource, token)?;
        cx.timeout(1.0).await?;
        cx.release(&resource, token)?;

        Ok(())
    }

    let mut env = Environment::new();
    let resource = Resource::new(&env, 1).unwrap();
    env.spawn("sloppy", {
        let resource = resource.clone();
        move |cx| sloppy(cx, resource)
    });

    let err = env.run_unbounded().unwrap_err();

    assert!(matches!(
        err,
        SimulationError::ProcessFailed {
            source: ProcessError::Resource(_),
            ..
        }
    ));
    assert_eq!(resource.in_use(), 0);
}

#[test]
fn awaiting_outside_process_is_an_error() {
    use std::future::Future;
    use std::pin::pin;
    use std::task::{Context as TaskContext, Poll};

    let mut env = Environment::new();
    let mut escaped = None;
    env.spawn("leaker", |cx| {
        escaped = Some(cx.clone());
        async move { cx.timeout(1.0).await }
    });
    env.run_unbounded().unwrap();

    let cx = escaped.unwrap();
    let mut timeout = pin!(cx.timeout(1.0));
    let mut task_cx = TaskContext::from_waker(futures_util::task::noop_waker_ref());

    assert!(matches!(
        timeout.as_mut().poll(&mut task_cx),
        Poll::Ready(Err(ProcessError::OutsideProcess))
    ));
    assert_eq!(env.pending_events(), 0);
}
