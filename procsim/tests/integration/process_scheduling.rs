//! Timers, spawning and event ordering.

use std::cell::RefCell;
use std::rc::Rc;

use futures_util::future::{select, Either};

use procsim::monitor::EventBuffer;
use procsim::process::{Context, ProcessError, ProcessState};
use procsim::simulation::{Environment, EventKind};

type Log = Rc<RefCell<Vec<(f64, String)>>>;

fn log_entry(log: &Log, cx: &Context, what: impl Into<String>) {
    log.borrow_mut().push((cx.now().as_f64(), what.into()));
}

async fn wake_after(cx: Context, log: Log, name: &'static str, delay: f64) -> Result<(), ProcessError> {
    cx.timeout(delay).await?;
    log_entry(&log, &cx, name);

    Ok(())
}

#[test]
fn simultaneous_timers_resume_in_scheduling_order() {
    let mut env = Environment::new();
    let log = Log::default();

    for name in ["A", "B", "C"] {
        let log = log.clone();
        env.spawn(name, move |cx| wake_after(cx, log, name, 0.0));
    }
    env.run(0.0).unwrap();

    let order: Vec<_> = log.borrow().iter().map(|(_, name)| name.clone()).collect();
    assert_eq!(order, ["A", "B", "C"]);
    assert_eq!(env.now().as_f64(), 0.0);
}

#[test]
fn timers_resume_in_time_order() {
    let mut env = Environment::new();
    let log = Log::default();

    for (name, delay) in [("late", 7.5), ("early", 1.25), ("middle", 3.0)] {
        let log = log.clone();
        env.spawn(name, move |cx| wake_after(cx, log, name, delay));
    }
    env.run_unbounded().unwrap();

    assert_eq!(
        *log.borrow(),
        [
            (1.25, "early".to_string()),
            (3.0, "middle".to_string()),
            (7.5, "late".to_string())
        ]
    );
}

#[test]
fn clock_is_monotonic() {
    async fn wanderer(cx: Context, mut delays: Vec<f64>) -> Result<(), ProcessError> {
        while let Some(delay) = delays.pop() {
            cx.timeout(delay).await?;
        }

        Ok(())
    }

    let mut env = Environment::new();
    let trace = EventBuffer::new();
    env.add_monitor(&trace);

    // A cheap deterministic pseudo-random sequence.
    let mut state = 17u64;
    let mut next = move || {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (state >> 40) as f64 / 1000.0
    };
    for n in 0..20 {
        let delays: Vec<f64> = (0..10).map(|_| next()).collect();
        env.spawn(format!("wanderer-{n}"), move |cx| wanderer(cx, delays));
    }
    env.run_unbounded().unwrap();

    let records: Vec<_> = trace.collect();
    assert_eq!(records.len(), 200);
    assert!(records.windows(2).all(|pair| pair[0].time <= pair[1].time));
    assert!(records
        .windows(2)
        .filter(|pair| pair[0].time == pair[1].time)
        .all(|pair| pair[0].sequence < pair[1].sequence));
    assert_eq!(env.now(), records.last().unwrap().time);
}

#[test]
fn spawn_runs_until_first_suspension() {
    let mut env = Environment::new();
    let log = Log::default();

    let id = env.spawn("eager", {
        let log = log.clone();
        move |cx| async move {
            log_entry(&log, &cx, "before");
            let result = cx.timeout(1.0).await;
            log_entry(&log, &cx, "after");
            result
        }
    });

    // Side effects up to the first suspension are already visible.
    assert_eq!(*log.borrow(), [(0.0, "before".to_string())]);
    assert_eq!(env.process_state(id), Some(ProcessState::AwaitingTimer));

    env.run_unbounded().unwrap();
    assert_eq!(log.borrow().len(), 2);
    assert_eq!(env.process_state(id), Some(ProcessState::Terminated));
}

#[test]
fn process_spawned_from_process_runs_first() {
    async fn parent(cx: Context, log: Log) -> Result<(), ProcessError> {
        cx.timeout(2.0).await?;
        log_entry(&log, &cx, "parent spawns");
        let child_log = log.clone();
        cx.spawn("child", move |cx| wake_after(cx, child_log, "child wakes", 1.0));
        log_entry(&log, &cx, "parent resumes");
        cx.timeout(5.0).await?;
        log_entry(&log, &cx, "parent done");

        Ok(())
    }

    let mut env = Environment::new();
    let log = Log::default();
    env.spawn("parent", {
        let log = log.clone();
        move |cx| parent(cx, log)
    });
    env.run_unbounded().unwrap();

    assert_eq!(
        *log.borrow(),
        [
            (2.0, "parent spawns".to_string()),
            (2.0, "parent resumes".to_string()),
            (3.0, "child wakes".to_string()),
            (7.0, "parent done".to_string()),
        ]
    );
    assert_eq!(env.live_processes(), 0);
}

#[test]
fn invalid_duration_is_reported_to_the_process() {
    async fn careless(cx: Context, log: Log) -> Result<(), ProcessError> {
        for duration in [-1.0, f64::NAN, f64::INFINITY] {
            match cx.timeout(duration).await {
                Err(ProcessError::InvalidDuration(_)) => log_entry(&log, &cx, "rejected"),
                other => return other,
            }
        }
        cx.timeout(1.0).await?;
        log_entry(&log, &cx, "recovered");

        Ok(())
    }

    let mut env = Environment::new();
    let log = Log::default();
    env.spawn("careless", {
        let log = log.clone();
        move |cx| careless(cx, log)
    });

    // Rejected timeouts schedule nothing.
    assert_eq!(env.pending_events(), 1);
    env.run_unbounded().unwrap();

    let entries: Vec<_> = log.borrow().iter().map(|(t, what)| (*t, what.clone())).collect();
    assert_eq!(entries.len(), 4);
    assert_eq!(entries[3], (1.0, "recovered".to_string()));
}

#[test]
fn sampled_timeout_draws_from_source() {
    async fn sampler(cx: Context, log: Log) -> Result<(), ProcessError> {
        let mut durations = [0.5, 1.5, 2.0].into_iter();
        let mut source = move || durations.next().unwrap_or(0.0);
        for _ in 0..3 {
            cx.sampled_timeout(&mut source).await?;
            log_entry(&log, &cx, "tick");
        }

        Ok(())
    }

    let mut env = Environment::new();
    let log = Log::default();
    env.spawn("sampler", {
        let log = log.clone();
        move |cx| sampler(cx, log)
    });
    env.run_unbounded().unwrap();

    let times: Vec<f64> = log.borrow().iter().map(|(t, _)| *t).collect();
    assert_eq!(times, [0.5, 2.0, 4.0]);
}

#[test]
fn losing_timeout_is_cancelled() {
    async fn impatient(cx: Context, log: Log) -> Result<(), ProcessError> {
        match select(cx.timeout(5.0), cx.timeout(2.0)).await {
            Either::Left((result, _)) => {
                result?;
                log_entry(&log, &cx, "slow");
            }
            Either::Right((result, _)) => {
                result?;
                log_entry(&log, &cx, "fast");
            }
        }

        Ok(())
    }

    let mut env = Environment::new();
    let trace = EventBuffer::new();
    env.add_monitor(&trace);
    let log = Log::default();
    env.spawn("impatient", {
        let log = log.clone();
        move |cx| impatient(cx, log)
    });
    assert_eq!(env.pending_events(), 2);

    env.run_unbounded().unwrap();

    assert_eq!(*log.borrow(), [(2.0, "fast".to_string())]);
    assert_eq!(env.pending_events(), 0);
    assert_eq!(env.events_processed(), 1);
    assert_eq!(env.now().as_f64(), 2.0);
    let kinds: Vec<_> = trace.map(|record| record.kind).collect();
    assert_eq!(kinds, [EventKind::Timeout]);
}

#[test]
fn process_identifiers_are_not_reused() {
    let mut env = Environment::new();

    let first = env.spawn("first", |cx| async move { cx.timeout(0.0).await });
    env.run_unbounded().unwrap();
    let second = env.spawn("second", |cx| async move { cx.timeout(0.0).await });

    assert_ne!(first, second);
    assert!(second.serial() > first.serial());
    assert_eq!(env.process_state(first), Some(ProcessState::Terminated));
    assert_eq!(env.process_state(second), Some(ProcessState::AwaitingTimer));
}
