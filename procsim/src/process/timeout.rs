use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{self, Poll};

use crate::process::{ProcessError, ProcessState};
use crate::simulation::kernel::SharedKernel;
use crate::simulation::{EventKind, EventSeq};

enum State {
    /// Not polled yet.
    Idle(f64),
    Scheduled(EventSeq),
    Elapsed,
}

/// Future returned by [`Context::timeout`](crate::process::Context::timeout).
///
/// The timer event is scheduled on first poll. Dropping the future before it
/// completes cancels the event.
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Timeout {
    kernel: SharedKernel,
    state: State,
}

impl Timeout {
    pub(crate) fn new(kernel: SharedKernel, duration: f64) -> Self {
        Self {
            kernel,
            state: State::Idle(duration),
        }
    }
}

impl Future for Timeout {
    type Output = Result<(), ProcessError>;

    fn poll(self: Pin<&mut Self>, _cx: &mut task::Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let mut kernel = this.kernel.borrow_mut();

        match this.state {
            State::Idle(duration) => {
                let Some(process) = kernel.running else {
                    return Poll::Ready(Err(ProcessError::OutsideProcess));
                };
                let Some(deadline) = kernel.clock.checked_add(duration) else {
                    this.state = State::Elapsed;
                    return Poll::Ready(Err(ProcessError::InvalidDuration(duration)));
                };
                let event = match kernel.schedule(deadline, EventKind::Timeout, process) {
                    Ok(event) => event,
                    Err(err) => {
                        this.state = State::Elapsed;
                        return Poll::Ready(Err(err.into()));
                    }
                };
                kernel.set_state(process, ProcessState::AwaitingTimer);
                this.state = State::Scheduled(event.seq);

                Poll::Pending
            }
            State::Scheduled(seq) => {
                if kernel.take_delivery(seq) {
                    this.state = State::Elapsed;
                    return Poll::Ready(Ok(()));
                }
                // Still waiting, e.g. after another branch of a `select` woke
                // the process up.
                if let Some(process) = kernel.running {
                    kernel.set_state(process, ProcessState::AwaitingTimer);
                }

                Poll::Pending
            }
            State::Elapsed => panic!("`Timeout` polled after completion"),
        }
    }
}

impl Drop for Timeout {
    fn drop(&mut self) {
        if let State::Scheduled(seq) = self.state {
            if let Ok(mut kernel) = self.kernel.try_borrow_mut() {
                kernel.queue.cancel(seq);
            }
        }
    }
}

impl fmt::Debug for Timeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state {
            State::Idle(_) => "idle",
            State::Scheduled(_) => "scheduled",
            State::Elapsed => "elapsed",
        };
        f.debug_struct("Timeout").field("state", &state).finish_non_exhaustive()
    }
}
