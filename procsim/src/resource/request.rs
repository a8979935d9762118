use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{self, Poll};

use pin_project::pin_project;

use crate::process::{ProcessError, ProcessState};

use super::{PendingRequest, RequestId, RequestToken, Resource, ResourceGuard};

enum State {
    Init,
    Queued(RequestId),
    Done,
}

/// Future returned by [`Context::request`](crate::process::Context::request).
///
/// Dropping the future while it waits in the queue withdraws the request. If
/// a slot was already handed over but not yet delivered, the slot is returned
/// to the resource.
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Request {
    resource: Resource,
    state: State,
}

impl Request {
    pub(super) fn new(resource: Resource) -> Self {
        Self {
            resource,
            state: State::Init,
        }
    }
}

impl Future for Request {
    type Output = Result<RequestToken, ProcessError>;

    fn poll(self: Pin<&mut Self>, _cx: &mut task::Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        match this.state {
            State::Init => {
                let pending = {
                    let mut kernel = this.resource.kernel.borrow_mut();
                    let Some(process) = kernel.running else {
                        return Poll::Ready(Err(ProcessError::OutsideProcess));
                    };
                    PendingRequest {
                        process,
                        request: kernel.next_request_id(),
                        enqueue_time: kernel.clock,
                    }
                };

                if this.resource.try_grant_or_enqueue(pending) {
                    this.state = State::Done;
                    return Poll::Ready(Ok(RequestToken {
                        resource: this.resource.id(),
                        request: pending.request,
                    }));
                }

                this.resource
                    .kernel
                    .borrow_mut()
                    .set_state(pending.process, ProcessState::AwaitingResource);
                this.state = State::Queued(pending.request);

                Poll::Pending
            }
            State::Queued(request) => {
                {
                    let mut kernel = this.resource.kernel.borrow_mut();
                    if !kernel.take_grant(request) {
                        if let Some(process) = kernel.running {
                            kernel.set_state(process, ProcessState::AwaitingResource);
                        }
                        return Poll::Pending;
                    }
                }
                this.state = State::Done;

                Poll::Ready(Ok(this.resource.confirm_grant(request)))
            }
            State::Done => panic!("`Request` polled after completion"),
        }
    }
}

impl Drop for Request {
    fn drop(&mut self) {
        if let State::Queued(request) = self.state {
            self.resource.withdraw(request);
        }
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state {
            State::Init => "init",
            State::Queued(_) => "queued",
            State::Done => "done",
        };
        f.debug_struct("Request")
            .field("resource", &self.resource.id())
            .field("state", &state)
            .finish_non_exhaustive()
    }
}

/// Future returned by [`Context::acquire`](crate::process::Context::acquire).
#[pin_project]
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Acquire {
    #[pin]
    request: Request,
}

impl Acquire {
    pub(super) fn new(resource: Resource) -> Self {
        Self {
            request: Request::new(resource),
        }
    }
}

impl Future for Acquire {
    type Output = Result<ResourceGuard, ProcessError>;

    fn poll(self: Pin<&mut Self>, cx: &mut task::Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let resource = this.request.resource.clone();

        this.request
            .poll(cx)
            .map_ok(|token| ResourceGuard::new(resource, token))
    }
}

impl fmt::Debug for Acquire {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Acquire")
            .field("request", &self.request)
            .finish()
    }
}
