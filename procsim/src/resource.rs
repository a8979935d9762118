//! Capacity-limited resources with a fair waiting line.
//!
//! A [`Resource`] models a pool of identical servers, for instance the nurses
//! of a clinic. Processes request a slot; while fewer than `capacity` slots are
//! in use the request is granted on the spot, otherwise the process waits in a
//! FIFO queue.
//!
//! Releasing a slot while processes are waiting hands the slot to the head of
//! the queue and schedules a grant event at the current simulation time. The
//! waiting process is therefore resumed at exactly the time of the release,
//! once the events already scheduled for that time have been processed.
//!
//! # Scoped acquisition
//!
//! A slot that is never released stalls every later requester. The
//! [`ResourceGuard`] returned by [`Context::acquire`](crate::process::Context::acquire)
//! releases its slot when dropped, including when the process body exits early
//! with `?`:
//!
//! ```
//! use procsim::process::{Context, ProcessError};
//! use procsim::resource::Resource;
//!
//! async fn consult(cx: Context, nurse: Resource, duration: f64) -> Result<(), ProcessError> {
//!     let _nurse = cx.acquire(&nurse).await?;
//!     // The slot is released even if the timeout fails.
//!     cx.timeout(duration).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! The lower-level [`Context::request`](crate::process::Context::request)
//! returns a plain [`RequestToken`] which must be released explicitly.

mod request;

use std::cell::{RefCell, RefMut};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::rc::Rc;

use crate::process::ProcessId;
use crate::simulation::kernel::SharedKernel;
use crate::simulation::{Environment, EventKind, EventSeq};
use crate::time::SimTime;

pub use request::{Acquire, Request};

/// Identifier of a resource within its environment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResourceId(u64);

impl ResourceId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}", self.0)
    }
}

/// Identifier of a resource request, unique within an environment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RequestId(u64);

impl RequestId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Q{}", self.0)
    }
}

/// Proof that a request was granted a slot.
///
/// A token is valid until it is released. Releasing it twice, or on another
/// resource, fails with [`ResourceError::UnbalancedRelease`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RequestToken {
    resource: ResourceId,
    request: RequestId,
}

impl RequestToken {
    /// The resource that granted the slot.
    pub fn resource(&self) -> ResourceId {
        self.resource
    }

    /// The granted request.
    pub fn request(&self) -> RequestId {
        self.request
    }
}

/// A request waiting for a slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingRequest {
    /// The requesting process.
    pub process: ProcessId,
    /// The request.
    pub request: RequestId,
    /// Simulation time at which the request joined the queue.
    pub enqueue_time: SimTime,
}

/// An error raised by a resource operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ResourceError {
    /// The resource was created with a capacity of zero.
    #[error("resource capacity must be at least 1, got {0}")]
    InvalidCapacity(usize),
    /// The released token is not an outstanding grant of this resource.
    #[error("request {request} does not hold a slot of resource {resource}")]
    UnbalancedRelease {
        /// The resource on which the release was attempted.
        resource: ResourceId,
        /// The request named by the token.
        request: RequestId,
    },
}

/// Usage statistics of a resource.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResourceStats {
    /// Number of requests made.
    pub requests: u64,
    /// Number of slots granted, immediately or after queuing.
    pub grants: u64,
    /// Number of requests that had to queue.
    pub queued: u64,
    /// Cumulated waiting time of all granted requests.
    pub total_wait: f64,
    /// Longest waiting time of a granted request.
    pub max_wait: f64,
    /// Longest observed queue.
    pub max_queue_len: usize,
}

impl ResourceStats {
    /// Mean waiting time per granted request, including zero waits.
    pub fn mean_wait(&self) -> Option<f64> {
        (self.grants > 0).then(|| self.total_wait / self.grants as f64)
    }

    fn record_grant(&mut self, wait: f64) {
        self.grants += 1;
        self.total_wait += wait;
        self.max_wait = self.max_wait.max(wait);
    }
}

struct ResourceState {
    id: ResourceId,
    capacity: usize,
    holders: HashSet<RequestId>,
    wait_queue: VecDeque<PendingRequest>,
    /// Grants handed to queued requests whose event has not been delivered.
    pending_grants: HashMap<RequestId, EventSeq>,
    stats: ResourceStats,
}

impl ResourceState {
    fn in_use(&self) -> usize {
        self.holders.len()
    }

    fn has_free_slot(&self) -> bool {
        self.in_use() < self.capacity
    }
}

/// A pool of `capacity` identical slots with a FIFO waiting line.
///
/// `Resource` is a shared handle: clones refer to the same pool.
#[derive(Clone)]
pub struct Resource {
    state: Rc<RefCell<ResourceState>>,
    kernel: SharedKernel,
}

impl Resource {
    /// Creates a resource with `capacity` slots in `env`.
    pub fn new(env: &Environment, capacity: usize) -> Result<Self, ResourceError> {
        if capacity == 0 {
            return Err(ResourceError::InvalidCapacity(capacity));
        }
        let kernel = env.kernel().clone();
        let id = kernel.borrow_mut().next_resource_id();
        tracing::debug!(resource = %id, capacity, "resource created");

        Ok(Self {
            state: Rc::new(RefCell::new(ResourceState {
                id,
                capacity,
                holders: HashSet::new(),
                wait_queue: VecDeque::new(),
                pending_grants: HashMap::new(),
                stats: ResourceStats::default(),
            })),
            kernel,
        })
    }

    /// Identifier of the resource.
    pub fn id(&self) -> ResourceId {
        self.state.borrow().id
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.state.borrow().capacity
    }

    /// Number of slots currently granted.
    ///
    /// This includes slots handed to queued requests whose grant event has
    /// not been processed yet.
    pub fn in_use(&self) -> usize {
        self.state.borrow().in_use()
    }

    /// Number of requests waiting for a slot.
    pub fn queue_len(&self) -> usize {
        self.state.borrow().wait_queue.len()
    }

    /// Snapshot of the waiting line, head first.
    pub fn waiting(&self) -> Vec<PendingRequest> {
        self.state.borrow().wait_queue.iter().copied().collect()
    }

    /// Usage statistics.
    pub fn stats(&self) -> ResourceStats {
        self.state.borrow().stats
    }

    /// Returns a future requesting a slot, see
    /// [`Context::request`](crate::process::Context::request).
    pub fn request(&self) -> Request {
        Request::new(self.clone())
    }

    /// Returns a future requesting a slot wrapped in a guard, see
    /// [`Context::acquire`](crate::process::Context::acquire).
    pub fn acquire(&self) -> Acquire {
        Acquire::new(self.clone())
    }

    /// Releases the slot held by `token`.
    ///
    /// If processes are waiting, the slot is immediately handed to the head of
    /// the queue. On error the resource is left unchanged.
    pub fn release(&self, token: RequestToken) -> Result<(), ResourceError> {
        let mut state = self.state.borrow_mut();
        let unbalanced = ResourceError::UnbalancedRelease {
            resource: state.id,
            request: token.request,
        };
        if token.resource != state.id || !state.holders.remove(&token.request) {
            tracing::warn!(resource = %state.id, request = %token.request, "unbalanced release");
            return Err(unbalanced);
        }
        tracing::debug!(resource = %state.id, request = %token.request, "slot released");
        self.grant_waiting(state);

        Ok(())
    }

    /// Tries to take a free slot for a new request, or enqueues it.
    ///
    /// Returns `true` if the slot was granted on the spot.
    fn try_grant_or_enqueue(&self, pending: PendingRequest) -> bool {
        let mut state = self.state.borrow_mut();
        state.stats.requests += 1;

        // A free slot cannot coexist with waiting requests, but the check on
        // the queue keeps FIFO order airtight.
        if state.has_free_slot() && state.wait_queue.is_empty() {
            state.holders.insert(pending.request);
            state.stats.record_grant(0.0);
            tracing::debug!(resource = %state.id, request = %pending.request, process = %pending.process, "slot granted");

            return true;
        }

        state.wait_queue.push_back(pending);
        state.stats.queued += 1;
        state.stats.max_queue_len = state.stats.max_queue_len.max(state.wait_queue.len());
        tracing::debug!(
            resource = %state.id,
            request = %pending.request,
            process = %pending.process,
            queue_len = state.wait_queue.len(),
            "request queued"
        );

        false
    }

    /// Hands free slots to the head of the queue.
    fn grant_waiting(&self, mut state: RefMut<'_, ResourceState>) {
        while state.has_free_slot() {
            let Some(head) = state.wait_queue.pop_front() else {
                break;
            };
            let mut kernel = self.kernel.borrow_mut();
            let now = kernel.clock;
            let event = kernel.schedule_now(
                EventKind::ResourceGrant {
                    resource: state.id,
                    request: head.request,
                },
                head.process,
            );
            state.holders.insert(head.request);
            state.pending_grants.insert(head.request, event.seq);
            state
                .stats
                .record_grant(now.saturating_duration_since(head.enqueue_time));
            tracing::debug!(
                resource = %state.id,
                request = %head.request,
                process = %head.process,
                waited = now.saturating_duration_since(head.enqueue_time),
                "slot granted to queued request"
            );
        }
        debug_assert!(state.in_use() <= state.capacity);
    }

    /// Completes the delivery of a queued grant.
    fn confirm_grant(&self, request: RequestId) -> RequestToken {
        let mut state = self.state.borrow_mut();
        state.pending_grants.remove(&request);

        RequestToken {
            resource: state.id,
            request,
        }
    }

    /// Withdraws a request whose future was dropped before completion.
    fn withdraw(&self, request: RequestId) {
        let Ok(mut state) = self.state.try_borrow_mut() else {
            return;
        };
        if let Some(pos) = state.wait_queue.iter().position(|p| p.request == request) {
            state.wait_queue.remove(pos);
            tracing::debug!(resource = %state.id, %request, "queued request withdrawn");
            return;
        }
        if let Some(&seq) = state.pending_grants.get(&request) {
            // The slot was handed over but never delivered: give it back.
            let Ok(mut kernel) = self.kernel.try_borrow_mut() else {
                tracing::warn!(resource = %state.id, %request, "cannot return an undelivered grant while the engine is busy");
                return;
            };
            kernel.queue.cancel(seq);
            drop(kernel);
            state.pending_grants.remove(&request);
            state.holders.remove(&request);
            tracing::debug!(resource = %state.id, %request, "undelivered grant returned");
            self.grant_waiting(state);
        }
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Resource")
            .field("id", &state.id)
            .field("capacity", &state.capacity)
            .field("in_use", &state.in_use())
            .field("queue_len", &state.wait_queue.len())
            .finish_non_exhaustive()
    }
}

/// A granted slot, released when the guard is dropped.
#[must_use = "dropping the guard releases the slot immediately"]
pub struct ResourceGuard {
    resource: Resource,
    token: Option<RequestToken>,
}

impl ResourceGuard {
    pub(crate) fn new(resource: Resource, token: RequestToken) -> Self {
        Self {
            resource,
            token: Some(token),
        }
    }

    /// The token of the held slot.
    pub fn token(&self) -> Option<RequestToken> {
        self.token
    }

    /// Releases the slot now rather than at the end of the scope.
    pub fn release(mut self) -> Result<(), ResourceError> {
        match self.token.take() {
            Some(token) => self.resource.release(token),
            None => Ok(()),
        }
    }
}

impl Drop for ResourceGuard {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            if let Err(err) = self.resource.release(token) {
                tracing::warn!(%err, "failed to release slot on drop");
            }
        }
    }
}

impl fmt::Debug for ResourceGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceGuard")
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}
