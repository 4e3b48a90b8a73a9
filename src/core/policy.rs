//! Conflict and ordering strategy supplied by the caller.

use std::cmp::Ordering;
use std::sync::Arc;

/// Caller-supplied rules for deciding which units of work may run together.
///
/// Both methods are called with the queue mutex held. They must not block and must not
/// call back into the queue.
///
/// # Example
///
/// ```
/// use std::cmp::Ordering;
/// use prometheus_job_queue::core::ConflictPolicy;
///
/// struct SameKey;
///
/// impl ConflictPolicy<(u32, u64)> for SameKey {
///     fn conflicts(&self, job: &(u32, u64), other: &(u32, u64)) -> bool {
///         job.0 == other.0 && other.1 < job.1
///     }
///
///     fn order(&self, a: &(u32, u64), b: &(u32, u64)) -> Ordering {
///         a.1.cmp(&b.1)
///     }
/// }
///
/// assert!(SameKey.conflicts(&(1, 9), &(1, 3)));
/// assert!(!SameKey.conflicts(&(1, 3), &(1, 9)));
/// ```
pub trait ConflictPolicy<C>: Send + Sync {
    /// True if `job` must not run while `other` is live.
    fn conflicts(&self, job: &C, other: &C) -> bool;

    /// Order among slots waiting for admission; the least is admitted first.
    fn order(&self, a: &C, b: &C) -> Ordering;
}

/// Policy built from a pair of closures.
#[derive(Debug, Clone, Copy)]
pub struct FnPolicy<F, O> {
    conflict: F,
    order: O,
}

impl<F, O> FnPolicy<F, O> {
    /// Wrap a conflict predicate and an order comparator.
    pub const fn new(conflict: F, order: O) -> Self {
        Self { conflict, order }
    }
}

impl<C, F, O> ConflictPolicy<C> for FnPolicy<F, O>
where
    F: Fn(&C, &C) -> bool + Send + Sync,
    O: Fn(&C, &C) -> Ordering + Send + Sync,
{
    fn conflicts(&self, job: &C, other: &C) -> bool {
        (self.conflict)(job, other)
    }

    fn order(&self, a: &C, b: &C) -> Ordering {
        (self.order)(a, b)
    }
}

impl<C, P> ConflictPolicy<C> for Arc<P>
where
    P: ConflictPolicy<C> + ?Sized,
{
    fn conflicts(&self, job: &C, other: &C) -> bool {
        (**self).conflicts(job, other)
    }

    fn order(&self, a: &C, b: &C) -> Ordering {
        (**self).order(a, b)
    }
}
