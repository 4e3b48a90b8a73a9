//! Bounded job queue with admission gating and conflict ordering.
//!
//! A [`JobQueue`] owns a fixed table of slots. Callers acquire a slot, attach a unit of
//! work (`ctx`) to it and start it. Starting passes two gates in order:
//!
//! 1. **Admission**: at most `max_concurrent` slots hold a seat. Excess starters park
//!    until a finishing slot hands its seat to the least waiter by the policy's order.
//! 2. **Conflicts**: every other live slot is tested with the policy's predicate. On a
//!    conflict the starter parks until that slot ends, then keeps scanning the rest of
//!    the table.
//!
//! All state lives behind one `parking_lot::Mutex`; each slot has its own `Condvar`, so a
//! signal wakes exactly the slot it is meant for.
//!
//! ```
//! use prometheus_job_queue::core::{JobKind, JobQueue};
//!
//! let queue = JobQueue::create(2, |a: &u32, b: &u32| a == b, |a: &u32, b: &u32| a.cmp(b));
//!
//! let slot = queue.acquire_slot(JobKind(0))?;
//! queue.start(&slot, 42)?;
//! assert_eq!(queue.end(&slot)?, 42);
//! queue.release_slot(slot);
//! queue.destroy()?;
//! # Ok::<(), prometheus_job_queue::core::QueueError>(())
//! ```

use std::cmp::Ordering;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use parking_lot::{Condvar, Mutex, MutexGuard};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::core::audit::{build_audit_event, AuditAction, AuditSink};
use crate::core::error::QueueError;
use crate::core::policy::{ConflictPolicy, FnPolicy};
use crate::core::slot::{JobKind, Slot, SlotHandle, SlotId, SlotState};

/// Upper bound on the number of slots in one queue.
pub const MAX_SLOTS: usize = 512;

static NEXT_QUEUE_TAG: AtomicU64 = AtomicU64::new(1);

/// Point-in-time counters for a queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    /// Slots in the table.
    pub capacity: usize,
    /// Admission ceiling.
    pub max_concurrent: usize,
    /// Slots allocated to callers.
    pub registered: usize,
    /// Slots holding an admission seat.
    pub active: usize,
    /// Slots in `Running`.
    pub running: usize,
    /// Slots parked in the admission gate.
    pub waiting_for_capacity: usize,
    /// Slots parked on a conflicting slot.
    pub waiting_for_conflict: usize,
}

/// Everything guarded by the queue mutex.
struct Table<C> {
    slots: Box<[Slot<C>]>,
    registered: usize,
    /// Seats held: running slots, conflict waiters, and readmitted capacity waiters.
    active: usize,
    /// One past the highest slot index ever acquired.
    high_water: usize,
    audit: Option<Box<dyn AuditSink>>,
}

impl<C> Table<C> {
    fn record(&mut self, index: usize, action: AuditAction) {
        if let Some(sink) = self.audit.as_mut() {
            let kind = self.slots[index].kind;
            sink.record(build_audit_event(SlotId::new(index), kind, action));
        }
    }

    fn stats(&self, capacity: usize, max_concurrent: usize) -> QueueStats {
        let mut stats = QueueStats {
            capacity,
            max_concurrent,
            registered: self.registered,
            active: self.active,
            ..QueueStats::default()
        };
        for slot in &self.slots[..self.high_water] {
            match slot.state {
                SlotState::Running => stats.running += 1,
                SlotState::WaitingForCapacity => stats.waiting_for_capacity += 1,
                SlotState::WaitingForConflict => stats.waiting_for_conflict += 1,
                _ => {}
            }
        }
        stats
    }
}

/// Fixed-capacity slot table shared by every thread applying work through it.
///
/// `C` is the caller's unit-of-work handle; the queue stores it, passes it to the policy
/// and hands it back from [`end`](Self::end). `P` decides conflicts and admission order.
pub struct JobQueue<C, P> {
    tag: u64,
    capacity: usize,
    max_concurrent: usize,
    policy: P,
    table: Mutex<Table<C>>,
    /// One parking cell per slot, always waited on with `table` locked.
    cells: Box<[Condvar]>,
}

impl<C, F, O> JobQueue<C, FnPolicy<F, O>>
where
    F: Fn(&C, &C) -> bool + Send + Sync,
    O: Fn(&C, &C) -> Ordering + Send + Sync,
{
    /// Create a queue with [`MAX_SLOTS`] slots from a conflict predicate and an order
    /// comparator.
    pub fn create(max_concurrent: usize, conflict_test: F, order_of: O) -> Self {
        Self::new(max_concurrent, FnPolicy::new(conflict_test, order_of))
    }
}

impl<C, P: ConflictPolicy<C>> JobQueue<C, P> {
    /// Create a queue with [`MAX_SLOTS`] slots.
    pub fn new(max_concurrent: usize, policy: P) -> Self {
        Self::with_capacity(MAX_SLOTS, max_concurrent, policy)
    }

    /// Create a queue with `capacity` slots (clamped to `1..=MAX_SLOTS`).
    ///
    /// `max_concurrent` is clamped to `1..=capacity`.
    pub fn with_capacity(capacity: usize, max_concurrent: usize, policy: P) -> Self {
        let capacity = capacity.clamp(1, MAX_SLOTS);
        let max_concurrent = max_concurrent.clamp(1, capacity);
        let slots = (0..capacity).map(|_| Slot::new(capacity)).collect();
        let cells = (0..capacity).map(|_| Condvar::new()).collect();
        let tag = NEXT_QUEUE_TAG.fetch_add(1, AtomicOrdering::Relaxed);

        debug!(queue = tag, capacity, max_concurrent, "job queue created");

        Self {
            tag,
            capacity,
            max_concurrent,
            policy,
            table: Mutex::new(Table {
                slots,
                registered: 0,
                active: 0,
                high_water: 0,
                audit: None,
            }),
            cells,
        }
    }

    /// Attach an audit sink.
    #[must_use]
    pub fn with_audit(mut self, audit: Box<dyn AuditSink>) -> Self {
        self.table.get_mut().audit = Some(audit);
        self
    }

    /// Number of slots in the table.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Admission ceiling.
    #[must_use]
    pub const fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Allocate a free slot tagged with `kind`. Never blocks.
    ///
    /// # Errors
    ///
    /// - `QueueError::QueueFull` if every slot is registered
    /// - `QueueError::NoFreeSlot` if the counters disagree with the table
    pub fn acquire_slot(&self, kind: JobKind) -> Result<SlotHandle, QueueError> {
        let mut table = self.table.lock();

        if table.registered == self.capacity {
            warn!(kind = %kind, registered = table.registered, "job queue full");
            return Err(QueueError::QueueFull {
                capacity: self.capacity,
            });
        }

        let Some(index) = table.slots.iter().position(|s| s.state == SlotState::Void) else {
            warn!(
                kind = %kind,
                registered = table.registered,
                "no free job queue slot found"
            );
            return Err(QueueError::NoFreeSlot {
                registered: table.registered,
            });
        };

        let slot = &mut table.slots[index];
        slot.state = SlotState::Idle;
        slot.kind = kind;
        table.registered += 1;
        table.high_water = table.high_water.max(index + 1);
        table.record(index, AuditAction::Acquired);

        debug!(
            slot = %SlotId::new(index),
            kind = %kind,
            registered = table.registered,
            "job queue slot acquired"
        );
        Ok(SlotHandle::new(SlotId::new(index), kind, self.tag))
    }

    /// Return a slot to the registry. Never blocks.
    ///
    /// A slot that was registered but never started is ended first, so anything parked on
    /// it wakes up.
    ///
    /// # Panics
    ///
    /// Panics if the slot is running or parked: its unit of work must be ended before the
    /// slot is released.
    pub fn release_slot(&self, slot: SlotHandle) {
        let index = self.index_of(&slot);
        let mut table = self.table.lock();

        if table.slots[index].state == SlotState::Registered {
            debug!(slot = %slot.id(), "registered job released before start");
            let entry = &mut table.slots[index];
            entry.state = SlotState::Idle;
            entry.ctx = None;
            self.release_waiters(&mut table, index);
        }

        let state = table.slots[index].state;
        if state != SlotState::Idle {
            error!(slot = %slot.id(), state = %state, "slot released while its job is live");
            drop(table);
            panic!(
                "job queue slot {} released in state {state}; end the job before releasing",
                slot.id()
            );
        }

        table.slots[index].state = SlotState::Void;
        table.registered -= 1;
        table.record(index, AuditAction::Released);

        debug!(
            slot = %slot.id(),
            registered = table.registered,
            "job queue slot released"
        );
    }

    /// Attach `ctx` to the slot without starting it, making it a conflict candidate for
    /// every later `start`.
    ///
    /// A no-op if the slot is already running; `ctx` is dropped in that case.
    ///
    /// # Errors
    ///
    /// `QueueError::InvalidState` if another thread is parked inside `start` for this slot.
    pub fn register(&self, slot: &SlotHandle, ctx: C) -> Result<(), QueueError> {
        let index = self.index_of(slot);
        let mut table = self.table.lock();

        match table.slots[index].state {
            SlotState::Running => {
                debug!(slot = %slot.id(), "job already running");
                return Ok(());
            }
            SlotState::Idle | SlotState::Registered => {}
            state => {
                if state.is_parked() {
                    warn!(slot = %slot.id(), state = %state, "register while start is parked");
                }
                return Err(QueueError::InvalidState {
                    slot: slot.id(),
                    state,
                });
            }
        }

        let entry = &mut table.slots[index];
        entry.ctx = Some(ctx);
        entry.state = SlotState::Registered;
        table.record(index, AuditAction::Registered);

        debug!(slot = %slot.id(), "job registered");
        Ok(())
    }

    /// Start the unit of work `ctx` on this slot, blocking until it may run.
    ///
    /// Blocks first until an admission seat is free, then once per live conflicting slot
    /// until that slot ends. A no-op if the slot is already running; `ctx` is dropped in
    /// that case. If the slot was registered, `ctx` replaces the registered value.
    ///
    /// # Errors
    ///
    /// `QueueError::InvalidState` if another thread is parked inside `start` for this slot.
    pub fn start(&self, slot: &SlotHandle, ctx: C) -> Result<(), QueueError> {
        self.admit(slot, Some(ctx))
    }

    /// Start a registered slot with the `ctx` it was registered with.
    ///
    /// # Errors
    ///
    /// `QueueError::InvalidState` if the slot is not registered (or already running, in
    /// which case this is a no-op success).
    pub fn start_registered(&self, slot: &SlotHandle) -> Result<(), QueueError> {
        self.admit(slot, None)
    }

    /// Finish the unit of work on this slot and hand back its `ctx`.
    ///
    /// Wakes every slot parked on this one and, if a seat freed up, admits the least
    /// capacity waiter by the policy's order. Never blocks.
    ///
    /// # Errors
    ///
    /// `QueueError::InvalidState` if the slot is neither running nor registered. Nothing is
    /// changed in that case.
    pub fn end(&self, slot: &SlotHandle) -> Result<C, QueueError> {
        let index = self.index_of(slot);
        let mut table = self.table.lock();

        let state = table.slots[index].state;
        if !matches!(state, SlotState::Running | SlotState::Registered) {
            warn!(slot = %slot.id(), state = %state, "job queue end with bad state");
            return Err(QueueError::InvalidState {
                slot: slot.id(),
                state,
            });
        }
        let Some(ctx) = table.slots[index].ctx.take() else {
            warn!(slot = %slot.id(), state = %state, "job queue end without a job");
            return Err(QueueError::InvalidState {
                slot: slot.id(),
                state,
            });
        };

        self.release_waiters(&mut table, index);

        if state == SlotState::Running {
            table.active -= 1;
        }
        table.slots[index].state = SlotState::Idle;
        table.record(index, AuditAction::Ended);

        self.readmit_next(&mut table);

        debug!(slot = %slot.id(), active = table.active, "job complete");
        Ok(ctx)
    }

    /// Current state of a slot.
    pub fn state_of(&self, slot: &SlotHandle) -> SlotState {
        let index = self.index_of(slot);
        self.table.lock().slots[index].state
    }

    /// Slots currently parked waiting for this one to end.
    pub fn waiters_of(&self, slot: &SlotHandle) -> Vec<SlotId> {
        let index = self.index_of(slot);
        self.table.lock().slots[index]
            .waiters
            .iter()
            .map(SlotId::new)
            .collect()
    }

    /// Snapshot of the queue counters.
    pub fn stats(&self) -> QueueStats {
        self.table.lock().stats(self.capacity, self.max_concurrent)
    }

    /// Look for a cycle in the conflict wait-for graph.
    ///
    /// Each parked slot waits on exactly one blocker, so the graph is a functional graph
    /// and any cycle is found by following blockers from each parked slot. Returns the
    /// slots on the first cycle found, starting from its lowest index.
    pub fn find_deadlock(&self) -> Option<Vec<SlotId>> {
        let table = self.table.lock();
        let len = table.high_water;

        let mut blocker: Vec<Option<usize>> = vec![None; len];
        for (index, slot) in table.slots[..len].iter().enumerate() {
            for waiter in slot.waiters.iter() {
                blocker[waiter] = Some(index);
            }
        }
        drop(table);

        for origin in 0..len {
            let mut path = Vec::new();
            let mut current = origin;
            while let Some(next) = blocker[current] {
                if let Some(pos) = path.iter().position(|&p| p == current) {
                    let mut cycle: Vec<usize> = path[pos..].to_vec();
                    let lowest = (0..cycle.len()).min_by_key(|&i| cycle[i]).unwrap_or(0);
                    cycle.rotate_left(lowest);
                    return Some(cycle.into_iter().map(SlotId::new).collect());
                }
                if path.len() > len {
                    break;
                }
                path.push(current);
                current = next;
            }
        }
        None
    }

    /// Tear the queue down.
    ///
    /// # Errors
    ///
    /// `QueueError::SlotsOutstanding` if slots were never released. The queue is dropped
    /// either way.
    pub fn destroy(self) -> Result<(), QueueError> {
        let table = self.table.into_inner();
        if table.registered > 0 {
            warn!(
                queue = self.tag,
                registered = table.registered,
                "job queue destroyed with slots outstanding"
            );
            return Err(QueueError::SlotsOutstanding {
                registered: table.registered,
            });
        }
        debug!(queue = self.tag, "job queue destroyed");
        Ok(())
    }

    /// Admission gate followed by the conflict scan. `ctx` of `None` reuses the registered
    /// unit of work.
    fn admit(&self, slot: &SlotHandle, ctx: Option<C>) -> Result<(), QueueError> {
        let index = self.index_of(slot);
        let mut table = self.table.lock();

        match table.slots[index].state {
            SlotState::Running => {
                debug!(slot = %slot.id(), "job already running");
                return Ok(());
            }
            SlotState::Registered => {}
            SlotState::Idle if ctx.is_some() => {}
            state => {
                if state.is_parked() {
                    warn!(slot = %slot.id(), state = %state, "start while already parked");
                }
                return Err(QueueError::InvalidState {
                    slot: slot.id(),
                    state,
                });
            }
        }
        if let Some(ctx) = ctx {
            table.slots[index].ctx = Some(ctx);
        }

        if table.active >= self.max_concurrent {
            info!(slot = %slot.id(), active = table.active, "job queue full, waiting for a seat");
            table.slots[index].state = SlotState::WaitingForCapacity;
            table.record(index, AuditAction::ParkedForCapacity);
            while !table.slots[index].seated {
                self.cells[index].wait(&mut table);
            }
            table.slots[index].seated = false;
            debug!(slot = %slot.id(), "job queue seat handed over");
        } else {
            table.active += 1;
        }

        self.resolve_conflicts(&mut table, index);

        table.slots[index].state = SlotState::Running;
        table.record(index, AuditAction::Started);
        debug!(slot = %slot.id(), active = table.active, "job starting");
        Ok(())
    }

    /// Park on each live conflicting slot in table order until none is left.
    fn resolve_conflicts(&self, table: &mut MutexGuard<'_, Table<C>>, index: usize) {
        let mut other = 0;
        while other < table.high_water {
            if other != index && self.in_conflict(table, index, other) {
                table.slots[other].waiters.insert(index);
                table.slots[index].state = SlotState::WaitingForConflict;
                table.record(
                    index,
                    AuditAction::ParkedForConflict {
                        blocker: SlotId::new(other),
                    },
                );
                debug!(
                    slot = %SlotId::new(index),
                    blocker = %SlotId::new(other),
                    "job waiting for conflicting job"
                );

                while table.slots[other].waiters.contains(index) {
                    self.cells[index].wait(table);
                }
                debug!(slot = %SlotId::new(index), "job released by conflicting job");
            }
            other += 1;
        }
    }

    fn in_conflict(&self, table: &Table<C>, index: usize, other: usize) -> bool {
        let candidate = &table.slots[other];
        if !candidate.state.is_live() {
            return false;
        }
        match (&table.slots[index].ctx, &candidate.ctx) {
            (Some(job), Some(theirs)) => self.policy.conflicts(job, theirs),
            _ => false,
        }
    }

    /// Wake every slot parked on `index` and empty its waiter set.
    fn release_waiters(&self, table: &mut Table<C>, index: usize) {
        let waiters = &table.slots[index].waiters;
        if waiters.is_empty() {
            return;
        }
        let count = waiters.len();
        for waiter in waiters.iter() {
            debug!(slot = %SlotId::new(waiter), "job queue signal for waiter");
            self.cells[waiter].notify_one();
        }
        table.slots[index].waiters.clear();
        table.record(index, AuditAction::WaitersReleased { count });
    }

    /// Hand a free seat to the least capacity waiter, if any.
    fn readmit_next(&self, table: &mut Table<C>) {
        if table.active >= self.max_concurrent {
            return;
        }

        let mut next: Option<usize> = None;
        for (index, slot) in table.slots[..table.high_water].iter().enumerate() {
            if slot.state != SlotState::WaitingForCapacity || slot.seated {
                continue;
            }
            next = match next {
                Some(current) if !self.precedes(slot, &table.slots[current]) => Some(current),
                _ => Some(index),
            };
        }

        if let Some(index) = next {
            table.slots[index].seated = true;
            table.active += 1;
            table.record(index, AuditAction::Readmitted);
            info!(slot = %SlotId::new(index), "job queue seat signal");
            self.cells[index].notify_one();
        }
    }

    fn precedes(&self, slot: &Slot<C>, current: &Slot<C>) -> bool {
        match (&slot.ctx, &current.ctx) {
            (Some(a), Some(b)) => self.policy.order(a, b) == Ordering::Less,
            _ => false,
        }
    }

    fn index_of(&self, slot: &SlotHandle) -> usize {
        assert_eq!(
            slot.queue_tag(),
            self.tag,
            "slot handle {} belongs to a different job queue",
            slot.id()
        );
        slot.id().index()
    }
}

impl<C, P> std::fmt::Debug for JobQueue<C, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobQueue")
            .field("tag", &self.tag)
            .field("capacity", &self.capacity)
            .field("max_concurrent", &self.max_concurrent)
            .finish_non_exhaustive()
    }
}
