//! Slot identities, states, and the caller-held slot handle.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::waiters::WaiterSet;

/// Stable index of a slot in the queue table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotId(usize);

impl SlotId {
    pub(crate) const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Position of the slot in the table.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Caller-defined tag attached to a slot when it is acquired.
///
/// The queue never interprets the value; it only carries it into logs and audit events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobKind(pub u32);

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotState {
    /// Not allocated to any caller.
    #[default]
    Void,
    /// Allocated, no unit of work attached.
    Idle,
    /// A unit of work is attached but has not been started.
    Registered,
    /// Parked in the admission gate until a seat is handed over.
    WaitingForCapacity,
    /// Holding a seat, parked until a conflicting slot ends.
    WaitingForConflict,
    /// Admitted and free of conflicts.
    Running,
}

impl SlotState {
    /// Whether a slot in this state is a conflict candidate for a starting unit.
    #[must_use]
    pub const fn is_live(self) -> bool {
        matches!(
            self,
            Self::Registered | Self::WaitingForCapacity | Self::WaitingForConflict | Self::Running
        )
    }

    /// Whether a thread is currently parked inside `start` for this slot.
    #[must_use]
    pub const fn is_parked(self) -> bool {
        matches!(self, Self::WaitingForCapacity | Self::WaitingForConflict)
    }
}

impl fmt::Display for SlotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Void => "void",
            Self::Idle => "idle",
            Self::Registered => "registered",
            Self::WaitingForCapacity => "waiting_for_capacity",
            Self::WaitingForConflict => "waiting_for_conflict",
            Self::Running => "running",
        };
        f.write_str(name)
    }
}

/// Owned handle to an acquired slot.
///
/// The handle is neither `Clone` nor `Copy` and is consumed by
/// [`JobQueue::release_slot`](crate::core::JobQueue::release_slot), so a released slot
/// cannot be addressed again through it.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a slot stays allocated until it is passed to `release_slot`"]
pub struct SlotHandle {
    id: SlotId,
    kind: JobKind,
    queue: u64,
}

impl SlotHandle {
    pub(crate) const fn new(id: SlotId, kind: JobKind, queue: u64) -> Self {
        Self { id, kind, queue }
    }

    /// Table index of this slot.
    #[must_use]
    pub const fn id(&self) -> SlotId {
        self.id
    }

    /// Tag given at acquisition.
    #[must_use]
    pub const fn kind(&self) -> JobKind {
        self.kind
    }

    pub(crate) const fn queue_tag(&self) -> u64 {
        self.queue
    }
}

/// Table entry guarded by the queue mutex.
pub(crate) struct Slot<C> {
    pub state: SlotState,
    pub kind: JobKind,
    pub ctx: Option<C>,
    /// Slots parked in `WaitingForConflict` on this one.
    pub waiters: WaiterSet,
    /// A finishing slot handed this one an admission seat while it was parked.
    pub seated: bool,
}

impl<C> Slot<C> {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: SlotState::Void,
            kind: JobKind::default(),
            ctx: None,
            waiters: WaiterSet::with_capacity(capacity),
            seated: false,
        }
    }
}
