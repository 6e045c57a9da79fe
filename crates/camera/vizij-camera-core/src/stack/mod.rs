//! Blend stacks: ordered collections of active rigs composited every frame.
//!
//! Two flavors share the entry machinery:
//! - [`PersistentStack`]: entries sorted by an explicit key, removed by id with a blend-out
//! - [`TransientStack`]: LIFO pushes with merge-on-push and a four-phase frame pipeline

mod base;
mod entry;
mod persistent;
mod transient;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::ids::EntryId;
use crate::setters::ParameterSetterService;
use crate::transition::Transition;

pub use entry::{BlendStatus, EntryFlags, ExtraInfo, StackEntry};
pub use persistent::PersistentStack;
pub use transient::TransientStack;

/// Per-frame inputs handed to a stack run.
#[derive(Copy, Clone, Debug, Default)]
pub struct StackRunParams<'a> {
    pub delta_time: f32,
    /// Compute the result without popping entries, changing statuses or emitting events.
    pub stateless: bool,
    pub setters: Option<&'a ParameterSetterService>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StackEventKind {
    Pushed,
    MergedOnto,
    Inserted,
    BlendingOut,
    Popped,
    Frozen,
}

/// Identity of an entry at the time an event fired.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntrySnapshot {
    pub id: EntryId,
    pub rig: String,
    pub context: String,
}

#[derive(Clone, Debug)]
pub struct StackEvent {
    pub kind: StackEventKind,
    pub entry: EntrySnapshot,
    pub transition: Option<Arc<Transition>>,
}

impl StackEvent {
    pub fn transition_name(&self) -> Option<&str> {
        self.transition.as_ref().map(|t| t.name.as_str())
    }
}

/// Persisted flags of one entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraInfoSnapshot {
    pub id: EntryId,
    pub blending_in: bool,
    pub blending_out: bool,
    pub pre_blend_full: bool,
}

/// What a stack saves across save/restore of its owner: booleans only.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackSnapshot {
    pub entries: Vec<ExtraInfoSnapshot>,
}
