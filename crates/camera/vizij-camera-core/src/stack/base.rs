//! Entry and bookkeeping arrays shared by both stack flavors.

use std::sync::Arc;

use log::{debug, error, warn};

use crate::blend::{BlendEvaluator, BlendFactory, BlendSpec};
use crate::context::{ContextHandle, SharedContext};
use crate::error::CameraError;
use crate::ids::{EntryId, IdAllocator};
use crate::rig::RigDefinition;
use crate::transition::Transition;

use super::entry::{BlendStatus, ExtraInfo, StackEntry};
use super::{EntrySnapshot, ExtraInfoSnapshot, StackEvent, StackEventKind, StackSnapshot};

/// Entries plus their parallel [`ExtraInfo`] array. The two always have the
/// same length; only the owning stack mutates them.
#[derive(Debug)]
pub(crate) struct StackBase {
    pub(crate) entries: Vec<StackEntry>,
    pub(crate) extras: Vec<ExtraInfo>,
    ids: IdAllocator,
    events: Vec<StackEvent>,
    max_events: usize,
}

impl StackBase {
    pub(crate) fn new(capacity: usize, max_events: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            extras: Vec::with_capacity(capacity),
            ids: IdAllocator::new(),
            events: Vec::new(),
            max_events,
        }
    }

    /// Logs and returns false when the parallel arrays disagree.
    pub(crate) fn check_invariant(&self) -> bool {
        if self.entries.len() == self.extras.len() {
            return true;
        }
        let err = CameraError::InvariantViolation {
            reason: format!(
                "{} entries but {} extra infos",
                self.entries.len(),
                self.extras.len()
            ),
        };
        error!("{err}");
        false
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn find(&self, id: EntryId) -> Option<usize> {
        self.entries.iter().position(|e| e.id() == id)
    }

    /// First non-frozen entry running `rig` on `context`.
    pub(crate) fn find_rig(
        &self,
        rig: &Arc<RigDefinition>,
        context: &SharedContext,
    ) -> Option<usize> {
        self.entries.iter().position(|e| {
            !e.is_frozen() && Arc::ptr_eq(e.rig(), rig) && e.context().points_to(context)
        })
    }

    pub(crate) fn create_entry(
        &mut self,
        rig: Arc<RigDefinition>,
        context: &SharedContext,
        blend: Option<Box<dyn BlendEvaluator>>,
    ) -> StackEntry {
        let id = self.ids.alloc_entry();
        StackEntry::new(id, rig, ContextHandle::new(context), blend)
    }

    pub(crate) fn insert(&mut self, index: usize, entry: StackEntry, extra: ExtraInfo) {
        let index = index.min(self.entries.len());
        self.entries.insert(index, entry);
        self.extras.insert(index, extra);
    }

    /// Remove the entry at `index`. Out of range is logged and ignored.
    pub(crate) fn pop_at(&mut self, index: usize) -> Option<StackEntry> {
        self.pop_at_via(index, None)
    }

    /// Like [`Self::pop_at`], reporting the transition that would have played.
    pub(crate) fn pop_at_via(
        &mut self,
        index: usize,
        transition: Option<Arc<Transition>>,
    ) -> Option<StackEntry> {
        if !self.check_invariant() {
            return None;
        }
        if index >= self.entries.len() {
            error!(
                "pop index {index} out of range for a stack of {}",
                self.entries.len()
            );
            return None;
        }
        self.extras.remove(index);
        let entry = self.entries.remove(index);
        debug!("popped {} ({})", entry.id(), entry.rig().name);
        self.push_event(StackEventKind::Popped, snapshot(&entry), transition);
        Some(entry)
    }

    pub(crate) fn freeze_at(&mut self, index: usize) -> bool {
        let Some(entry) = self.entries.get_mut(index) else {
            return false;
        };
        if entry.is_frozen() {
            return false;
        }
        entry.freeze();
        debug!("froze {} ({})", entry.id(), entry.rig().name);
        let snap = snapshot(entry);
        self.push_event(StackEventKind::Frozen, snap, None);
        true
    }

    pub(crate) fn freeze_all(&mut self, context: &SharedContext) -> usize {
        let matching: Vec<usize> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| !e.is_frozen() && e.context().points_to(context))
            .map(|(i, _)| i)
            .collect();
        matching.into_iter().filter(|&i| self.freeze_at(i)).count()
    }

    pub(crate) fn event(
        &mut self,
        kind: StackEventKind,
        index: usize,
        transition: Option<Arc<Transition>>,
    ) {
        if let Some(entry) = self.entries.get(index) {
            let snap = snapshot(entry);
            self.push_event(kind, snap, transition);
        }
    }

    fn push_event(
        &mut self,
        kind: StackEventKind,
        entry: EntrySnapshot,
        transition: Option<Arc<Transition>>,
    ) {
        if self.events.len() >= self.max_events {
            debug!("dropping {kind:?} event for {}: event buffer full", entry.id);
            return;
        }
        self.events.push(StackEvent {
            kind,
            entry,
            transition,
        });
    }

    pub(crate) fn take_events(&mut self) -> Vec<StackEvent> {
        std::mem::take(&mut self.events)
    }

    /// Stateless runs evaluate over a copy of each entry's committed state.
    pub(crate) fn begin_frame(&mut self, stateless: bool) {
        if stateless {
            for entry in &mut self.entries {
                entry.stash_committed();
            }
        }
    }

    /// Capture every entry's context for this frame. `false` marks entries
    /// whose context is gone; they are skipped but kept.
    pub(crate) fn capture_contexts(&mut self) -> Vec<bool> {
        self.entries
            .iter_mut()
            .map(|entry| {
                let resolved = entry.context().resolve();
                match resolved {
                    Some(ctx) => {
                        entry.capture_context(&ctx.borrow().result);
                        true
                    }
                    None => {
                        debug!("context of {} is gone; skipping it this frame", entry.id());
                        false
                    }
                }
            })
            .collect()
    }

    /// Clear per-frame flags. Outside stateless runs, completed blend-ins lose
    /// their status and their blend, and entries leave their first frame.
    /// Stateless runs put every entry's committed result back.
    pub(crate) fn finish_frame(&mut self, stateless: bool) {
        for (entry, extra) in self.entries.iter_mut().zip(self.extras.iter_mut()) {
            if !stateless
                && extra.blend_status == BlendStatus::BlendIn
                && extra.post_blend_complete
            {
                // A finished blend-in leaves the entry opaque.
                extra.blend_status = BlendStatus::None;
                entry.take_blend();
            }
            if extra.ran_update {
                entry.end_frame(stateless);
            }
            if stateless {
                entry.restore_committed();
            }
            extra.reset_frame();
        }
    }

    pub(crate) fn save_extra_info(&self) -> StackSnapshot {
        StackSnapshot {
            entries: self
                .entries
                .iter()
                .zip(self.extras.iter())
                .map(|(entry, extra)| ExtraInfoSnapshot {
                    id: entry.id(),
                    blending_in: extra.blend_status == BlendStatus::BlendIn,
                    blending_out: extra.blend_status == BlendStatus::BlendOut,
                    pre_blend_full: extra.pre_blend_full,
                })
                .collect(),
        }
    }

    pub(crate) fn restore_extra_info(
        &mut self,
        snapshot: &StackSnapshot,
    ) -> Result<(), CameraError> {
        if snapshot.entries.len() != self.entries.len() {
            return Err(CameraError::SnapshotMismatch {
                expected: snapshot.entries.len(),
                actual: self.entries.len(),
            });
        }
        if let Some(saved) = snapshot
            .entries
            .iter()
            .zip(self.entries.iter())
            .find(|(saved, entry)| saved.id != entry.id())
            .map(|(saved, _)| saved)
        {
            return Err(CameraError::EntryNotFound { id: saved.id });
        }
        for (saved, extra) in snapshot.entries.iter().zip(self.extras.iter_mut()) {
            extra.blend_status = if saved.blending_out {
                BlendStatus::BlendOut
            } else if saved.blending_in {
                BlendStatus::BlendIn
            } else {
                BlendStatus::None
            };
            extra.pre_blend_full = saved.pre_blend_full;
        }
        Ok(())
    }
}

pub(crate) fn snapshot(entry: &StackEntry) -> EntrySnapshot {
    EntrySnapshot {
        id: entry.id(),
        rig: entry.rig().name.clone(),
        context: entry.context().name(),
    }
}

/// Build the blend a transition plays. A transition without a blend factory is
/// a configuration error and degrades to a cut.
pub(crate) fn build_blend(transition: Option<&Arc<Transition>>) -> Option<Box<dyn BlendEvaluator>> {
    let transition = transition?;
    match &transition.blend {
        Some(factory) => Some(factory.build()),
        None => {
            if let Err(err) = transition.validate() {
                warn!("{err}; playing a cut instead");
            }
            Some(BlendSpec::Pop.build())
        }
    }
}
