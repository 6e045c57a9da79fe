//! Transient blend stack: LIFO pushes with merge-on-push.
//!
//! Each run goes through four phases over all entries, bottom to top:
//! 1. prepare: seed parameters, apply setters, run update hooks, advance blends
//! 2. pre-blend: cross-blend input parameters into one shared table and write
//!    it back, so every rig sees the stack's blended state before any rig runs
//! 3. update: run every rig's node hierarchy
//! 4. post-blend: composite results, then prune what became fully covered

use std::sync::Arc;

use log::debug;

use crate::blend::BlendRunParams;
use crate::context::SharedContext;
use crate::error::CameraError;
use crate::finder::{find_transition, TransitionQuery};
use crate::ids::EntryId;
use crate::params::{OverrideFilter, ParameterTable};
use crate::result::EvalResult;
use crate::rig::{MergeEligibility, NodeRunParams, RigDefinition};
use crate::transition::Transition;

use super::base::{build_blend, StackBase};
use super::entry::{BlendStatus, ExtraInfo, StackEntry};
use super::{StackEvent, StackEventKind, StackRunParams, StackSnapshot};

#[derive(Debug)]
pub struct TransientStack {
    base: StackBase,
    /// Prune entries fully covered by an opaque entry above them.
    isolated: bool,
    shared_params: ParameterTable,
}

impl Default for TransientStack {
    fn default() -> Self {
        Self::new(true, 0, usize::MAX)
    }
}

impl TransientStack {
    pub fn new(isolated: bool, capacity: usize, max_events: usize) -> Self {
        Self {
            base: StackBase::new(capacity, max_events),
            isolated,
            shared_params: ParameterTable::new(),
        }
    }

    pub fn is_isolated(&self) -> bool {
        self.isolated
    }

    pub fn len(&self) -> usize {
        self.base.len()
    }

    pub fn is_empty(&self) -> bool {
        self.base.len() == 0
    }

    pub fn entries(&self) -> &[StackEntry] {
        &self.base.entries
    }

    pub fn extra_infos(&self) -> &[ExtraInfo] {
        &self.base.extras
    }

    pub fn entry(&self, id: EntryId) -> Option<&StackEntry> {
        self.base.find(id).map(|i| &self.base.entries[i])
    }

    pub fn top(&self) -> Option<&StackEntry> {
        self.base.entries.last()
    }

    pub fn blend_status(&self, id: EntryId) -> Option<BlendStatus> {
        self.base.find(id).map(|i| self.base.extras[i].blend_status)
    }

    /// Shared table built by the last pre-blend; empty when no rig had hooks.
    pub fn pre_blended_parameters(&self) -> &ParameterTable {
        &self.shared_params
    }

    /// Push `rig` for `context`.
    ///
    /// Returns the id of the entry now running the rig: a new entry, or the
    /// top entry when the rig was merged into it. `None` when the rig is
    /// already on top for this context and `force` is not set.
    pub fn push(
        &mut self,
        rig: Arc<RigDefinition>,
        context: &SharedContext,
        force: bool,
        transition_override: Option<&Arc<Transition>>,
    ) -> Option<EntryId> {
        if !self.base.check_invariant() {
            return None;
        }

        let top = self
            .base
            .entries
            .last()
            .filter(|e| !e.is_frozen() && e.context().points_to(context));
        let eligibility = top.map(|e| e.rig().compare_for_merging(&rig));
        if eligibility == Some(MergeEligibility::Active) && !force {
            return None;
        }

        let last = self.base.entries.last();
        let query = TransitionQuery {
            from_rig: last.map(|e| e.rig()),
            from_frozen: last.is_some_and(|e| e.is_frozen()),
            to_rig: Some(&rig),
        };
        let transition = find_transition(&query, transition_override);

        let may_merge = transition.as_ref().is_some_and(|t| t.allow_merging);
        if eligibility == Some(MergeEligibility::EligibleForMerge) && may_merge {
            let index = self.base.len() - 1;
            let blend = build_blend(transition.as_ref());
            let entry = &mut self.base.entries[index];
            debug!("merging {} onto {} ({})", rig.name, entry.id(), entry.rig().name);
            entry.merge(rig, blend);
            let id = entry.id();
            self.base.event(StackEventKind::MergedOnto, index, transition);
            return Some(id);
        }

        let blend = build_blend(transition.as_ref());
        let status = if blend.is_some() {
            BlendStatus::BlendIn
        } else {
            BlendStatus::None
        };
        let entry = self.base.create_entry(Arc::clone(&rig), context, blend);
        let id = entry.id();
        let index = self.base.len();
        self.base.insert(index, entry, ExtraInfo::new(status, 0));
        debug!("pushed {id} ({}) with status {status:?}", rig.name);
        self.base.event(StackEventKind::Pushed, index, transition);
        Some(id)
    }

    /// Remove an entry immediately.
    pub fn pop(&mut self, id: EntryId) -> bool {
        match self.base.find(id) {
            Some(index) => self.base.pop_at(index).is_some(),
            None => {
                debug!("{}", CameraError::EntryNotFound { id });
                false
            }
        }
    }

    /// Remove every entry bound to `context` immediately.
    pub fn pop_all(&mut self, context: &SharedContext) -> usize {
        let mut popped = 0;
        let mut index = self.base.len();
        while index > 0 {
            index -= 1;
            if self.base.entries[index].context().points_to(context)
                && self.base.pop_at(index).is_some()
            {
                popped += 1;
            }
        }
        popped
    }

    pub fn freeze(&mut self, id: EntryId) -> bool {
        self.base.find(id).is_some_and(|i| self.base.freeze_at(i))
    }

    /// Freeze the live entry running `rig` on `context`.
    pub fn freeze_rig(&mut self, rig: &Arc<RigDefinition>, context: &SharedContext) -> bool {
        self.base
            .find_rig(rig, context)
            .is_some_and(|i| self.base.freeze_at(i))
    }

    pub fn freeze_all(&mut self, context: &SharedContext) -> usize {
        self.base.freeze_all(context)
    }

    pub fn take_events(&mut self) -> Vec<StackEvent> {
        self.base.take_events()
    }

    pub fn save_extra_info(&self) -> StackSnapshot {
        self.base.save_extra_info()
    }

    pub fn restore_extra_info(&mut self, snapshot: &StackSnapshot) -> Result<(), CameraError> {
        self.base.restore_extra_info(snapshot)
    }

    /// Evaluate the stack and composite it over `out`.
    pub fn run(&mut self, params: &StackRunParams<'_>, out: &mut EvalResult) {
        if !self.base.check_invariant() {
            return;
        }
        let incoming = out.clone();
        self.base.begin_frame(params.stateless);
        let live = self.base.capture_contexts();

        self.prepare(params, &incoming, &live);
        self.pre_blend(&live);
        self.update(params, &incoming, &live);
        let opaque = self.post_blend(&live, out);

        if self.isolated && !params.stateless {
            if let Some(top) = opaque {
                for index in (0..top).rev() {
                    debug!("pruning {} below opaque entry", self.base.entries[index].id());
                    self.base.pop_at(index);
                }
            }
        }
        self.base.finish_frame(params.stateless);
    }

    fn prepare(&mut self, params: &StackRunParams<'_>, incoming: &EvalResult, live: &[bool]) {
        let blend_run = BlendRunParams {
            delta_time: params.delta_time,
            stateless: params.stateless,
        };
        for (index, (entry, extra)) in self
            .base
            .entries
            .iter_mut()
            .zip(self.base.extras.iter_mut())
            .enumerate()
        {
            if entry.is_frozen() || !live[index] || extra.ran_prepare {
                continue;
            }
            entry.prepare(
                &incoming.params,
                OverrideFilter::None,
                params.setters,
                &blend_run,
            );
            extra.has_parameter_hooks = entry.has_parameter_hooks();
            extra.ran_prepare = true;
        }
    }

    fn pre_blend(&mut self, live: &[bool]) {
        self.shared_params.clear();
        if !self.base.extras.iter().any(|x| x.has_parameter_hooks) {
            return;
        }
        for (index, (entry, extra)) in self
            .base
            .entries
            .iter_mut()
            .zip(self.base.extras.iter_mut())
            .enumerate()
        {
            if !entry.is_frozen() && !live[index] {
                continue;
            }
            extra.pre_blend_full = entry.pre_blend_into(true, &mut self.shared_params).is_full;
        }
        for (index, entry) in self.base.entries.iter_mut().enumerate() {
            if entry.is_frozen() || !live[index] {
                continue;
            }
            entry.absorb_pre_blend(&self.shared_params);
            entry.run_parameter_hooks();
        }
    }

    fn update(&mut self, params: &StackRunParams<'_>, incoming: &EvalResult, live: &[bool]) {
        let node_run = NodeRunParams {
            delta_time: params.delta_time,
            is_first_frame: false,
            stateless: params.stateless,
        };
        for (index, (entry, extra)) in self
            .base
            .entries
            .iter_mut()
            .zip(self.base.extras.iter_mut())
            .enumerate()
        {
            if entry.is_frozen() || !live[index] {
                continue;
            }
            entry.update(incoming, &node_run);
            extra.ran_update = true;
        }
    }

    /// Composite every entry over `out`. Returns the highest entry that is
    /// now fully opaque: full and finished, or without a blend.
    fn post_blend(&mut self, live: &[bool], out: &mut EvalResult) -> Option<usize> {
        let mut opaque = None;
        for (index, (entry, extra)) in self
            .base
            .entries
            .iter_mut()
            .zip(self.base.extras.iter_mut())
            .enumerate()
        {
            if entry.is_frozen() {
                entry.post_blend_into(out);
                continue;
            }
            if !live[index] {
                continue;
            }
            let outcome = entry.post_blend_into(out);
            extra.post_blend_complete = outcome.is_complete();
            if outcome.is_complete() {
                opaque = Some(index);
            }
        }
        opaque
    }
}
