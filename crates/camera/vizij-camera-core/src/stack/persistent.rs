//! Persistent blend stack: entries ordered by an explicit key, each entry
//! evaluated every frame until it is removed.

use std::sync::Arc;

use log::debug;

use crate::blend::{make_interrupting, make_reversed, BlendFactory, BlendRunParams, BlendSpec};
use crate::context::SharedContext;
use crate::error::CameraError;
use crate::finder::{find_transition, TransitionQuery};
use crate::ids::EntryId;
use crate::params::{OverrideFilter, ParameterTable};
use crate::result::EvalResult;
use crate::rig::{NodeRunParams, RigDefinition};
use crate::transition::Transition;

use super::base::{build_blend, StackBase};
use super::entry::{BlendStatus, ExtraInfo, StackEntry};
use super::{StackEvent, StackEventKind, StackRunParams, StackSnapshot};

#[derive(Debug)]
pub struct PersistentStack {
    base: StackBase,
    /// Outer parameter table the entries pre-blend into.
    pre_blend: ParameterTable,
}

impl Default for PersistentStack {
    fn default() -> Self {
        Self::new(0, usize::MAX)
    }
}

impl PersistentStack {
    pub fn new(capacity: usize, max_events: usize) -> Self {
        Self {
            base: StackBase::new(capacity, max_events),
            pre_blend: ParameterTable::new(),
        }
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

    pub fn blend_status(&self, id: EntryId) -> Option<BlendStatus> {
        self.base.find(id).map(|i| self.base.extras[i].blend_status)
    }

    /// Parameters as left by the last run's pre-blend.
    pub fn pre_blended_parameters(&self) -> &ParameterTable {
        &self.pre_blend
    }

    /// Insert `rig` for `context` at the position given by `order_key`;
    /// equal keys keep insertion order.
    ///
    /// Without `force`, inserting the same (rig, context, key) as a live entry
    /// is a no-op and returns `None`.
    pub fn insert(
        &mut self,
        rig: Arc<RigDefinition>,
        context: &SharedContext,
        order_key: i32,
        force: bool,
        transition_override: Option<&Arc<Transition>>,
    ) -> Option<EntryId> {
        if !self.base.check_invariant() {
            return None;
        }
        if !force {
            let duplicate = self
                .base
                .entries
                .iter()
                .zip(self.base.extras.iter())
                .any(|(e, x)| {
                    !e.is_frozen()
                        && Arc::ptr_eq(e.rig(), &rig)
                        && e.context().points_to(context)
                        && x.order_key == order_key
                });
            if duplicate {
                return None;
            }
        }

        let query = TransitionQuery {
            from_rig: None,
            from_frozen: false,
            to_rig: Some(&rig),
        };
        let transition = find_transition(&query, transition_override);
        let blend = build_blend(transition.as_ref()).unwrap_or_else(|| BlendSpec::Pop.build());

        let entry = self.base.create_entry(Arc::clone(&rig), context, Some(blend));
        let id = entry.id();
        let index = self
            .base
            .extras
            .partition_point(|x| x.order_key <= order_key);
        self.base
            .insert(index, entry, ExtraInfo::new(BlendStatus::BlendIn, order_key));
        debug!("inserted {id} ({}) at {index} with key {order_key}", rig.name);
        self.base.event(StackEventKind::Inserted, index, transition);
        Some(id)
    }

    /// Remove an entry, blending it out through its exit transition unless
    /// `immediate`. Returns false when the id is unknown.
    pub fn remove(
        &mut self,
        id: EntryId,
        immediate: bool,
        transition_override: Option<&Arc<Transition>>,
    ) -> bool {
        match self.base.find(id) {
            Some(index) => {
                self.remove_at(index, immediate, transition_override);
                true
            }
            None => {
                debug!("{}", CameraError::EntryNotFound { id });
                false
            }
        }
    }

    /// Remove the live entry running `rig` on `context`.
    pub fn remove_rig(
        &mut self,
        rig: &Arc<RigDefinition>,
        context: &SharedContext,
        immediate: bool,
        transition_override: Option<&Arc<Transition>>,
    ) -> bool {
        match self.base.find_rig(rig, context) {
            Some(index) => {
                self.remove_at(index, immediate, transition_override);
                true
            }
            None => false,
        }
    }

    /// Remove every entry bound to `context`. Returns how many were affected.
    pub fn remove_all(&mut self, context: &SharedContext, immediate: bool) -> usize {
        let ids: Vec<EntryId> = self
            .base
            .entries
            .iter()
            .filter(|e| e.context().points_to(context))
            .map(|e| e.id())
            .collect();
        ids.into_iter()
            .filter(|&id| self.remove(id, immediate, None))
            .count()
    }

    fn remove_at(
        &mut self,
        index: usize,
        immediate: bool,
        transition_override: Option<&Arc<Transition>>,
    ) {
        if immediate {
            self.base.pop_at(index);
            return;
        }
        let Some(status) = self.base.extras.get(index).map(|x| x.blend_status) else {
            return;
        };
        if status == BlendStatus::BlendOut {
            return;
        }
        let entry = &self.base.entries[index];
        let query = TransitionQuery {
            from_rig: Some(entry.rig()),
            from_frozen: entry.is_frozen(),
            to_rig: None,
        };
        let transition = find_transition(&query, transition_override);
        if entry.is_frozen() {
            // Frozen entries never run their blend, so they leave at once.
            debug!("removing frozen {}", entry.id());
            self.base.pop_at_via(index, transition);
            return;
        }
        let Some(factory) = transition.as_ref().and_then(|t| t.blend.clone()) else {
            if let Some(Err(err)) = transition.as_ref().map(|t| t.validate()) {
                log::warn!("{err}; cutting instead");
            }
            self.base.pop_at(index);
            return;
        };

        let mut blend = make_reversed(factory.build());
        let entry = &mut self.base.entries[index];
        if status == BlendStatus::BlendIn {
            if let Some(enter) = entry.take_blend() {
                blend = make_interrupting(blend, enter);
            }
        }
        entry.set_blend(blend);
        self.base.extras[index].blend_status = BlendStatus::BlendOut;
        debug!("blending out {}", entry.id());
        self.base.event(StackEventKind::BlendingOut, index, transition);
    }

    pub fn freeze(&mut self, id: EntryId) -> bool {
        self.base.find(id).is_some_and(|i| self.base.freeze_at(i))
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

    /// Evaluate every entry in key order and composite it over `out`.
    pub fn run(&mut self, params: &StackRunParams<'_>, out: &mut EvalResult) {
        if !self.base.check_invariant() {
            return;
        }
        let incoming = out.clone();
        self.pre_blend.clone_from(&incoming.params);
        self.base.begin_frame(params.stateless);
        let live = self.base.capture_contexts();
        let blend_run = BlendRunParams {
            delta_time: params.delta_time,
            stateless: params.stateless,
        };
        let node_run = NodeRunParams {
            delta_time: params.delta_time,
            is_first_frame: false,
            stateless: params.stateless,
        };

        let mut finished = Vec::new();
        for (index, (entry, extra)) in self
            .base
            .entries
            .iter_mut()
            .zip(self.base.extras.iter_mut())
            .enumerate()
        {
            if entry.is_frozen() {
                self.pre_blend
                    .override_with(&entry.result().params, OverrideFilter::None);
                out.override_from(entry.result());
                continue;
            }
            if !live[index] {
                continue;
            }

            // The rig's own values reach the table through its blend below.
            entry.prepare(
                &self.pre_blend,
                OverrideFilter::UnknownOnly,
                params.setters,
                &blend_run,
            );
            extra.ran_prepare = true;

            extra.pre_blend_full = entry.pre_blend_into(false, &mut self.pre_blend).is_full;
            entry.absorb_pre_blend(&self.pre_blend);
            entry.run_parameter_hooks();

            entry.update(&incoming, &node_run);
            extra.ran_update = true;

            let outcome = entry.post_blend_into(out);
            extra.post_blend_complete = outcome.is_complete();
            if outcome.is_complete() && extra.blend_status == BlendStatus::BlendOut {
                finished.push(index);
            }
        }

        out.params.override_with(&self.pre_blend, OverrideFilter::None);

        if !params.stateless {
            for index in finished.into_iter().rev() {
                self.base.pop_at(index);
            }
        }
        self.base.finish_frame(params.stateless);
    }
}
