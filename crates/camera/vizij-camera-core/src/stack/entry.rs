//! Stack entries and their per-frame bookkeeping.

use std::borrow::Cow;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::blend::{BlendEvaluator, BlendOutcome, BlendRunParams};
use crate::context::ContextHandle;
use crate::ids::EntryId;
use crate::params::{OverrideFilter, ParameterTable};
use crate::result::EvalResult;
use crate::rig::{EvaluatorStorage, NodeIndex, NodeRunParams, RigDefinition};
use crate::setters::ParameterSetterService;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlendStatus {
    BlendIn,
    /// Fully blended in, no status.
    #[default]
    None,
    BlendOut,
}

/// Bookkeeping kept in a parallel array to the entries, same index.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExtraInfo {
    pub blend_status: BlendStatus,
    pub ran_prepare: bool,
    pub ran_update: bool,
    pub pre_blend_full: bool,
    pub has_parameter_hooks: bool,
    /// Post-blend reported full and finished this frame.
    pub post_blend_complete: bool,
    /// Sort key; persistent stacks only.
    pub order_key: i32,
}

impl ExtraInfo {
    pub fn new(blend_status: BlendStatus, order_key: i32) -> Self {
        Self {
            blend_status,
            order_key,
            ..Self::default()
        }
    }

    pub(crate) fn reset_frame(&mut self) {
        self.ran_prepare = false;
        self.ran_update = false;
        self.post_blend_complete = false;
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct EntryFlags {
    pub frozen: bool,
    pub first_frame: bool,
    /// Report a cut on the first frame; set when the entry started without a blend.
    pub force_cut: bool,
}

/// Blend from the parameters of a rig that was merged away toward the new rig's.
#[derive(Debug)]
struct MergeBlend {
    blend: Box<dyn BlendEvaluator>,
    from: ParameterTable,
}

/// Built evaluators of a rig plus the blends running on the entry.
#[derive(Debug)]
pub struct EntryRoot {
    storage: EvaluatorStorage,
    hierarchy: Vec<NodeIndex>,
    blend: Option<Box<dyn BlendEvaluator>>,
    merge: Option<MergeBlend>,
}

impl EntryRoot {
    fn build(rig: &RigDefinition, blend: Option<Box<dyn BlendEvaluator>>) -> Self {
        let mut storage = EvaluatorStorage::new();
        let hierarchy = rig.build_into(&mut storage);
        Self {
            storage,
            hierarchy,
            blend,
            merge: None,
        }
    }

    fn has_parameter_hooks(&self) -> bool {
        self.hierarchy.iter().any(|&i| {
            self.storage
                .get(i)
                .is_some_and(|n| n.flags().needs_parameter_update)
        })
    }
}

/// One active rig instance on a blend stack.
#[derive(Debug)]
pub struct StackEntry {
    id: EntryId,
    rig: Arc<RigDefinition>,
    context: ContextHandle,
    root: EntryRoot,
    /// Prepared parameters for the current frame.
    params: ParameterTable,
    result: EvalResult,
    /// Copy of what the context last pushed.
    context_result: EvalResult,
    /// Parameters and result saved while a stateless run borrows the entry.
    committed: Option<(ParameterTable, EvalResult)>,
    flags: EntryFlags,
}

impl StackEntry {
    pub(crate) fn new(
        id: EntryId,
        rig: Arc<RigDefinition>,
        context: ContextHandle,
        blend: Option<Box<dyn BlendEvaluator>>,
    ) -> Self {
        let force_cut = blend.is_none();
        let root = EntryRoot::build(&rig, blend);
        Self {
            id,
            rig,
            context,
            root,
            params: ParameterTable::new(),
            result: EvalResult::default(),
            context_result: EvalResult::default(),
            committed: None,
            flags: EntryFlags {
                frozen: false,
                first_frame: true,
                force_cut,
            },
        }
    }

    pub fn id(&self) -> EntryId {
        self.id
    }

    pub fn rig(&self) -> &Arc<RigDefinition> {
        &self.rig
    }

    pub fn context(&self) -> &ContextHandle {
        &self.context
    }

    pub fn flags(&self) -> EntryFlags {
        self.flags
    }

    pub fn is_frozen(&self) -> bool {
        self.flags.frozen
    }

    /// Last computed result; replayed verbatim while frozen.
    pub fn result(&self) -> &EvalResult {
        &self.result
    }

    pub fn parameters(&self) -> &ParameterTable {
        &self.params
    }

    pub fn blend(&self) -> Option<&dyn BlendEvaluator> {
        self.root.blend.as_deref()
    }

    pub fn node_count(&self) -> usize {
        self.root.hierarchy.len()
    }

    pub fn is_merge_blending(&self) -> bool {
        self.root.merge.is_some()
    }

    pub(crate) fn take_blend(&mut self) -> Option<Box<dyn BlendEvaluator>> {
        self.root.blend.take()
    }

    pub(crate) fn set_blend(&mut self, blend: Box<dyn BlendEvaluator>) {
        self.root.blend = Some(blend);
    }

    /// Pre-blend this entry's parameters into `out`. Frozen entries and entries
    /// without a blend overwrite `out` outright.
    pub(crate) fn pre_blend_into(
        &mut self,
        inputs_only: bool,
        out: &mut ParameterTable,
    ) -> BlendOutcome {
        let source = if inputs_only {
            let mut inputs = ParameterTable::new();
            inputs.override_with(&self.params, OverrideFilter::InputOnly);
            Cow::Owned(inputs)
        } else {
            Cow::Borrowed(&self.params)
        };
        match (self.flags.frozen, self.root.blend.as_mut()) {
            (false, Some(blend)) => blend.blend_parameters(&source, out),
            _ => {
                out.override_with(&source, OverrideFilter::None);
                BlendOutcome::DONE
            }
        }
    }

    /// Composite this entry's result over `out`; same fallbacks as the pre-blend.
    pub(crate) fn post_blend_into(&mut self, out: &mut EvalResult) -> BlendOutcome {
        match (self.flags.frozen, self.root.blend.as_mut()) {
            (false, Some(blend)) => blend.blend_results(&self.result, out),
            _ => {
                out.override_from(&self.result);
                BlendOutcome::DONE
            }
        }
    }

    pub(crate) fn freeze(&mut self) {
        self.flags.frozen = true;
    }

    pub(crate) fn has_parameter_hooks(&self) -> bool {
        self.root.has_parameter_hooks()
    }

    /// Refresh the copy of the context's pushed result.
    pub(crate) fn capture_context(&mut self, context: &EvalResult) {
        self.context_result.clone_from(context);
    }

    /// Seed this frame's parameters: rig defaults, then whatever of the
    /// stack's incoming table passes `seed`, then the context, then active
    /// setters. Runs update hooks and advances the blends.
    pub(crate) fn prepare(
        &mut self,
        incoming: &ParameterTable,
        seed: OverrideFilter,
        setters: Option<&ParameterSetterService>,
        run: &BlendRunParams,
    ) {
        self.params = self.rig.default_parameters();
        self.params.override_with(incoming, seed);
        self.params
            .override_with(&self.context_result.params, OverrideFilter::None);
        if let Some(setters) = setters {
            setters.apply_all(&mut self.params);
        }
        self.apply_merge_blend(run);
        self.run_parameter_hooks();
        if let Some(blend) = self.root.blend.as_mut() {
            blend.run(run);
        }
    }

    fn apply_merge_blend(&mut self, run: &BlendRunParams) {
        let Some(merge) = self.root.merge.as_mut() else {
            return;
        };
        merge.blend.run(run);
        let mut blended = merge.from.clone();
        let outcome = merge.blend.blend_parameters(&self.params, &mut blended);
        self.params.override_with(&blended, OverrideFilter::KnownOnly);
        if outcome.is_complete() && !run.stateless {
            self.root.merge = None;
        }
    }

    pub(crate) fn run_parameter_hooks(&mut self) {
        let root = &mut self.root;
        for &index in &root.hierarchy {
            if let Some(node) = root.storage.get_mut(index) {
                if node.flags().needs_parameter_update {
                    node.update_parameters(&self.params);
                }
            }
        }
    }

    /// Write a shared pre-blend table back over the parameters this entry declares.
    pub(crate) fn absorb_pre_blend(&mut self, shared: &ParameterTable) {
        self.params.override_with(shared, OverrideFilter::KnownOnly);
    }

    /// Reset the working result from the stack's incoming result and the
    /// context, then run the node hierarchy.
    pub(crate) fn update(&mut self, incoming: &EvalResult, run: &NodeRunParams) {
        let result = &mut self.result;
        result.pose = incoming.pose;
        result.is_valid = incoming.is_valid;
        result.params.clone_from(&self.params);
        if self.context_result.is_valid {
            result.pose = self.context_result.pose;
            result.is_valid = true;
        }
        result.is_cut =
            self.context_result.is_cut || (self.flags.first_frame && self.flags.force_cut);

        let node_params = NodeRunParams {
            is_first_frame: self.flags.first_frame,
            ..*run
        };
        let root = &mut self.root;
        for &index in &root.hierarchy {
            if let Some(node) = root.storage.get_mut(index) {
                if node_params.is_first_frame {
                    node.initialize(result);
                }
                node.run(&node_params, result);
            }
        }
    }

    pub(crate) fn end_frame(&mut self, stateless: bool) {
        if !stateless {
            self.flags.first_frame = false;
        }
    }

    pub(crate) fn stash_committed(&mut self) {
        if self.committed.is_none() {
            self.committed = Some((self.params.clone(), self.result.clone()));
        }
    }

    pub(crate) fn restore_committed(&mut self) {
        if let Some((params, result)) = self.committed.take() {
            self.params = params;
            self.result = result;
        }
    }

    /// Fold `rig` into this entry: rebuild the hierarchy in the same arena,
    /// swap the rig and blend the old parameter values toward the new ones.
    pub(crate) fn merge(
        &mut self,
        rig: Arc<RigDefinition>,
        blend: Option<Box<dyn BlendEvaluator>>,
    ) {
        let mut from = self.rig.default_parameters();
        from.override_with(&self.params, OverrideFilter::None);

        self.root.storage.clear();
        self.root.hierarchy = rig.build_into(&mut self.root.storage);
        self.root.merge = blend.map(|blend| MergeBlend { blend, from });
        self.rig = rig;
        self.flags.first_frame = true;
        self.flags.force_cut = false;
    }
}
