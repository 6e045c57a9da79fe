//! Rig definitions and the node-evaluation seam.
//!
//! A [`RigDefinition`] is immutable and shared between every entry that runs
//! it. Each entry builds its own evaluators from the rig's [`CameraNode`] tree
//! into an [`EvaluatorStorage`] arena it owns exclusively.

use std::fmt;
use std::sync::Arc;

use log::warn;

use crate::ids::ParamId;
use crate::params::ParameterTable;
use crate::result::EvalResult;
use crate::transition::Transition;
use crate::value::Value;

/// How a candidate rig relates to the rig an entry is currently running.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MergeEligibility {
    /// The candidate is the running rig.
    Active,
    /// Same node structure; the candidate can be folded into the running entry.
    EligibleForMerge,
    Ineligible,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct NodeFlags {
    /// The node wants [`NodeEvaluator::update_parameters`] called before the pre-blend.
    pub needs_parameter_update: bool,
}

#[derive(Copy, Clone, Debug, Default)]
pub struct NodeRunParams {
    pub delta_time: f32,
    pub is_first_frame: bool,
    /// Speculative evaluation; nodes must not commit persistent state.
    pub stateless: bool,
}

/// Shared, immutable description of one node of a rig.
pub trait CameraNode: fmt::Debug + Send + Sync {
    /// Stable name of the node kind; used for structural merge checks.
    fn type_name(&self) -> &'static str;

    fn children(&self) -> &[Arc<dyn CameraNode>] {
        &[]
    }

    fn build(&self) -> Box<dyn NodeEvaluator>;

    /// Whether an entry running this node tree can absorb `candidate` in place.
    fn compare_for_merging(&self, candidate: &dyn CameraNode) -> MergeEligibility {
        if same_structure(self, candidate) {
            MergeEligibility::EligibleForMerge
        } else {
            MergeEligibility::Ineligible
        }
    }
}

/// Per-entry runtime state of one node.
pub trait NodeEvaluator: fmt::Debug {
    fn flags(&self) -> NodeFlags {
        NodeFlags::default()
    }

    fn initialize(&mut self, _result: &mut EvalResult) {}

    /// Parameter-update hook, called with the entry's prepared parameters.
    fn update_parameters(&mut self, _params: &ParameterTable) {}

    fn run(&mut self, params: &NodeRunParams, result: &mut EvalResult);
}

/// Recursive comparison of node kinds and child shapes.
pub fn same_structure<N: CameraNode + ?Sized>(a: &N, b: &dyn CameraNode) -> bool {
    if a.type_name() != b.type_name() {
        return false;
    }
    let (ca, cb) = (a.children(), b.children());
    ca.len() == cb.len()
        && ca
            .iter()
            .zip(cb.iter())
            .all(|(x, y)| same_structure(x.as_ref(), y.as_ref()))
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct NodeIndex(pub usize);

/// Arena of node evaluators owned by exactly one stack entry.
/// Not `Clone`: evaluator storage is moved with its entry, never duplicated.
#[derive(Debug, Default)]
pub struct EvaluatorStorage {
    nodes: Vec<Box<dyn NodeEvaluator>>,
}

impl EvaluatorStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, evaluator: Box<dyn NodeEvaluator>) -> NodeIndex {
        self.nodes.push(evaluator);
        NodeIndex(self.nodes.len() - 1)
    }

    pub fn get(&self, index: NodeIndex) -> Option<&(dyn NodeEvaluator + 'static)> {
        self.nodes.get(index.0).map(|n| n.as_ref())
    }

    pub fn get_mut(&mut self, index: NodeIndex) -> Option<&mut (dyn NodeEvaluator + 'static)> {
        self.nodes.get_mut(index.0).map(|n| n.as_mut())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Drop every evaluator, keeping the allocation for a rebuild.
    pub fn clear(&mut self) {
        self.nodes.clear();
    }
}

/// Asset owning a family of rigs; carries transitions shared by all of them.
#[derive(Debug, Default)]
pub struct RigAsset {
    pub name: String,
    pub enter_transitions: Vec<Arc<Transition>>,
    pub exit_transitions: Vec<Arc<Transition>>,
}

impl RigAsset {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_enter_transition(mut self, transition: Transition) -> Self {
        self.enter_transitions.push(Arc::new(transition));
        self
    }

    pub fn with_exit_transition(mut self, transition: Transition) -> Self {
        self.exit_transitions.push(Arc::new(transition));
        self
    }
}

#[derive(Debug, Default)]
pub struct RigDefinition {
    pub name: String,
    pub root: Option<Arc<dyn CameraNode>>,
    /// Rig inputs and their defaults; every entry is flagged as an input.
    pub parameters: ParameterTable,
    pub enter_transitions: Vec<Arc<Transition>>,
    pub exit_transitions: Vec<Arc<Transition>>,
    /// Sub-rigs when this rig is a combination of several rigs.
    pub combination: Vec<Arc<RigDefinition>>,
    pub asset: Option<Arc<RigAsset>>,
}

impl RigDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// A rig that runs each of `rigs` in order.
    pub fn combine(name: impl Into<String>, rigs: Vec<Arc<RigDefinition>>) -> Self {
        Self {
            name: name.into(),
            combination: rigs,
            ..Self::default()
        }
    }

    pub fn with_root(mut self, root: Arc<dyn CameraNode>) -> Self {
        self.root = Some(root);
        self
    }

    pub fn with_parameter(mut self, id: impl Into<ParamId>, default: impl Into<Value>) -> Self {
        self.parameters.set_input(id.into(), default);
        self
    }

    pub fn with_enter_transition(mut self, transition: Transition) -> Self {
        self.enter_transitions.push(Arc::new(transition));
        self
    }

    pub fn with_exit_transition(mut self, transition: Transition) -> Self {
        self.exit_transitions.push(Arc::new(transition));
        self
    }

    pub fn with_asset(mut self, asset: Arc<RigAsset>) -> Self {
        self.asset = Some(asset);
        self
    }

    pub fn root_node(&self) -> Option<&Arc<dyn CameraNode>> {
        self.root.as_ref()
    }

    pub fn combination_sub_rigs(&self) -> &[Arc<RigDefinition>] {
        &self.combination
    }

    pub fn is_combination(&self) -> bool {
        !self.combination.is_empty()
    }

    /// Parameter defaults, including those of combined sub-rigs.
    pub fn default_parameters(&self) -> ParameterTable {
        let mut out = ParameterTable::new();
        for sub in &self.combination {
            out.override_all(&sub.default_parameters(), false);
        }
        out.override_all(&self.parameters, false);
        out
    }

    /// Build this rig's evaluators into `storage`, returning them in run order.
    pub fn build_into(&self, storage: &mut EvaluatorStorage) -> Vec<NodeIndex> {
        let mut order = Vec::new();
        if self.root.is_none() && self.combination.is_empty() {
            warn!("camera rig '{}' has no root node; it will not drive the camera", self.name);
        }
        if let Some(root) = &self.root {
            build_node(root.as_ref(), storage, &mut order);
        }
        for sub in &self.combination {
            order.extend(sub.build_into(storage));
        }
        order
    }

    pub fn compare_for_merging(&self, candidate: &RigDefinition) -> MergeEligibility {
        if std::ptr::eq(self, candidate) {
            return MergeEligibility::Active;
        }
        if self.combination.len() != candidate.combination.len() {
            return MergeEligibility::Ineligible;
        }
        let roots = match (&self.root, &candidate.root) {
            (Some(a), Some(b)) => a.compare_for_merging(b.as_ref()),
            (None, None) => MergeEligibility::EligibleForMerge,
            _ => MergeEligibility::Ineligible,
        };
        if roots == MergeEligibility::Ineligible {
            return roots;
        }
        let subs_ok = self
            .combination
            .iter()
            .zip(candidate.combination.iter())
            .all(|(a, b)| a.compare_for_merging(b) != MergeEligibility::Ineligible);
        if subs_ok {
            MergeEligibility::EligibleForMerge
        } else {
            MergeEligibility::Ineligible
        }
    }
}

fn build_node(node: &dyn CameraNode, storage: &mut EvaluatorStorage, order: &mut Vec<NodeIndex>) {
    order.push(storage.alloc(node.build()));
    for child in node.children() {
        build_node(child.as_ref(), storage, order);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::{OffsetNode, SetPoseNode};
    use crate::result::CameraPose;

    #[test]
    fn build_is_preorder_and_combinations_concatenate() {
        let a = Arc::new(
            RigDefinition::new("a").with_root(Arc::new(
                SetPoseNode::new(CameraPose::at([1.0, 0.0, 0.0]))
                    .with_child(Arc::new(OffsetNode::new([0.0, 1.0, 0.0]))),
            )),
        );
        let b = Arc::new(
            RigDefinition::new("b").with_root(Arc::new(OffsetNode::new([0.0, 0.0, 1.0]))),
        );
        let combo = RigDefinition::combine("ab", vec![a, b]);

        let mut storage = EvaluatorStorage::new();
        let order = combo.build_into(&mut storage);
        assert_eq!(order, vec![NodeIndex(0), NodeIndex(1), NodeIndex(2)]);
        assert_eq!(storage.len(), 3);

        let mut result = EvalResult::default();
        for idx in order {
            storage
                .get_mut(idx)
                .unwrap()
                .run(&NodeRunParams::default(), &mut result);
        }
        assert_eq!(result.pose.position, [1.0, 1.0, 1.0]);
    }

    #[test]
    fn merge_eligibility_follows_structure() {
        let a = RigDefinition::new("a").with_root(Arc::new(OffsetNode::new([1.0, 0.0, 0.0])));
        let b = RigDefinition::new("b").with_root(Arc::new(OffsetNode::new([2.0, 0.0, 0.0])));
        let c = RigDefinition::new("c")
            .with_root(Arc::new(SetPoseNode::new(CameraPose::default())));

        assert_eq!(a.compare_for_merging(&a), MergeEligibility::Active);
        assert_eq!(a.compare_for_merging(&b), MergeEligibility::EligibleForMerge);
        assert_eq!(a.compare_for_merging(&c), MergeEligibility::Ineligible);
    }

    #[test]
    fn default_parameters_are_inputs() {
        let rig = RigDefinition::new("a").with_parameter("dist", 4.0f32);
        let params = rig.default_parameters();
        let entry = params.entry(&ParamId::from("dist")).unwrap();
        assert!(entry.input);
    }
}
