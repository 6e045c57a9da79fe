//! Built-in camera nodes.
//!
//! - SetPoseNode: write a fixed pose
//! - OffsetNode: translate the pose, optionally driven by a Vec3 parameter
//! - FieldOfViewNode: drive the field of view from a Float parameter

use std::sync::Arc;

use crate::ids::ParamId;
use crate::params::ParameterTable;
use crate::result::{CameraPose, EvalResult};
use crate::rig::{CameraNode, NodeEvaluator, NodeFlags, NodeRunParams};

#[derive(Debug, Clone)]
pub struct SetPoseNode {
    pub pose: CameraPose,
    pub children: Vec<Arc<dyn CameraNode>>,
}

impl SetPoseNode {
    pub fn new(pose: CameraPose) -> Self {
        Self {
            pose,
            children: Vec::new(),
        }
    }

    pub fn with_child(mut self, child: Arc<dyn CameraNode>) -> Self {
        self.children.push(child);
        self
    }
}

impl CameraNode for SetPoseNode {
    fn type_name(&self) -> &'static str {
        "set_pose"
    }

    fn children(&self) -> &[Arc<dyn CameraNode>] {
        &self.children
    }

    fn build(&self) -> Box<dyn NodeEvaluator> {
        Box::new(SetPoseEvaluator { pose: self.pose })
    }
}

#[derive(Debug)]
struct SetPoseEvaluator {
    pose: CameraPose,
}

impl NodeEvaluator for SetPoseEvaluator {
    fn run(&mut self, _params: &NodeRunParams, result: &mut EvalResult) {
        result.pose = self.pose;
        result.is_valid = true;
    }
}

#[derive(Debug, Clone)]
pub struct OffsetNode {
    pub offset: [f32; 3],
    /// When set and present in the entry's parameters, overrides `offset`.
    pub param: Option<ParamId>,
    pub children: Vec<Arc<dyn CameraNode>>,
}

impl OffsetNode {
    pub fn new(offset: [f32; 3]) -> Self {
        Self {
            offset,
            param: None,
            children: Vec::new(),
        }
    }

    pub fn driven_by(mut self, param: impl Into<ParamId>) -> Self {
        self.param = Some(param.into());
        self
    }

    pub fn with_child(mut self, child: Arc<dyn CameraNode>) -> Self {
        self.children.push(child);
        self
    }
}

impl CameraNode for OffsetNode {
    fn type_name(&self) -> &'static str {
        "offset"
    }

    fn children(&self) -> &[Arc<dyn CameraNode>] {
        &self.children
    }

    fn build(&self) -> Box<dyn NodeEvaluator> {
        Box::new(OffsetEvaluator {
            offset: self.offset,
            param: self.param.clone(),
        })
    }
}

#[derive(Debug)]
struct OffsetEvaluator {
    offset: [f32; 3],
    param: Option<ParamId>,
}

impl NodeEvaluator for OffsetEvaluator {
    fn run(&mut self, _params: &NodeRunParams, result: &mut EvalResult) {
        let offset = self
            .param
            .as_ref()
            .and_then(|p| result.params.try_get::<[f32; 3]>(p))
            .unwrap_or(self.offset);
        for (axis, delta) in result.pose.position.iter_mut().zip(offset) {
            *axis += delta;
        }
        result.is_valid = true;
    }
}

#[derive(Debug, Clone)]
pub struct FieldOfViewNode {
    pub param: ParamId,
    pub default_fov: f32,
}

impl FieldOfViewNode {
    pub fn new(param: impl Into<ParamId>, default_fov: f32) -> Self {
        Self {
            param: param.into(),
            default_fov,
        }
    }
}

impl CameraNode for FieldOfViewNode {
    fn type_name(&self) -> &'static str {
        "field_of_view"
    }

    fn build(&self) -> Box<dyn NodeEvaluator> {
        Box::new(FieldOfViewEvaluator {
            param: self.param.clone(),
            fov: self.default_fov,
        })
    }
}

#[derive(Debug)]
struct FieldOfViewEvaluator {
    param: ParamId,
    fov: f32,
}

impl NodeEvaluator for FieldOfViewEvaluator {
    fn flags(&self) -> NodeFlags {
        NodeFlags {
            needs_parameter_update: true,
        }
    }

    fn update_parameters(&mut self, params: &ParameterTable) {
        if let Some(fov) = params.try_get::<f32>(&self.param) {
            self.fov = fov;
        }
    }

    fn run(&mut self, _params: &NodeRunParams, result: &mut EvalResult) {
        result.pose.field_of_view = self.fov;
        result.is_valid = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn offset_prefers_parameter_value() {
        let node = OffsetNode::new([1.0, 0.0, 0.0]).driven_by("offset");
        let mut eval = node.build();
        let mut result = EvalResult::default();
        result.params.set(ParamId::from("offset"), Value::vec3(0.0, 2.0, 0.0));
        eval.run(&NodeRunParams::default(), &mut result);
        assert_eq!(result.pose.position, [0.0, 2.0, 0.0]);
    }

    #[test]
    fn field_of_view_reads_parameter_in_update_hook() {
        let node = FieldOfViewNode::new("fov", 60.0);
        let mut eval = node.build();
        assert!(eval.flags().needs_parameter_update);

        let mut result = EvalResult::default();
        eval.run(&NodeRunParams::default(), &mut result);
        assert_eq!(result.pose.field_of_view, 60.0);

        let mut params = ParameterTable::new();
        params.set(ParamId::from("fov"), 75.0f32);
        eval.update_parameters(&params);
        eval.run(&NodeRunParams::default(), &mut result);
        assert_eq!(result.pose.field_of_view, 75.0);
    }
}
