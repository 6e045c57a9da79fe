//! Vizij Camera Core (engine-agnostic)
//!
//! Runtime for blending camera rigs. This crate defines parameter tables and
//! per-frame results, blend evaluators and their adapters, transitions and the
//! transition finder, the persistent and transient blend stacks, the parameter
//! setter service, and a `CameraSystem` that evaluates the stack layers each
//! frame.

pub mod blend;
pub mod config;
pub mod context;
pub mod error;
pub mod finder;
pub mod ids;
pub mod interp;
pub mod nodes;
pub mod params;
pub mod result;
pub mod rig;
pub mod setters;
pub mod stack;
pub mod system;
pub mod transition;
pub mod value;

// Re-exports for hosts
pub use blend::{
    make_interrupting, make_reversed, BlendEvaluator, BlendFactory, BlendKind, BlendOutcome,
    BlendRunParams, BlendSpec, InterruptedBlend, PopBlend, ReverseBlend, SimpleBlend,
};
pub use config::{Config, TransientLayerConfig};
pub use context::{ContextHandle, SceneContext, SharedContext};
pub use error::CameraError;
pub use finder::{find_transition, TransitionQuery};
pub use ids::{EntryId, ParamId, SetterHandle};
pub use interp::BlendCurve;
pub use nodes::{FieldOfViewNode, OffsetNode, SetPoseNode};
pub use params::{OverrideFilter, ParamEntry, ParameterTable};
pub use result::{CameraPose, EvalResult};
pub use rig::{
    CameraNode, EvaluatorStorage, MergeEligibility, NodeEvaluator, NodeFlags, NodeIndex,
    NodeRunParams, RigAsset, RigDefinition,
};
pub use setters::{ParameterSetterService, SetterBlendShape, SetterSpec, SetterState};
pub use stack::{
    BlendStatus, EntrySnapshot, ExtraInfo, ExtraInfoSnapshot, PersistentStack, StackEntry,
    StackEvent, StackEventKind, StackRunParams, StackSnapshot, TransientStack,
};
pub use system::{CameraSystem, Layer, LayerEvent};
pub use transition::{Transition, TransitionCondition, TransitionConditionContext, TransitionDef};
pub use value::{Value, ValueKind};
