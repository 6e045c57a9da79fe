//! Transitions: declarative rules choosing the blend played between two rigs.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::blend::{BlendFactory, BlendSpec};
use crate::error::CameraError;
use crate::rig::RigDefinition;

/// What a condition sees when a transition is being resolved.
#[derive(Copy, Clone, Debug, Default)]
pub struct TransitionConditionContext<'a> {
    pub from_rig: Option<&'a RigDefinition>,
    pub from_asset: Option<&'a str>,
    pub from_frozen: bool,
    pub to_rig: Option<&'a RigDefinition>,
    pub to_asset: Option<&'a str>,
}

/// One match condition; a transition matches when all of its conditions do.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TransitionCondition {
    FromRig { name: String },
    ToRig { name: String },
    FromAsset { name: String },
    ToAsset { name: String },
    FromFrozen { frozen: bool },
    /// Nothing is being left (first rig on a stack).
    FromNone,
    /// Nothing is being entered (rig leaves without replacement).
    ToNone,
}

impl TransitionCondition {
    pub fn matches(&self, ctx: &TransitionConditionContext<'_>) -> bool {
        match self {
            TransitionCondition::FromRig { name } => ctx.from_rig.is_some_and(|r| &r.name == name),
            TransitionCondition::ToRig { name } => ctx.to_rig.is_some_and(|r| &r.name == name),
            TransitionCondition::FromAsset { name } => ctx.from_asset == Some(name.as_str()),
            TransitionCondition::ToAsset { name } => ctx.to_asset == Some(name.as_str()),
            TransitionCondition::FromFrozen { frozen } => ctx.from_frozen == *frozen,
            TransitionCondition::FromNone => ctx.from_rig.is_none(),
            TransitionCondition::ToNone => ctx.to_rig.is_none(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Transition {
    pub name: String,
    pub conditions: Vec<TransitionCondition>,
    /// `None` is a configuration error; a cut is played instead.
    pub blend: Option<Arc<dyn BlendFactory>>,
    /// Whether a push using this transition may merge into the running entry.
    pub allow_merging: bool,
}

impl Transition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_condition(mut self, condition: TransitionCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn with_blend(mut self, blend: impl BlendFactory + 'static) -> Self {
        self.blend = Some(Arc::new(blend));
        self
    }

    pub fn with_merging(mut self, allow: bool) -> Self {
        self.allow_merging = allow;
        self
    }

    pub fn conditions_match(&self, ctx: &TransitionConditionContext<'_>) -> bool {
        self.conditions.iter().all(|c| c.matches(ctx))
    }

    pub fn validate(&self) -> Result<(), CameraError> {
        if self.blend.is_none() {
            return Err(CameraError::MissingBlend {
                transition: self.name.clone(),
            });
        }
        Ok(())
    }
}

/// Data form of a [`Transition`] using the built-in blends.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TransitionDef {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub conditions: Vec<TransitionCondition>,
    #[serde(default)]
    pub blend: Option<BlendSpec>,
    #[serde(default)]
    pub allow_merging: bool,
}

impl From<TransitionDef> for Transition {
    fn from(def: TransitionDef) -> Self {
        Transition {
            name: def.name,
            conditions: def.conditions,
            blend: def
                .blend
                .map(|spec| Arc::new(spec) as Arc<dyn BlendFactory>),
            allow_merging: def.allow_merging,
        }
    }
}
