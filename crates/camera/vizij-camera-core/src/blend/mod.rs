//! Blend evaluators: the stateful objects that fade one stack entry over the
//! entries below it.
//!
//! Every evaluator implements the same contract:
//! - `run` advances time, `compute_progress` reports the factor in [0, 1]
//! - `blend_parameters` blends a child parameter table into the output table (pre-blend)
//! - `blend_results` blends a child result into the output result (post-blend)
//! - `set_reversed` / `initialize_from_interruption` report native support;
//!   callers fall back to the [`ReverseBlend`] / [`InterruptedBlend`] adapters
//!   when an evaluator declines.

mod adapters;
mod simple;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::interp::BlendCurve;
use crate::params::ParameterTable;
use crate::result::EvalResult;

pub use adapters::{InterruptedBlend, ReverseBlend};
pub use simple::{PopBlend, SimpleBlend};

/// Status reported by the blend calls.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlendOutcome {
    /// The child fully covers what is underneath.
    pub is_full: bool,
    /// The blend has nothing left to do. May trail `is_full`.
    pub is_finished: bool,
}

impl BlendOutcome {
    pub const DONE: BlendOutcome = BlendOutcome {
        is_full: true,
        is_finished: true,
    };

    pub const PENDING: BlendOutcome = BlendOutcome {
        is_full: false,
        is_finished: false,
    };

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.is_full && self.is_finished
    }
}

#[derive(Copy, Clone, Debug, Default)]
pub struct BlendRunParams {
    pub delta_time: f32,
    /// Speculative evaluation; blend time is not advanced.
    pub stateless: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlendKind {
    Linear,
    SmoothStep,
    SmootherStep,
    Pop,
    Reverse,
    Interrupted,
    Custom,
}

pub trait BlendEvaluator: fmt::Debug {
    fn kind(&self) -> BlendKind;

    /// Advance the blend by one frame.
    fn run(&mut self, params: &BlendRunParams);

    /// Current blend factor, always within [0, 1].
    fn compute_progress(&self) -> f32;

    fn blend_parameters(&mut self, child: &ParameterTable, out: &mut ParameterTable)
        -> BlendOutcome;

    fn blend_results(&mut self, child: &EvalResult, out: &mut EvalResult) -> BlendOutcome;

    /// Pick up from a blend this one interrupts. `false` if unsupported.
    fn initialize_from_interruption(&mut self, _interrupted: &dyn BlendEvaluator) -> bool {
        false
    }

    /// Play back-to-front. `false` if unsupported.
    fn set_reversed(&mut self, _reversed: bool) -> bool {
        false
    }

    /// Wrapped evaluator, for adapters.
    fn inner(&self) -> Option<&dyn BlendEvaluator> {
        None
    }

    /// Evaluator that was interrupted, for the interruption adapter.
    fn interrupted(&self) -> Option<&dyn BlendEvaluator> {
        None
    }
}

/// Builds fresh blend evaluators; held by transitions.
pub trait BlendFactory: fmt::Debug + Send + Sync {
    fn build(&self) -> Box<dyn BlendEvaluator>;
}

/// Data form of the built-in blends.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BlendSpec {
    Pop,
    Linear { blend_time: f32 },
    SmoothStep { blend_time: f32 },
    SmootherStep { blend_time: f32 },
}

impl BlendFactory for BlendSpec {
    fn build(&self) -> Box<dyn BlendEvaluator> {
        match *self {
            BlendSpec::Pop => Box::new(PopBlend::new()),
            BlendSpec::Linear { blend_time } => {
                Box::new(SimpleBlend::new(BlendCurve::Linear, blend_time))
            }
            BlendSpec::SmoothStep { blend_time } => {
                Box::new(SimpleBlend::new(BlendCurve::SmoothStep, blend_time))
            }
            BlendSpec::SmootherStep { blend_time } => {
                Box::new(SimpleBlend::new(BlendCurve::SmootherStep, blend_time))
            }
        }
    }
}

/// Turn a freshly built blend into a blend-out: native reversal first, the
/// [`ReverseBlend`] adapter otherwise.
pub fn make_reversed(mut blend: Box<dyn BlendEvaluator>) -> Box<dyn BlendEvaluator> {
    if blend.set_reversed(true) {
        blend
    } else {
        Box::new(ReverseBlend::new(blend))
    }
}

/// Let `blend` continue from `interrupted`: native support first, the
/// [`InterruptedBlend`] adapter otherwise.
pub fn make_interrupting(
    mut blend: Box<dyn BlendEvaluator>,
    interrupted: Box<dyn BlendEvaluator>,
) -> Box<dyn BlendEvaluator> {
    if blend.initialize_from_interruption(interrupted.as_ref()) {
        blend
    } else {
        Box::new(InterruptedBlend::new(blend, interrupted))
    }
}
