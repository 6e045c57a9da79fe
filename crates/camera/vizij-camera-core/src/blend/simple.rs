//! Time-based blends and the instant cut.

use crate::interp::BlendCurve;
use crate::params::{OverrideFilter, ParameterTable};
use crate::result::EvalResult;

use super::{BlendEvaluator, BlendKind, BlendOutcome, BlendRunParams};

/// Fixed-duration blend shaped by a [`BlendCurve`].
#[derive(Clone, Debug)]
pub struct SimpleBlend {
    curve: BlendCurve,
    blend_time: f32,
    elapsed: f32,
    reversed: bool,
}

impl SimpleBlend {
    pub fn new(curve: BlendCurve, blend_time: f32) -> Self {
        Self {
            curve,
            blend_time: blend_time.max(0.0),
            elapsed: 0.0,
            reversed: false,
        }
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn blend_time(&self) -> f32 {
        self.blend_time
    }

    pub fn is_reversed(&self) -> bool {
        self.reversed
    }

    /// Normalized time; a zero-length blend is complete immediately.
    fn alpha(&self) -> f32 {
        if self.blend_time <= 0.0 {
            1.0
        } else {
            (self.elapsed / self.blend_time).clamp(0.0, 1.0)
        }
    }

    fn outcome(&self) -> BlendOutcome {
        let is_full = self.alpha() >= 1.0;
        BlendOutcome {
            is_full,
            is_finished: is_full,
        }
    }
}

impl BlendEvaluator for SimpleBlend {
    fn kind(&self) -> BlendKind {
        match self.curve {
            BlendCurve::Linear => BlendKind::Linear,
            BlendCurve::SmoothStep => BlendKind::SmoothStep,
            BlendCurve::SmootherStep => BlendKind::SmootherStep,
        }
    }

    fn run(&mut self, params: &BlendRunParams) {
        if !params.stateless {
            self.elapsed += params.delta_time.max(0.0);
        }
    }

    fn compute_progress(&self) -> f32 {
        let factor = self.curve.eval(self.alpha());
        if self.reversed {
            1.0 - factor
        } else {
            factor
        }
    }

    fn blend_parameters(
        &mut self,
        child: &ParameterTable,
        out: &mut ParameterTable,
    ) -> BlendOutcome {
        let factor = self.compute_progress();
        if factor > 0.0 {
            out.lerp(child, factor, OverrideFilter::None);
        }
        self.outcome()
    }

    fn blend_results(&mut self, child: &EvalResult, out: &mut EvalResult) -> BlendOutcome {
        let factor = self.compute_progress();
        if factor > 0.0 {
            out.lerp_from(child, factor);
        }
        self.outcome()
    }

    fn set_reversed(&mut self, reversed: bool) -> bool {
        self.reversed = reversed;
        true
    }
}

/// Instant cut: full and finished on the first call.
#[derive(Clone, Debug, Default)]
pub struct PopBlend {
    reversed: bool,
}

impl PopBlend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlendEvaluator for PopBlend {
    fn kind(&self) -> BlendKind {
        BlendKind::Pop
    }

    fn run(&mut self, _params: &BlendRunParams) {}

    fn compute_progress(&self) -> f32 {
        if self.reversed {
            0.0
        } else {
            1.0
        }
    }

    fn blend_parameters(
        &mut self,
        child: &ParameterTable,
        out: &mut ParameterTable,
    ) -> BlendOutcome {
        if !self.reversed {
            out.override_all(child, false);
        }
        BlendOutcome::DONE
    }

    fn blend_results(&mut self, child: &EvalResult, out: &mut EvalResult) -> BlendOutcome {
        if !self.reversed {
            out.override_from(child);
        }
        out.is_cut = true;
        BlendOutcome::DONE
    }

    fn initialize_from_interruption(&mut self, _interrupted: &dyn BlendEvaluator) -> bool {
        true
    }

    fn set_reversed(&mut self, reversed: bool) -> bool {
        self.reversed = reversed;
        true
    }
}
