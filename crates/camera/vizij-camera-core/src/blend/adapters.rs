//! Adapters wrapping blends that lack native reversal or interruption support.

use crate::params::ParameterTable;
use crate::result::EvalResult;

use super::{BlendEvaluator, BlendKind, BlendOutcome, BlendRunParams};

/// Plays the wrapped blend back-to-front.
///
/// The wrapped blend is handed the output as its child and a "child over
/// output" copy as its destination, so it blends from the child toward what
/// lies underneath without knowing it.
#[derive(Debug)]
pub struct ReverseBlend {
    inner: Box<dyn BlendEvaluator>,
    scratch_params: ParameterTable,
    scratch_result: EvalResult,
}

impl ReverseBlend {
    pub fn new(inner: Box<dyn BlendEvaluator>) -> Self {
        Self {
            inner,
            scratch_params: ParameterTable::new(),
            scratch_result: EvalResult::default(),
        }
    }
}

impl BlendEvaluator for ReverseBlend {
    fn kind(&self) -> BlendKind {
        BlendKind::Reverse
    }

    fn run(&mut self, params: &BlendRunParams) {
        self.inner.run(params);
    }

    fn compute_progress(&self) -> f32 {
        1.0 - self.inner.compute_progress()
    }

    fn blend_parameters(
        &mut self,
        child: &ParameterTable,
        out: &mut ParameterTable,
    ) -> BlendOutcome {
        self.scratch_params.clone_from(out);
        self.scratch_params.override_all(child, false);
        let outcome = self.inner.blend_parameters(out, &mut self.scratch_params);
        std::mem::swap(out, &mut self.scratch_params);
        outcome
    }

    fn blend_results(&mut self, child: &EvalResult, out: &mut EvalResult) -> BlendOutcome {
        self.scratch_result.clone_from(out);
        self.scratch_result.override_from(child);
        let outcome = self.inner.blend_results(out, &mut self.scratch_result);
        std::mem::swap(out, &mut self.scratch_result);
        outcome
    }

    fn inner(&self) -> Option<&dyn BlendEvaluator> {
        Some(self.inner.as_ref())
    }
}

/// Runs a new blend on top of the frozen state of the blend it interrupted.
///
/// The interrupted blend is no longer advanced. Each call first blends the
/// child over the output with the interrupted blend's frozen factor, then lets
/// the new blend work against that snapshot, so a blend-out started mid
/// blend-in continues from where the blend-in had reached.
#[derive(Debug)]
pub struct InterruptedBlend {
    child: Box<dyn BlendEvaluator>,
    interrupted: Option<Box<dyn BlendEvaluator>>,
    frozen_params: ParameterTable,
    frozen_result: EvalResult,
}

impl InterruptedBlend {
    pub fn new(child: Box<dyn BlendEvaluator>, interrupted: Box<dyn BlendEvaluator>) -> Self {
        Self {
            child,
            interrupted: Some(interrupted),
            frozen_params: ParameterTable::new(),
            frozen_result: EvalResult::default(),
        }
    }

    /// Progress the interrupted blend had reached when it was cut short.
    pub fn interrupted_progress(&self) -> Option<f32> {
        self.interrupted.as_ref().map(|b| b.compute_progress())
    }
}

impl BlendEvaluator for InterruptedBlend {
    fn kind(&self) -> BlendKind {
        BlendKind::Interrupted
    }

    fn run(&mut self, params: &BlendRunParams) {
        self.child.run(params);
    }

    fn compute_progress(&self) -> f32 {
        self.child.compute_progress()
    }

    fn blend_parameters(
        &mut self,
        child: &ParameterTable,
        out: &mut ParameterTable,
    ) -> BlendOutcome {
        self.frozen_params.clone_from(out);
        match self.interrupted.as_mut() {
            Some(interrupted) => {
                interrupted.blend_parameters(child, &mut self.frozen_params);
            }
            None => self.frozen_params.override_all(child, false),
        }
        self.child.blend_parameters(&self.frozen_params, out)
    }

    fn blend_results(&mut self, child: &EvalResult, out: &mut EvalResult) -> BlendOutcome {
        self.frozen_result.clone_from(out);
        match self.interrupted.as_mut() {
            Some(interrupted) => {
                interrupted.blend_results(child, &mut self.frozen_result);
            }
            None => self.frozen_result.override_from(child),
        }
        self.child.blend_results(&self.frozen_result, out)
    }

    fn inner(&self) -> Option<&dyn BlendEvaluator> {
        Some(self.child.as_ref())
    }

    fn interrupted(&self) -> Option<&dyn BlendEvaluator> {
        self.interrupted.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blend::SimpleBlend;
    use crate::interp::BlendCurve;
    use crate::result::CameraPose;

    fn approx(a: f32, b: f32, eps: f32) {
        assert!((a - b).abs() <= eps, "left={a} right={b} eps={eps}");
    }

    fn at(x: f32) -> EvalResult {
        EvalResult {
            pose: CameraPose::at([x, 0.0, 0.0]),
            is_valid: true,
            ..EvalResult::default()
        }
    }

    /// Blend that cannot reverse itself.
    #[derive(Debug)]
    struct ForwardOnly(SimpleBlend);

    impl BlendEvaluator for ForwardOnly {
        fn kind(&self) -> BlendKind {
            BlendKind::Custom
        }
        fn run(&mut self, params: &BlendRunParams) {
            self.0.run(params)
        }
        fn compute_progress(&self) -> f32 {
            self.0.compute_progress()
        }
        fn blend_parameters(
            &mut self,
            child: &ParameterTable,
            out: &mut ParameterTable,
        ) -> BlendOutcome {
            self.0.blend_parameters(child, out)
        }
        fn blend_results(&mut self, child: &EvalResult, out: &mut EvalResult) -> BlendOutcome {
            self.0.blend_results(child, out)
        }
    }

    fn advance(blend: &mut dyn BlendEvaluator, dt: f32) {
        blend.run(&BlendRunParams {
            delta_time: dt,
            stateless: false,
        });
    }

    #[test]
    fn reverse_plays_wrapped_blend_back_to_front() {
        let mut blend = crate::blend::make_reversed(Box::new(ForwardOnly(SimpleBlend::new(
            BlendCurve::Linear,
            1.0,
        ))));
        assert_eq!(blend.kind(), BlendKind::Reverse);

        let mut out = at(0.0);
        let outcome = blend.blend_results(&at(10.0), &mut out);
        assert!(!outcome.is_full);
        approx(out.pose.position[0], 10.0, 1e-5);

        advance(blend.as_mut(), 0.25);
        let mut out = at(0.0);
        blend.blend_results(&at(10.0), &mut out);
        approx(out.pose.position[0], 7.5, 1e-5);
        approx(blend.compute_progress(), 0.75, 1e-6);

        advance(blend.as_mut(), 1.0);
        let mut out = at(0.0);
        assert!(blend.blend_results(&at(10.0), &mut out).is_complete());
        approx(out.pose.position[0], 0.0, 1e-5);
    }

    #[test]
    fn reverse_keeps_parameters_the_child_does_not_touch() {
        let mut blend = ReverseBlend::new(Box::new(ForwardOnly(SimpleBlend::new(
            BlendCurve::Linear,
            1.0,
        ))));
        let mut out = ParameterTable::new();
        out.set("below".into(), 1.0f32);
        let mut child = ParameterTable::new();
        child.set("dist".into(), 4.0f32);
        blend.blend_parameters(&child, &mut out);
        assert_eq!(out.try_get::<f32>(&"below".into()), Some(1.0));
        assert_eq!(out.try_get::<f32>(&"dist".into()), Some(4.0));
    }

    #[test]
    fn interrupted_blend_out_starts_from_interrupted_state() {
        let mut enter = SimpleBlend::new(BlendCurve::Linear, 1.0);
        advance(&mut enter, 0.3);

        let mut exit = SimpleBlend::new(BlendCurve::Linear, 1.0);
        exit.set_reversed(true);
        let mut blend = InterruptedBlend::new(Box::new(exit), Box::new(enter));
        approx(blend.interrupted_progress().unwrap(), 0.3, 1e-6);

        let mut out = at(0.0);
        blend.blend_results(&at(10.0), &mut out);
        approx(out.pose.position[0], 3.0, 1e-4);

        advance(&mut blend, 0.5);
        let mut out = at(0.0);
        blend.blend_results(&at(10.0), &mut out);
        approx(out.pose.position[0], 1.5, 1e-4);

        advance(&mut blend, 0.5);
        let mut out = at(0.0);
        assert!(blend.blend_results(&at(10.0), &mut out).is_complete());
        approx(out.pose.position[0], 0.0, 1e-4);
    }
}
