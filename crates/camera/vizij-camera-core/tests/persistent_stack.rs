use std::sync::Arc;

use vizij_camera_core::{
    BlendKind, BlendSpec, BlendStatus, CameraPose, EvalResult, FieldOfViewNode, ParamId,
    PersistentStack, RigDefinition, SceneContext, SetPoseNode, StackEventKind, StackRunParams,
    Transition, TransitionCondition,
};
use vizij_camera_fixtures::rigs;

fn approx(a: f32, b: f32, eps: f32) {
    assert!((a - b).abs() <= eps, "left={a} right={b} eps={eps}");
}

fn run(stack: &mut PersistentStack, dt: f32) -> EvalResult {
    let mut out = EvalResult::default();
    stack.run(
        &StackRunParams {
            delta_time: dt,
            stateless: false,
            setters: None,
        },
        &mut out,
    );
    out
}

fn posed(name: &str, x: f32) -> RigDefinition {
    RigDefinition::new(name).with_root(Arc::new(SetPoseNode::new(CameraPose::at([x, 0.0, 0.0]))))
}

fn linear(name: &str, seconds: f32) -> Transition {
    Transition::new(name).with_blend(BlendSpec::Linear {
        blend_time: seconds,
    })
}

#[test]
fn inserting_the_same_rig_context_and_key_twice_yields_one_entry() {
    let ctx = SceneContext::shared("player");
    let rig = rigs::load("static_wide").unwrap();
    let mut stack = PersistentStack::default();

    assert!(stack.insert(Arc::clone(&rig), &ctx, 3, false, None).is_some());
    assert!(stack.insert(Arc::clone(&rig), &ctx, 3, false, None).is_none());
    assert_eq!(stack.len(), 1);

    assert!(stack.insert(Arc::clone(&rig), &ctx, 4, false, None).is_some());
    assert!(stack.insert(rig, &ctx, 3, true, None).is_some());
    assert_eq!(stack.len(), 3);
    assert_eq!(stack.extra_infos().len(), 3);
}

#[test]
fn higher_keys_composite_on_top() {
    let ctx = SceneContext::shared("player");
    let mut stack = PersistentStack::default();
    stack.insert(Arc::new(posed("top", 7.0)), &ctx, 10, false, None);
    stack.insert(Arc::new(posed("bottom", 1.0)), &ctx, -5, false, None);

    let names: Vec<&str> = stack.entries().iter().map(|e| e.rig().name.as_str()).collect();
    assert_eq!(names, vec!["bottom", "top"]);
    let out = run(&mut stack, 0.016);
    assert_eq!(out.pose.position[0], 7.0);
}

#[test]
fn insert_reports_the_enter_transition() {
    let ctx = SceneContext::shared("player");
    let mut stack = PersistentStack::default();
    stack.insert(rigs::load("aim").unwrap(), &ctx, 0, false, None);
    let events = stack.take_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, StackEventKind::Inserted);
    assert_eq!(events[0].transition_name(), Some("to-aim"));
    assert_eq!(events[0].entry.context, "player");
}

#[test]
fn removing_mid_blend_in_wraps_the_exit_blend_in_an_interruption() {
    let ctx = SceneContext::shared("player");
    let mut stack = PersistentStack::default();
    stack.insert(Arc::new(posed("ground", 0.0)), &ctx, 0, false, None);
    let id = stack
        .insert(
            Arc::new(
                posed("mover", 10.0)
                    .with_enter_transition(linear("in", 1.0))
                    .with_exit_transition(linear("out", 1.0)),
            ),
            &ctx,
            1,
            false,
            None,
        )
        .unwrap();

    let out = run(&mut stack, 0.3);
    approx(out.pose.position[0], 3.0, 1e-4);
    assert_eq!(stack.blend_status(id), Some(BlendStatus::BlendIn));

    assert!(stack.remove(id, false, None));
    assert_eq!(stack.blend_status(id), Some(BlendStatus::BlendOut));
    let blend = stack.entry(id).unwrap().blend().unwrap();
    assert_eq!(blend.kind(), BlendKind::Interrupted);
    assert_eq!(blend.inner().map(|b| b.kind()), Some(BlendKind::Linear));
    let interrupted = blend.interrupted().unwrap();
    assert_eq!(interrupted.kind(), BlendKind::Linear);
    approx(interrupted.compute_progress(), 0.3, 1e-5);

    // The blend-out starts where the blend-in was.
    let out = run(&mut stack, 0.0);
    approx(out.pose.position[0], 3.0, 1e-4);
    let out = run(&mut stack, 0.5);
    approx(out.pose.position[0], 1.5, 1e-4);

    let out = run(&mut stack, 0.5);
    approx(out.pose.position[0], 0.0, 1e-4);
    assert!(stack.entry(id).is_none());
    assert_eq!(stack.len(), 1);
}

#[test]
fn removing_a_fully_blended_entry_plays_the_reversed_exit() {
    let ctx = SceneContext::shared("player");
    let mut stack = PersistentStack::default();
    stack.insert(Arc::new(posed("ground", 0.0)), &ctx, 0, false, None);
    let id = stack
        .insert(
            Arc::new(posed("mover", 10.0).with_exit_transition(linear("out", 1.0))),
            &ctx,
            1,
            false,
            None,
        )
        .unwrap();
    run(&mut stack, 0.016);
    assert_eq!(stack.blend_status(id), Some(BlendStatus::None));

    stack.remove(id, false, None);
    let blend = stack.entry(id).unwrap().blend().unwrap();
    assert_eq!(blend.kind(), BlendKind::Linear);

    let out = run(&mut stack, 0.25);
    approx(out.pose.position[0], 7.5, 1e-4);
    // A second remove while blending out changes nothing.
    assert!(stack.remove(id, false, None));
    let out = run(&mut stack, 0.25);
    approx(out.pose.position[0], 5.0, 1e-4);
}

#[test]
fn exit_transition_of_the_asset_is_used() {
    let ctx = SceneContext::shared("player");
    let mut stack = PersistentStack::default();
    let id = stack
        .insert(rigs::load("orbit").unwrap(), &ctx, 0, false, None)
        .unwrap();
    run(&mut stack, 0.016);
    stack.take_events();

    stack.remove(id, false, None);
    let events = stack.take_events();
    assert_eq!(events[0].kind, StackEventKind::BlendingOut);
    assert_eq!(events[0].transition_name(), Some("follow-exit"));
    assert_eq!(
        stack.entry(id).unwrap().blend().map(|b| b.kind()),
        Some(BlendKind::SmootherStep)
    );
}

#[test]
fn removal_without_exit_transition_cuts_immediately() {
    let ctx = SceneContext::shared("player");
    let mut stack = PersistentStack::default();
    let id = stack
        .insert(rigs::load("static_wide").unwrap(), &ctx, 0, false, None)
        .unwrap();
    assert!(stack.remove(id, false, None));
    assert!(stack.is_empty());
    assert!(stack
        .take_events()
        .iter()
        .any(|e| e.kind == StackEventKind::Popped));
}

#[test]
fn frozen_flag_selects_the_exit_transition() {
    let ctx = SceneContext::shared("player");
    let mut stack = PersistentStack::default();
    let rig = Arc::new(
        posed("cam", 1.0).with_exit_transition(
            linear("frozen-out", 1.0).with_condition(TransitionCondition::FromFrozen {
                frozen: true,
            }),
        ),
    );
    let frozen = stack.insert(Arc::clone(&rig), &ctx, 0, false, None).unwrap();
    let live = stack.insert(rig, &ctx, 1, false, None).unwrap();
    assert!(stack.freeze(frozen));
    stack.take_events();

    assert!(stack.remove(frozen, false, None));
    assert!(stack.entry(frozen).is_none());
    let events = stack.take_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, StackEventKind::Popped);
    assert_eq!(events[0].transition_name(), Some("frozen-out"));

    stack.remove(live, false, None);
    assert!(stack.entry(live).is_none());
    assert_eq!(stack.take_events()[0].transition_name(), None);
}

#[test]
fn removing_a_frozen_entry_does_not_leave_it_behind() {
    let ctx = SceneContext::shared("player");
    let mut stack = PersistentStack::default();
    let id = stack
        .insert(
            Arc::new(posed("cam", 1.0).with_exit_transition(linear("out", 1.0))),
            &ctx,
            0,
            false,
            None,
        )
        .unwrap();
    run(&mut stack, 0.016);
    assert!(stack.freeze(id));
    assert!(stack.remove(id, false, None));
    for _ in 0..3 {
        run(&mut stack, 1.0);
    }
    assert!(stack.entry(id).is_none());
    assert!(stack.is_empty());
    assert!(stack.extra_infos().is_empty());
}

#[test]
fn higher_entries_see_the_pre_blended_parameters_of_lower_ones() {
    let ctx = SceneContext::shared("player");
    let fov = ParamId::new("fov");
    let mut stack = PersistentStack::default();
    stack.insert(
        Arc::new(
            RigDefinition::new("wide")
                .with_root(Arc::new(FieldOfViewNode::new(fov.clone(), 30.0)))
                .with_parameter(fov.clone(), 30.0f32),
        ),
        &ctx,
        0,
        false,
        None,
    );
    let high = stack
        .insert(
            Arc::new(
                RigDefinition::new("narrow")
                    .with_root(Arc::new(FieldOfViewNode::new(fov.clone(), 90.0)))
                    .with_parameter(fov.clone(), 90.0f32)
                    .with_enter_transition(linear("in", 1.0)),
            ),
            &ctx,
            1,
            false,
            None,
        )
        .unwrap();

    let out = run(&mut stack, 0.5);
    let entry = stack.entry(high).unwrap();
    assert_eq!(entry.parameters().try_get::<f32>(&fov), Some(60.0));
    approx(entry.result().pose.field_of_view, 60.0, 1e-4);
    assert_eq!(stack.pre_blended_parameters().try_get::<f32>(&fov), Some(60.0));
    assert_eq!(out.params.try_get::<f32>(&fov), Some(60.0));
}

#[test]
fn stateless_runs_leave_the_committed_result_for_frozen_replay() {
    let ctx = SceneContext::shared("player");
    let mut stack = PersistentStack::default();
    let id = stack
        .insert(Arc::new(RigDefinition::new("follow")), &ctx, 0, false, None)
        .unwrap();
    ctx.borrow_mut().set_pose(CameraPose::at([1.0, 0.0, 0.0]));
    run(&mut stack, 0.016);

    ctx.borrow_mut().set_pose(CameraPose::at([50.0, 0.0, 0.0]));
    let mut preview = EvalResult::default();
    stack.run(
        &StackRunParams {
            delta_time: 0.016,
            stateless: true,
            setters: None,
        },
        &mut preview,
    );
    assert_eq!(preview.pose.position, [50.0, 0.0, 0.0]);
    assert_eq!(stack.entry(id).unwrap().result().pose.position, [1.0, 0.0, 0.0]);

    stack.freeze(id);
    let out = run(&mut stack, 0.016);
    assert_eq!(out.pose.position, [1.0, 0.0, 0.0]);
}

#[test]
fn remove_all_only_touches_one_context() {
    let a = SceneContext::shared("a");
    let b = SceneContext::shared("b");
    let mut stack = PersistentStack::default();
    stack.insert(Arc::new(posed("1", 1.0)), &a, 0, false, None);
    stack.insert(Arc::new(posed("2", 2.0)), &b, 0, false, None);
    stack.insert(Arc::new(posed("3", 3.0)), &a, 0, false, None);

    assert_eq!(stack.remove_all(&a, true), 2);
    assert_eq!(stack.len(), 1);
    assert_eq!(stack.entries()[0].rig().name, "2");
    assert_eq!(stack.extra_infos().len(), 1);
}

#[test]
fn remove_rig_finds_the_entry_by_rig_and_context() {
    let ctx = SceneContext::shared("player");
    let rig = Arc::new(posed("cam", 1.0));
    let mut stack = PersistentStack::default();
    stack.insert(Arc::clone(&rig), &ctx, 0, false, None);
    assert!(!stack.remove_rig(&rig, &SceneContext::shared("other"), true, None));
    assert!(stack.remove_rig(&rig, &ctx, true, None));
    assert!(stack.is_empty());
}

#[test]
fn frozen_entries_replay_their_last_result() {
    let ctx = SceneContext::shared("player");
    let mut stack = PersistentStack::default();
    let id = stack
        .insert(rigs::load("static_wide").unwrap(), &ctx, 0, false, None)
        .unwrap();
    run(&mut stack, 0.016);
    let before = stack.entry(id).unwrap().result().clone();
    stack.freeze(id);
    ctx.borrow_mut().set_pose(CameraPose::at([3.0, 3.0, 3.0]));
    for _ in 0..5 {
        let out = run(&mut stack, 0.1);
        assert_eq!(out.pose, before.pose);
    }
    assert_eq!(stack.entry(id).unwrap().result(), &before);
}

#[test]
fn dropped_context_keeps_the_entry() {
    let ctx = SceneContext::shared("temporary");
    let mut stack = PersistentStack::default();
    stack.insert(Arc::new(posed("cam", 1.0)), &ctx, 0, false, None);
    drop(ctx);
    let out = run(&mut stack, 0.016);
    assert!(!out.is_valid);
    assert_eq!(stack.len(), 1);
}
