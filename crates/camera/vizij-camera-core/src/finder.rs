//! Transition lookup.
//!
//! Order of the search:
//! 1. a caller-supplied override short-circuits everything
//! 2. exit transitions of the rig being left, then of its asset
//! 3. enter transitions of the rig being entered, then of its asset
//!
//! Within a list the first transition (in declaration order) whose conditions
//! match any (from, to) pairing wins. Combination rigs take part in pairings as
//! themselves and as each of their sub-rigs.

use std::sync::Arc;

use crate::rig::RigDefinition;
use crate::transition::{Transition, TransitionConditionContext};

#[derive(Copy, Clone, Debug, Default)]
pub struct TransitionQuery<'a> {
    pub from_rig: Option<&'a Arc<RigDefinition>>,
    pub from_frozen: bool,
    pub to_rig: Option<&'a Arc<RigDefinition>>,
}

/// Resolve the transition for `query`; `None` means "no transition" (a cut).
pub fn find_transition(
    query: &TransitionQuery<'_>,
    override_transition: Option<&Arc<Transition>>,
) -> Option<Arc<Transition>> {
    if let Some(t) = override_transition {
        return Some(Arc::clone(t));
    }
    find_exit_transition(query).or_else(|| find_enter_transition(query))
}

/// Exit transitions declared on the rig being left, or on its asset.
pub fn find_exit_transition(query: &TransitionQuery<'_>) -> Option<Arc<Transition>> {
    let from = query.from_rig?;
    let mut lists: Vec<&[Arc<Transition>]> = vec![from.exit_transitions.as_slice()];
    if let Some(asset) = &from.asset {
        lists.push(asset.exit_transitions.as_slice());
    }
    search(&lists, query)
}

/// Enter transitions declared on the rig being entered, or on its asset.
pub fn find_enter_transition(query: &TransitionQuery<'_>) -> Option<Arc<Transition>> {
    let to = query.to_rig?;
    let mut lists: Vec<&[Arc<Transition>]> = vec![to.enter_transitions.as_slice()];
    if let Some(asset) = &to.asset {
        lists.push(asset.enter_transitions.as_slice());
    }
    search(&lists, query)
}

fn search(lists: &[&[Arc<Transition>]], query: &TransitionQuery<'_>) -> Option<Arc<Transition>> {
    let froms = expand(query.from_rig);
    let tos = expand(query.to_rig);
    for list in lists {
        for transition in list.iter() {
            for from in &froms {
                for to in &tos {
                    let ctx = TransitionConditionContext {
                        from_rig: *from,
                        from_asset: asset_name(*from),
                        from_frozen: query.from_frozen,
                        to_rig: *to,
                        to_asset: asset_name(*to),
                    };
                    if transition.conditions_match(&ctx) {
                        return Some(Arc::clone(transition));
                    }
                }
            }
        }
    }
    None
}

fn asset_name(rig: Option<&RigDefinition>) -> Option<&str> {
    rig.and_then(|r| r.asset.as_ref()).map(|a| a.name.as_str())
}

/// The rig itself followed by every leaf of its combination tree.
fn expand(rig: Option<&Arc<RigDefinition>>) -> Vec<Option<&RigDefinition>> {
    let mut out = Vec::new();
    match rig {
        Some(rig) => {
            out.push(Some(rig.as_ref()));
            collect_sub_rigs(rig, &mut out);
        }
        None => out.push(None),
    }
    out
}

fn collect_sub_rigs<'a>(rig: &'a RigDefinition, out: &mut Vec<Option<&'a RigDefinition>>) {
    for sub in rig.combination_sub_rigs() {
        if sub.is_combination() {
            collect_sub_rigs(sub, out);
        } else {
            out.push(Some(sub.as_ref()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blend::BlendSpec;
    use crate::rig::RigAsset;
    use crate::transition::TransitionCondition;

    fn named(name: &str) -> Transition {
        Transition::new(name).with_blend(BlendSpec::Pop)
    }

    #[test]
    fn override_short_circuits() {
        let a = Arc::new(RigDefinition::new("a").with_exit_transition(named("exit")));
        let forced = Arc::new(named("forced"));
        let q = TransitionQuery {
            from_rig: Some(&a),
            ..Default::default()
        };
        assert_eq!(find_transition(&q, Some(&forced)).unwrap().name, "forced");
        assert_eq!(find_transition(&q, None).unwrap().name, "exit");
    }

    #[test]
    fn exit_beats_enter_and_rig_beats_asset() {
        let asset = Arc::new(RigAsset::new("asset").with_exit_transition(named("asset-exit")));
        let a = Arc::new(
            RigDefinition::new("a")
                .with_asset(asset.clone())
                .with_exit_transition(
                    named("never").with_condition(TransitionCondition::ToRig {
                        name: "zzz".into(),
                    }),
                ),
        );
        let b = Arc::new(RigDefinition::new("b").with_enter_transition(named("enter-b")));
        let q = TransitionQuery {
            from_rig: Some(&a),
            from_frozen: false,
            to_rig: Some(&b),
        };
        assert_eq!(find_transition(&q, None).unwrap().name, "asset-exit");

        let plain = Arc::new(RigDefinition::new("plain"));
        let q = TransitionQuery {
            from_rig: Some(&plain),
            from_frozen: false,
            to_rig: Some(&b),
        };
        assert_eq!(find_transition(&q, None).unwrap().name, "enter-b");
    }

    #[test]
    fn declaration_order_breaks_ties() {
        let a = Arc::new(
            RigDefinition::new("a")
                .with_exit_transition(named("first"))
                .with_exit_transition(named("second")),
        );
        let q = TransitionQuery {
            from_rig: Some(&a),
            ..Default::default()
        };
        assert_eq!(find_transition(&q, None).unwrap().name, "first");
    }

    #[test]
    fn combination_sub_rigs_take_part_in_matching() {
        let orbit = Arc::new(RigDefinition::new("orbit"));
        let shake = Arc::new(RigDefinition::new("shake"));
        let combo = Arc::new(
            RigDefinition::combine("combo", vec![orbit, shake]).with_exit_transition(
                named("from-shake").with_condition(TransitionCondition::FromRig {
                    name: "shake".into(),
                }),
            ),
        );
        let q = TransitionQuery {
            from_rig: Some(&combo),
            ..Default::default()
        };
        assert_eq!(find_transition(&q, None).unwrap().name, "from-shake");
    }

    #[test]
    fn frozen_flag_is_visible_to_conditions() {
        let a = Arc::new(RigDefinition::new("a").with_exit_transition(
            named("frozen-only").with_condition(TransitionCondition::FromFrozen { frozen: true }),
        ));
        let mut q = TransitionQuery {
            from_rig: Some(&a),
            ..Default::default()
        };
        assert!(find_transition(&q, None).is_none());
        q.from_frozen = true;
        assert_eq!(find_transition(&q, None).unwrap().name, "frozen-only");
    }
}
