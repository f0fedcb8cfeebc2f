//! The next-action-predicate scheduler.
//!
//! Naps are a lazy, finite, restartable sequence of predicates over the
//! model. Each step the driver walks them in order; a predicate whose
//! state matches the current state and whose condition holds fires its
//! follow-up action and reports [`NapOutcome::Scheduled`], telling the
//! driver to skip this step's render because another action is on its way.
//!
//! Plain naps come first, in state-declaration order; composite
//! cross-machine naps follow, in declaration order. Predicates belonging
//! to other states simply report [`NapOutcome::Idle`], so the per-step
//! cost is constant in the total predicate count.

use crate::core::Model;
use crate::machine::MachineInner;
use serde_json::Map;
use std::sync::Arc;

/// What a next-action predicate decided for this step.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum NapOutcome {
    /// The condition held and the follow-up action was fired; the driver
    /// must not render this step.
    Scheduled,
    /// Condition not met (or not this predicate's state); the step
    /// proceeds normally.
    Idle,
}

/// A next-action predicate.
pub type Nap = Box<dyn Fn(&mut Model) -> NapOutcome + Send + Sync>;

pub(crate) fn build(inner: &Arc<MachineInner>) -> Vec<Nap> {
    let mut naps: Vec<Nap> = Vec::new();

    for (label, spec) in &inner.states {
        for nap in &spec.naps {
            let inner = Arc::clone(inner);
            let label = label.clone();
            let condition = Arc::clone(&nap.condition);
            let next_action = Arc::clone(&nap.next_action);
            naps.push(Box::new(move |model| {
                let current = model.state_at(inner.scope(), &inner.pc);
                if current.as_ref() == Some(&label) && condition(model) {
                    next_action(model);
                    NapOutcome::Scheduled
                } else {
                    NapOutcome::Idle
                }
            }));
        }
    }

    if let Some(link) = &inner.composite {
        for transition in &link.transitions {
            let inner = Arc::clone(inner);
            let transition = transition.clone();
            naps.push(Box::new(move |model| {
                let current = model.state_at(inner.scope(), &inner.pc);
                if current.as_ref() == Some(&transition.on_state) {
                    let mut payload = Map::new();
                    for key in &transition.proposal {
                        if let Some(value) = model.value(None, key) {
                            payload.insert(key.clone(), value.clone());
                        }
                    }
                    (transition.action)(payload);
                    NapOutcome::Scheduled
                } else {
                    NapOutcome::Idle
                }
            }));
        }
    }

    naps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{NapSpec, StateId, StateSpec};
    use crate::machine::{CompositeLink, Machine, ParentState};
    use serde_json::{json, Value};
    use std::sync::Mutex;

    fn ticker() -> Machine {
        Machine::builder()
            .initial("TICKED")
            .state(
                "TICKED",
                StateSpec::with_transitions(["TOCK"]).nap(NapSpec::new(
                    |model: &Model| {
                        model
                            .value(None, "counter")
                            .and_then(Value::as_i64)
                            .is_some_and(|counter| counter > 0)
                    },
                    |model: &mut Model| {
                        model.set_value(None, "ticked", json!(true));
                    },
                )),
            )
            .state("TOCKED", StateSpec::with_transitions(["TICK"]))
            .action("TOCK", "TOCKED")
            .action("TICK", "TICKED")
            .deterministic(true)
            .build()
            .unwrap()
    }

    #[test]
    fn nap_schedules_when_its_condition_holds() {
        let machine = ticker();
        let mut model = Model::new();
        machine.initial_state(&mut model);
        model.set_value(None, "counter", json!(10));

        let naps = machine.naps();
        assert_eq!(naps.len(), 1);
        assert_eq!(naps[0](&mut model), NapOutcome::Scheduled);
        assert_eq!(model.value(None, "ticked"), Some(&json!(true)));
    }

    #[test]
    fn nap_is_idle_when_its_condition_fails() {
        let machine = ticker();
        let mut model = Model::new();
        machine.initial_state(&mut model);
        model.set_value(None, "counter", json!(0));

        let naps = machine.naps();
        assert_eq!(naps[0](&mut model), NapOutcome::Idle);
        assert_eq!(model.value(None, "ticked"), None);
    }

    #[test]
    fn nap_is_idle_outside_its_state() {
        let machine = ticker();
        let mut model = Model::new();
        model.set_value(None, "pc", json!("TOCKED"));
        model.set_value(None, "counter", json!(10));

        let naps = machine.naps();
        assert_eq!(naps[0](&mut model), NapOutcome::Idle);
    }

    #[test]
    fn naps_preserve_declaration_order_within_a_state() {
        let fired = Arc::new(Mutex::new(Vec::new()));
        let first = Arc::clone(&fired);
        let second = Arc::clone(&fired);

        let machine = Machine::builder()
            .initial("counting")
            .state(
                "counting",
                StateSpec::with_transitions(["STOP"])
                    .nap(NapSpec::new(
                        |_| true,
                        move |_| first.lock().unwrap().push("first"),
                    ))
                    .nap(NapSpec::new(
                        |_| true,
                        move |_| second.lock().unwrap().push("second"),
                    )),
            )
            .state("stopped", StateSpec::with_transitions([] as [&str; 0]))
            .action("STOP", "stopped")
            .deterministic(true)
            .build()
            .unwrap();

        let mut model = Model::new();
        machine.initial_state(&mut model);
        for nap in machine.naps() {
            // a real driver would stop at the first Scheduled; evaluating
            // all of them here shows declaration order
            nap(&mut model);
        }

        assert_eq!(*fired.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn composite_nap_forwards_the_named_fields() {
        let forwarded = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&forwarded);

        let machine = Machine::builder()
            .transitions(vec![crate::core::Transition::new(
                "armed", "fired", "FIRE",
            )])
            .deterministic(true)
            .composite(
                CompositeLink::gated_by(ParentState::new(None, "parent_pc", "ready"))
                    .transition(
                        "fired",
                        move |payload| {
                            *sink.lock().unwrap() = Some(payload);
                        },
                        ["counter"],
                    ),
            )
            .build()
            .unwrap();

        let mut model = Model::new();
        model.set_value(None, "pc", json!("fired"));
        model.set_value(None, "counter", json!(7));
        model.set_value(None, "ignored", json!("x"));

        let naps = machine.naps();
        assert_eq!(naps.len(), 1);
        assert_eq!(naps[0](&mut model), NapOutcome::Scheduled);

        let payload = forwarded.lock().unwrap().clone().unwrap();
        assert_eq!(payload.get("counter"), Some(&json!(7)));
        assert!(!payload.contains_key("ignored"));
    }

    #[test]
    fn composite_nap_is_idle_outside_its_trigger_state() {
        let machine = Machine::builder()
            .transitions(vec![crate::core::Transition::new(
                "armed", "fired", "FIRE",
            )])
            .deterministic(true)
            .composite(
                CompositeLink::gated_by(ParentState::new(None, "parent_pc", "ready"))
                    .transition("fired", |_| {}, [] as [&str; 0]),
            )
            .build()
            .unwrap();

        let mut model = Model::new();
        model.set_value(None, "pc", json!("armed"));

        assert_eq!(machine.naps()[0](&mut model), NapOutcome::Idle);
    }

    #[test]
    fn plain_naps_come_before_composite_naps() {
        let machine = Machine::builder()
            .initial("armed")
            .state(
                "armed",
                StateSpec::with_transitions(["FIRE"]).nap(NapSpec::new(|_| false, |_| {})),
            )
            .state("fired", StateSpec::with_transitions([] as [&str; 0]))
            .action("FIRE", "fired")
            .deterministic(true)
            .composite(
                CompositeLink::gated_by(ParentState::new(None, "parent_pc", "ready"))
                    .transition("fired", |_| {}, [] as [&str; 0]),
            )
            .build()
            .unwrap();

        let mut model = Model::new();
        model.set_value(None, "pc", json!("fired"));

        let naps = machine.naps();
        assert_eq!(naps.len(), 2);
        // the plain nap belongs to "armed" and stays idle; the composite
        // one fires on "fired"
        assert_eq!(naps[0](&mut model), NapOutcome::Idle);
        assert_eq!(naps[1](&mut model), NapOutcome::Scheduled);
    }
}
