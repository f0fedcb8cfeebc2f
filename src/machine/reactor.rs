//! Transition validators: the reactors that re-check commits.
//!
//! The validator runs after the acceptors, re-deriving correctness
//! independently of them. It is the primary detection point for
//! configurations with custom per-state acceptors, where nothing gates a
//! commit up front. It never mutates machine state, only the error slot
//! and the allowed/disallowed accumulators.

use crate::core::{previous_key, ActionId, Model, StepError, NO_ALLOWED_ACTIONS};
use crate::machine::MachineInner;
use std::sync::Arc;

/// A closure invoked once per step, after the acceptors.
pub type Reactor = Box<dyn Fn(&mut Model) + Send + Sync>;

pub(crate) fn build(inner: &Arc<MachineInner>) -> Vec<Reactor> {
    let mut reactors: Vec<Reactor> = vec![validator(Arc::clone(inner))];

    if inner.block_unexpected_actions {
        reactors.push(allowed_actions(Arc::clone(inner)));
    }
    if inner.composite.is_some() {
        reactors.push(composite_gate(Arc::clone(inner)));
    }

    reactors
}

/// Flag a committed step whose action was not legal for the prior state.
fn validator(inner: Arc<MachineInner>) -> Reactor {
    Box::new(move |model| {
        let scope = inner.scope();
        let previous = model.state_at(scope, &previous_key(&inner.pc));
        let current = model.state_at(scope, &inner.pc);
        let action = model.ctx.action.clone();
        let owner = model.ctx.machine;

        if !inner.lax
            && !current
                .as_ref()
                .is_some_and(|state| inner.states.contains_key(state))
        {
            model.set_error(StepError::UnexpectedState {
                state: current.unwrap_or_else(|| "<unset>".into()),
            });
            return;
        }

        let (Some(action), Some(previous)) = (action, previous) else {
            return;
        };
        match inner.states.get(&previous) {
            Some(spec) => {
                // another machine's action is not ours to flag
                if !spec.transitions.contains(&action) && owner == Some(inner.id) {
                    model.set_error(StepError::UnexpectedAction {
                        action,
                        state: current.unwrap_or_else(|| "<unset>".into()),
                    });
                }
            }
            None => {
                // evaluation against an undeclared previous state is
                // rewritten, never propagated
                model.set_error(StepError::Internal {
                    message: format!("unknown state {previous}"),
                    action,
                    state: current.unwrap_or_else(|| "<unset>".into()),
                });
            }
        }
    })
}

/// Accumulate the current state's guard-filtered allowed actions.
fn allowed_actions(inner: Arc<MachineInner>) -> Reactor {
    Box::new(move |model| {
        model.ctx.block_unexpected_actions = true;

        let current = model.state_at(inner.scope(), &inner.pc);
        let mut permitted: Vec<ActionId> = Vec::new();
        if let Some(spec) = current.as_ref().and_then(|state| inner.states.get(state)) {
            let first = spec.transitions.first();
            for transition in &spec.transitions {
                let pass = spec.guards.iter().all(|guard| {
                    // a guard without an explicit action applies to the
                    // state's first declared transition
                    if guard.action.as_ref().or(first) == Some(transition) {
                        (guard.condition)(model)
                    } else {
                        true
                    }
                });
                if pass {
                    permitted.push(transition.clone());
                }
            }
        }

        model.ctx.allowed_actions.extend(permitted);
        if model.ctx.allowed_actions.is_empty() {
            model.ctx.allowed_actions = vec![ActionId::from(NO_ALLOWED_ACTIONS)];
        }
    })
}

/// While the parent machine sits outside the gating state, every one of
/// this machine's actions is disallowed for the step.
fn composite_gate(inner: Arc<MachineInner>) -> Reactor {
    Box::new(move |model| {
        let Some(link) = &inner.composite else {
            return;
        };
        let parent = model.state_at(link.on_state.component.as_deref(), &link.on_state.pc);
        if parent.as_ref() != Some(&link.on_state.label) {
            let own: Vec<ActionId> = inner.actions.keys().cloned().collect();
            model.ctx.disallowed_actions.extend(own);
        }
    })
}
