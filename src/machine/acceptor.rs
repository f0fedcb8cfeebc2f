//! Transition acceptors: the mutators that commit proposals to the model.
//!
//! Every machine contributes an ordered acceptor list: first the
//! bookkeeping closures that record the acting action and reset the
//! per-step accumulators, then the transition acceptor itself (one
//! table-driven closure in deterministic mode, the author's per-state
//! acceptors otherwise).

use crate::core::{previous_key, Model, Proposal, StateId, StepError};
use crate::machine::{AcceptorStrategy, MachineInner};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

/// A mutator invoked once per proposal.
pub type Acceptor = Box<dyn Fn(&mut Model, &Proposal) + Send + Sync>;

pub(crate) fn build(inner: &Arc<MachineInner>) -> Vec<Acceptor> {
    let mut acceptors: Vec<Acceptor> = vec![
        // record the acting action and its owner before anything is tested
        Box::new(|model, proposal| {
            model.ctx.action = proposal.action.clone();
            model.ctx.machine = proposal.machine;
        }),
        // the guard-reporting accumulators are per step
        Box::new(|model, _| {
            model.ctx.allowed_actions.clear();
            model.ctx.disallowed_actions.clear();
        }),
    ];

    match inner.strategy {
        AcceptorStrategy::Deterministic => {
            acceptors.push(deterministic(Arc::clone(inner)));
        }
        AcceptorStrategy::PerState => {
            for spec in inner.states.values() {
                // build() guarantees per-state acceptors exist
                if let Some(state_acceptor) = spec.acceptor.clone() {
                    acceptors.push(Box::new(move |model, proposal| {
                        state_acceptor(model, proposal);
                    }));
                }
            }
        }
    }

    acceptors
}

/// The single table-driven acceptor of deterministic mode.
fn deterministic(inner: Arc<MachineInner>) -> Acceptor {
    Box::new(move |model, proposal| {
        // ownership filter: untagged proposals pass, foreign ones do not
        if proposal.machine.is_some() && proposal.machine != Some(inner.id) {
            return;
        }
        let Some(action) = proposal.action.as_ref() else {
            return;
        };

        let scope = inner.scope();
        let current = model.state_at(scope, &inner.pc);
        let permitted = !inner.enforce_allowed_transitions
            || current
                .as_ref()
                .and_then(|state| inner.states.get(state))
                .is_some_and(|spec| spec.transitions.contains(action));

        if permitted {
            match inner.actions.get(action).and_then(|dest| dest.first()) {
                Some(destination) => {
                    let history = model
                        .value(scope, &inner.pc)
                        .cloned()
                        .unwrap_or(Value::Null);
                    model.set_value(scope, &previous_key(&inner.pc), history);
                    model.set_value(scope, &inner.pc, json!(destination.as_str()));
                    debug!(
                        machine = %inner.id,
                        action = %action,
                        from = current.as_ref().map(StateId::as_str),
                        to = %destination,
                        "transition committed"
                    );
                }
                None => {
                    // only reachable with enforcement off and an action
                    // name absent from the table
                    model.set_error(StepError::Internal {
                        message: format!("no destination for action {action}"),
                        action: action.clone(),
                        state: unset_or(current),
                    });
                }
            }
        } else {
            let state = unset_or(current);
            match &inner.composite {
                Some(link) => {
                    let own_action = inner.actions.contains_key(action);
                    let parent =
                        model.state_at(link.on_state.component.as_deref(), &link.on_state.pc);
                    if own_action && parent.as_ref() == Some(&link.on_state.label) {
                        model.set_error(StepError::UnexpectedAction {
                            action: action.clone(),
                            state,
                        });
                    } else {
                        // foreign-context action while the parent gates us
                        // off: drop without surfacing noise
                        debug!(
                            machine = %inner.id,
                            action = %action,
                            "action dropped outside composite gating state"
                        );
                    }
                }
                None => {
                    model.set_error(StepError::UnexpectedAction {
                        action: action.clone(),
                        state,
                    });
                }
            }
        }
    })
}

fn unset_or(state: Option<StateId>) -> StateId {
    state.unwrap_or_else(|| StateId::from("<unset>"))
}
