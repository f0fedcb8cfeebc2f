//! Proposals and wrapped actions.
//!
//! A proposal is the payload an action produces, tagged with the action
//! name and the id of the machine that owns it. The tag is the wire
//! contract between the engine and the enclosing update loop: acceptors use
//! it to decide whether a proposal is addressed to them.

use crate::core::ids::{ActionId, MachineId};
use serde_json::{Map, Value};
use std::sync::Arc;

/// An intent turns the caller's argument into a proposal payload.
///
/// Intents may do arbitrary work (including having been awaited upstream);
/// by the time one runs here it is a plain synchronous function.
pub type Intent = Arc<dyn Fn(Value) -> Map<String, Value> + Send + Sync>;

/// An action-invocation result, consumed exactly once by the acceptors.
#[derive(Clone, Debug, Default)]
pub struct Proposal {
    pub action: Option<ActionId>,
    pub machine: Option<MachineId>,
    pub payload: Map<String, Value>,
}

impl Proposal {
    /// An untagged proposal carrying only a payload, as produced by actions
    /// that do not belong to any machine.
    pub fn untagged(payload: Map<String, Value>) -> Self {
        Proposal {
            action: None,
            machine: None,
            payload,
        }
    }

    /// Read one payload field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }
}

/// An intent bound to a declared action name and its owning machine.
///
/// Tagging happens when the proposal is produced, so intents resolved
/// asynchronously upstream still end up tagged the same way synchronous
/// ones are.
#[derive(Clone)]
pub struct WrappedAction {
    action: ActionId,
    machine: MachineId,
    intent: Intent,
}

impl WrappedAction {
    pub(crate) fn new(action: ActionId, machine: MachineId, intent: Intent) -> Self {
        WrappedAction {
            action,
            machine,
            intent,
        }
    }

    /// The action name this wrapper was registered under.
    pub fn action(&self) -> &ActionId {
        &self.action
    }

    /// The machine the wrapper belongs to.
    pub fn machine(&self) -> MachineId {
        self.machine
    }

    /// Run the intent and tag the resulting payload.
    pub fn propose(&self, arg: Value) -> Proposal {
        Proposal {
            action: Some(self.action.clone()),
            machine: Some(self.machine),
            payload: (self.intent)(arg),
        }
    }
}

impl std::fmt::Debug for WrappedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WrappedAction")
            .field("action", &self.action)
            .field("machine", &self.machine)
            .finish_non_exhaustive()
    }
}
