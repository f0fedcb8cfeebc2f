//! The shared model and its per-step bookkeeping.
//!
//! The model is owned by the enclosing update loop and passed to the engine
//! by mutable reference for the duration of one call. Machine state lives in
//! named fields (the "program counter" and its one-generation history),
//! either at the root or inside a named component's local state. Everything
//! the engine records about the step in flight — last action, owning
//! machine, error slot, allowed/disallowed accumulators — lives in a typed
//! [`StepContext`] instead of dynamically poked fields.

use crate::core::ids::{ActionId, MachineId, StateId};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

/// Sentinel pushed into the allowed-actions accumulator when guard
/// filtering leaves no permitted action, so downstream consumers can tell
/// "nothing allowed" apart from "nobody computed the set".
pub const NO_ALLOWED_ACTIONS: &str = "__EMPTY";

/// Non-fatal errors recorded on the model's error slot.
///
/// These never propagate as `Err` through the update loop; the driver
/// inspects and clears the slot after each render.
#[derive(Clone, PartialEq, Eq, Debug, Error)]
pub enum StepError {
    /// The action taken was not legal for the state it was taken from.
    #[error("unexpected action {action} for state: {state}")]
    UnexpectedAction { action: ActionId, state: StateId },

    /// The current state is not a declared state label (non-lax mode only).
    #[error("unexpected state: {state}")]
    UnexpectedState { state: StateId },

    /// Validator evaluation itself failed, e.g. the previous state is
    /// absent from the specification.
    #[error("unexpected error: {message} for action {action} and state: {state}")]
    Internal {
        message: String,
        action: ActionId,
        state: StateId,
    },
}

/// Transient bookkeeping for the proposal currently moving through the
/// acceptor → validator → nap pipeline.
#[derive(Clone, Debug, Default)]
pub struct StepContext {
    pub(crate) action: Option<ActionId>,
    pub(crate) machine: Option<MachineId>,
    pub(crate) error: Option<StepError>,
    pub(crate) allowed_actions: Vec<ActionId>,
    pub(crate) disallowed_actions: Vec<ActionId>,
    pub(crate) block_unexpected_actions: bool,
}

/// The shared mutable model.
///
/// Dynamic application fields are JSON values; component-scoped machine
/// state lives in per-component maps created on first write.
///
/// # Example
///
/// ```rust
/// use lockstep::core::Model;
/// use serde_json::json;
///
/// let mut model = Model::new();
/// model.set_value(None, "counter", json!(10));
/// model.set_value(Some("launcher"), "pc", json!("ready"));
///
/// assert_eq!(model.value(None, "counter"), Some(&json!(10)));
/// assert_eq!(model.value(Some("launcher"), "pc"), Some(&json!("ready")));
/// assert_eq!(model.value(Some("launcher"), "counter"), None);
/// ```
#[derive(Clone, Debug, Default)]
pub struct Model {
    root: Map<String, Value>,
    components: BTreeMap<String, Map<String, Value>>,
    pub(crate) ctx: StepContext,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a model from a JSON object of initial application fields.
    pub fn with_values(values: Map<String, Value>) -> Self {
        Model {
            root: values,
            ..Self::default()
        }
    }

    /// Read a field, either from the root or from a named component's
    /// local state.
    pub fn value(&self, component: Option<&str>, key: &str) -> Option<&Value> {
        match component {
            Some(name) => self.components.get(name).and_then(|local| local.get(key)),
            None => self.root.get(key),
        }
    }

    /// Write a field, creating the component's local state on first write.
    pub fn set_value(&mut self, component: Option<&str>, key: &str, value: Value) {
        match component {
            Some(name) => {
                self.components
                    .entry(name.to_string())
                    .or_default()
                    .insert(key.to_string(), value);
            }
            None => {
                self.root.insert(key.to_string(), value);
            }
        }
    }

    /// Read a field as a state label, if it holds a string.
    pub fn state_at(&self, component: Option<&str>, key: &str) -> Option<StateId> {
        self.value(component, key)
            .and_then(Value::as_str)
            .map(StateId::from)
    }

    /// The name of the action whose proposal is currently being processed.
    pub fn last_action(&self) -> Option<&ActionId> {
        self.ctx.action.as_ref()
    }

    /// The machine that owns the current proposal, when it was tagged.
    pub fn last_action_owner(&self) -> Option<MachineId> {
        self.ctx.machine
    }

    pub fn error(&self) -> Option<&StepError> {
        self.ctx.error.as_ref()
    }

    pub fn has_error(&self) -> bool {
        self.ctx.error.is_some()
    }

    pub fn clear_error(&mut self) {
        self.ctx.error = None;
    }

    pub(crate) fn set_error(&mut self, error: StepError) {
        self.ctx.error = Some(error);
    }

    /// Actions the current state permits, as accumulated by validators with
    /// `block_unexpected_actions` enabled. Contains the single sentinel
    /// [`NO_ALLOWED_ACTIONS`] when the filtered set came out empty.
    pub fn allowed_actions(&self) -> &[ActionId] {
        &self.ctx.allowed_actions
    }

    /// Actions currently gated off, e.g. a composite child's whole action
    /// set while its parent sits outside the gating state.
    pub fn disallowed_actions(&self) -> &[ActionId] {
        &self.ctx.disallowed_actions
    }

    /// Whether some machine on this model computes the allowed-action set.
    pub fn blocks_unexpected_actions(&self) -> bool {
        self.ctx.block_unexpected_actions
    }
}

/// Key of the one-generation history slot for a program-counter field.
pub(crate) fn previous_key(pc: &str) -> String {
    format!("{pc}_1")
}
