//! Composite links between a child machine and its parent.
//!
//! A composite link does two things: it gates the child's own transitions
//! on the parent sitting in a given state, and it auto-fires a parent
//! action when the child reaches a given state, forwarding selected model
//! fields as the synthetic proposal payload.

use crate::core::StateId;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Callback that dispatches a forwarded action on the parent machine.
///
/// Receives the synthetic payload; the callback decides how to feed it
/// into the loop, typically through the parent's wrapped action.
pub type ForwardAction = Arc<dyn Fn(Map<String, Value>) + Send + Sync>;

/// Where the parent machine keeps its state, and which of its states gates
/// the child.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParentState {
    pub component: Option<String>,
    pub pc: String,
    pub label: StateId,
}

impl ParentState {
    pub fn new(component: Option<&str>, pc: impl Into<String>, label: impl Into<StateId>) -> Self {
        ParentState {
            component: component.map(str::to_string),
            pc: pc.into(),
            label: label.into(),
        }
    }
}

/// Reaching `on_state` on the child auto-fires `action` on the parent,
/// forwarding the named model fields.
#[derive(Clone)]
pub struct CompositeTransition {
    pub on_state: StateId,
    pub action: ForwardAction,
    pub proposal: Vec<String>,
}

impl fmt::Debug for CompositeTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeTransition")
            .field("on_state", &self.on_state)
            .field("proposal", &self.proposal)
            .finish_non_exhaustive()
    }
}

/// Declaration that a child machine is gated by a parent machine's state.
#[derive(Clone, Debug)]
pub struct CompositeLink {
    pub on_state: ParentState,
    pub transitions: Vec<CompositeTransition>,
}

impl CompositeLink {
    /// A link gated by the given parent state, with no automatic
    /// cross-machine transitions yet.
    pub fn gated_by(on_state: ParentState) -> Self {
        CompositeLink {
            on_state,
            transitions: Vec::new(),
        }
    }

    /// Add an automatic parent transition fired when the child reaches
    /// `on_state`, forwarding the named model fields.
    pub fn transition<F>(
        mut self,
        on_state: impl Into<StateId>,
        action: F,
        proposal: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self
    where
        F: Fn(Map<String, Value>) + Send + Sync + 'static,
    {
        self.transitions.push(CompositeTransition {
            on_state: on_state.into(),
            action: Arc::new(action),
            proposal: proposal.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Action names appended to the disallowed accumulator while the
    /// parent is outside the gating state.
    pub(crate) fn gates(&self) -> &ParentState {
        &self.on_state
    }
}
