//! Machine construction and the instance surface.
//!
//! A [`Machine`] compiles its transition description once, then mints the
//! closures the enclosing update loop splices into its own pipeline:
//! acceptors (mutators), the validator array, and next-action predicates.
//! The machine itself holds no mutable state; everything lives on the
//! shared model.

pub mod acceptor;
pub mod composite;
pub mod error;
pub mod nap;
pub mod reactor;

pub use acceptor::Acceptor;
pub use composite::{CompositeLink, CompositeTransition, ForwardAction, ParentState};
pub use error::BuildError;
pub use nap::{Nap, NapOutcome};
pub use reactor::Reactor;

use crate::core::{
    actions_and_states_for, flatten_transitions, ActionId, ActionTable, MachineId, Model,
    StateId, StateSpec, Transition, WrappedAction,
};
use indexmap::IndexMap;
use serde_json::{json, Map, Value};
use std::sync::Arc;

/// Dispatch strategy chosen once at construction time.
///
/// Deterministic mode installs a single table-driven acceptor for the whole
/// machine; per-state mode installs one author-supplied acceptor per
/// declared state.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum AcceptorStrategy {
    Deterministic,
    PerState,
}

/// Shared, read-only configuration closed over by every closure the
/// machine mints.
pub(crate) struct MachineInner {
    pub(crate) id: MachineId,
    pub(crate) component: Option<String>,
    pub(crate) pc: String,
    pub(crate) pc0: StateId,
    pub(crate) states: IndexMap<StateId, StateSpec>,
    pub(crate) actions: ActionTable,
    pub(crate) composite: Option<CompositeLink>,
    pub(crate) strategy: AcceptorStrategy,
    pub(crate) lax: bool,
    pub(crate) enforce_allowed_transitions: bool,
    pub(crate) block_unexpected_actions: bool,
}

impl MachineInner {
    pub(crate) fn scope(&self) -> Option<&str> {
        self.component.as_deref()
    }
}

/// Fluent builder for a machine.
///
/// Exactly one of `.states(..)`, `.transitions(..)` or `.nested(..)` must
/// describe the graph. An explicit states map is used verbatim (the author
/// takes responsibility for consistency); the other two compile through
/// [`actions_and_states_for`].
pub struct MachineBuilder {
    component: Option<String>,
    pc: String,
    pc0: Option<StateId>,
    actions: Option<ActionTable>,
    transitions: Option<Vec<Transition>>,
    nested: Option<IndexMap<StateId, IndexMap<ActionId, StateId>>>,
    states: Option<IndexMap<StateId, StateSpec>>,
    composite: Option<CompositeLink>,
    deterministic: bool,
    lax: bool,
    enforce_allowed_transitions: bool,
    block_unexpected_actions: bool,
}

impl MachineBuilder {
    fn new() -> Self {
        MachineBuilder {
            component: None,
            pc: "pc".to_string(),
            pc0: None,
            actions: None,
            transitions: None,
            nested: None,
            states: None,
            composite: None,
            deterministic: false,
            lax: true,
            enforce_allowed_transitions: false,
            block_unexpected_actions: false,
        }
    }

    /// Namespace this machine's state under a named component instead of
    /// the model root.
    pub fn component(mut self, name: impl Into<String>) -> Self {
        self.component = Some(name.into());
        self
    }

    /// The field holding the current state label. Defaults to `"pc"`.
    pub fn pc(mut self, key: impl Into<String>) -> Self {
        self.pc = key.into();
        self
    }

    /// Initial state. Required with an explicit states map; otherwise
    /// defaults to the `from` of the first compiled edge.
    pub fn initial(mut self, pc0: impl Into<StateId>) -> Self {
        self.pc0 = Some(pc0.into());
        self
    }

    /// Explicit action table.
    pub fn actions(mut self, actions: ActionTable) -> Self {
        self.actions = Some(actions);
        self
    }

    /// Declare one action and its destination state.
    pub fn action(mut self, name: impl Into<ActionId>, destination: impl Into<StateId>) -> Self {
        self.actions
            .get_or_insert_with(ActionTable::new)
            .insert(name.into(), vec![destination.into()]);
        self
    }

    /// Author the graph as an ordered edge list.
    pub fn transitions(mut self, edges: Vec<Transition>) -> Self {
        self.transitions = Some(edges);
        self
    }

    /// Author the graph as a nested state → action → state map.
    pub fn nested(mut self, nested: IndexMap<StateId, IndexMap<ActionId, StateId>>) -> Self {
        self.nested = Some(nested);
        self
    }

    /// Supply the states map verbatim, skipping compilation.
    pub fn states(mut self, states: IndexMap<StateId, StateSpec>) -> Self {
        self.states = Some(states);
        self
    }

    /// Declare one state of a verbatim states map.
    pub fn state(mut self, label: impl Into<StateId>, spec: StateSpec) -> Self {
        self.states
            .get_or_insert_with(IndexMap::new)
            .insert(label.into(), spec);
        self
    }

    /// Gate this machine's transitions on a parent machine's state.
    pub fn composite(mut self, link: CompositeLink) -> Self {
        self.composite = Some(link);
        self
    }

    /// Install the single table-driven acceptor instead of per-state ones.
    pub fn deterministic(mut self, deterministic: bool) -> Self {
        self.deterministic = deterministic;
        self
    }

    /// In non-lax mode the validator flags current states that are not
    /// declared labels. Defaults to lax.
    pub fn lax(mut self, lax: bool) -> Self {
        self.lax = lax;
        self
    }

    /// Reject actions not listed in the current state's transitions.
    pub fn enforce_allowed_transitions(mut self, enforce: bool) -> Self {
        self.enforce_allowed_transitions = enforce;
        self
    }

    /// Compute the guard-filtered allowed-action set each step.
    pub fn block_unexpected_actions(mut self, block: bool) -> Self {
        self.block_unexpected_actions = block;
        self
    }

    /// Validate the configuration and compile the specification.
    pub fn build(self) -> Result<Machine, BuildError> {
        let (states, compiled_actions, compiled_pc0) = if let Some(states) = self.states {
            // verbatim states map, no compilation
            (states, None, None)
        } else {
            let edges = match (self.transitions, self.nested) {
                (Some(edges), _) => edges,
                (None, Some(nested)) => flatten_transitions(&nested),
                (None, None) => return Err(BuildError::MissingGraph),
            };
            let compiled = actions_and_states_for(&edges)?;
            (compiled.states, Some(compiled.actions), Some(compiled.pc0))
        };

        let actions = self
            .actions
            .or(compiled_actions)
            .unwrap_or_default();
        let pc0 = self
            .pc0
            .or(compiled_pc0)
            .ok_or(BuildError::MissingInitialState)?;

        let strategy = if self.deterministic {
            if actions.is_empty() {
                return Err(BuildError::MissingActionTable);
            }
            AcceptorStrategy::Deterministic
        } else {
            for (label, spec) in &states {
                if spec.acceptor.is_none() {
                    return Err(BuildError::MissingStateAcceptor(label.clone()));
                }
            }
            AcceptorStrategy::PerState
        };

        Ok(Machine {
            inner: Arc::new(MachineInner {
                id: MachineId::generate(),
                component: self.component,
                pc: self.pc,
                pc0,
                states,
                actions,
                composite: self.composite,
                strategy,
                lax: self.lax,
                enforce_allowed_transitions: self.enforce_allowed_transitions,
                block_unexpected_actions: self.block_unexpected_actions,
            }),
        })
    }
}

/// One machine instance.
///
/// The instance owns nothing mutable: its methods mint fresh closures over
/// a shared, read-only compiled specification, so a driver may splice the
/// same machine into its pipeline any number of times.
#[derive(Clone)]
pub struct Machine {
    inner: Arc<MachineInner>,
}

impl Machine {
    pub fn builder() -> MachineBuilder {
        MachineBuilder::new()
    }

    /// The process-unique id proposals are tagged with.
    pub fn id(&self) -> MachineId {
        self.inner.id
    }

    /// The initial state label.
    pub fn pc0(&self) -> &StateId {
        &self.inner.pc0
    }

    /// Seed the model: set the program counter to the initial state and
    /// clear the last-action marker.
    pub fn initial_state(&self, model: &mut Model) {
        model.set_value(
            self.inner.scope(),
            &self.inner.pc,
            json!(self.inner.pc0.as_str()),
        );
        model.ctx.action = None;
    }

    /// Bind an intent to a declared action name.
    ///
    /// Fails when the name is not in the action table; this is the one
    /// fatal, construction-time error of the steady-state surface.
    pub fn add_action<F>(
        &self,
        intent: F,
        name: impl Into<ActionId>,
    ) -> Result<WrappedAction, BuildError>
    where
        F: Fn(Value) -> Map<String, Value> + Send + Sync + 'static,
    {
        let name = name.into();
        if !self.inner.actions.contains_key(&name) {
            return Err(BuildError::InvalidAction(name));
        }
        Ok(WrappedAction::new(name, self.inner.id, Arc::new(intent)))
    }

    /// A proposal factory for a bare event: an empty payload tagged with
    /// the event name and this machine's id. No declaration check, so
    /// drivers can signal through the loop without authoring an intent.
    pub fn event(&self, name: impl Into<ActionId>) -> WrappedAction {
        WrappedAction::new(name.into(), self.inner.id, Arc::new(|_| Map::new()))
    }

    /// The ordered mutator list to splice into the driver's acceptors.
    pub fn acceptors(&self) -> Vec<Acceptor> {
        acceptor::build(&self.inner)
    }

    /// The ordered validator list to splice into the driver's reactors.
    pub fn state_machine(&self) -> Vec<Reactor> {
        reactor::build(&self.inner)
    }

    /// The next-action predicates to splice into the driver's nap list.
    pub fn naps(&self) -> Vec<Nap> {
        nap::build(&self.inner)
    }
}

impl std::fmt::Debug for Machine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Machine")
            .field("id", &self.inner.id)
            .field("component", &self.inner.component)
            .field("pc", &self.inner.pc)
            .field("pc0", &self.inner.pc0)
            .field("strategy", &self.inner.strategy)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StepError;

    fn clock() -> Machine {
        Machine::builder()
            .transitions(vec![
                Transition::new("TICKED", "TOCKED", "TOCK"),
                Transition::new("TOCKED", "TICKED", "TICK"),
            ])
            .deterministic(true)
            .enforce_allowed_transitions(true)
            .build()
            .unwrap()
    }

    #[test]
    fn build_requires_a_graph() {
        let result = Machine::builder().deterministic(true).build();
        assert!(matches!(result, Err(BuildError::MissingGraph)));
    }

    #[test]
    fn verbatim_states_require_an_initial_state() {
        let result = Machine::builder()
            .state("TICKED", StateSpec::with_transitions(["TOCK"]))
            .action("TOCK", "TOCKED")
            .deterministic(true)
            .build();
        assert!(matches!(result, Err(BuildError::MissingInitialState)));
    }

    #[test]
    fn deterministic_mode_requires_an_action_table() {
        let result = Machine::builder()
            .initial("TICKED")
            .state("TICKED", StateSpec::with_transitions(["TOCK"]))
            .deterministic(true)
            .build();
        assert!(matches!(result, Err(BuildError::MissingActionTable)));
    }

    #[test]
    fn per_state_mode_requires_acceptors() {
        let result = Machine::builder()
            .transitions(vec![Transition::new("a", "b", "GO")])
            .build();
        assert!(matches!(
            result,
            Err(BuildError::MissingStateAcceptor(ref label)) if label == &StateId::from("a")
        ));
    }

    #[test]
    fn compiled_pc0_seeds_the_initial_state() {
        let machine = clock();
        let mut model = Model::new();
        machine.initial_state(&mut model);

        assert_eq!(model.state_at(None, "pc"), Some(StateId::from("TICKED")));
        assert!(model.last_action().is_none());
    }

    #[test]
    fn explicit_initial_overrides_the_compiled_one() {
        let machine = Machine::builder()
            .transitions(vec![
                Transition::new("TICKED", "TOCKED", "TOCK"),
                Transition::new("TOCKED", "TICKED", "TICK"),
            ])
            .initial("TOCKED")
            .deterministic(true)
            .build()
            .unwrap();

        let mut model = Model::new();
        machine.initial_state(&mut model);
        assert_eq!(model.state_at(None, "pc"), Some(StateId::from("TOCKED")));
    }

    #[test]
    fn component_machines_seed_their_own_namespace() {
        let machine = Machine::builder()
            .transitions(vec![Transition::new("idle", "busy", "WORK")])
            .component("worker")
            .deterministic(true)
            .build()
            .unwrap();

        let mut model = Model::new();
        machine.initial_state(&mut model);
        assert_eq!(model.state_at(None, "pc"), None);
        assert_eq!(
            model.state_at(Some("worker"), "pc"),
            Some(StateId::from("idle"))
        );
    }

    #[test]
    fn add_action_rejects_undeclared_names() {
        let machine = clock();
        let result = machine.add_action(|_| Map::new(), "EXPLODE");
        match result {
            Err(BuildError::InvalidAction(name)) => {
                assert_eq!(name, ActionId::from("EXPLODE"));
            }
            other => panic!("expected InvalidAction, got {other:?}"),
        }
        assert_eq!(
            BuildError::InvalidAction(ActionId::from("EXPLODE")).to_string(),
            "addAction invalid action: EXPLODE"
        );
    }

    #[test]
    fn event_produces_a_tagged_empty_proposal() {
        let machine = clock();
        let proposal = machine.event("TOCK").propose(Value::Null);

        assert_eq!(proposal.action, Some(ActionId::from("TOCK")));
        assert_eq!(proposal.machine, Some(machine.id()));
        assert!(proposal.payload.is_empty());
    }

    #[test]
    fn machines_get_distinct_ids() {
        assert_ne!(clock().id(), clock().id());
    }

    #[test]
    fn step_errors_never_come_from_build() {
        // the steady-state error type and the build error type are
        // deliberately distinct surfaces
        let step: StepError = StepError::UnexpectedState {
            state: StateId::from("LIMBO"),
        };
        assert_eq!(step.to_string(), "unexpected state: LIMBO");
    }
}
