//! Transition specifications and the spec compiler.
//!
//! Two authoring formats normalize into one canonical specification: an
//! ordered list of `{from, to, on}` edges, or a nested state → action → state
//! map that gets flattened into edges first. The compiled result drives the
//! deterministic acceptor, the validator and the nap scheduler.

use crate::core::ids::{ActionId, StateId};
use crate::core::model::Model;
use crate::core::proposal::Proposal;
use crate::machine::error::BuildError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Pure condition over the model, used by guards and naps.
pub type Predicate = Arc<dyn Fn(&Model) -> bool + Send + Sync>;

/// Side-effecting follow-up fired by the nap scheduler.
pub type Effect = Arc<dyn Fn(&mut Model) + Send + Sync>;

/// Author-supplied acceptor for one state, used in non-deterministic mode.
pub type StateAcceptor = Arc<dyn Fn(&mut Model, &Proposal) + Send + Sync>;

/// One edge of the transition graph.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Transition {
    pub from: StateId,
    pub to: StateId,
    pub on: ActionId,
}

impl Transition {
    pub fn new(from: impl Into<StateId>, to: impl Into<StateId>, on: impl Into<ActionId>) -> Self {
        Transition {
            from: from.into(),
            to: to.into(),
            on: on.into(),
        }
    }
}

/// A guard gates one action out of a state's transition list.
///
/// A guard with no explicit action applies to the state's first declared
/// transition.
#[derive(Clone)]
pub struct GuardSpec {
    pub action: Option<ActionId>,
    pub condition: Predicate,
}

impl GuardSpec {
    /// Guard the state's first declared transition.
    pub fn new<F>(condition: F) -> Self
    where
        F: Fn(&Model) -> bool + Send + Sync + 'static,
    {
        GuardSpec {
            action: None,
            condition: Arc::new(condition),
        }
    }

    /// Guard one named action.
    pub fn for_action<F>(action: impl Into<ActionId>, condition: F) -> Self
    where
        F: Fn(&Model) -> bool + Send + Sync + 'static,
    {
        GuardSpec {
            action: Some(action.into()),
            condition: Arc::new(condition),
        }
    }
}

impl fmt::Debug for GuardSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardSpec")
            .field("action", &self.action)
            .finish_non_exhaustive()
    }
}

/// A next-action predicate: when the owning state is current and the
/// condition holds, the follow-up fires and the step skips its render.
#[derive(Clone)]
pub struct NapSpec {
    pub condition: Predicate,
    pub next_action: Effect,
}

impl NapSpec {
    pub fn new<C, E>(condition: C, next_action: E) -> Self
    where
        C: Fn(&Model) -> bool + Send + Sync + 'static,
        E: Fn(&mut Model) + Send + Sync + 'static,
    {
        NapSpec {
            condition: Arc::new(condition),
            next_action: Arc::new(next_action),
        }
    }
}

impl fmt::Debug for NapSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NapSpec").finish_non_exhaustive()
    }
}

/// Everything declared about one state.
#[derive(Clone, Default)]
pub struct StateSpec {
    /// Exactly the actions valid from this state, in declaration order.
    pub transitions: Vec<ActionId>,
    pub guards: Vec<GuardSpec>,
    pub naps: Vec<NapSpec>,
    /// Per-state acceptor, required in non-deterministic mode.
    pub acceptor: Option<StateAcceptor>,
}

impl StateSpec {
    pub fn with_transitions<I, A>(transitions: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<ActionId>,
    {
        StateSpec {
            transitions: transitions.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn guard(mut self, guard: GuardSpec) -> Self {
        self.guards.push(guard);
        self
    }

    pub fn nap(mut self, nap: NapSpec) -> Self {
        self.naps.push(nap);
        self
    }

    pub fn acceptor<F>(mut self, acceptor: F) -> Self
    where
        F: Fn(&mut Model, &Proposal) + Send + Sync + 'static,
    {
        self.acceptor = Some(Arc::new(acceptor));
        self
    }
}

impl fmt::Debug for StateSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateSpec")
            .field("transitions", &self.transitions)
            .field("guards", &self.guards.len())
            .field("naps", &self.naps.len())
            .field("has_acceptor", &self.acceptor.is_some())
            .finish()
    }
}

/// Action name → single-element list of the destination reached when the
/// action fires. Deterministic mode assumes one destination per name.
pub type ActionTable = IndexMap<ActionId, Vec<StateId>>;

/// The canonical compiled specification of one machine.
#[derive(Clone)]
pub struct MachineSpec {
    /// Initial state: the `from` of the first edge.
    pub pc0: StateId,
    pub states: IndexMap<StateId, StateSpec>,
    pub actions: ActionTable,
    pub deterministic: bool,
    pub enforce_allowed_transitions: bool,
}

impl fmt::Debug for MachineSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MachineSpec")
            .field("pc0", &self.pc0)
            .field("states", &self.states)
            .field("actions", &self.actions)
            .field("deterministic", &self.deterministic)
            .field(
                "enforce_allowed_transitions",
                &self.enforce_allowed_transitions,
            )
            .finish()
    }
}

/// Flatten a nested state → action → state map into an edge list, outer
/// keys first, inner keys in declaration order.
pub fn flatten_transitions(
    nested: &IndexMap<StateId, IndexMap<ActionId, StateId>>,
) -> Vec<Transition> {
    nested
        .iter()
        .flat_map(|(from, by_action)| {
            by_action.iter().map(|(on, to)| Transition {
                from: from.clone(),
                to: to.clone(),
                on: on.clone(),
            })
        })
        .collect()
}

/// Compile an ordered edge list into the canonical specification.
///
/// The first time a state is seen as a `from`, its transition list starts
/// with that edge's action; later edges from the same state append in
/// order. A state only ever seen as a `to` still gets an entry with an
/// empty transition list, except that a self-loop seeds a one-element list.
/// When the same action name is routed to a different destination later,
/// the last write wins; the overwrite is logged, not rejected, because
/// deterministic tables treat action names as globally unique.
pub fn actions_and_states_for(edges: &[Transition]) -> Result<MachineSpec, BuildError> {
    let first = edges.first().ok_or(BuildError::EmptyTransitions)?;

    let mut states: IndexMap<StateId, StateSpec> = IndexMap::new();
    let mut actions: ActionTable = IndexMap::new();

    for edge in edges {
        states
            .entry(edge.from.clone())
            .or_default()
            .transitions
            .push(edge.on.clone());
        states.entry(edge.to.clone()).or_default();

        if let Some(previous) = actions.get(&edge.on) {
            if previous.first() != Some(&edge.to) {
                warn!(
                    action = %edge.on,
                    previous = %previous[0],
                    next = %edge.to,
                    "action re-routed to a different destination, last write wins"
                );
            }
        }
        actions.insert(edge.on.clone(), vec![edge.to.clone()]);
    }

    Ok(MachineSpec {
        pc0: first.from.clone(),
        states,
        actions,
        deterministic: true,
        enforce_allowed_transitions: true,
    })
}
