//! Core value types of the engine.
//!
//! This module contains everything that is data rather than behavior:
//! - Identifier newtypes for states, actions and machine instances
//! - The shared model, its value accessor and per-step context
//! - Proposals and wrapped actions (the wire contract with the driver)
//! - Transition specifications and the spec compiler

mod ids;
mod model;
mod proposal;
mod spec;

pub use ids::{ActionId, MachineId, StateId};
pub use model::{Model, StepError, NO_ALLOWED_ACTIONS};
pub use proposal::{Intent, Proposal, WrappedAction};
pub use spec::{
    actions_and_states_for, flatten_transitions, ActionTable, Effect, GuardSpec, MachineSpec,
    NapSpec, Predicate, StateAcceptor, StateSpec, Transition,
};

pub(crate) use model::previous_key;
