//! Lockstep: a finite state machine engine for unidirectional
//! state-update loops.
//!
//! Lockstep compiles a transition specification into the closures a
//! unidirectional action → acceptor → reactor → render loop splices into
//! its own pipeline: acceptors that commit proposals, validators that
//! re-check every state change against the declared transitions, and
//! next-action predicates that auto-fire follow-up actions. Several
//! machines can coexist inside one shared model; every proposal is tagged
//! with the id of the machine that owns it, and a child machine's
//! transitions can be gated on a parent machine's state.
//!
//! # Core Concepts
//!
//! - **Proposal**: the payload an action produces, tagged with its action
//!   name and owning machine id
//! - **Acceptor**: a mutator that commits a proposal's effect onto the
//!   shared model
//! - **Validator (reactor)**: inspects the model after commit and records
//!   inconsistencies on the model's error slot, never throwing
//! - **Nap (next-action predicate)**: a condition/effect pair that
//!   schedules a follow-up action from the current state
//!
//! # Example
//!
//! ```rust
//! use lockstep::core::{Model, StateId, Transition};
//! use lockstep::machine::Machine;
//! use serde_json::Value;
//!
//! let clock = Machine::builder()
//!     .transitions(vec![
//!         Transition::new("TICKED", "TOCKED", "TOCK"),
//!         Transition::new("TOCKED", "TICKED", "TICK"),
//!     ])
//!     .deterministic(true)
//!     .enforce_allowed_transitions(true)
//!     .build()?;
//!
//! let mut model = Model::new();
//! clock.initial_state(&mut model);
//! assert_eq!(model.state_at(None, "pc"), Some(StateId::from("TICKED")));
//!
//! let tock = clock.event("TOCK").propose(Value::Null);
//! for acceptor in clock.acceptors() {
//!     acceptor(&mut model, &tock);
//! }
//! for validator in clock.state_machine() {
//!     validator(&mut model);
//! }
//!
//! assert!(!model.has_error());
//! assert_eq!(model.state_at(None, "pc"), Some(StateId::from("TOCKED")));
//! # Ok::<(), lockstep::machine::BuildError>(())
//! ```

pub mod core;
pub mod machine;

// Re-export commonly used types
pub use core::{
    ActionId, MachineId, Model, Proposal, StateId, StateSpec, StepError, Transition,
    WrappedAction,
};
pub use machine::{
    Acceptor, BuildError, CompositeLink, Machine, Nap, NapOutcome, ParentState, Reactor,
};
