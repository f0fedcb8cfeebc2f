//! Construction errors for machine builders.

use crate::core::{ActionId, StateId};
use thiserror::Error;

/// Errors raised at machine-construction time. These are the only errors
/// the engine ever raises to the caller; everything that happens during
/// steady-state operation is recorded on the model's error slot instead.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("No transition graph supplied. Provide .transitions(..), .nested(..) or .states(..)")]
    MissingGraph,

    #[error("Transition list is empty. Add at least one edge")]
    EmptyTransitions,

    #[error("Initial state not specified. Call .initial(state) when supplying an explicit states map")]
    MissingInitialState,

    #[error("Deterministic mode needs an action table. Supply .actions(..) or author the graph as transitions")]
    MissingActionTable,

    #[error("addAction invalid action: {0}")]
    InvalidAction(ActionId),

    #[error("Non-deterministic mode requires an acceptor for state '{0}'")]
    MissingStateAcceptor(StateId),
}
