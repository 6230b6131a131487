//! Error types for circuit topology and solving.

use thiserror::Error;

use crate::element::{ElementId, WireId};

#[derive(Debug, Error, PartialEq)]
pub enum CircuitError {
    #[error("element {0} is not part of this circuit")]
    UnknownElement(ElementId),

    #[error("wire {0} is not part of this circuit")]
    UnknownWire(WireId),

    #[error("a wire cannot connect element {0} to itself")]
    SelfLoop(ElementId),

    #[error("element {element} already uses all of its {pins} pins")]
    PinsExhausted { element: ElementId, pins: usize },

    #[error("element {0} does not have exactly two pins")]
    NotTwoPin(ElementId),

    #[error("wire {wire} is not connected to element {element}")]
    WireNotIncident { wire: WireId, element: ElementId },

    #[error("wire {wire} cannot be both terminals of element {element}")]
    SameTerminal { wire: WireId, element: ElementId },

    #[error("a loop can only be built from a closed path")]
    IncompleteLoop,

    #[error("singular matrix: no usable pivot in column {column}")]
    SingularMatrix { column: usize },

    #[error("only {rank} independent equations for {unknowns} branch currents")]
    RankDeficient { rank: usize, unknowns: usize },

    #[error("invalid matrix dimensions: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("netlist error: {0}")]
    Netlist(String),
}

pub type Result<T, E = CircuitError> = std::result::Result<T, E>;
