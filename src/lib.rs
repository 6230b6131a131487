//! Kirchhoff circuit analysis for networks of batteries, resistors, junctions
//! and ideal wires.
//!
//! Loops are discovered incrementally as wires are connected, loop wires are
//! grouped into branches carrying one current each, and `Circuit::solve`
//! finds every branch current from the junction and loop equations.

mod branch;
mod circuit;
mod element;
mod equations;
mod error;
mod format;
mod loops;
mod netlist;
pub mod solver;

pub use branch::{Branch, BranchId};
pub use circuit::Circuit;
pub use element::{Element, ElementBuilder, ElementId, ElementKind, Wire, WireId};
pub use error::{CircuitError, Result};
pub use format::format_unit_value;
pub use loops::{Loop, LoopBuilder};
pub use netlist::{BranchReport, ElementReport, ElementEntry, NamedCircuit, Netlist, SolveReport};
pub use solver::SolverSettings;
