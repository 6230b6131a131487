//! JSON netlists: named elements plus the wires between them, connected in
//! file order.

use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::circuit::Circuit;
use crate::element::{ElementBuilder, ElementId, ElementKind};
use crate::error::{CircuitError, Result};

/// One element of a netlist
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementEntry {
    pub name: String,
    pub kind: ElementKind,
    /// Volts for a battery, ohms for a resistor
    #[serde(default)]
    pub value: f64,
    /// Neighbour on the negative terminal of a two-pin element
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negative: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Netlist {
    pub elements: Vec<ElementEntry>,
    #[serde(default)]
    pub wires: Vec<(String, String)>,
}

fn netlist_error(msg: String) -> CircuitError {
    CircuitError::Netlist(msg)
}

fn file_error(path: &Path, e: impl fmt::Display) -> CircuitError {
    netlist_error(format!("{}: {}", path.display(), e))
}

impl Netlist {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| netlist_error(e.to_string()))
    }

    /// Reads a netlist from a JSON file
    pub fn read_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| file_error(path, e))?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader).map_err(|e| file_error(path, e))
    }

    /// Build the circuit: register every element, connect the wires in order,
    /// then apply the requested polarities.
    pub fn build(&self) -> Result<NamedCircuit> {
        let mut circuit = Circuit::new();
        let mut names = IndexMap::new();
        for entry in &self.elements {
            if names.contains_key(&entry.name) {
                return Err(netlist_error(format!("duplicate element name {}", entry.name)));
            }
            let builder = match entry.kind {
                ElementKind::Battery => ElementBuilder::battery(entry.value),
                ElementKind::Resistor => ElementBuilder::resistor(entry.value),
                ElementKind::Junction => ElementBuilder::junction(),
            };
            names.insert(entry.name.clone(), circuit.add_element(builder));
        }
        let mut named = NamedCircuit { circuit, names };

        for (a, b) in &self.wires {
            let (a, b) = (named.lookup(a)?, named.lookup(b)?);
            named.circuit.connect(a, b)?;
        }

        for entry in &self.elements {
            if let Some(neighbour) = &entry.negative {
                named.orient(&entry.name, neighbour)?;
            }
        }
        Ok(named)
    }
}

/// A circuit together with the element names it was built from.
#[derive(Debug)]
pub struct NamedCircuit {
    pub circuit: Circuit,
    names: IndexMap<String, ElementId>,
}

impl NamedCircuit {
    pub fn id(&self, name: &str) -> Option<ElementId> {
        self.names.get(name).copied()
    }

    pub fn name(&self, id: ElementId) -> Option<&str> {
        self.names
            .iter()
            .find(|(_, e)| **e == id)
            .map(|(n, _)| n.as_str())
    }

    fn lookup(&self, name: &str) -> Result<ElementId> {
        self.id(name)
            .ok_or_else(|| netlist_error(format!("unknown element {}", name)))
    }

    fn orient(&mut self, name: &str, neighbour: &str) -> Result<()> {
        let id = self.lookup(name)?;
        let other = self.lookup(neighbour)?;
        let element = self.circuit.element(id)?;
        if !element.is_two_pin() {
            return Err(netlist_error(format!("{} {} has no polarity", element.kind(), name)));
        }
        let Some((first, second)) = element.terminals() else {
            return Err(netlist_error(format!("{} needs two wires to take a polarity", name)));
        };
        let reaches = |w| self.circuit.wire(w).map(|w| w.other(id) == Some(other));
        let (negative, positive) = if reaches(first)? {
            (first, second)
        } else if reaches(second)? {
            (second, first)
        } else {
            return Err(netlist_error(format!("{} is not wired to {}", name, neighbour)));
        };
        self.circuit.set_direction(id, negative, positive)
    }

    fn display_name(&self, id: ElementId) -> String {
        self.name(id).map_or_else(|| id.to_string(), str::to_string)
    }

    /// Snapshot of the topology and of the last solution.
    pub fn report(&self) -> SolveReport {
        let c = &self.circuit;
        let branches = c
            .branches()
            .iter()
            .map(|b| BranchReport {
                id: b.id().index(),
                elements: b.elements().map(|e| self.display_name(e)).collect(),
                closed: b.is_closed(),
                current: b.current(),
            })
            .collect();
        let elements = c
            .elements()
            .map(|e| ElementReport {
                name: self.display_name(e.id()),
                kind: e.kind(),
                current: c.element_current(e.id()),
                voltage: c.potential_difference(e.id()),
            })
            .collect();
        SolveReport {
            loops: c.loops().len(),
            junctions: c.junctions().iter().map(|j| self.display_name(*j)).collect(),
            branches,
            elements,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BranchReport {
    pub id: usize,
    pub elements: Vec<String>,
    pub closed: bool,
    /// Amps, positive along `elements`
    pub current: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ElementReport {
    pub name: String,
    pub kind: ElementKind,
    pub current: Option<f64>,
    pub voltage: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SolveReport {
    pub loops: usize,
    pub junctions: Vec<String>,
    pub branches: Vec<BranchReport>,
    pub elements: Vec<ElementReport>,
}
