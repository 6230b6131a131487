//! The circuit: owns every element, wire, loop and branch, and keeps loops
//! and branches in step with each topology change.

use indexmap::{IndexMap, IndexSet};
use log::debug;

use crate::branch::{Branch, BranchClassifier, BranchId, Classification};
use crate::element::{
    Element, ElementArena, ElementBuilder, ElementId, ElementKind, Wire, WireArena, WireId,
};
use crate::equations::EquationBuilder;
use crate::error::{CircuitError, Result};
use crate::loops::{Loop, LoopFinder};
use crate::solver::{self, SolverSettings};

/// An electric network of ideal wires, batteries, resistors and junctions.
///
/// Elements and wires are addressed by handles allocated by this circuit.
/// Wires exist in the circuit from `create_wire` on, but only take part in
/// the topology while connected (between `add_wire` and `remove_wire`).
#[derive(Debug, Default)]
pub struct Circuit {
    elements: ElementArena,
    wire_pool: WireArena,
    connected: IndexSet<WireId>,
    loops: Vec<Loop>,
    branches: Vec<Branch>,
    wire_to_branch: IndexMap<WireId, BranchId>,
    junctions: IndexSet<ElementId>,
    next_element: u32,
    next_wire: u32,
}

impl Circuit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new element. It has no wires yet, so no loop changes.
    pub fn add_element(&mut self, builder: ElementBuilder) -> ElementId {
        let id = ElementId(self.next_element);
        self.next_element += 1;
        self.elements.insert(id, builder.build(id));
        id
    }

    /// Allocate a wire between two elements without connecting it.
    pub fn create_wire(&mut self, a: ElementId, b: ElementId) -> Result<WireId> {
        for e in [a, b] {
            if !self.elements.contains_key(&e) {
                return Err(CircuitError::UnknownElement(e));
            }
        }
        if a == b {
            return Err(CircuitError::SelfLoop(a));
        }
        let id = WireId(self.next_wire);
        self.next_wire += 1;
        self.wire_pool.insert(id, Wire::new(id, a, b));
        Ok(id)
    }

    /// Create a wire and connect it.
    pub fn connect(&mut self, a: ElementId, b: ElementId) -> Result<WireId> {
        let id = self.create_wire(a, b)?;
        self.add_wire(id)?;
        Ok(id)
    }

    /// Connect `id` to both of its endpoints, find the loops it closes and
    /// rebuild the branches. Does nothing if it is already connected.
    pub fn add_wire(&mut self, id: WireId) -> Result<()> {
        let wire = *self.wire(id)?;
        if self.connected.contains(&id) {
            return Ok(());
        }
        for e in wire.endpoints() {
            let element = self.element(e)?;
            if let Some(pins) = element.kind().pins() {
                if element.connections().len() >= pins {
                    return Err(CircuitError::PinsExhausted { element: e, pins });
                }
            }
        }
        for e in [wire.b(), wire.a()] {
            self.element_mut(e)?.connect(id)?;
        }
        self.connected.insert(id);

        let found = LoopFinder::new(&self.elements, &self.wire_pool).discover(id)?;
        for l in found {
            if !self.loops.contains(&l) {
                self.loops.push(l);
            }
        }
        self.rebuild()
    }

    /// Disconnect `id`, drop every loop through it and rebuild the branches.
    /// Does nothing if it is not connected.
    pub fn remove_wire(&mut self, id: WireId) -> Result<()> {
        let wire = *self.wire(id)?;
        if !self.connected.shift_remove(&id) {
            return Ok(());
        }
        for e in wire.endpoints() {
            self.element_mut(e)?.disconnect(id);
        }
        let before = self.loops.len();
        self.loops.retain(|l| !l.has_wire(id));
        debug!("wire {} removed, {} loop(s) broken", id, before - self.loops.len());
        self.rebuild()
    }

    /// Fix the polarity of a two-pin element: `negative` becomes its
    /// reference terminal.
    pub fn set_direction(
        &mut self,
        element: ElementId,
        negative: WireId,
        positive: WireId,
    ) -> Result<()> {
        self.element_mut(element)?.set_direction(negative, positive)
    }

    fn rebuild(&mut self) -> Result<()> {
        let Classification {
            branches,
            wire_to_branch,
            junctions,
        } = BranchClassifier::new(&self.elements, &self.wire_pool, &self.loops).classify()?;
        self.branches = branches;
        self.wire_to_branch = wire_to_branch;
        self.junctions = junctions;
        Ok(())
    }

    /// Compute the current of every branch with the default settings.
    pub fn solve(&mut self) -> Result<()> {
        self.solve_with(&SolverSettings::default())
    }

    /// Compute the current of every branch. On error no branch is touched.
    pub fn solve_with(&mut self, settings: &SolverSettings) -> Result<()> {
        let mat = EquationBuilder {
            elements: &self.elements,
            branches: &self.branches,
            wire_to_branch: &self.wire_to_branch,
            junctions: &self.junctions,
            loops: &self.loops,
        }
        .assemble(settings)?;
        let currents = solver::solve(mat, settings)?;
        for (branch, current) in self.branches.iter_mut().zip(currents) {
            branch.set_current(current);
        }
        Ok(())
    }

    pub fn element(&self, id: ElementId) -> Result<&Element> {
        self.elements
            .get(&id)
            .ok_or(CircuitError::UnknownElement(id))
    }

    fn element_mut(&mut self, id: ElementId) -> Result<&mut Element> {
        self.elements
            .get_mut(&id)
            .ok_or(CircuitError::UnknownElement(id))
    }

    pub fn wire(&self, id: WireId) -> Result<&Wire> {
        self.wire_pool.get(&id).ok_or(CircuitError::UnknownWire(id))
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.elements.values()
    }

    /// Connected wires, in connection order.
    pub fn wires(&self) -> impl Iterator<Item = &Wire> {
        self.connected.iter().filter_map(|id| self.wire_pool.get(id))
    }

    pub fn is_connected(&self, id: WireId) -> bool {
        self.connected.contains(&id)
    }

    pub fn loops(&self) -> &[Loop] {
        &self.loops
    }

    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }

    pub fn branch(&self, id: BranchId) -> Option<&Branch> {
        self.branches.get(id.index())
    }

    pub fn junctions(&self) -> &IndexSet<ElementId> {
        &self.junctions
    }

    pub fn wire_to_branch(&self) -> &IndexMap<WireId, BranchId> {
        &self.wire_to_branch
    }

    /// The branch carrying the current of `wire`, if it lies on any loop.
    pub fn branch_of(&self, wire: WireId) -> Option<&Branch> {
        self.wire_to_branch
            .get(&wire)
            .and_then(|id| self.branch(*id))
    }

    /// Current through a two-pin element, positive from its negative
    /// terminal towards its positive one. Zero when it is on no loop; `None`
    /// for junctions and unknown handles.
    pub fn element_current(&self, id: ElementId) -> Option<f64> {
        let element = self.elements.get(&id)?;
        if !element.is_two_pin() {
            return None;
        }
        let Some((negative, _)) = element.terminals() else {
            return Some(0.0);
        };
        let Some(branch) = self.branch_of(negative) else {
            return Some(0.0);
        };
        if branch.enters_through(id, negative) {
            Some(branch.current())
        } else {
            Some(-branch.current())
        }
    }

    /// Voltage across a two-pin element along the same direction as
    /// `element_current`: the EMF a battery adds, the drop a resistor takes.
    pub fn potential_difference(&self, id: ElementId) -> Option<f64> {
        let element = self.elements.get(&id)?;
        match element.kind() {
            ElementKind::Battery => Some(element.potential_difference()),
            ElementKind::Resistor => Some(self.element_current(id)? * element.resistance()),
            ElementKind::Junction => None,
        }
    }
}
