//! Branches: maximal runs of loop wires that carry a single current.
//!
//! Runs are separated by junctions, i.e. multi-pin elements whose wires are
//! not used uniformly by the loops passing through them. Multi-pin elements
//! with only two live wires behave like any two-pin element.

use std::collections::VecDeque;
use std::fmt;

use indexmap::{IndexMap, IndexSet};
use log::{debug, warn};

use crate::element::{ElementArena, ElementId, Wire, WireArena, WireId};
use crate::error::{CircuitError, Result};
use crate::loops::{Loop, cyclic_forward};

/// Handle of a branch. Only valid until the next topology change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BranchId(pub(crate) u32);

impl BranchId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BranchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "b{}", self.0)
    }
}

/// An ordered path of wires sharing one unknown current.
///
/// The current is signed along element order: positive means it flows from
/// `elements[0]` towards the last element. For an open path `wires[k]` joins
/// `elements[k]` and `elements[k + 1]`; a closed path drops its repeated
/// first element, so its last wire joins the last element back to the first.
#[derive(Debug, Clone)]
pub struct Branch {
    id: BranchId,
    wires: VecDeque<WireId>,
    elements: VecDeque<ElementId>,
    closed: bool,
    current: f64,
}

impl Branch {
    pub(crate) fn new(id: BranchId) -> Self {
        Self {
            id,
            wires: VecDeque::new(),
            elements: VecDeque::new(),
            closed: false,
            current: 0.0,
        }
    }

    pub fn id(&self) -> BranchId {
        self.id
    }

    pub fn current(&self) -> f64 {
        self.current
    }

    pub(crate) fn set_current(&mut self, current: f64) {
        self.current = current;
    }

    pub fn wires(&self) -> impl Iterator<Item = WireId> + '_ {
        self.wires.iter().copied()
    }

    pub fn elements(&self) -> impl Iterator<Item = ElementId> + '_ {
        self.elements.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.wires.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wires.is_empty()
    }

    /// True once the path has come back onto its own first element.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn has_wire(&self, wire: WireId) -> bool {
        self.wires.contains(&wire)
    }

    pub fn has_element(&self, element: ElementId) -> bool {
        self.elements.contains(&element)
    }

    /// Extend the path by a wire adjacent to either end. The direction of the
    /// path is fixed by the second wire. Returns false if `wire` is not
    /// adjacent or the path is already closed.
    pub(crate) fn add_wire(&mut self, wire: &Wire) -> bool {
        if self.closed || self.has_wire(wire.id()) {
            return false;
        }
        match self.wires.len() {
            0 => {
                self.wires.push_back(wire.id());
                self.elements.extend(wire.endpoints());
                return true;
            }
            1 => {
                if !wire.touches(self.elements[1]) && wire.touches(self.elements[0]) {
                    self.elements.swap(0, 1);
                }
            }
            _ => {}
        }

        let back = self.elements.back().copied();
        let front = self.elements.front().copied();
        if let Some(next) = back.and_then(|e| wire.other(e)) {
            self.wires.push_back(wire.id());
            self.elements.push_back(next);
        } else if let Some(next) = front.and_then(|e| wire.other(e)) {
            self.wires.push_front(wire.id());
            self.elements.push_front(next);
        } else {
            return false;
        }

        if self.elements.len() > 2 && self.elements.front() == self.elements.back() {
            self.elements.pop_back();
            self.closed = true;
        }
        true
    }

    fn element_position(&self, element: ElementId) -> Option<usize> {
        self.elements.iter().position(|e| *e == element)
    }

    fn wire_position(&self, wire: WireId) -> Option<usize> {
        self.wires.iter().position(|w| *w == wire)
    }

    /// True if the branch direction goes from `a` to `b`.
    pub fn is_forward(&self, a: ElementId, b: ElementId) -> bool {
        match (self.element_position(a), self.element_position(b)) {
            (Some(ai), Some(bi)) if self.closed => cyclic_forward(ai, bi, self.elements.len()),
            (Some(ai), Some(bi)) => bi > ai,
            _ => false,
        }
    }

    /// True if, following the branch direction, `element` is entered through `wire`.
    pub fn enters_through(&self, element: ElementId, wire: WireId) -> bool {
        let Some(j) = self.element_position(element) else {
            return false;
        };
        let n = self.wires.len();
        if self.closed {
            self.wires[(j + n - 1) % n] == wire
        } else {
            j > 0 && self.wires[j - 1] == wire
        }
    }

    /// Whether the current leaves `junction` along `wire`, `None` if the wire
    /// is not part of this branch.
    pub fn flows_away_from(&self, junction: ElementId, wire: WireId) -> Option<bool> {
        self.wire_position(wire).map(|k| self.elements[k] == junction)
    }
}

impl PartialEq for Branch {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.elements.iter().map(|e| e.to_string()).collect();
        write!(f, "{}[{}]", self.id, names.join("->"))?;
        if self.closed {
            f.write_str("->(start)")?;
        }
        Ok(())
    }
}

/// Result of partitioning the loop wires into branches.
#[derive(Debug, Default)]
pub(crate) struct Classification {
    pub branches: Vec<Branch>,
    pub wire_to_branch: IndexMap<WireId, BranchId>,
    pub junctions: IndexSet<ElementId>,
}

pub(crate) struct BranchClassifier<'a> {
    elements: &'a ElementArena,
    wires: &'a WireArena,
    loops: &'a [Loop],
}

impl<'a> BranchClassifier<'a> {
    pub(crate) fn new(elements: &'a ElementArena, wires: &'a WireArena, loops: &'a [Loop]) -> Self {
        Self {
            elements,
            wires,
            loops,
        }
    }

    fn wire(&self, id: WireId) -> Result<&'a Wire> {
        self.wires.get(&id).ok_or(CircuitError::UnknownWire(id))
    }

    fn is_two_pin(&self, id: ElementId) -> Result<bool> {
        self.elements
            .get(&id)
            .map(|e| e.is_two_pin())
            .ok_or(CircuitError::UnknownElement(id))
    }

    /// True if some wire of `id` belongs to one loop through `id` but not to
    /// another one.
    pub(crate) fn is_multi_junction(&self, id: ElementId) -> Result<bool> {
        let element = self
            .elements
            .get(&id)
            .ok_or(CircuitError::UnknownElement(id))?;
        let touching: Vec<&Loop> = self.loops.iter().filter(|l| l.has_element(id)).collect();
        for &wire in element.connections() {
            let mut usage = touching.iter().map(|l| l.has_wire(wire));
            if let Some(first) = usage.next() {
                if usage.any(|used| used != first) {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    fn find_junctions(&self) -> Result<IndexSet<ElementId>> {
        let mut junctions = IndexSet::new();
        let mut seen = IndexSet::new();
        for l in self.loops {
            for &e in l.elements() {
                if !seen.insert(e) || self.is_two_pin(e)? {
                    continue;
                }
                if self.is_multi_junction(e)? {
                    junctions.insert(e);
                }
            }
        }
        Ok(junctions)
    }

    pub(crate) fn classify(&self) -> Result<Classification> {
        let mut out = Classification {
            junctions: self.find_junctions()?,
            ..Default::default()
        };

        for l in self.loops {
            let n = l.len();
            let wires = l.wires();
            let elements = l.elements();
            // Walk from a junction when there is one, so every run is grown
            // from its start.
            let start = elements
                .iter()
                .position(|e| out.junctions.contains(e))
                .unwrap_or(0);

            for k in 0..n {
                let i = (start + k) % n;
                let curr = wires[i];
                if out.wire_to_branch.contains_key(&curr) {
                    continue;
                }
                let ce = elements[i];
                let prev = wires[(i + n - 1) % n];

                let target = if out.junctions.contains(&ce) {
                    // A non-junction `far` has only `curr` and `ahead` live, so
                    // `ahead` is never classified before `curr` here.
                    let far = elements[(i + 1) % n];
                    let ahead = wires[(i + 1) % n];
                    if !out.junctions.contains(&far) {
                        out.wire_to_branch.get(&ahead).copied()
                    } else {
                        None
                    }
                } else {
                    out.wire_to_branch.get(&prev).copied()
                };
                self.associate(&mut out, curr, target)?;
            }
        }

        debug!(
            "{} loop(s) give {} branch(es) and {} junction(s)",
            self.loops.len(),
            out.branches.len(),
            out.junctions.len()
        );
        Ok(out)
    }

    /// Append `wire` to `target`, or to a fresh branch.
    fn associate(
        &self,
        out: &mut Classification,
        wire: WireId,
        target: Option<BranchId>,
    ) -> Result<()> {
        let w = self.wire(wire)?;
        if let Some(id) = target {
            if out.branches[id.index()].add_wire(w) {
                out.wire_to_branch.insert(wire, id);
                return Ok(());
            }
            warn!("wire {} does not continue branch {}, starting a new one", wire, id);
        }
        let id = BranchId(out.branches.len() as u32);
        let mut branch = Branch::new(id);
        branch.add_wire(w);
        out.branches.push(branch);
        out.wire_to_branch.insert(wire, id);
        Ok(())
    }
}
