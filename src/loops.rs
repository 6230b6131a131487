//! Kirchhoff loops and their incremental discovery.
//!
//! Loops are only ever searched from a freshly connected wire: every simple
//! cycle through that wire is new, every cycle not through it was found when
//! one of its own wires was connected. Removing a wire must therefore evict
//! the loops that used it.

use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use log::{debug, trace};

use crate::element::{ElementArena, ElementId, Wire, WireArena, WireId};
use crate::error::{CircuitError, Result};

/// True if `bi` comes after `ai` when walking a cyclic sequence of length `n`.
///
/// Positions 0 and n-1 are neighbours across the seam, so their order flips.
pub(crate) fn cyclic_forward(ai: usize, bi: usize, n: usize) -> bool {
    let last = n.saturating_sub(1);
    if n > 2 && ((ai == 0 && bi == last) || (ai == last && bi == 0)) {
        ai > bi
    } else {
        bi > ai
    }
}

/// An immutable simple cycle.
///
/// `elements[i]` is the element shared by `wires[i - 1]` and `wires[i]`
/// (indices wrap), so the loop enters `elements[i]` through `wires[i - 1]`
/// and leaves it through `wires[i]`.
#[derive(Debug, Clone)]
pub struct Loop {
    wires: Vec<WireId>,
    elements: Vec<ElementId>,
    wire_set: BTreeSet<WireId>,
    element_set: BTreeSet<ElementId>,
}

impl Loop {
    fn from_path(wires: Vec<WireId>, elements: Vec<ElementId>) -> Self {
        let wire_set = wires.iter().copied().collect();
        let element_set = elements.iter().copied().collect();
        Self {
            wires,
            elements,
            wire_set,
            element_set,
        }
    }

    pub fn wires(&self) -> &[WireId] {
        &self.wires
    }

    pub fn elements(&self) -> &[ElementId] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.wires.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wires.is_empty()
    }

    pub fn has_wire(&self, wire: WireId) -> bool {
        self.wire_set.contains(&wire)
    }

    pub fn has_element(&self, element: ElementId) -> bool {
        self.element_set.contains(&element)
    }

    fn element_position(&self, element: ElementId) -> Option<usize> {
        self.elements.iter().position(|e| *e == element)
    }

    fn wire_position(&self, wire: WireId) -> Option<usize> {
        self.wires.iter().position(|w| *w == wire)
    }

    pub fn next_element(&self, element: ElementId) -> Option<ElementId> {
        let i = self.element_position(element)?;
        Some(self.elements[(i + 1) % self.elements.len()])
    }

    pub fn next_wire(&self, wire: WireId) -> Option<WireId> {
        let i = self.wire_position(wire)?;
        Some(self.wires[(i + 1) % self.wires.len()])
    }

    /// The wire the loop leaves `element` through.
    pub fn wire_after(&self, element: ElementId) -> Option<WireId> {
        self.element_position(element).map(|i| self.wires[i])
    }

    /// The wire the loop enters `element` through.
    pub fn wire_before(&self, element: ElementId) -> Option<WireId> {
        let n = self.wires.len();
        self.element_position(element).map(|i| self.wires[(i + n - 1) % n])
    }

    /// True if the traversal enters `element` through `wire`.
    pub fn enters_through(&self, element: ElementId, wire: WireId) -> bool {
        self.wire_before(element) == Some(wire)
    }

    /// True if `b` follows `a` in traversal order.
    pub fn is_forward(&self, a: ElementId, b: ElementId) -> bool {
        match (self.element_position(a), self.element_position(b)) {
            (Some(ai), Some(bi)) => cyclic_forward(ai, bi, self.elements.len()),
            _ => false,
        }
    }

    /// True if wire `b` follows wire `a` in traversal order.
    pub fn is_forward_wire(&self, a: WireId, b: WireId) -> bool {
        match (self.wire_position(a), self.wire_position(b)) {
            (Some(ai), Some(bi)) => cyclic_forward(ai, bi, self.wires.len()),
            _ => false,
        }
    }
}

impl PartialEq for Loop {
    fn eq(&self, other: &Self) -> bool {
        self.wire_set == other.wire_set && self.element_set == other.element_set
    }
}

impl Eq for Loop {}

impl Hash for Loop {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.wire_set.hash(state);
        self.element_set.hash(state);
    }
}

impl fmt::Display for Loop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for e in &self.elements {
            write!(f, "{}->", e)?;
        }
        f.write_str("(start)")
    }
}

/// A path under construction, frozen into a `Loop` once it closes.
#[derive(Debug, Clone, Default)]
pub struct LoopBuilder {
    wires: Vec<Wire>,
    elements: Vec<ElementId>,
}

impl LoopBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wires(&self) -> impl Iterator<Item = WireId> + '_ {
        self.wires.iter().map(|w| w.id())
    }

    pub fn elements(&self) -> &[ElementId] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.wires.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wires.is_empty()
    }

    pub fn has_wire(&self, wire: WireId) -> bool {
        self.wires.iter().any(|w| w.id() == wire)
    }

    /// The frontier element the next wire has to start from.
    pub fn last(&self) -> Option<ElementId> {
        self.elements.last().copied()
    }

    /// Extend the path by `wire`. Returns false (leaving the path untouched)
    /// if the wire does not continue the path or would revisit an element.
    pub fn add_wire(&mut self, wire: Wire) -> bool {
        if self.wires.is_empty() {
            self.wires.push(wire);
            self.elements.extend(wire.endpoints());
            return true;
        }
        if self.is_complete() || self.has_wire(wire.id()) {
            return false;
        }
        if self.wires.len() == 1 {
            // The first wire is unordered; the second one decides which of
            // its endpoints the path continues from.
            if !wire.touches(self.elements[1]) && wire.touches(self.elements[0]) {
                self.elements.swap(0, 1);
            }
        }
        let Some(next) = self.last().and_then(|frontier| wire.other(frontier)) else {
            return false;
        };
        if next == self.elements[0] {
            self.wires.push(wire);
            true
        } else if self.elements.contains(&next) {
            false
        } else {
            self.wires.push(wire);
            self.elements.push(next);
            true
        }
    }

    /// Drop the most recently added wire.
    pub fn remove_wire(&mut self) {
        let was_complete = self.is_complete();
        if self.wires.pop().is_none() {
            return;
        }
        if self.wires.is_empty() {
            self.elements.clear();
        } else if !was_complete {
            self.elements.pop();
        }
    }

    pub fn is_complete(&self) -> bool {
        match (self.wires.last(), self.elements.first(), self.elements.last()) {
            (Some(closing), Some(first), Some(last)) => {
                self.wires.len() > 1
                    && self.elements.len() == self.wires.len()
                    && closing.other(*last) == Some(*first)
            }
            _ => false,
        }
    }

    /// True if `wire` would close the path back onto its first element.
    pub fn closes_with(&self, wire: &Wire) -> bool {
        match (self.elements.first(), self.last()) {
            (Some(first), Some(last)) => {
                self.elements.len() == self.wires.len() + 1
                    && !self.has_wire(wire.id())
                    && wire.other(last) == Some(*first)
            }
            _ => false,
        }
    }

    pub fn build(&self) -> Result<Loop> {
        if !self.is_complete() {
            return Err(CircuitError::IncompleteLoop);
        }
        Ok(Loop::from_path(
            self.wires.iter().map(|w| w.id()).collect(),
            self.elements.clone(),
        ))
    }
}

impl fmt::Display for LoopBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.elements.is_empty() {
            return f.write_str("empty");
        }
        let names: Vec<String> = self.elements.iter().map(|e| e.to_string()).collect();
        let tail = if self.is_complete() { "(start)" } else { "/" };
        write!(f, "{}->{}", names.join("->"), tail)
    }
}

/// Depth-first search for every simple cycle through one wire.
pub(crate) struct LoopFinder<'a> {
    elements: &'a ElementArena,
    wires: &'a WireArena,
}

impl<'a> LoopFinder<'a> {
    pub(crate) fn new(elements: &'a ElementArena, wires: &'a WireArena) -> Self {
        Self { elements, wires }
    }

    /// All simple cycles containing `seed`, each reported once.
    pub(crate) fn discover(&self, seed: WireId) -> Result<Vec<Loop>> {
        let mut found = Vec::new();
        let mut path = LoopBuilder::new();
        self.search(seed, &mut path, &mut found)?;
        debug!("wire {} closes {} new loop(s)", seed, found.len());
        Ok(found)
    }

    fn wire(&self, id: WireId) -> Result<&'a Wire> {
        self.wires.get(&id).ok_or(CircuitError::UnknownWire(id))
    }

    fn search(&self, current: WireId, path: &mut LoopBuilder, found: &mut Vec<Loop>) -> Result<()> {
        let wire = self.wire(current)?;
        if path.closes_with(wire) {
            path.add_wire(*wire);
            let closed = path.build();
            path.remove_wire();
            let closed = closed?;
            trace!("found loop {}", closed);
            if !found.contains(&closed) {
                found.push(closed);
            }
        } else if path.len() < self.elements.len() && path.add_wire(*wire) {
            let frontier = path.last().ok_or(CircuitError::IncompleteLoop)?;
            let element = self
                .elements
                .get(&frontier)
                .ok_or(CircuitError::UnknownElement(frontier))?;
            for &next in element.connections() {
                if next != current {
                    self.search(next, path, found)?;
                }
            }
            path.remove_wire();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CE1: ElementId = ElementId(1);
    const CE2: ElementId = ElementId(2);
    const CE3: ElementId = ElementId(3);

    fn wire(id: u32, a: ElementId, b: ElementId) -> Wire {
        Wire::new(WireId(id), a, b)
    }

    #[test]
    fn test_membership() -> Result<()> {
        let mut lb = LoopBuilder::new();
        let w1 = wire(1, CE1, CE2);
        let w2 = wire(2, CE2, CE1);
        assert!(lb.add_wire(w1));
        assert!(lb.add_wire(w2));

        let l = lb.build()?;
        assert!(l.has_element(CE1));
        assert!(l.has_element(CE2));
        assert!(!l.has_element(CE3));
        assert!(l.has_wire(w1.id()));
        assert!(l.has_wire(w2.id()));
        Ok(())
    }

    #[test]
    fn test_incomplete_build() -> Result<(), String> {
        let mut lb = LoopBuilder::new();
        assert_eq!(lb.build(), Err(CircuitError::IncompleteLoop));
        lb.add_wire(wire(1, CE1, CE2));
        assert_eq!(lb.build(), Err(CircuitError::IncompleteLoop));
        Ok(())
    }

    #[test]
    fn test_add_order() -> Result<(), String> {
        let mut lb = LoopBuilder::new();
        let w1 = wire(1, CE1, CE2);
        let w2 = wire(2, CE2, CE3);
        assert!(lb.is_empty());

        assert!(lb.add_wire(w1));
        assert_eq!(lb.len(), 1);
        assert_eq!(lb.elements(), &[CE1, CE2]);

        assert!(lb.add_wire(w2));
        assert_eq!(lb.wires().collect::<Vec<_>>(), vec![w1.id(), w2.id()]);
        assert_eq!(lb.elements(), &[CE1, CE2, CE3]);
        assert!(!lb.is_complete());
        assert_eq!(lb.to_string(), "e1->e2->e3->/");
        Ok(())
    }

    #[test]
    fn test_add_order_flipped() -> Result<(), String> {
        let mut lb = LoopBuilder::new();
        let w1 = wire(1, CE2, CE1);
        let w2 = wire(2, CE3, CE2);

        assert!(lb.add_wire(w1));
        assert_eq!(lb.elements(), &[CE2, CE1]);

        // second wire shares CE2, so the first wire's endpoints swap
        assert!(lb.add_wire(w2));
        assert_eq!(lb.elements(), &[CE1, CE2, CE3]);
        assert_eq!(lb.wires().collect::<Vec<_>>(), vec![w1.id(), w2.id()]);
        assert!(!lb.is_complete());
        Ok(())
    }

    #[test]
    fn test_two_wire_loop() -> Result<(), String> {
        let mut lb = LoopBuilder::new();
        let w1 = wire(1, CE1, CE2);
        let w2 = wire(2, CE2, CE1);

        assert!(lb.add_wire(w1));
        assert!(lb.add_wire(w2));
        assert_eq!(lb.elements(), &[CE1, CE2]);
        assert!(lb.is_complete());
        assert_eq!(lb.to_string(), "e1->e2->(start)");

        // a closed path takes no more wires
        assert!(!lb.add_wire(wire(3, CE1, CE3)));
        Ok(())
    }

    #[test]
    fn test_rejects_revisit_and_disconnected() -> Result<(), String> {
        let mut lb = LoopBuilder::new();
        assert!(lb.add_wire(wire(1, CE1, CE2)));
        assert!(lb.add_wire(wire(2, CE2, CE3)));
        // does not touch the frontier (CE3)
        assert!(!lb.add_wire(wire(3, ElementId(7), ElementId(8))));
        // would come back to CE2
        assert!(!lb.add_wire(wire(4, CE3, CE2)));
        assert_eq!(lb.len(), 2);
        assert_eq!(lb.elements(), &[CE1, CE2, CE3]);
        Ok(())
    }

    #[test]
    fn test_remove_order() -> Result<(), String> {
        let mut lb = LoopBuilder::new();
        let w1 = wire(1, CE2, CE1);
        let w2 = wire(2, CE3, CE2);
        lb.add_wire(w1);
        lb.add_wire(w2);

        lb.remove_wire();
        assert_eq!(lb.wires().collect::<Vec<_>>(), vec![w1.id()]);
        assert_eq!(lb.elements(), &[CE1, CE2]);
        assert!(!lb.is_complete());

        lb.remove_wire();
        assert!(lb.is_empty());
        assert!(lb.elements().is_empty());
        Ok(())
    }

    #[test]
    fn test_remove_closing_wire() -> Result<(), String> {
        let mut lb = LoopBuilder::new();
        lb.add_wire(wire(1, CE1, CE2));
        lb.add_wire(wire(2, CE2, CE3));
        let closing = wire(3, CE3, CE1);
        assert!(lb.closes_with(&closing));
        assert!(lb.add_wire(closing));
        assert!(lb.is_complete());

        lb.remove_wire();
        assert!(!lb.is_complete());
        assert_eq!(lb.elements(), &[CE1, CE2, CE3]);
        Ok(())
    }

    #[test]
    fn test_equality_ignores_direction() -> Result<()> {
        let w1 = wire(1, CE1, CE2);
        let w2 = wire(2, CE2, CE3);
        let w3 = wire(3, CE3, CE1);

        let mut forward = LoopBuilder::new();
        for w in [w1, w2, w3] {
            forward.add_wire(w);
        }
        let mut backward = LoopBuilder::new();
        for w in [w2, w1, w3] {
            backward.add_wire(w);
        }
        let a = forward.build()?;
        let b = backward.build()?;
        assert_ne!(a.elements(), b.elements());
        assert_eq!(a, b);

        let mut set = std::collections::HashSet::new();
        set.insert(a);
        assert!(!set.insert(b));
        Ok(())
    }

    #[test]
    fn test_traversal_queries() -> Result<()> {
        let w1 = wire(1, CE1, CE2);
        let w2 = wire(2, CE2, CE3);
        let w3 = wire(3, CE3, CE1);
        let mut lb = LoopBuilder::new();
        for w in [w1, w2, w3] {
            lb.add_wire(w);
        }
        let l = lb.build()?;
        assert_eq!(l.elements(), &[CE1, CE2, CE3]);

        assert_eq!(l.next_element(CE3), Some(CE1));
        assert_eq!(l.next_wire(w3.id()), Some(w1.id()));
        assert_eq!(l.wire_after(CE1), Some(w1.id()));
        assert_eq!(l.wire_before(CE1), Some(w3.id()));
        assert!(l.enters_through(CE2, w1.id()));
        assert!(!l.enters_through(CE2, w2.id()));

        assert!(l.is_forward(CE1, CE2));
        assert!(!l.is_forward(CE2, CE1));
        // across the seam
        assert!(l.is_forward(CE3, CE1));
        assert!(!l.is_forward(CE1, CE3));
        assert!(l.is_forward_wire(w3.id(), w1.id()));
        assert!(l.is_forward_wire(w1.id(), w2.id()));
        Ok(())
    }

    #[test]
    fn test_two_wire_loop_entry() -> Result<()> {
        let w1 = wire(1, CE1, CE2);
        let w2 = wire(2, CE1, CE2);
        let mut lb = LoopBuilder::new();
        lb.add_wire(w1);
        lb.add_wire(w2);
        let l = lb.build()?;
        // CE1 is entered through the closing wire, CE2 through the first
        assert!(l.enters_through(CE1, w2.id()));
        assert!(l.enters_through(CE2, w1.id()));
        Ok(())
    }
}
