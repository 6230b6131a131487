use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{CircuitError, Result};

/// Element storage keyed by handle, in registration order.
pub(crate) type ElementArena = IndexMap<ElementId, Element>;

/// Wire storage keyed by handle, in creation order.
pub(crate) type WireArena = IndexMap<WireId, Wire>;

/// Handle of an element inside one circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub(crate) u32);

/// Handle of a wire inside one circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WireId(pub(crate) u32);

impl ElementId {
    pub fn index(self) -> u32 {
        self.0
    }
}

impl WireId {
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

impl fmt::Display for WireId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "w{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Junction,
    Battery,
    Resistor,
}

impl ElementKind {
    /// Pin count contract, `None` when unbounded
    pub fn pins(self) -> Option<usize> {
        match self {
            ElementKind::Junction => None,
            ElementKind::Battery | ElementKind::Resistor => Some(2),
        }
    }

    pub fn is_two_pin(self) -> bool {
        self.pins() == Some(2)
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ElementKind::Junction => "JUNCTION",
            ElementKind::Battery => "BATTERY",
            ElementKind::Resistor => "RESISTOR",
        };
        f.write_str(name)
    }
}

/// Standalone description of an element, turned into an `Element` when a
/// circuit registers it.
#[derive(Debug, Clone)]
pub struct ElementBuilder {
    kind: ElementKind,
    potential_difference: f64,
    resistance: f64,
}

impl ElementBuilder {
    pub fn new(kind: ElementKind) -> Self {
        Self {
            kind,
            potential_difference: 0.0,
            resistance: 0.0,
        }
    }

    pub fn junction() -> Self {
        Self::new(ElementKind::Junction)
    }

    pub fn battery(potential_difference: f64) -> Self {
        Self::new(ElementKind::Battery).potential_difference(potential_difference)
    }

    pub fn resistor(resistance: f64) -> Self {
        Self::new(ElementKind::Resistor).resistance(resistance)
    }

    pub fn potential_difference(mut self, v: f64) -> Self {
        self.potential_difference = v;
        self
    }

    pub fn resistance(mut self, r: f64) -> Self {
        self.resistance = r;
        self
    }

    pub(crate) fn build(self, id: ElementId) -> Element {
        Element {
            id,
            kind: self.kind,
            connections: Vec::new(),
            potential_difference: self.potential_difference,
            resistance: self.resistance,
        }
    }
}

/// A node of the circuit graph.
///
/// For two-pin elements the order of `connections` carries polarity:
/// `connections[0]` is the negative (reference) terminal.
#[derive(Debug, Clone)]
pub struct Element {
    id: ElementId,
    kind: ElementKind,
    connections: Vec<WireId>,
    potential_difference: f64,
    resistance: f64,
}

impl Element {
    pub fn id(&self) -> ElementId {
        self.id
    }

    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    pub fn is_two_pin(&self) -> bool {
        self.kind.is_two_pin()
    }

    pub fn connections(&self) -> &[WireId] {
        &self.connections
    }

    pub fn potential_difference(&self) -> f64 {
        self.potential_difference
    }

    pub fn resistance(&self) -> f64 {
        self.resistance
    }

    /// Negative and positive terminal wires of a fully wired two-pin element
    pub fn terminals(&self) -> Option<(WireId, WireId)> {
        match (self.is_two_pin(), self.connections.as_slice()) {
            (true, [neg, pos]) => Some((*neg, *pos)),
            _ => None,
        }
    }

    /// For a two-pin element, the wire on the other side of `wire`
    pub fn next_wire(&self, wire: WireId) -> Option<WireId> {
        let (neg, pos) = self.terminals()?;
        if neg == wire {
            Some(pos)
        } else if pos == wire {
            Some(neg)
        } else {
            None
        }
    }

    pub(crate) fn connect(&mut self, wire: WireId) -> Result<()> {
        if let Some(pins) = self.kind.pins() {
            if self.connections.len() >= pins {
                return Err(CircuitError::PinsExhausted {
                    element: self.id,
                    pins,
                });
            }
        }
        self.connections.push(wire);
        Ok(())
    }

    pub(crate) fn disconnect(&mut self, wire: WireId) {
        self.connections.retain(|w| *w != wire);
    }

    /// Fix polarity so that `negative` becomes `connections[0]`.
    pub(crate) fn set_direction(&mut self, negative: WireId, positive: WireId) -> Result<()> {
        if !self.is_two_pin() {
            return Err(CircuitError::NotTwoPin(self.id));
        }
        if negative == positive {
            return Err(CircuitError::SameTerminal {
                wire: negative,
                element: self.id,
            });
        }
        for wire in [negative, positive] {
            if !self.connections.contains(&wire) {
                return Err(CircuitError::WireNotIncident {
                    wire,
                    element: self.id,
                });
            }
        }
        if self.connections[0] != negative {
            self.connections.swap(0, 1);
        }
        Ok(())
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.id.0, self.kind)
    }
}

/// Undirected edge between two elements. Endpoints never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Wire {
    id: WireId,
    a: ElementId,
    b: ElementId,
}

impl Wire {
    pub(crate) fn new(id: WireId, a: ElementId, b: ElementId) -> Self {
        Self { id, a, b }
    }

    pub fn id(&self) -> WireId {
        self.id
    }

    pub fn a(&self) -> ElementId {
        self.a
    }

    pub fn b(&self) -> ElementId {
        self.b
    }

    pub fn endpoints(&self) -> [ElementId; 2] {
        [self.a, self.b]
    }

    /// The endpoint opposite `element`, or `None` if `element` is not an endpoint.
    pub fn other(&self, element: ElementId) -> Option<ElementId> {
        if element == self.a {
            Some(self.b)
        } else if element == self.b {
            Some(self.a)
        } else {
            None
        }
    }

    pub fn touches(&self, element: ElementId) -> bool {
        element == self.a || element == self.b
    }

    pub fn shared_endpoint(&self, other: &Wire) -> Option<ElementId> {
        if self.touches(other.a) {
            Some(other.a)
        } else if self.touches(other.b) {
            Some(other.b)
        } else {
            None
        }
    }
}

impl fmt::Display for Wire {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}<->{}", self.a, self.b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wire(id: u32, a: u32, b: u32) -> Wire {
        Wire::new(WireId(id), ElementId(a), ElementId(b))
    }

    #[test]
    fn test_wire_other() -> Result<(), String> {
        let w = wire(0, 1, 2);
        assert_eq!(w.other(ElementId(1)), Some(ElementId(2)));
        assert_eq!(w.other(ElementId(2)), Some(ElementId(1)));
        assert_eq!(w.other(ElementId(3)), None);
        Ok(())
    }

    #[test]
    fn test_shared_endpoint() -> Result<(), String> {
        let w1 = wire(0, 1, 2);
        let w2 = wire(1, 3, 2);
        let w3 = wire(2, 4, 5);
        assert_eq!(w1.shared_endpoint(&w2), Some(ElementId(2)));
        assert_eq!(w2.shared_endpoint(&w1), Some(ElementId(2)));
        assert_eq!(w1.shared_endpoint(&w3), None);
        Ok(())
    }

    #[test]
    fn test_pin_contract() -> Result<(), String> {
        let mut r = ElementBuilder::resistor(100.0).build(ElementId(0));
        assert!(r.connect(WireId(0)).is_ok());
        assert!(r.connect(WireId(1)).is_ok());
        assert_eq!(
            r.connect(WireId(2)),
            Err(CircuitError::PinsExhausted {
                element: ElementId(0),
                pins: 2
            })
        );

        let mut j = ElementBuilder::junction().build(ElementId(1));
        for w in 0..5 {
            assert!(j.connect(WireId(w)).is_ok());
        }
        assert_eq!(j.connections().len(), 5);
        Ok(())
    }

    #[test]
    fn test_set_direction() -> Result<(), String> {
        let mut b = ElementBuilder::battery(5.0).build(ElementId(0));
        b.connect(WireId(3)).map_err(|e| e.to_string())?;
        b.connect(WireId(4)).map_err(|e| e.to_string())?;
        assert_eq!(b.terminals(), Some((WireId(3), WireId(4))));

        b.set_direction(WireId(4), WireId(3)).map_err(|e| e.to_string())?;
        assert_eq!(b.terminals(), Some((WireId(4), WireId(3))));
        assert_eq!(b.next_wire(WireId(4)), Some(WireId(3)));

        assert!(matches!(
            b.set_direction(WireId(4), WireId(9)),
            Err(CircuitError::WireNotIncident { .. })
        ));
        // one wire cannot be both terminals, and the order is left alone
        assert_eq!(
            b.set_direction(WireId(3), WireId(3)),
            Err(CircuitError::SameTerminal {
                wire: WireId(3),
                element: ElementId(0)
            })
        );
        assert_eq!(b.terminals(), Some((WireId(4), WireId(3))));

        let mut j = ElementBuilder::junction().build(ElementId(1));
        assert_eq!(
            j.set_direction(WireId(0), WireId(1)),
            Err(CircuitError::NotTwoPin(ElementId(1)))
        );
        Ok(())
    }

    #[test]
    fn test_display() -> Result<(), String> {
        let b = ElementBuilder::battery(5.0).build(ElementId(7));
        assert_eq!(b.to_string(), "7:BATTERY");
        assert_eq!(wire(0, 1, 2).to_string(), "e1<->e2");
        Ok(())
    }
}
