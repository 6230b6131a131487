//! Kirchhoff equations for the branch currents.
//!
//! With B branches and J junctions a connected network needs J-1 junction
//! (current) equations and B-(J-1) loop (voltage) equations. Rows are kept
//! only while they raise the rank, so a dependent choice is never handed to
//! the solver.

use indexmap::{IndexMap, IndexSet};
use log::{debug, trace};

use crate::branch::{Branch, BranchId};
use crate::element::{ElementArena, ElementId, ElementKind, WireId};
use crate::error::{CircuitError, Result};
use crate::loops::Loop;
use crate::solver::{AugmentedMatrix, Row, RowBasis, SolverSettings};

pub(crate) struct EquationBuilder<'a> {
    pub elements: &'a ElementArena,
    pub branches: &'a [Branch],
    pub wire_to_branch: &'a IndexMap<WireId, BranchId>,
    pub junctions: &'a IndexSet<ElementId>,
    pub loops: &'a [Loop],
}

impl EquationBuilder<'_> {
    fn unknowns(&self) -> usize {
        self.branches.len()
    }

    fn branch_of(&self, wire: WireId) -> Option<&Branch> {
        self.wire_to_branch
            .get(&wire)
            .map(|id| &self.branches[id.index()])
    }

    /// Voltage law along `l`: sum of resistor drops equals the battery EMFs.
    pub(crate) fn loop_row(&self, l: &Loop) -> Result<Row> {
        let b = self.unknowns();
        let mut row = vec![0.0; b + 1];
        for &ce in l.elements() {
            let element = self
                .elements
                .get(&ce)
                .ok_or(CircuitError::UnknownElement(ce))?;
            let Some((negative, _)) = element.terminals() else {
                continue;
            };
            let Some(branch) = l.wire_after(ce).and_then(|w| self.branch_of(w)) else {
                continue;
            };
            let loop_forward = l.enters_through(ce, negative);
            match element.kind() {
                ElementKind::Battery => {
                    let sign = if loop_forward { 1.0 } else { -1.0 };
                    row[b] += -element.potential_difference() * sign;
                }
                ElementKind::Resistor => {
                    let agree = loop_forward == branch.enters_through(ce, negative);
                    let sign = if agree { -1.0 } else { 1.0 };
                    row[branch.id().index()] += element.resistance() * sign;
                }
                ElementKind::Junction => {}
            }
        }
        Ok(row)
    }

    /// Current law at `junction`: inflow minus outflow is zero.
    pub(crate) fn junction_row(&self, junction: ElementId) -> Result<Row> {
        let element = self
            .elements
            .get(&junction)
            .ok_or(CircuitError::UnknownElement(junction))?;
        let mut row = vec![0.0; self.unknowns() + 1];
        for &wire in element.connections() {
            let Some(branch) = self.branch_of(wire) else {
                continue;
            };
            match branch.flows_away_from(junction, wire) {
                Some(true) => row[branch.id().index()] -= 1.0,
                Some(false) => row[branch.id().index()] += 1.0,
                None => {}
            }
        }
        Ok(row)
    }

    /// Pick B independent equations and lay them out as a B x (B+1) matrix,
    /// loop rows first.
    pub(crate) fn assemble(&self, settings: &SolverSettings) -> Result<AugmentedMatrix> {
        let b = self.unknowns();
        let mut basis = RowBasis::new(settings.rank_epsilon);
        let mut junction_rows = Vec::new();
        let mut loop_rows = Vec::new();

        for &j in self.junctions {
            if basis.rank() == b {
                break;
            }
            let row = self.junction_row(j)?;
            if basis.admit(&row[..b]) {
                junction_rows.push(row);
            } else {
                trace!("junction {} adds no independent equation", j);
            }
        }
        for l in self.loops {
            if basis.rank() == b {
                break;
            }
            let row = self.loop_row(l)?;
            if basis.admit(&row[..b]) {
                loop_rows.push(row);
            } else {
                trace!("loop {} adds no independent equation", l);
            }
        }

        if basis.rank() < b {
            return Err(CircuitError::RankDeficient {
                rank: basis.rank(),
                unknowns: b,
            });
        }
        debug!(
            "{} unknown(s): {} loop equation(s), {} junction equation(s)",
            b,
            loop_rows.len(),
            junction_rows.len()
        );

        let mut mat = loop_rows;
        mat.extend(junction_rows);
        for row in &mat {
            trace!("{:?}", row);
        }
        Ok(mat)
    }
}
