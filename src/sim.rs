//! Solve a JSON netlist and print its branch currents.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use kirchhoff::{ElementKind, Netlist, SolveReport, SolverSettings, format_unit_value};

#[derive(Parser)]
#[command(name = "sim")]
#[command(about = "Kirchhoff solver for battery and resistor networks", long_about = None)]
#[command(version)]
struct Cli {
    /// Input netlist file (JSON)
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Print the full report as JSON
    #[arg(long)]
    json: bool,

    /// Smallest pivot accepted during elimination
    #[arg(long)]
    pivot_epsilon: Option<f64>,

    /// Residual below which an equation counts as dependent
    #[arg(long)]
    rank_epsilon: Option<f64>,
}

impl Cli {
    fn settings(&self) -> SolverSettings {
        let defaults = SolverSettings::default();
        SolverSettings {
            pivot_epsilon: self.pivot_epsilon.unwrap_or(defaults.pivot_epsilon),
            rank_epsilon: self.rank_epsilon.unwrap_or(defaults.rank_epsilon),
        }
    }
}

fn main() -> Result<()> {
    env_logger::init(); // Log to stderr (if you run with `RUST_LOG=debug`).
    let cli = Cli::parse();

    let netlist = Netlist::read_json(&cli.input)
        .with_context(|| format!("reading {}", cli.input.display()))?;
    let mut named = netlist
        .build()
        .with_context(|| format!("building circuit from {}", cli.input.display()))?;
    info!(
        "{} element(s), {} wire(s)",
        named.circuit.elements().count(),
        named.circuit.wires().count()
    );
    named
        .circuit
        .solve_with(&cli.settings())
        .context("solving circuit")?;

    let report = named.report();
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &SolveReport) {
    println!(
        "{} loop(s), {} branch(es), junctions: [{}]",
        report.loops,
        report.branches.len(),
        report.junctions.join(", ")
    );
    for b in &report.branches {
        let tail = if b.closed { "->(start)" } else { "" };
        println!(
            "  b{} {}{}: {}",
            b.id,
            b.elements.join("->"),
            tail,
            format_unit_value(b.current, "A")
        );
    }
    for e in &report.elements {
        if e.kind == ElementKind::Junction {
            continue;
        }
        let current = e.current.unwrap_or(0.0);
        let voltage = e.voltage.unwrap_or(0.0);
        println!(
            "  {} {}: {} {}",
            e.kind,
            e.name,
            format_unit_value(current, "A"),
            format_unit_value(voltage, "V")
        );
    }
}
