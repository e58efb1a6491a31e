//! Exit State Violation Report
//!
//! CLI tool that audits a persisted position-state snapshot
//! (`data_dir/position_state.json`, written by `exit::state_store::StateStore`)
//! for state-machine inconsistencies the Sentry safety monitor would
//! flag at runtime (§4.G) but that are otherwise invisible once the
//! process exits, since Sentry's violation log is in-memory only.
//!
//! Usage:
//!   cargo run --release --bin violation-report -- --path ./data/position_state.json

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use elite_guard::model::{Milestone, Position, PositionState};
use serde::Deserialize;

#[derive(Parser, Debug)]
#[command(name = "violation-report")]
#[command(about = "Audit a persisted position-state snapshot for exit-FSM inconsistencies")]
struct Cli {
    /// Path to the position state JSON file
    #[arg(short, long)]
    path: PathBuf,
}

/// Mirrors the private on-disk shape `StateStore` writes
/// (`positions` keyed by ticket-as-string) without needing access to
/// it directly.
#[derive(Debug, Deserialize)]
struct StateFile {
    positions: HashMap<String, Position>,
    #[allow(dead_code)]
    global_seq: u64,
    timestamp: DateTime<Utc>,
}

struct Finding {
    ticket: u64,
    detail: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let raw = std::fs::read(&cli.path).with_context(|| format!("reading {}", cli.path.display()))?;
    let file: StateFile = serde_json::from_slice(&raw).context("parsing position state file")?;

    println!("snapshot taken at: {}", file.timestamp);
    println!("positions: {}", file.positions.len());
    println!();

    let mut tickets: Vec<&u64> = Vec::new();
    let mut by_ticket: HashMap<u64, &Position> = HashMap::new();
    for pos in file.positions.values() {
        by_ticket.insert(pos.ticket, pos);
    }
    let mut keys: Vec<&u64> = by_ticket.keys().collect();
    keys.sort();
    tickets.extend(keys);

    let mut findings = Vec::new();
    for ticket in tickets {
        let pos = by_ticket[ticket];
        findings.extend(check_position(pos));
    }

    if findings.is_empty() {
        println!("no inconsistencies found");
    } else {
        println!("{} inconsistencies found:", findings.len());
        for finding in &findings {
            println!("  ticket {}: {}", finding.ticket, finding.detail);
        }
    }
    Ok(())
}

/// Flags positions whose recorded milestones and state don't agree with
/// each other (the Exit FSM should make these impossible; a mismatch
/// here means either a bug or manual tampering with the snapshot).
fn check_position(pos: &Position) -> Vec<Finding> {
    let mut findings = Vec::new();
    let ticket = pos.ticket;

    if pos.be_set && !pos.milestones_hit.contains(&Milestone::Be) {
        findings.push(Finding { ticket, detail: "be_set is true but BE milestone was never recorded".into() });
    }
    if pos.trail_on && !pos.milestones_hit.contains(&Milestone::TrailStart) {
        findings.push(Finding { ticket, detail: "trail_on is true but trail-start milestone was never recorded".into() });
    }
    if pos.tp1_done && !pos.milestones_hit.contains(&Milestone::Tp1) {
        findings.push(Finding { ticket, detail: "tp1_done is true but TP1 milestone was never recorded".into() });
    }
    if matches!(pos.state, PositionState::Trailing) && !pos.be_set {
        findings.push(Finding { ticket, detail: "position is trailing without ever being moved to break-even".into() });
    }
    if matches!(pos.state, PositionState::Closed) && pos.lot_remaining > 0.0 {
        findings.push(Finding { ticket, detail: format!("closed with {} lots still recorded open", pos.lot_remaining) });
    }
    if pos.state != PositionState::Entered && pos.pre_tp1_max_hold_min.is_some() {
        findings.push(Finding { ticket, detail: "pre-TP1 timeout was never cleared after the first milestone".into() });
    }

    findings
}
