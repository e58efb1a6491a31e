//! Position state store (§3, §5): per-ticket locking, monotone global
//! `seq`, atomic JSON snapshot. Grounded on original source
//! `state_store.py`'s `StateStore` (per-ticket `RLock` acquired under a
//! short global lock for map lookup/insertion, `_save_state`'s
//! temp-file-then-rename).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::model::{Milestone, Position, PositionState};

#[derive(Debug, Serialize, Deserialize)]
struct StateFile {
    positions: HashMap<String, Position>,
    global_seq: u64,
    timestamp: DateTime<Utc>,
}

/// Owns every managed position, one `parking_lot::Mutex` per ticket so
/// unrelated tickets never contend. The global lock only ever protects
/// the outer map during lookup/insertion, matching spec.md §5's
/// "per-ticket locks are acquired under a short global lock only for
/// map lookup/insertion".
pub struct StateStore {
    positions: RwLock<HashMap<u64, Mutex<Position>>>,
    global_seq: AtomicU64,
    persist_path: PathBuf,
}

impl StateStore {
    pub fn new(persist_path: PathBuf) -> Self {
        StateStore { positions: RwLock::new(HashMap::new()), global_seq: AtomicU64::new(0), persist_path }
    }

    /// Loads a previously persisted snapshot, if any. Corrupt or missing
    /// files start cold rather than fail the process (§7: no fatal path
    /// besides the outbound publisher bind).
    pub fn load(persist_path: PathBuf) -> Self {
        let store = StateStore::new(persist_path);
        let Ok(raw) = std::fs::read(&store.persist_path) else {
            return store;
        };
        match serde_json::from_slice::<StateFile>(&raw) {
            Ok(file) => {
                let mut positions = store.positions.write();
                for (ticket_str, pos) in file.positions {
                    if let Ok(ticket) = ticket_str.parse::<u64>() {
                        positions.insert(ticket, Mutex::new(pos));
                    }
                }
                drop(positions);
                store.global_seq.store(file.global_seq, Ordering::SeqCst);
                info!(count = store.positions.read().len(), "loaded position state");
            }
            Err(e) => warn!(error = %e, "failed to parse persisted position state, starting cold"),
        }
        store
    }

    pub fn create_position(&self, position: Position) {
        let mut positions = self.positions.write();
        if positions.contains_key(&position.ticket) {
            warn!(ticket = position.ticket, "position already exists");
            return;
        }
        let ticket = position.ticket;
        positions.insert(ticket, Mutex::new(position));
        drop(positions);
        self.save();
        info!(ticket, "created position");
    }

    /// Runs `f` against the locked position, if it exists, and persists
    /// afterward. Returns `None` if the ticket is unknown.
    pub fn with_position<R>(&self, ticket: u64, f: impl FnOnce(&mut Position) -> R) -> Option<R> {
        let positions = self.positions.read();
        let lock = positions.get(&ticket)?;
        let mut pos = lock.lock();
        let result = f(&mut pos);
        pos.last_update_ts = Utc::now();
        drop(pos);
        drop(positions);
        self.save();
        Some(result)
    }

    pub fn get_snapshot(&self, ticket: u64) -> Option<Position> {
        let positions = self.positions.read();
        positions.get(&ticket).map(|lock| lock.lock().clone())
    }

    /// Idempotency gate for a one-shot lifecycle event (§4.G, §8
    /// "Idempotency"). Marks `milestone` hit in the same step so the
    /// check-and-set is atomic under the ticket's lock.
    pub fn check_milestone_idempotent(&self, ticket: u64, milestone: Milestone) -> bool {
        self.with_position(ticket, |pos| {
            if pos.milestones_hit.contains(&milestone) {
                false
            } else {
                pos.milestones_hit.insert(milestone);
                true
            }
        })
        .unwrap_or(false)
    }

    /// Next monotonically increasing sequence number, globally across
    /// tickets (§8 "Monotone seq").
    pub fn get_next_seq(&self, ticket: u64) -> u64 {
        let seq = self.global_seq.fetch_add(1, Ordering::SeqCst) + 1;
        self.with_position(ticket, |pos| pos.last_seq = seq);
        seq
    }

    pub fn record_command(&self, ticket: u64, cmd_wire_name: &str, seq: u64) {
        self.with_position(ticket, |pos| {
            pos.commands_sent.insert(cmd_wire_name.to_string(), seq);
        });
    }

    pub fn close_position(&self, ticket: u64) {
        self.with_position(ticket, |pos| pos.state = PositionState::Closed);
    }

    pub fn active_positions(&self) -> Vec<Position> {
        self.positions
            .read()
            .values()
            .map(|lock| lock.lock().clone())
            .filter(|pos| pos.state != PositionState::Closed)
            .collect()
    }

    fn save(&self) {
        let positions = self.positions.read();
        let snapshot: HashMap<String, Position> =
            positions.iter().map(|(ticket, lock)| (ticket.to_string(), lock.lock().clone())).collect();
        drop(positions);
        let file = StateFile { positions: snapshot, global_seq: self.global_seq.load(Ordering::SeqCst), timestamp: Utc::now() };
        if let Err(e) = save_atomic(&self.persist_path, &file) {
            error!(error = %e, "failed to persist position state");
        }
    }
}

fn save_atomic(path: &Path, file: &StateFile) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, serde_json::to_vec(file)?)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Direction;
    use std::collections::{HashMap as Map, HashSet};

    fn position(ticket: u64) -> Position {
        Position {
            ticket,
            fire_id: "f1".into(),
            user_id: "u1".into(),
            tier: "TIER_PLUS".into(),
            symbol: "EURUSD".into(),
            direction: Direction::Buy,
            entry_px: 1.0800,
            sl_init_px: 1.0780,
            sl_current_px: 1.0780,
            tp_px: 1.0850,
            r_pips: 20.0,
            lot_size: 1.0,
            lot_remaining: 1.0,
            state: PositionState::Entered,
            tp1_done: false,
            be_set: false,
            trail_on: false,
            open_ts: Utc::now(),
            last_update_ts: Utc::now(),
            milestones_hit: HashSet::new(),
            commands_sent: Map::new(),
            last_seq: 0,
            target_uuid: None,
            pre_tp1_max_hold_min: Some(30),
        }
    }

    #[test]
    fn milestone_idempotency_fires_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));
        store.create_position(position(1));
        assert!(store.check_milestone_idempotent(1, Milestone::Tp1));
        assert!(!store.check_milestone_idempotent(1, Milestone::Tp1));
    }

    #[test]
    fn seq_is_monotonic_across_tickets() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));
        store.create_position(position(1));
        store.create_position(position(2));
        let a = store.get_next_seq(1);
        let b = store.get_next_seq(2);
        let c = store.get_next_seq(1);
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let store = StateStore::new(path.clone());
        store.create_position(position(42));
        store.get_next_seq(42);

        let reloaded = StateStore::load(path);
        let snap = reloaded.get_snapshot(42).unwrap();
        assert_eq!(snap.ticket, 42);
        assert_eq!(snap.last_seq, 1);
    }

    #[test]
    fn active_positions_excludes_closed() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));
        store.create_position(position(1));
        store.create_position(position(2));
        store.close_position(1);
        let active = store.active_positions();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].ticket, 2);
    }
}
