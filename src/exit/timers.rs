//! Timeout scanning (§4.G, §5, §9): a periodic scan over `ENTERED`
//! positions rather than a task per position timer, per spec.md §9's
//! explicit redesign note ("do not create a task per position timer").
//! Grounded on original source `timers.py`'s `set_timeout_meta` /
//! `get_timeout_meta` / `clear_timeout_meta` semantics, folded into
//! `Position::pre_tp1_max_hold_min` instead of a separate SQLite table.

use chrono::{DateTime, Utc};

use crate::model::{Command, PositionState};

use super::fsm::close_command;
use super::state_store::StateStore;

/// Scans every still-`ENTERED` position for an expired max-hold window
/// and returns the CLOSE commands to enqueue. `pre_tp1_max_hold_min` is
/// cleared on TP1 or close by the FSM itself, so once a position leaves
/// `ENTERED` it is structurally immune to a stale timeout firing late
/// (§8 "Timeout" property).
pub fn scan_timeouts(store: &StateStore, now: DateTime<Utc>) -> Vec<Command> {
    let mut commands = Vec::new();
    for pos in store.active_positions() {
        if pos.state != PositionState::Entered {
            continue;
        }
        let Some(max_hold_min) = pos.pre_tp1_max_hold_min else { continue };
        let elapsed_min = now.signed_duration_since(pos.open_ts).num_seconds() as f64 / 60.0;
        if elapsed_min < max_hold_min as f64 {
            continue;
        }
        let seq = store.get_next_seq(pos.ticket);
        let reason = format!("timeout_{max_hold_min}min");
        commands.push(close_command(&pos, seq, reason));
        store.close_position(pos.ticket);
    }
    commands
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Direction, Position};
    use std::collections::{HashMap, HashSet};

    fn position_opened_at(ticket: u64, open_ts: DateTime<Utc>, max_hold_min: u32) -> Position {
        Position {
            ticket,
            fire_id: "f1".into(),
            user_id: "u1".into(),
            tier: "TIER_BEGINNER".into(),
            symbol: "EURUSD".into(),
            direction: Direction::Buy,
            entry_px: 1.0800,
            sl_init_px: 1.0780,
            sl_current_px: 1.0780,
            tp_px: 1.0830,
            r_pips: 20.0,
            lot_size: 1.0,
            lot_remaining: 1.0,
            state: PositionState::Entered,
            tp1_done: false,
            be_set: false,
            trail_on: false,
            open_ts,
            last_update_ts: open_ts,
            milestones_hit: HashSet::new(),
            commands_sent: HashMap::new(),
            last_seq: 0,
            target_uuid: Some("EA-1".into()),
            pre_tp1_max_hold_min: Some(max_hold_min),
        }
    }

    #[test]
    fn closes_position_past_max_hold() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));
        let open_ts = Utc::now() - chrono::Duration::minutes(31);
        store.create_position(position_opened_at(1, open_ts, 30));

        let commands = scan_timeouts(&store, Utc::now());
        assert_eq!(commands.len(), 1);
        assert!(matches!(&commands[0].args, crate::model::CommandArgs::Close { reason, .. } if reason == "timeout_30min"));
        assert_eq!(commands[0].target_uuid.as_deref(), Some("EA-1"));
        assert_eq!(store.get_snapshot(1).unwrap().state, PositionState::Closed);
    }

    #[test]
    fn does_not_close_before_max_hold_elapses() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));
        let open_ts = Utc::now() - chrono::Duration::minutes(10);
        store.create_position(position_opened_at(1, open_ts, 30));

        let commands = scan_timeouts(&store, Utc::now());
        assert!(commands.is_empty());
    }

    #[test]
    fn cleared_timeout_meta_never_fires_after_tp1() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));
        let open_ts = Utc::now() - chrono::Duration::minutes(60);
        store.create_position(position_opened_at(1, open_ts, 30));
        store.with_position(1, |p| {
            p.tp1_done = true;
            p.pre_tp1_max_hold_min = None;
        });

        let commands = scan_timeouts(&store, Utc::now());
        assert!(commands.is_empty());
    }
}
