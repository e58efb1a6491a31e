//! Exit FSM (§4.G): drives a managed position through
//! `ENTERED → TP1_DONE → BE_SET → TRAILING → CLOSED`, or straight to
//! `CLOSED` on timeout/external confirm. Grounded on original source
//! `exit_profiles.py`'s `ExitProfileManager` (tier routing,
//! `_check_rr_reached`'s bid/ask side selection, `_move_to_breakeven`,
//! `_start_trailing`), with the explicit `PositionState` enum replacing
//! its ad hoc state field per spec.md §9's "codify as a small enum"
//! note.

use chrono::{DateTime, Utc};

use crate::config::TierConfig;
use crate::model::{Command, CommandArgs, CommandType, Direction, Milestone, Position, PositionState, SymbolSpec};
use crate::symbols::{be_offset_pips, calculate_trail_distance, price_plus_pips, price_to_pips, spread_pips};

use super::state_store::StateStore;

/// Current market quote for a symbol, fed in by the exit-drive tick
/// (§5: "feed thread also drives the Exit FSM debounced at 10 Hz").
#[derive(Debug, Clone, Copy)]
pub struct MarketData {
    pub bid: f64,
    pub ask: f64,
    pub atr: Option<f64>,
}

pub struct ExitFsm<'a> {
    store: &'a StateStore,
}

impl<'a> ExitFsm<'a> {
    pub fn new(store: &'a StateStore) -> Self {
        ExitFsm { store }
    }

    /// Registers a freshly-filled position and returns it (§4.G
    /// "on_position_open hook"). `max_hold_min` comes from the tier
    /// config resolved by the caller.
    #[allow(clippy::too_many_arguments)]
    pub fn on_position_open(
        &self,
        ticket: u64,
        fire_id: String,
        user_id: String,
        tier: String,
        symbol: String,
        direction: Direction,
        entry_px: f64,
        sl_px: f64,
        tp_px: f64,
        lot_size: f64,
        symbol_spec: &SymbolSpec,
        max_hold_min: u32,
        now: DateTime<Utc>,
    ) {
        let r_pips = price_to_pips(symbol_spec, entry_px, sl_px);
        self.store.create_position(Position {
            ticket,
            fire_id,
            user_id,
            tier,
            symbol,
            direction,
            entry_px,
            sl_init_px: sl_px,
            sl_current_px: sl_px,
            tp_px,
            r_pips,
            lot_size,
            lot_remaining: lot_size,
            state: PositionState::Entered,
            tp1_done: false,
            be_set: false,
            trail_on: false,
            open_ts: now,
            last_update_ts: now,
            milestones_hit: Default::default(),
            commands_sent: Default::default(),
            last_seq: 0,
            target_uuid: None,
            pre_tp1_max_hold_min: Some(max_hold_min),
        });
    }

    /// Main tick entry point (§4.G `on_tick`). Returns the commands the
    /// caller must enqueue onto the command bus, already carrying a
    /// freshly-issued `seq`.
    pub fn on_tick(&self, ticket: u64, market: MarketData, symbol_spec: &SymbolSpec, tier_config: &TierConfig) -> Vec<Command> {
        let Some(snapshot) = self.store.get_snapshot(ticket) else { return Vec::new() };
        if snapshot.state == PositionState::Closed {
            return Vec::new();
        }
        if snapshot.is_beginner() {
            self.handle_beginner_tick(&snapshot, market, symbol_spec, tier_config)
        } else {
            self.handle_plus_pro_tick(&snapshot, market, symbol_spec, tier_config)
        }
    }

    fn handle_beginner_tick(&self, pos: &Position, market: MarketData, symbol_spec: &SymbolSpec, config: &TierConfig) -> Vec<Command> {
        if !check_rr_reached(pos, market, symbol_spec, config.rr) {
            return Vec::new();
        }
        let seq = self.store.get_next_seq(pos.ticket);
        let reason = format!("TARGET_{}R", config.rr);
        let command = close_command(pos, seq, reason);
        self.store.record_command(pos.ticket, CommandType::Close.wire_name(), seq);
        self.store.with_position(pos.ticket, |p| {
            p.state = PositionState::Closed;
            p.pre_tp1_max_hold_min = None;
        });
        vec![command]
    }

    fn handle_plus_pro_tick(&self, pos: &Position, market: MarketData, symbol_spec: &SymbolSpec, config: &TierConfig) -> Vec<Command> {
        let mut commands = Vec::new();

        if !pos.tp1_done && check_rr_reached(pos, market, symbol_spec, config.tp1_r) {
            if self.store.check_milestone_idempotent(pos.ticket, Milestone::Tp1) {
                let seq = self.store.get_next_seq(pos.ticket);
                commands.push(partial_close_command(pos, seq, config.tp1_close_pct));
                self.store.record_command(pos.ticket, CommandType::PartialClose.wire_name(), seq);

                let remaining_lots = pos.lot_size * (1.0 - config.tp1_close_pct);
                self.store.with_position(pos.ticket, |p| {
                    p.tp1_done = true;
                    p.lot_remaining = remaining_lots;
                    p.state = PositionState::Tp1Done;
                    p.pre_tp1_max_hold_min = None;
                });

                if config.move_be_at == "TP1" && self.store.check_milestone_idempotent(pos.ticket, Milestone::Be) {
                    let be_seq = self.store.get_next_seq(pos.ticket);
                    let (command, be_price) = modify_sl_be_command(pos, market, symbol_spec, be_seq);
                    commands.push(command);
                    self.store.record_command(pos.ticket, CommandType::ModifySl.wire_name(), be_seq);
                    self.store.with_position(pos.ticket, |p| {
                        p.be_set = true;
                        p.sl_current_px = be_price;
                        p.state = PositionState::BeSet;
                    });
                }

                if config.trail_enabled && self.store.check_milestone_idempotent(pos.ticket, Milestone::TrailStart) {
                    let trail_seq = self.store.get_next_seq(pos.ticket);
                    let command = start_trail_command(pos, market, symbol_spec, config, trail_seq);
                    commands.push(command);
                    self.store.record_command(pos.ticket, CommandType::StartTrail.wire_name(), trail_seq);
                    self.store.with_position(pos.ticket, |p| {
                        p.trail_on = true;
                        p.state = PositionState::Trailing;
                    });
                }
            }
        }

        commands
    }
}

/// §4.G "evaluation uses the correct quote side per direction": bid for
/// longs, ask for shorts.
fn check_rr_reached(pos: &Position, market: MarketData, symbol_spec: &SymbolSpec, target_r: f64) -> bool {
    let target_pips = pos.r_pips * target_r;
    match pos.direction {
        Direction::Buy => {
            let target_price = price_plus_pips(symbol_spec, pos.entry_px, Direction::Buy, target_pips);
            market.bid >= target_price
        }
        Direction::Sell => {
            let target_price = price_plus_pips(symbol_spec, pos.entry_px, Direction::Sell, target_pips);
            market.ask <= target_price
        }
    }
}

fn partial_close_command(pos: &Position, seq: u64, close_pct: f64) -> Command {
    let comment = if (close_pct - 0.75).abs() < 1e-9 {
        "BITMODE_PARTIAL75".to_string()
    } else if (close_pct - 0.50).abs() < 1e-9 {
        "BITMODE_PARTIAL50".to_string()
    } else {
        format!("PARTIAL_{}", (close_pct * 100.0) as u32)
    };
    Command {
        fire_id: pos.fire_id.clone(),
        ticket: pos.ticket,
        seq,
        cmd_type: CommandType::PartialClose,
        args: CommandArgs::PartialClose { close_pct, milestone: "TP1".to_string(), comment },
        ts_ms: Utc::now().timestamp_millis(),
        retries: 0,
        priority: CommandType::PartialClose.priority(),
        target_uuid: pos.target_uuid.clone(),
    }
}

fn modify_sl_be_command(pos: &Position, market: MarketData, symbol_spec: &SymbolSpec, seq: u64) -> (Command, f64) {
    let current_spread = spread_pips(symbol_spec, market.bid, market.ask);
    let offset = be_offset_pips(symbol_spec, current_spread, None);
    let be_price = match pos.direction {
        Direction::Buy => price_plus_pips(symbol_spec, pos.entry_px, Direction::Buy, offset),
        Direction::Sell => price_plus_pips(symbol_spec, pos.entry_px, Direction::Sell, -offset),
    };
    let command = Command {
        fire_id: pos.fire_id.clone(),
        ticket: pos.ticket,
        seq,
        cmd_type: CommandType::ModifySl,
        args: CommandArgs::ModifySl { sl_price: be_price, milestone: "BE_AFTER_TP1".to_string(), comment: "BE_MOVE".to_string() },
        ts_ms: Utc::now().timestamp_millis(),
        retries: 0,
        priority: CommandType::ModifySl.priority(),
        target_uuid: pos.target_uuid.clone(),
    };
    (command, be_price)
}

fn start_trail_command(pos: &Position, market: MarketData, symbol_spec: &SymbolSpec, config: &TierConfig, seq: u64) -> Command {
    let distance = if config.trail_method == "ATR" && market.atr.is_some() {
        calculate_trail_distance(symbol_spec, market.atr)
    } else {
        config.trail_step_pips
    };
    Command {
        fire_id: pos.fire_id.clone(),
        ticket: pos.ticket,
        seq,
        cmd_type: CommandType::StartTrail,
        args: CommandArgs::StartTrail {
            method: config.trail_method.clone(),
            distance_pips: distance,
            comment: format!("TRAIL_{}PIPS", distance as u32),
        },
        ts_ms: Utc::now().timestamp_millis(),
        retries: 0,
        priority: CommandType::StartTrail.priority(),
        target_uuid: pos.target_uuid.clone(),
    }
}

pub(super) fn close_command(pos: &Position, seq: u64, reason: String) -> Command {
    let comment = if reason.to_lowercase().contains("timeout") {
        "TIMEOUT_CLOSE".to_string()
    } else if reason.to_lowercase().contains("manual") {
        "MANUAL_CLOSE".to_string()
    } else if reason.to_lowercase().contains("trail") {
        "TRAIL_CLOSE".to_string()
    } else {
        reason.chars().take(20).collect()
    };
    Command {
        fire_id: pos.fire_id.clone(),
        ticket: pos.ticket,
        seq,
        cmd_type: CommandType::Close,
        args: CommandArgs::Close { reason, comment },
        ts_ms: Utc::now().timestamp_millis(),
        retries: 0,
        priority: CommandType::Close.priority(),
        target_uuid: pos.target_uuid.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::DEFAULT_SPEC;
    use std::collections::{HashMap, HashSet};

    fn open_plus_position(store: &StateStore, ticket: u64) {
        store.create_position(Position {
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
            commands_sent: HashMap::new(),
            last_seq: 0,
            target_uuid: Some("EA-UUID".into()),
            pre_tp1_max_hold_min: Some(30),
        });
    }

    fn plus_config() -> TierConfig {
        TierConfig {
            tp1_r: 1.0,
            tp1_close_pct: 0.75,
            trail_method: "ATR".to_string(),
            trail_atr_mult: 2.0,
            trail_step_pips: 20.0,
            max_hold_min: 30,
            rr: 1.0,
            trail_enabled: true,
            move_be_at: "TP1".to_string(),
        }
    }

    #[test]
    fn plus_tier_tp1_then_be_then_trail_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));
        open_plus_position(&store, 1);
        let fsm = ExitFsm::new(&store);
        let config = plus_config();

        // r_pips = 20, TP1_R = 1.0 -> target 20 pips above entry -> bid 1.0820
        let market = MarketData { bid: 1.0820, ask: 1.0821, atr: Some(0.0006) };
        let commands = fsm.on_tick(1, market, &DEFAULT_SPEC, &config);

        assert_eq!(commands.len(), 3);
        assert_eq!(commands[0].cmd_type, CommandType::PartialClose);
        assert_eq!(commands[1].cmd_type, CommandType::ModifySl);
        assert_eq!(commands[2].cmd_type, CommandType::StartTrail);
        assert!(commands[0].seq < commands[1].seq);
        assert!(commands[1].seq < commands[2].seq);
    }

    #[test]
    fn tp1_does_not_refire_on_further_favorable_movement() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));
        open_plus_position(&store, 1);
        let fsm = ExitFsm::new(&store);
        let config = plus_config();

        let first = MarketData { bid: 1.0820, ask: 1.0821, atr: Some(0.0006) };
        fsm.on_tick(1, first, &DEFAULT_SPEC, &config);

        let second = MarketData { bid: 1.0830, ask: 1.0831, atr: Some(0.0006) };
        let commands = fsm.on_tick(1, second, &DEFAULT_SPEC, &config);
        assert!(commands.is_empty());
    }

    #[test]
    fn beginner_tier_closes_fully_at_target() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));
        store.create_position(Position {
            ticket: 7,
            fire_id: "f7".into(),
            user_id: "u7".into(),
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
            open_ts: Utc::now(),
            last_update_ts: Utc::now(),
            milestones_hit: HashSet::new(),
            commands_sent: HashMap::new(),
            last_seq: 0,
            target_uuid: None,
            pre_tp1_max_hold_min: Some(30),
        });
        let fsm = ExitFsm::new(&store);
        let config = TierConfig { rr: 1.5, ..plus_config() };
        let market = MarketData { bid: 1.0830, ask: 1.0831, atr: None };
        let commands = fsm.on_tick(7, market, &DEFAULT_SPEC, &config);
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].cmd_type, CommandType::Close);
        assert_eq!(store.get_snapshot(7).unwrap().state, PositionState::Closed);
    }
}
