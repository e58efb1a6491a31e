//! Core data model (§3): ticks, candles, pattern signals, published
//! signals, symbol specs, positions, commands and timeout metadata.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single inbound price update. Immutable once constructed; held in a
/// bounded per-symbol ring (`TickRing`, capacity 200).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Tick {
    pub bid: f64,
    pub ask: f64,
    pub volume: f64,
    pub ts_monotonic: i64,
}

impl Tick {
    pub fn mid(&self) -> f64 {
        (self.bid + self.ask) / 2.0
    }

    pub fn spread(&self) -> f64 {
        (self.ask - self.bid).abs()
    }
}

/// Candle timeframes the builder cascades through (§4.B).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    M1,
    M5,
    M15,
}

impl Timeframe {
    pub const fn bucket_seconds(self) -> i64 {
        match self {
            Timeframe::M1 => 60,
            Timeframe::M5 => 300,
            Timeframe::M15 => 900,
        }
    }
}

/// One OHLCV bar. `bucket_start_ts` is the floor of the bar's start time
/// to the timeframe's bucket size. Completed candles are immutable.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub bucket_start_ts: i64,
}

impl Candle {
    pub fn from_tick(bucket_start_ts: i64, mid: f64, volume: f64) -> Self {
        Candle {
            open: mid,
            high: mid,
            low: mid,
            close: mid,
            volume,
            bucket_start_ts,
        }
    }

    pub fn apply_tick(&mut self, mid: f64, volume: f64) {
        self.high = self.high.max(mid);
        self.low = self.low.min(mid);
        self.close = mid;
        self.volume += volume;
    }

    /// Aggregate a run of child candles (ordered oldest-first) into a
    /// single parent bar per §3: open of first child, close of last,
    /// high/low over all, volume summed.
    pub fn aggregate(children: &[Candle]) -> Option<Candle> {
        let first = children.first()?;
        let last = children.last()?;
        let high = children.iter().fold(f64::MIN, |acc, c| acc.max(c.high));
        let low = children.iter().fold(f64::MAX, |acc, c| acc.min(c.low));
        let volume: f64 = children.iter().map(|c| c.volume).sum();
        Some(Candle {
            open: first.open,
            high,
            low,
            close: last.close,
            volume,
            bucket_start_ts: first.bucket_start_ts,
        })
    }
}

/// Trade direction. `str` round-trips with the original `"BUY"/"SELL"`
/// wire vocabulary via `Direction::parse`/`Display`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    pub fn parse(s: &str) -> Option<Direction> {
        match s.to_ascii_uppercase().as_str() {
            "BUY" => Some(Direction::Buy),
            "SELL" => Some(Direction::Sell),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Buy => "BUY",
            Direction::Sell => "SELL",
        }
    }
}

/// Trading session, derived from the tick's UTC hour (GLOSSARY).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Session {
    London,
    Overlap,
    Ny,
    Asian,
    OffHours,
}

impl Session {
    /// Overlap (12-16 UTC) takes priority over the London/NY windows it
    /// sits inside of, matching the GLOSSARY's window definitions.
    pub fn from_utc_hour(hour: u32) -> Session {
        match hour {
            12..=15 => Session::Overlap,
            7..=11 => Session::London,
            16..=21 => Session::Ny,
            22..=23 | 0..=6 => Session::Asian,
            _ => Session::OffHours,
        }
    }

    pub fn session_multiplier(self) -> f64 {
        match self {
            Session::Overlap => 1.2,
            Session::Asian => 0.8,
            Session::London | Session::Ny => 1.0,
            Session::OffHours => 1.0,
        }
    }
}

/// Pattern family identifiers (§4.C). `SweepReturn`/`SweepAndReturn` in
/// the original source are treated as a single alias per spec.md §9.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Pattern {
    LiquiditySweepReversal,
    OrderBlockBounce,
    FairValueGapFill,
    VcbBreakout,
    SweepAndReturn,
    MomentumBurst,
    SessionOpenFade,
    MicroBreakoutRetest,
}

impl Pattern {
    pub fn name(self) -> &'static str {
        match self {
            Pattern::LiquiditySweepReversal => "LIQUIDITY_SWEEP_REVERSAL",
            Pattern::OrderBlockBounce => "ORDER_BLOCK_BOUNCE",
            Pattern::FairValueGapFill => "FAIR_VALUE_GAP_FILL",
            Pattern::VcbBreakout => "VCB_BREAKOUT",
            Pattern::SweepAndReturn => "SWEEP_AND_RETURN",
            Pattern::MomentumBurst => "MOMENTUM_BURST",
            Pattern::SessionOpenFade => "SESSION_OPEN_FADE",
            Pattern::MicroBreakoutRetest => "MICRO_BREAKOUT_RETEST",
        }
    }

    /// Accepts either historical spelling for the sweep-and-return family.
    pub fn parse(s: &str) -> Option<Pattern> {
        match s {
            "LIQUIDITY_SWEEP_REVERSAL" => Some(Pattern::LiquiditySweepReversal),
            "ORDER_BLOCK_BOUNCE" => Some(Pattern::OrderBlockBounce),
            "FAIR_VALUE_GAP_FILL" => Some(Pattern::FairValueGapFill),
            "VCB_BREAKOUT" => Some(Pattern::VcbBreakout),
            "SWEEP_AND_RETURN" | "SWEEP_RETURN" => Some(Pattern::SweepAndReturn),
            "MOMENTUM_BURST" => Some(Pattern::MomentumBurst),
            "SESSION_OPEN_FADE" => Some(Pattern::SessionOpenFade),
            "MICRO_BREAKOUT_RETEST" => Some(Pattern::MicroBreakoutRetest),
            _ => None,
        }
    }

    pub fn base_score(self) -> f64 {
        match self {
            Pattern::LiquiditySweepReversal => 75.0,
            Pattern::OrderBlockBounce => 70.0,
            Pattern::FairValueGapFill => 65.0,
            Pattern::VcbBreakout => 72.5,
            Pattern::SweepAndReturn => 70.0,
            Pattern::MomentumBurst => 70.0,
            Pattern::SessionOpenFade => 75.0,
            Pattern::MicroBreakoutRetest => 72.0,
        }
    }

    /// Reversal-family patterns are subject to the reversal-specific
    /// 0.8 RR floor called out in §3's invariants.
    pub fn is_reversal(self) -> bool {
        matches!(
            self,
            Pattern::LiquiditySweepReversal
                | Pattern::OrderBlockBounce
                | Pattern::FairValueGapFill
                | Pattern::SweepAndReturn
        )
    }
}

/// Transient output of a detector (§3). Never observed externally;
/// either discarded by the scorer or promoted into a [`Signal`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternSignal {
    pub pattern: Pattern,
    pub direction: Direction,
    pub entry_price: f64,
    pub base_confidence: f64,
    pub final_score: f64,
    pub timeframe: Timeframe,
    pub pair: String,
    pub tf_alignment: f64,
    pub calculated_sl: Option<f64>,
    pub calculated_tp: Option<f64>,
    pub sl_pips: Option<f64>,
    pub tp_pips: Option<f64>,
    pub pattern_metadata: HashMap<String, f64>,
}

impl PatternSignal {
    pub fn new(
        pattern: Pattern,
        direction: Direction,
        pair: impl Into<String>,
        entry_price: f64,
        base_confidence: f64,
        timeframe: Timeframe,
    ) -> Self {
        PatternSignal {
            pattern,
            direction,
            entry_price,
            base_confidence,
            final_score: base_confidence,
            timeframe,
            pair: pair.into(),
            tf_alignment: 0.0,
            calculated_sl: None,
            calculated_tp: None,
            sl_pips: None,
            tp_pips: None,
            pattern_metadata: HashMap::new(),
        }
    }
}

/// Classification (not a presentation label) from §4.D step 4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalMode {
    Rapid,
    Sniper,
}

/// Presentation label, a 1:1 function of [`SignalMode`] (spec.md §9: the
/// two vocabularies are orthogonal concerns, not independent choices).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalType {
    RapidAssault,
    PrecisionStrike,
}

impl From<SignalMode> for SignalType {
    fn from(mode: SignalMode) -> Self {
        match mode {
            SignalMode::Rapid => SignalType::RapidAssault,
            SignalMode::Sniper => SignalType::PrecisionStrike,
        }
    }
}

/// The breakdown backing a published signal's confidence score. The
/// publisher (§4.F) refuses to emit a signal lacking this.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfidenceBreakdown {
    pub base: f64,
    pub session_bonus: f64,
    pub volume_bonus: f64,
    pub spread_bonus: f64,
    pub alignment_bonus: f64,
    pub volatility_bonus: f64,
    pub momentum_bonus: f64,
    pub micro_trend_bonus: f64,
    pub news_penalty: f64,
}

/// The externally observable record (§3). Once constructed and
/// published, immutable; any further information is a separate event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub signal_id: String,
    pub pair: String,
    pub direction: Direction,
    pub pattern: Pattern,
    pub signal_mode: SignalMode,
    pub signal_type: SignalType,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub stop_pips: f64,
    pub target_pips: f64,
    pub risk_reward: f64,
    pub session: Session,
    pub expires_at: DateTime<Utc>,
    pub xp_reward: f64,
    pub shield_score: f64,
    pub citadel_shielded: bool,
    pub ml_tier: f64,
    pub created_at: DateTime<Utc>,
    pub confidence_breakdown: ConfidenceBreakdown,
}

impl Signal {
    pub fn new_id(pair: &str, created_at: DateTime<Utc>) -> String {
        format!("ELITE_GUARD_{pair}_{}", created_at.timestamp())
    }
}

/// Per-symbol static configuration (§3), looked up with a `DEFAULT`
/// fallback (symbols.rs).
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct SymbolSpec {
    pub pip_size: f64,
    pub points_per_pip: f64,
    pub min_stop_pips: f64,
    pub be_offset_min_pips: f64,
    pub trail_min_pips: f64,
    pub atr_mult_default: f64,
    pub decimals: u32,
}

/// Position lifecycle state (§4.G FSM).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionState {
    Entered,
    Tp1Done,
    BeSet,
    Trailing,
    Closed,
}

/// Idempotency key for one-shot lifecycle events (spec.md §9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Milestone {
    Tp1,
    Be,
    TrailStart,
}

/// A managed position, owned exclusively by the Exit FSM and serialized
/// to disk on every mutation (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub ticket: u64,
    pub fire_id: String,
    pub user_id: String,
    pub tier: String,
    pub symbol: String,
    pub direction: Direction,
    pub entry_px: f64,
    pub sl_init_px: f64,
    pub sl_current_px: f64,
    pub tp_px: f64,
    pub r_pips: f64,
    pub lot_size: f64,
    pub lot_remaining: f64,
    pub state: PositionState,
    pub tp1_done: bool,
    pub be_set: bool,
    pub trail_on: bool,
    pub open_ts: DateTime<Utc>,
    pub last_update_ts: DateTime<Utc>,
    pub milestones_hit: HashSet<Milestone>,
    pub commands_sent: HashMap<String, u64>,
    pub last_seq: u64,
    pub target_uuid: Option<String>,
    /// Cleared on TP1 or close; drives the timeout scan in `exit::timers`.
    pub pre_tp1_max_hold_min: Option<u32>,
}

impl Position {
    pub fn is_beginner(&self) -> bool {
        self.tier.eq_ignore_ascii_case("TIER_BEGINNER")
    }
}

/// Command kinds dispatched to the execution venue (§3/§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandType {
    PartialClose,
    ModifySl,
    Close,
    StartTrail,
}

impl CommandType {
    /// Close commands outrank modifications (§4.G): lower number = higher
    /// priority in the command-bus min-heap.
    pub fn priority(self) -> u8 {
        match self {
            CommandType::Close => 0,
            CommandType::PartialClose | CommandType::ModifySl | CommandType::StartTrail => 1,
        }
    }

    pub fn wire_name(self) -> &'static str {
        match self {
            CommandType::PartialClose => "PARTIAL_CLOSE",
            CommandType::ModifySl => "MODIFY_SL",
            CommandType::Close => "CLOSE",
            CommandType::StartTrail => "START_TRAIL",
        }
    }
}

/// Per-variant argument payload (§6). `comment` is always populated by
/// the command bus from the milestone/reason per the supplemented
/// command-comment-tagging feature.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum CommandArgs {
    PartialClose {
        close_pct: f64,
        milestone: String,
        comment: String,
    },
    ModifySl {
        sl_price: f64,
        milestone: String,
        comment: String,
    },
    Close {
        reason: String,
        comment: String,
    },
    StartTrail {
        method: String,
        distance_pips: f64,
        comment: String,
    },
}

/// Enqueued to the command bus's `(priority, seq)` min-heap (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    pub fire_id: String,
    pub ticket: u64,
    pub seq: u64,
    pub cmd_type: CommandType,
    pub args: CommandArgs,
    pub ts_ms: i64,
    pub retries: u32,
    pub priority: u8,
    pub target_uuid: Option<String>,
}

impl PartialEq for Command {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}
impl Eq for Command {}
impl PartialOrd for Command {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Command {
    /// `BinaryHeap` is a max-heap; reverse so lower `(priority, seq)`
    /// pops first, matching the original's `PriorityQueue` ordering.
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (other.priority, other.seq).cmp(&(self.priority, self.seq))
    }
}

/// Persisted timeout row (§3/§6); survives restart, cleared on TP1/close.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutMeta {
    pub ticket: u64,
    pub open_ts_utc: DateTime<Utc>,
    pub pre_tp1_max_hold_min: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candle_aggregate_matches_spec_rule() {
        let children = vec![
            Candle { open: 1.0, high: 1.2, low: 0.9, close: 1.1, volume: 10.0, bucket_start_ts: 0 },
            Candle { open: 1.1, high: 1.3, low: 1.0, close: 1.25, volume: 5.0, bucket_start_ts: 60 },
            Candle { open: 1.25, high: 1.4, low: 1.2, close: 1.3, volume: 7.0, bucket_start_ts: 120 },
        ];
        let agg = Candle::aggregate(&children).unwrap();
        assert_eq!(agg.open, 1.0);
        assert_eq!(agg.close, 1.3);
        assert_eq!(agg.high, 1.4);
        assert_eq!(agg.low, 0.9);
        assert_eq!(agg.volume, 22.0);
        assert_eq!(agg.bucket_start_ts, 0);
    }

    #[test]
    fn command_ordering_is_priority_then_seq() {
        use std::collections::BinaryHeap;
        let mut heap = BinaryHeap::new();
        let make = |priority: u8, seq: u64| Command {
            fire_id: "f".into(),
            ticket: 1,
            seq,
            cmd_type: CommandType::ModifySl,
            args: CommandArgs::ModifySl { sl_price: 1.0, milestone: "".into(), comment: "".into() },
            ts_ms: 0,
            retries: 0,
            priority,
            target_uuid: None,
        };
        heap.push(make(1, 5));
        heap.push(make(0, 9));
        heap.push(make(1, 1));
        let first = heap.pop().unwrap();
        assert_eq!(first.priority, 0);
        assert_eq!(first.seq, 9);
        let second = heap.pop().unwrap();
        assert_eq!(second.priority, 1);
        assert_eq!(second.seq, 1);
    }

    #[test]
    fn pattern_aliases_sweep_and_return() {
        assert_eq!(Pattern::parse("SWEEP_RETURN"), Some(Pattern::SweepAndReturn));
        assert_eq!(Pattern::parse("SWEEP_AND_RETURN"), Some(Pattern::SweepAndReturn));
    }

    #[test]
    fn signal_type_is_one_to_one_with_mode() {
        assert_eq!(SignalType::from(SignalMode::Rapid), SignalType::RapidAssault);
        assert_eq!(SignalType::from(SignalMode::Sniper), SignalType::PrecisionStrike);
    }
}
