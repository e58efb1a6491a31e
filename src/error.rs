//! Error taxonomy by kind, not by failing type.
//!
//! The feed, scanner and command-processor loops never propagate an error
//! out of themselves: every public function here returns a typed error
//! that the caller matches on and logs, per the "propagate nothing across
//! component boundaries" policy. `anyhow::Result` is reserved for the
//! composition root (config loading, engine wiring, persistence I/O at
//! startup) where there is no meaningful recovery beyond refusing to boot.

use thiserror::Error;

/// Top-level error kind, used only where a caller genuinely needs to
/// distinguish kinds across module boundaries (e.g. the engine's fatal
/// startup path). Most internal code matches on the narrower enums below.
#[derive(Debug, Error)]
pub enum EliteGuardError {
    #[error("feed unavailable: {0}")]
    Feed(#[from] FeedError),

    #[error("outbound publisher failed to bind: {0}")]
    PublisherBind(String),

    #[error("config error: {0}")]
    Config(#[from] anyhow::Error),
}

/// Feed Bridge failures (§4.A). Internal recv/parse errors never reach
/// this type; only a failed socket rebind does, per spec.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("inbound socket rebind failed after {idle_secs}s idle")]
    FeedUnavailable { idle_secs: u64 },
}

/// Why a PatternSignal did not become a published Signal (§4.D).
/// Every variant here is a silent-drop outcome except where noted;
/// callers log at the granularity the taxonomy implies (debug for
/// routine skips, warn for resource exhaustion).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScoreRejection {
    #[error("extreme chop: ratio {ratio:.4} < {threshold:.4}")]
    ExtremeChop { ratio: f64, threshold: f64 },

    #[error("below tier threshold: {score:.1} < {threshold:.1}")]
    BelowThreshold { score: f64, threshold: f64 },

    #[error("combo disabled: {symbol}/{pattern}/{session:?} win-rate below floor")]
    DisabledCombo {
        symbol: String,
        pattern: String,
        session: String,
    },

    #[error("risk/reward below floor: {rr:.2} < {floor:.2}")]
    RrFloor { rr: f64, floor: f64 },

    #[error("symbol cooldown active: {remaining_secs}s remaining")]
    Cooldown { remaining_secs: u64 },

    #[error("daily quota exhausted: {count}/{limit}")]
    DailyQuota { count: u32, limit: u32 },

    #[error("hourly tier-1 quota exhausted: {count}/{limit}")]
    HourlyQuota { count: u32, limit: u32 },

    #[error("news window blocked: {reason}")]
    NewsBlock { reason: String },
}

/// Shield Filter rejection reasons (§4.E / §8 "Shield reject" property).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ShieldRejection {
    #[error("insufficient consensus sources: {got} < {required}")]
    InsufficientSources { got: usize, required: usize },

    #[error("price deviation {deviation_pct:.3}% exceeds {limit_pct:.3}%")]
    PriceDeviation { deviation_pct: f64, limit_pct: f64 },

    #[error("consensus confidence {confidence:.1} below {floor:.1}")]
    LowConfidence { confidence: f64, floor: f64 },

    #[error("too many outliers: {outliers} > {max}")]
    TooManyOutliers { outliers: usize, max: usize },

    #[error("consensus stale: {age_secs}s > {max_secs}s")]
    StaleConsensus { age_secs: u64, max_secs: u64 },
}

/// Command Bus failures (§4.G). These are never fatal: a command that
/// fails to send is retried up to `max_retries` and then dropped with
/// an ERROR log, never propagated to the caller that enqueued it.
#[derive(Debug, Error)]
pub enum CommandBusError {
    #[error("ticket {ticket} rate-limited, {wait_ms}ms remaining")]
    RateLimited { ticket: u64, wait_ms: u64 },

    #[error("command for ticket {ticket} exhausted {retries} retries")]
    RetriesExhausted { ticket: u64, retries: u32 },

    #[error("no target_uuid known for ticket {ticket}")]
    MissingTargetUuid { ticket: u64 },
}
