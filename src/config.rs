//! Configuration: CLI flags, on-disk TOML tables (symbols, tiers,
//! rollout flags) with `DEFAULT`/`INHERIT` fallback, and the hot-reloadable
//! rollout-flags handle used by the Sentry auto-disable path.
//!
//! Grounded on `models.rs::Config::from_env`'s env-var-with-defaults
//! style (teacher, before removal) and on `symbols.py`/`exit_profiles.py`'s
//! dict-with-`DEFAULT`/`INHERIT` lookup, translated into explicit
//! `HashMap` fallback chains rather than dynamic attribute merging
//! (spec.md §9).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use clap::Parser;
use serde::Deserialize;

use crate::model::SymbolSpec;
use crate::symbols::DEFAULT_SPEC;

/// CLI flags for the `elite-guard` binary.
#[derive(Debug, Parser)]
#[command(name = "elite-guard", about = "Real-time forex signal engine")]
pub struct Cli {
    /// Directory containing symbols.toml, tiers.toml, rollout.toml
    #[arg(long, env = "ELITE_GUARD_CONFIG_DIR", default_value = "config")]
    pub config_dir: PathBuf,

    /// Directory for candle cache, position state, and log sinks
    #[arg(long, env = "ELITE_GUARD_DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,

    /// Upstream inbound address (PULL)
    #[arg(long, env = "ELITE_GUARD_UPSTREAM_ADDR")]
    pub upstream_addr: Option<String>,

    /// Downstream outbound address (PUB)
    #[arg(long, env = "ELITE_GUARD_DOWNSTREAM_ADDR")]
    pub downstream_addr: Option<String>,

    /// Outbound command channel address (PUSH) — the execution venue's
    /// listening side
    #[arg(long, env = "ELITE_GUARD_COMMAND_ADDR")]
    pub command_addr: Option<String>,

    /// Inbound confirmation channel address (PULL)
    #[arg(long, env = "ELITE_GUARD_CONFIRM_ADDR")]
    pub confirm_addr: Option<String>,

    /// Address the /healthz and /metrics HTTP surface binds to
    #[arg(long, env = "ELITE_GUARD_HTTP_ADDR", default_value = "0.0.0.0:9090")]
    pub http_addr: String,

    /// Pattern-scanner cadence in seconds (§5)
    #[arg(long, env = "ELITE_GUARD_SCAN_INTERVAL_SECS", default_value_t = 15)]
    pub scan_interval_secs: u64,

    /// Log level filter, passed straight to `EnvFilter`
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,
}

/// Per-symbol static config table with `DEFAULT` fallback (§3/§6).
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SymbolTable {
    #[serde(flatten)]
    entries: HashMap<String, SymbolSpec>,
}

impl SymbolTable {
    pub fn load(path: &Path) -> anyhow::Result<SymbolTable> {
        if !path.exists() {
            return Ok(SymbolTable::default());
        }
        let raw = std::fs::read_to_string(path)?;
        let table: SymbolTable = toml::from_str(&raw)?;
        Ok(table)
    }

    /// Looks up `symbol`, falling back to the table's `DEFAULT` entry,
    /// falling back further to [`crate::symbols::DEFAULT_SPEC`] if the
    /// table itself has none.
    pub fn get(&self, symbol: &str) -> SymbolSpec {
        self.entries
            .get(symbol)
            .or_else(|| self.entries.get("DEFAULT"))
            .copied()
            .unwrap_or(DEFAULT_SPEC)
    }
}

/// Raw per-tier row as stored on disk; `inherit` layers onto a parent
/// before fields are read (exit_profiles.py `_get_tier_config`).
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TierConfigRow {
    #[serde(rename = "INHERIT")]
    pub inherit: Option<String>,
    #[serde(rename = "TP1_R")]
    pub tp1_r: Option<f64>,
    #[serde(rename = "TP1_CLOSE_PCT")]
    pub tp1_close_pct: Option<f64>,
    #[serde(rename = "TP2_R")]
    pub tp2_r: Option<f64>,
    #[serde(rename = "TRAIL_METHOD")]
    pub trail_method: Option<String>,
    #[serde(rename = "TRAIL_ATR_MULT")]
    pub trail_atr_mult: Option<f64>,
    #[serde(rename = "TRAIL_STEP_PIPS")]
    pub trail_step_pips: Option<f64>,
    #[serde(rename = "MAX_HOLD_MIN")]
    pub max_hold_min: Option<u32>,
    #[serde(rename = "RR")]
    pub rr: Option<f64>,
    #[serde(rename = "TRAIL_ENABLED")]
    pub trail_enabled: Option<bool>,
    #[serde(rename = "MOVE_BE_AT")]
    pub move_be_at: Option<String>,
}

/// Fully-resolved tier config after inheritance has been applied.
#[derive(Debug, Clone)]
pub struct TierConfig {
    pub tp1_r: f64,
    pub tp1_close_pct: f64,
    pub trail_method: String,
    pub trail_atr_mult: f64,
    pub trail_step_pips: f64,
    pub max_hold_min: u32,
    pub rr: f64,
    pub trail_enabled: bool,
    pub move_be_at: String,
}

impl Default for TierConfig {
    fn default() -> Self {
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
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TierTable {
    #[serde(flatten)]
    rows: HashMap<String, TierConfigRow>,
}

impl TierTable {
    pub fn load(path: &Path) -> anyhow::Result<TierTable> {
        if !path.exists() {
            return Ok(TierTable::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }

    /// Resolves `tier`, merging one level of `INHERIT` onto a parent row
    /// (child fields win), matching `_get_tier_config`'s shallow merge.
    pub fn resolve(&self, tier: &str) -> TierConfig {
        let Some(row) = self.rows.get(tier) else {
            return TierConfig::default();
        };
        let parent = row
            .inherit
            .as_deref()
            .and_then(|p| self.rows.get(p))
            .cloned()
            .unwrap_or_default();
        let base = TierConfig::default();
        TierConfig {
            tp1_r: row.tp1_r.or(parent.tp1_r).unwrap_or(base.tp1_r),
            tp1_close_pct: row
                .tp1_close_pct
                .or(parent.tp1_close_pct)
                .unwrap_or(base.tp1_close_pct),
            trail_method: row
                .trail_method
                .clone()
                .or(parent.trail_method)
                .unwrap_or(base.trail_method),
            trail_atr_mult: row
                .trail_atr_mult
                .or(parent.trail_atr_mult)
                .unwrap_or(base.trail_atr_mult),
            trail_step_pips: row
                .trail_step_pips
                .or(parent.trail_step_pips)
                .unwrap_or(base.trail_step_pips),
            max_hold_min: row.max_hold_min.or(parent.max_hold_min).unwrap_or(base.max_hold_min),
            rr: row.rr.or(parent.rr).unwrap_or(base.rr),
            trail_enabled: row
                .trail_enabled
                .or(parent.trail_enabled)
                .unwrap_or(base.trail_enabled),
            move_be_at: row
                .move_be_at
                .clone()
                .or(parent.move_be_at)
                .unwrap_or(base.move_be_at),
        }
    }
}

/// Rollout flags (§6), held behind an `ArcSwap` so the Sentry auto-disable
/// path can flip `feature_hybrid_enabled` without any writer/reader lock
/// contention (spec.md §9 "FeatureFlags object held behind an atomic").
#[derive(Debug, Clone, Deserialize, serde::Serialize)]
#[serde(default)]
pub struct RolloutFlags {
    #[serde(rename = "FEATURE_HYBRID_ENABLED")]
    pub feature_hybrid_enabled: bool,
    #[serde(rename = "MIN_CMD_GAP_MS")]
    pub min_cmd_gap_ms: u64,
    #[serde(rename = "MAX_RETRIES")]
    pub max_retries: u32,
    #[serde(rename = "RETRY_BACKOFF_MS")]
    pub retry_backoff_ms: Vec<u64>,
    #[serde(rename = "AUTO_DISABLE_THRESHOLD")]
    pub auto_disable_threshold: u32,
    #[serde(rename = "ALERT_PARTIAL_MIN_R")]
    pub alert_partial_min_r: f64,
    #[serde(rename = "ALERT_BE_MIN_R")]
    pub alert_be_min_r: f64,
    /// Not in the original Python config; spec.md §9 asks for the ±3%
    /// confidence jitter to become configurable.
    pub confidence_jitter_pct: f64,
    /// spec.md §9 open question: default chosen as 2.0, see DESIGN.md.
    pub min_rr_ratio: f64,
}

impl Default for RolloutFlags {
    fn default() -> Self {
        RolloutFlags {
            feature_hybrid_enabled: true,
            min_cmd_gap_ms: 700,
            max_retries: 3,
            retry_backoff_ms: vec![150, 300, 600],
            auto_disable_threshold: 2,
            alert_partial_min_r: 1.25,
            alert_be_min_r: 0.0,
            confidence_jitter_pct: 0.03,
            min_rr_ratio: 2.0,
        }
    }
}

/// Hot-reloadable handle: the on-disk file is re-read at most every
/// `reload_interval`, and auto-disable writes go through [`set_hybrid_enabled`]
/// rather than directly rewriting the file from multiple threads.
pub struct RolloutFlagsHandle {
    current: ArcSwap<RolloutFlags>,
    path: PathBuf,
    reload_interval: Duration,
    last_reload: parking_lot::Mutex<Instant>,
}

impl RolloutFlagsHandle {
    pub fn load(path: PathBuf, reload_interval: Duration) -> anyhow::Result<Arc<Self>> {
        let flags = Self::read_from_disk(&path).unwrap_or_default();
        Ok(Arc::new(RolloutFlagsHandle {
            current: ArcSwap::from_pointee(flags),
            path,
            reload_interval,
            last_reload: parking_lot::Mutex::new(Instant::now()),
        }))
    }

    fn read_from_disk(path: &Path) -> anyhow::Result<RolloutFlags> {
        if !path.exists() {
            return Ok(RolloutFlags::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }

    pub fn get(&self) -> Arc<RolloutFlags> {
        self.current.load_full()
    }

    /// Reloads from disk if `reload_interval` has elapsed since the last
    /// reload; a no-op otherwise (debounces a flapping config file).
    pub fn maybe_reload(&self) {
        let mut last = self.last_reload.lock();
        if last.elapsed() < self.reload_interval {
            return;
        }
        *last = Instant::now();
        if let Ok(flags) = Self::read_from_disk(&self.path) {
            self.current.store(Arc::new(flags));
        }
    }

    /// Flips the hybrid feature flag in memory and best-effort persists
    /// it to disk; failure to persist is logged, never propagated
    /// (Sentry auto-disable must never panic the exit-drive loop).
    pub fn set_hybrid_enabled(&self, enabled: bool) {
        let mut next = (**self.current.load()).clone();
        next.feature_hybrid_enabled = enabled;
        if let Ok(serialized) = toml::to_string_pretty(&next) {
            let tmp = self.path.with_extension("tmp");
            if std::fs::write(&tmp, serialized).and_then(|_| std::fs::rename(&tmp, &self.path)).is_err()
            {
                tracing::warn!("failed to persist rollout flags after auto-disable flip");
            }
        }
        self.current.store(Arc::new(next));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_table_inherits_parent_fields() {
        let toml_src = r#"
            [TIER_BEGINNER]
            RR = 1.5
            MAX_HOLD_MIN = 30

            [TIER_PLUS]
            INHERIT = "TIER_BEGINNER"
            TP1_R = 1.0
            TP1_CLOSE_PCT = 0.75
        "#;
        let table: TierTable = toml::from_str(toml_src).unwrap();
        let plus = table.resolve("TIER_PLUS");
        assert_eq!(plus.tp1_r, 1.0);
        assert_eq!(plus.max_hold_min, 30);
    }

    #[test]
    fn symbol_table_falls_back_to_default_entry() {
        let toml_src = r#"
            [DEFAULT]
            pip_size = 0.0001
            points_per_pip = 10.0
            min_stop_pips = 5.0
            be_offset_min_pips = 2.0
            trail_min_pips = 12.0
            atr_mult_default = 2.0
            decimals = 5
        "#;
        let table: SymbolTable = toml::from_str(toml_src).unwrap();
        let spec = table.get("UNKNOWNPAIR");
        assert_eq!(spec.pip_size, 0.0001);
    }
}
