//! Sentry (§4.G safety monitor): checks every milestone transition for
//! a violation and tracks a bad-exit streak that auto-disables the
//! hybrid feature flag. Grounded on original source
//! `diagnostics/sentry.py`'s `DiagnosticSentry` (severity table, streak
//! counter, `_auto_disable_feature`), with config-file mutation routed
//! through [`crate::config::RolloutFlagsHandle`] instead of a direct
//! `toml.dump` per spec.md §9 ("on-disk change is a hint the flags
//! loader rereads").

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{error, warn};

use crate::config::RolloutFlagsHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone)]
pub struct Violation {
    pub ticket: u64,
    pub kind: &'static str,
    pub severity: Severity,
    pub detail: String,
}

/// Runtime safety monitor. One instance shared across the exit-drive
/// loop; `bad_exit_streak` is the only mutable state that crosses a
/// tick boundary.
pub struct Sentry {
    flags: Arc<RolloutFlagsHandle>,
    bad_exit_streak: Mutex<u32>,
    recent: Mutex<Vec<Violation>>,
}

const MAX_RECENT: usize = 100;

impl Sentry {
    pub fn new(flags: Arc<RolloutFlagsHandle>) -> Self {
        Sentry { flags, bad_exit_streak: Mutex::new(0), recent: Mutex::new(Vec::new()) }
    }

    /// §4.G: "Partial at current_r < 1.25 → HIGH, alert."
    pub fn check_partial_milestone(&self, ticket: u64, current_r: f64) -> bool {
        let floor = self.flags.get().alert_partial_min_r;
        if current_r < floor {
            self.record(Violation {
                ticket,
                kind: "PREMATURE_PARTIAL",
                severity: Severity::High,
                detail: format!("r={current_r:.2} < {floor:.2}"),
            });
            return false;
        }
        true
    }

    /// §4.G: "BE move before TP1 → HIGH, alert."
    pub fn check_be_milestone(&self, ticket: u64, current_r: f64, tp1_done: bool) -> bool {
        if !tp1_done {
            self.record(Violation { ticket, kind: "PREMATURE_BE", severity: Severity::High, detail: "BE moved before TP1".to_string() });
            return false;
        }
        let floor = self.flags.get().alert_be_min_r;
        if current_r < floor {
            self.record(Violation {
                ticket,
                kind: "LOW_R_BE",
                severity: Severity::Medium,
                detail: format!("r={current_r:.2} < {floor:.2}"),
            });
            return false;
        }
        true
    }

    /// §4.G: "Trail start before TP1 → HIGH, alert."
    pub fn check_trail_milestone(&self, ticket: u64, tp1_done: bool) -> bool {
        if !tp1_done {
            self.record(Violation { ticket, kind: "PREMATURE_TRAIL", severity: Severity::High, detail: "trail before TP1".to_string() });
            return false;
        }
        true
    }

    /// §4.G / §8 "Auto-disable": a close at `r < 0.2` extends the bad
    /// exit streak; at `AUTO_DISABLE_THRESHOLD` consecutive bad exits
    /// the hybrid flag flips off. Any exit with `r > 0.5` resets it.
    pub fn check_bad_exit(&self, ticket: u64, exit_r: f64) -> bool {
        if exit_r < 0.2 {
            let mut streak = self.bad_exit_streak.lock();
            *streak += 1;
            let threshold = self.flags.get().auto_disable_threshold;
            let severity = if *streak >= threshold { Severity::Critical } else { Severity::High };
            let current_streak = *streak;
            drop(streak);
            self.record(Violation { ticket, kind: "BAD_EXIT", severity, detail: format!("exit_r={exit_r:.2} streak={current_streak}") });
            if current_streak >= threshold {
                self.auto_disable();
            }
            return false;
        }
        if exit_r > 0.5 {
            *self.bad_exit_streak.lock() = 0;
        }
        true
    }

    pub fn bad_exit_streak(&self) -> u32 {
        *self.bad_exit_streak.lock()
    }

    fn auto_disable(&self) {
        error!("auto-disabling hybrid feature after bad exit streak");
        self.flags.set_hybrid_enabled(false);
    }

    fn record(&self, violation: Violation) {
        warn!(ticket = violation.ticket, kind = violation.kind, severity = ?violation.severity, detail = %violation.detail, "sentry violation");
        let mut recent = self.recent.lock();
        recent.push(violation);
        if recent.len() > MAX_RECENT {
            recent.remove(0);
        }
    }

    pub fn recent_violations(&self) -> Vec<Violation> {
        self.recent.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn sentry() -> Sentry {
        let dir = tempfile::tempdir().unwrap();
        let flags = RolloutFlagsHandle::load(dir.path().join("rollout.toml"), Duration::from_secs(60)).unwrap();
        Sentry::new(flags)
    }

    #[test]
    fn auto_disables_after_threshold_bad_exits() {
        let s = sentry();
        assert!(s.flags.get().feature_hybrid_enabled);
        s.check_bad_exit(1, 0.1);
        assert!(s.flags.get().feature_hybrid_enabled);
        s.check_bad_exit(2, 0.15);
        assert!(!s.flags.get().feature_hybrid_enabled);
    }

    #[test]
    fn good_exit_resets_streak() {
        let s = sentry();
        s.check_bad_exit(1, 0.1);
        assert_eq!(s.bad_exit_streak(), 1);
        s.check_bad_exit(2, 0.6);
        assert_eq!(s.bad_exit_streak(), 0);
    }

    #[test]
    fn premature_be_before_tp1_is_flagged() {
        let s = sentry();
        assert!(!s.check_be_milestone(1, 1.0, false));
    }
}
