//! Cooldown and daily/hourly dedup (§4.D step 6). Time is passed in
//! explicitly (`now: DateTime<Utc>`) rather than read from the clock
//! internally, so callers — and tests — control it directly (§8 scenario
//! 3's literal `T=0/120s/301s` cooldown enforcement).

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;

use crate::error::ScoreRejection;

const DEFAULT_COOLDOWN_SECS: i64 = 300;
const DEFAULT_DAILY_LIMIT: u32 = 200;
const DEFAULT_HOURLY_TIER1_LIMIT: u32 = 20;

pub struct CooldownTracker {
    cooldown_secs: i64,
    daily_limit: u32,
    hourly_tier1_limit: u32,
    last_publish: Mutex<HashMap<String, DateTime<Utc>>>,
    daily: Mutex<(NaiveDate, u32)>,
    hourly_tier1: Mutex<VecDeque<DateTime<Utc>>>,
}

impl CooldownTracker {
    pub fn new(cooldown_secs: i64, daily_limit: u32, hourly_tier1_limit: u32, now: DateTime<Utc>) -> Self {
        CooldownTracker {
            cooldown_secs,
            daily_limit,
            hourly_tier1_limit,
            last_publish: Mutex::new(HashMap::new()),
            daily: Mutex::new((now.date_naive(), 0)),
            hourly_tier1: Mutex::new(VecDeque::new()),
        }
    }

    /// Restores the daily counter from persisted state at boot (§6).
    pub fn restore_daily_count(&self, date: NaiveDate, count: u32) {
        *self.daily.lock() = (date, count);
    }

    pub fn daily_count(&self) -> u32 {
        self.daily.lock().1
    }

    /// Checks every applicable gate for `symbol` at `now` without
    /// recording a publication; callers still need to call
    /// [`Self::record_publication`] on success.
    pub fn check(&self, symbol: &str, is_tier1: bool, now: DateTime<Utc>) -> Result<(), ScoreRejection> {
        if let Some(last) = self.last_publish.lock().get(symbol) {
            let elapsed = (now - *last).num_seconds();
            if elapsed < self.cooldown_secs {
                return Err(ScoreRejection::Cooldown {
                    remaining_secs: (self.cooldown_secs - elapsed).max(0) as u64,
                });
            }
        }
        {
            let daily = self.daily.lock();
            if daily.0 == now.date_naive() && daily.1 >= self.daily_limit {
                return Err(ScoreRejection::DailyQuota { count: daily.1, limit: self.daily_limit });
            }
        }
        if is_tier1 {
            let hourly = self.hourly_tier1.lock();
            let window_start = now - chrono::Duration::hours(1);
            let count = hourly.iter().filter(|&&t| t > window_start).count() as u32;
            if count >= self.hourly_tier1_limit {
                return Err(ScoreRejection::HourlyQuota { count, limit: self.hourly_tier1_limit });
            }
        }
        Ok(())
    }

    /// Records a successful publication against every gate.
    pub fn record_publication(&self, symbol: &str, is_tier1: bool, now: DateTime<Utc>) {
        self.last_publish.lock().insert(symbol.to_string(), now);
        {
            let mut daily = self.daily.lock();
            if daily.0 != now.date_naive() {
                *daily = (now.date_naive(), 0);
            }
            daily.1 += 1;
        }
        if is_tier1 {
            let mut hourly = self.hourly_tier1.lock();
            hourly.push_back(now);
            let window_start = now - chrono::Duration::hours(1);
            while hourly.front().map_or(false, |t| *t <= window_start) {
                hourly.pop_front();
            }
        }
    }
}

impl Default for CooldownTracker {
    fn default() -> Self {
        CooldownTracker::new(DEFAULT_COOLDOWN_SECS, DEFAULT_DAILY_LIMIT, DEFAULT_HOURLY_TIER1_LIMIT, Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn cooldown_blocks_within_window_then_allows_after() {
        let tracker = CooldownTracker::new(300, 200, 20, t(0));
        assert!(tracker.check("EURUSD", false, t(0)).is_ok());
        tracker.record_publication("EURUSD", false, t(0));

        assert!(matches!(tracker.check("EURUSD", false, t(120)), Err(ScoreRejection::Cooldown { .. })));
        assert!(tracker.check("EURUSD", false, t(301)).is_ok());
    }

    #[test]
    fn daily_quota_resets_on_new_day() {
        let tracker = CooldownTracker::new(0, 1, 20, t(0));
        assert!(tracker.check("EURUSD", false, t(0)).is_ok());
        tracker.record_publication("EURUSD", false, t(0));
        assert!(matches!(tracker.check("GBPUSD", false, t(1)), Err(ScoreRejection::DailyQuota { .. })));
        let next_day = t(0) + chrono::Duration::days(1);
        assert!(tracker.check("GBPUSD", false, next_day).is_ok());
    }
}
