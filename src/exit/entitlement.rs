//! Entitlement (§4.G): maps `user_id → tier` and keeps a tier-change
//! audit trail. Grounded on original source `entitlement.py`'s
//! `EntitlementManager` (SQLite-backed `user_entitlements` +
//! `tier_history` tables, default-to-beginner-on-first-sight), using
//! `rusqlite` per the teacher's own dependency rather than hand-rolling
//! a store.

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{params, Connection};

pub const TIER_BEGINNER: &str = "TIER_BEGINNER";
pub const TIER_PLUS: &str = "TIER_PLUS";
pub const TIER_PRO: &str = "TIER_PRO";

#[derive(Debug, Clone, Copy)]
pub struct TierFeatures {
    pub max_concurrent: u32,
    pub autofire: bool,
}

pub fn tier_features(tier: &str) -> TierFeatures {
    match tier {
        TIER_PLUS => TierFeatures { max_concurrent: 3, autofire: false },
        TIER_PRO => TierFeatures { max_concurrent: 5, autofire: true },
        _ => TierFeatures { max_concurrent: 1, autofire: false },
    }
}

#[derive(Debug, Clone)]
pub struct TierHistoryEntry {
    pub old_tier: Option<String>,
    pub new_tier: String,
    pub changed_by: String,
    pub reason: String,
}

pub struct EntitlementManager {
    conn: Mutex<Connection>,
}

impl EntitlementManager {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS user_entitlements (
                user_id TEXT PRIMARY KEY,
                tier TEXT NOT NULL DEFAULT 'TIER_BEGINNER'
            );
            CREATE TABLE IF NOT EXISTS tier_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                old_tier TEXT,
                new_tier TEXT NOT NULL,
                changed_by TEXT,
                reason TEXT
            );",
        )?;
        Ok(EntitlementManager { conn: Mutex::new(conn) })
    }

    /// Defaults a never-seen user to `TIER_BEGINNER`, recording the
    /// assignment in history (original's "New user default").
    pub fn get_user_tier(&self, user_id: &str) -> anyhow::Result<String> {
        let conn = self.conn.lock();
        let existing: Option<String> = conn
            .query_row("SELECT tier FROM user_entitlements WHERE user_id = ?1", params![user_id], |row| row.get(0))
            .ok();
        if let Some(tier) = existing {
            return Ok(tier);
        }
        drop(conn);
        self.set_user_tier(user_id, TIER_BEGINNER, "system", "New user default")?;
        Ok(TIER_BEGINNER.to_string())
    }

    pub fn set_user_tier(&self, user_id: &str, tier: &str, changed_by: &str, reason: &str) -> anyhow::Result<()> {
        let conn = self.conn.lock();
        let old_tier: Option<String> = conn
            .query_row("SELECT tier FROM user_entitlements WHERE user_id = ?1", params![user_id], |row| row.get(0))
            .ok();
        conn.execute(
            "INSERT INTO user_entitlements (user_id, tier) VALUES (?1, ?2)
             ON CONFLICT(user_id) DO UPDATE SET tier = excluded.tier",
            params![user_id, tier],
        )?;
        conn.execute(
            "INSERT INTO tier_history (user_id, old_tier, new_tier, changed_by, reason) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![user_id, old_tier, tier, changed_by, reason],
        )?;
        Ok(())
    }

    pub fn get_user_history(&self, user_id: &str) -> anyhow::Result<Vec<TierHistoryEntry>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT old_tier, new_tier, changed_by, reason FROM tier_history
             WHERE user_id = ?1 ORDER BY id DESC LIMIT 10",
        )?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok(TierHistoryEntry { old_tier: row.get(0)?, new_tier: row.get(1)?, changed_by: row.get(2)?, reason: row.get(3)? })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}
