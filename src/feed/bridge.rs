//! Feed Bridge (§4.A): fans in inbound frames, republishes unchanged,
//! maintains the quotes snapshot, and debounce-drives the Exit FSM.
//!
//! Grounded on the teacher's `edge::receiver::EdgeReceiver` shape: an
//! `AtomicU64`-backed stats struct, a non-blocking recv loop with a
//! staleness threshold that triggers a rebuild, and a `parking_lot`-guarded
//! per-symbol state map. The spec's distinct 30s/60s escalation (warn,
//! then rebuild) replaces the teacher's single reconnect threshold.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::close_detector::CloseDetector;
use super::frame::Frame;
use super::quotes::QuotesCache;
use crate::model::Tick;

#[derive(Debug, Default)]
pub struct FeedStats {
    pub frames_received: AtomicU64,
    pub frames_discarded: AtomicU64,
    pub ticks_seen: AtomicU64,
    pub rebuilds: AtomicU64,
}

pub struct FeedBridgeConfig {
    pub inbound_timeout: Duration,
    pub warn_after_idle: Duration,
    pub rebuild_after_idle: Duration,
    pub housekeeping_every_n_frames: u64,
    pub stale_position_threshold: Duration,
    pub managed_symbols: Vec<String>,
}

impl Default for FeedBridgeConfig {
    fn default() -> Self {
        FeedBridgeConfig {
            inbound_timeout: Duration::from_secs(5),
            warn_after_idle: Duration::from_secs(30),
            rebuild_after_idle: Duration::from_secs(60),
            housekeeping_every_n_frames: 50,
            stale_position_threshold: Duration::from_secs(5 * 60),
            managed_symbols: Vec::new(),
        }
    }
}

/// Fans inbound frames out to the candle builder (via `tick_tx`) and the
/// Exit FSM drive path (via the shared [`QuotesCache`]), republishing raw
/// frames on `out_tx` unchanged.
pub struct FeedBridge {
    config: FeedBridgeConfig,
    stats: Arc<FeedStats>,
    quotes: Arc<QuotesCache>,
    close_detector: RwLock<CloseDetector>,
    frames_since_housekeeping: AtomicU64,
}

impl FeedBridge {
    pub fn new(config: FeedBridgeConfig, quotes: Arc<QuotesCache>) -> Self {
        FeedBridge {
            config,
            stats: Arc::new(FeedStats::default()),
            quotes,
            close_detector: RwLock::new(CloseDetector::new()),
            frames_since_housekeeping: AtomicU64::new(0),
        }
    }

    pub fn stats(&self) -> Arc<FeedStats> {
        self.stats.clone()
    }

    /// Consumes inbound raw frame strings from `inbound_rx`, republishing
    /// on `out_tx` and forwarding parsed ticks on `tick_tx`. Never
    /// returns unless `inbound_rx` is closed or a rebuild signal is
    /// requested by the caller (rebinding the actual socket is the
    /// caller's responsibility; this loop only tracks staleness).
    pub async fn run(
        &self,
        mut inbound_rx: mpsc::Receiver<String>,
        out_tx: mpsc::Sender<String>,
        tick_tx: mpsc::Sender<(String, Tick)>,
        rebuild_tx: mpsc::Sender<()>,
    ) {
        let mut last_frame_at = Instant::now();
        loop {
            let recv = tokio::time::timeout(self.config.inbound_timeout, inbound_rx.recv()).await;
            match recv {
                Ok(Some(raw)) => {
                    last_frame_at = Instant::now();
                    self.stats.frames_received.fetch_add(1, Ordering::Relaxed);
                    let _ = out_tx.send(raw.clone()).await;
                    self.handle_frame(&raw, &tick_tx).await;
                    self.maybe_housekeep();
                }
                Ok(None) => {
                    info!("feed inbound channel closed");
                    return;
                }
                Err(_timeout) => {
                    let idle = last_frame_at.elapsed();
                    if idle > self.config.rebuild_after_idle {
                        warn!(idle_secs = idle.as_secs(), "feed inbound idle too long, requesting rebuild");
                        self.stats.rebuilds.fetch_add(1, Ordering::Relaxed);
                        let _ = rebuild_tx.send(()).await;
                        last_frame_at = Instant::now();
                    } else if idle > self.config.warn_after_idle {
                        warn!(idle_secs = idle.as_secs(), "feed inbound idle");
                    }
                }
            }
        }
    }

    async fn handle_frame(&self, raw: &str, tick_tx: &mpsc::Sender<(String, Tick)>) {
        let Some(frame) = Frame::parse(raw) else {
            self.stats.frames_discarded.fetch_add(1, Ordering::Relaxed);
            return;
        };
        match frame {
            Frame::Tick(t) => {
                self.stats.ticks_seen.fetch_add(1, Ordering::Relaxed);
                self.quotes.update(&t.symbol, t.bid, t.ask);
                self.close_detector.write().observe_frame_tickets(&t.open_tickets);
                let tick = Tick {
                    bid: t.bid,
                    ask: t.ask,
                    volume: t.volume,
                    ts_monotonic: t.timestamp.unwrap_or_else(|| chrono::Utc::now().timestamp()),
                };
                let _ = tick_tx.send((t.symbol, tick)).await;
            }
            Frame::OhlcBatch(_) | Frame::Heartbeat | Frame::Status(_) | Frame::Unknown => {}
        }
    }

    fn maybe_housekeep(&self) {
        let n = self.frames_since_housekeeping.fetch_add(1, Ordering::Relaxed) + 1;
        if n >= self.config.housekeeping_every_n_frames {
            self.frames_since_housekeeping.store(0, Ordering::Relaxed);
            self.quotes.mark_stale_positions(self.config.stale_position_threshold);
        }
    }

    pub fn vanished_tickets(&self, frame_known_open: &[u64]) -> Vec<u64> {
        self.close_detector.read().diff_vanished(frame_known_open)
    }

    /// Seeds the close detector's known-open set from persisted position
    /// state at startup (§4.A supplemented feature).
    pub fn seed_close_detector(&self, tickets: impl IntoIterator<Item = u64>) {
        self.close_detector.write().seed(tickets);
    }

    pub fn track_open(&self, ticket: u64) {
        self.close_detector.write().track_open(ticket);
    }

    pub fn untrack_closed(&self, ticket: u64) {
        self.close_detector.write().untrack(ticket);
    }

    /// Clears the current frame-observation window; call after each
    /// [`Self::vanished_tickets`] poll so the next round starts fresh.
    pub fn reset_close_round(&self) {
        self.close_detector.write().reset_round();
    }

    pub fn managed_symbols(&self) -> &[String] {
        &self.config.managed_symbols
    }

    pub fn frame_counts(&self) -> HashMap<&'static str, u64> {
        let mut m = HashMap::new();
        m.insert("received", self.stats.frames_received.load(Ordering::Relaxed));
        m.insert("discarded", self.stats.frames_discarded.load(Ordering::Relaxed));
        m
    }
}
