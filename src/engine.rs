//! Composition root (spec.md §9 redesign note: "an explicit `Engine`
//! struct that owns every subsystem instance, constructed once in
//! `main`, rather than a scattering of module-level globals").
//!
//! Every background task the system runs — feed ingestion, the pattern
//! scanner, the exit drive loop, the command bus processor, the
//! confirmation reconciler, timeout scanning, and periodic persistence —
//! is spawned from [`Engine::run`] against state this struct owns, in
//! the teacher's `AppState`-plus-`tokio::spawn`-per-subsystem style
//! (`main.rs`, before removal).

use std::sync::Arc;
use std::time::Duration;

use chrono::{Timelike, Utc};
use rayon::prelude::*;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::candles::cache::{self, CandleCacheFile};
use crate::candles::CandleBuilder;
use crate::config::{Cli, RolloutFlagsHandle, SymbolTable, TierTable};
use crate::eventbus::{Event, EventBus, EventType};
use crate::exit::{
    CommandBus, EntitlementManager, ExitFsm, MarketData, Sentry, StateStore,
};
use crate::feed::{FeedBridge, FeedBridgeConfig, QuotesCache, TickVolumeTracker};
use crate::metrics_init;
use crate::model::{Direction, Session};
use crate::patterns::{self, DetectorInput};
use crate::publisher::{self, TrackingLogWriter, TrackingRecord, TruthLogWriter};
use crate::scoring::{self, ComboWinRateTracker, CooldownTracker, DefaultNewsEvaluator, ScoringContext};
use crate::shield::{ConsensusSource, HttpQuoteSource, ShieldFilter, ShieldOutcome};
use crate::symbols::spread_pips;
use crate::transport::{
    self, ConfirmationFrame, ConfirmationOutcome, TcpCommandSink,
};

const TICK_RING_DEBOUNCE: Duration = Duration::from_millis(100);
const TIMEOUT_SCAN_EVERY: Duration = Duration::from_secs(30);
const CANDLE_CACHE_SAVE_EVERY: Duration = Duration::from_secs(300);
const COMMAND_DRAIN_EVERY: Duration = Duration::from_millis(250);
const CLOSE_RECONCILE_EVERY: Duration = Duration::from_secs(20);
const HEARTBEAT_EVERY: Duration = Duration::from_secs(60);

/// Everything the engine needs that isn't rebuilt per cycle: on-disk
/// tables, hot-reloadable flags, and the managed-symbol list (spec.md §9
/// "feed thread is the sole writer to SymbolState's rings" drives the
/// `Mutex<CandleBuilder>` below rather than a lock-free structure).
pub struct Engine {
    data_dir: std::path::PathBuf,
    scan_interval: Duration,
    symbols: SymbolTable,
    tiers: TierTable,
    rollout: Arc<RolloutFlagsHandle>,
    managed_symbols: Vec<String>,

    candle_builder: Arc<tokio::sync::Mutex<CandleBuilder>>,
    quotes: Arc<QuotesCache>,
    tick_volumes: Arc<TickVolumeTracker>,
    feed_bridge: Arc<FeedBridge>,

    state_store: Arc<StateStore>,
    command_bus: Arc<CommandBus<Arc<TcpCommandSink>>>,
    entitlement: Arc<EntitlementManager>,
    sentry: Arc<Sentry>,

    cooldown: Arc<CooldownTracker>,
    combos: Arc<ComboWinRateTracker>,
    news: Arc<DefaultNewsEvaluator>,
    shield: Arc<ShieldFilter>,

    truth_log: Arc<TruthLogWriter>,
    tracking_log: Arc<TrackingLogWriter>,
    event_bus: Arc<EventBus>,

    http_addr: String,
    upstream_addr: Option<String>,
    downstream_addr: Option<String>,
    confirm_addr: Option<String>,
}

impl Engine {
    /// Loads every on-disk table, opens every persisted store, and wires
    /// the command sink to the configured execution venue address.
    /// Nothing here talks to the network except the outbound command
    /// connection (`TcpCommandSink::connect` reconnects in the
    /// background and never blocks startup).
    pub async fn bootstrap(cli: Cli) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&cli.data_dir)?;
        std::fs::create_dir_all(&cli.config_dir)?;

        let symbols = SymbolTable::load(&cli.config_dir.join("symbols.toml"))?;
        let tiers = TierTable::load(&cli.config_dir.join("tiers.toml"))?;
        let rollout = RolloutFlagsHandle::load(cli.config_dir.join("rollout.toml"), Duration::from_secs(30))?;

        let state_store_path = cli.data_dir.join("position_state.json");
        let state_store = Arc::new(StateStore::load(state_store_path));

        let entitlement = Arc::new(EntitlementManager::open(&cli.data_dir.join("entitlements.db"))?);
        let sentry = Arc::new(Sentry::new(rollout.clone()));

        let flags = rollout.get();
        let command_sink = match &cli.command_addr {
            Some(addr) => TcpCommandSink::connect(addr.clone()),
            None => TcpCommandSink::connect("127.0.0.1:0".to_string()),
        };
        let command_bus = Arc::new(CommandBus::new(
            command_sink,
            Duration::from_millis(flags.min_cmd_gap_ms),
            flags.max_retries,
            flags.retry_backoff_ms.clone(),
        ));

        let cooldown = Arc::new(CooldownTracker::default());
        let combos = Arc::new(ComboWinRateTracker::new());
        let news = Arc::new(DefaultNewsEvaluator::new(Vec::new()));

        let sources: Vec<Arc<dyn ConsensusSource>> = shield_sources_from_env();
        let shield = Arc::new(ShieldFilter::new(sources, false)?);

        let truth_log = Arc::new(TruthLogWriter::open(cli.data_dir.join("truth_log.jsonl"))?);
        let tracking_log = Arc::new(TrackingLogWriter::open(cli.data_dir.join("tracking_log.jsonl"))?);
        let event_bus = Arc::new(EventBus::new());

        let quotes = Arc::new(QuotesCache::new(TICK_RING_DEBOUNCE));
        let tick_volumes = Arc::new(TickVolumeTracker::new());

        let managed_symbols = managed_symbols_from_env();
        let feed_config = FeedBridgeConfig { managed_symbols: managed_symbols.clone(), ..FeedBridgeConfig::default() };
        let feed_bridge = Arc::new(FeedBridge::new(feed_config, quotes.clone()));
        feed_bridge.seed_close_detector(
            state_store.active_positions().iter().map(|p| p.ticket),
        );

        let mut candle_builder = CandleBuilder::new();
        let cache_path = cli.data_dir.join("candle_cache.json");
        if let Some(file) = cache::load_if_fresh(&cache_path) {
            restore_candle_cache(&mut candle_builder, file);
            info!("restored candle cache from disk");
        }

        Ok(Engine {
            data_dir: cli.data_dir,
            scan_interval: Duration::from_secs(cli.scan_interval_secs),
            symbols,
            tiers,
            rollout,
            managed_symbols,
            candle_builder: Arc::new(tokio::sync::Mutex::new(candle_builder)),
            quotes,
            tick_volumes,
            feed_bridge,
            state_store,
            command_bus,
            entitlement,
            sentry,
            cooldown,
            combos,
            news,
            shield,
            truth_log,
            tracking_log,
            event_bus,
            http_addr: cli.http_addr,
            upstream_addr: cli.upstream_addr,
            downstream_addr: cli.downstream_addr,
            confirm_addr: cli.confirm_addr,
        })
    }

    /// Spawns every background task and serves the HTTP surface until
    /// the process is killed. Returns only on a fatal bind failure (§7:
    /// "the one fatal startup condition is the outbound publisher bind").
    pub async fn run(self) -> anyhow::Result<()> {
        let metrics_handle = metrics_init::install()?;
        let engine = Arc::new(self);

        let (tick_tx, tick_rx) = mpsc::channel::<(String, crate::model::Tick)>(4096);
        let (inbound_tx, inbound_rx) = mpsc::channel::<String>(4096);
        let (out_tx, out_rx) = mpsc::channel::<String>(4096);
        let (rebuild_tx, mut rebuild_rx) = mpsc::channel::<()>(8);
        let (confirm_tx, confirm_rx) = mpsc::channel::<(ConfirmationFrame, ConfirmationOutcome)>(1024);

        if let Some(addr) = &engine.upstream_addr {
            let listener = TcpListener::bind(addr).await?;
            tokio::spawn(transport::run_upstream_listener(listener, inbound_tx));
        } else {
            drop(inbound_tx);
        }

        if let Some(addr) = &engine.downstream_addr {
            let listener = TcpListener::bind(addr).await?;
            tokio::spawn(transport::run_downstream_broadcaster(listener, out_rx));
        }
        let signal_out_tx = out_tx.clone();

        if let Some(addr) = &engine.confirm_addr {
            let listener = TcpListener::bind(addr).await?;
            tokio::spawn(transport::run_confirmation_listener(listener, confirm_tx));
        } else {
            drop(confirm_tx);
        }

        {
            let feed_bridge = engine.feed_bridge.clone();
            tokio::spawn(async move {
                feed_bridge.run(inbound_rx, out_tx, tick_tx, rebuild_tx).await;
            });
        }

        tokio::spawn(rebuild_watcher(rebuild_rx_take(&mut rebuild_rx)));
        tokio::spawn(tick_consumer(engine.clone(), tick_rx));
        tokio::spawn(confirmation_reconciler(engine.clone(), confirm_rx));
        tokio::spawn(scanner_loop(engine.clone(), signal_out_tx));
        tokio::spawn(exit_drive_loop(engine.clone()));
        tokio::spawn(command_drain_loop(engine.clone()));
        tokio::spawn(timeout_scan_loop(engine.clone()));
        tokio::spawn(close_reconcile_loop(engine.clone()));
        tokio::spawn(candle_cache_save_loop(engine.clone()));
        {
            let event_bus = engine.event_bus.clone();
            tokio::spawn(async move { event_bus.run_heartbeat("elite_guard", HEARTBEAT_EVERY).await });
        }

        let api_state = crate::api::ApiState {
            metrics_handle,
            store: engine.state_store.clone(),
            started_at: Utc::now(),
        };
        let router = crate::api::router(api_state);
        let listener = TcpListener::bind(&engine.http_addr).await?;
        info!(addr = %engine.http_addr, "http surface listening");
        axum::serve(listener, router).await?;
        Ok(())
    }
}

/// `tokio::sync::mpsc::Receiver` isn't `Clone`; this helper exists only
/// to move the receiver into a spawned task from `run`'s borrow-checked
/// setup without restructuring the channel construction order.
fn rebuild_rx_take(rx: &mut mpsc::Receiver<()>) -> mpsc::Receiver<()> {
    std::mem::replace(rx, mpsc::channel(1).1)
}

/// §4.A: a rebuild signal means the feed's own idle-reconnect escalation
/// fired. Reconnecting the actual upstream socket is out of scope for
/// this crate (the upstream process owns that); this loop only logs so
/// operators see the escalation in the log stream.
async fn rebuild_watcher(mut rebuild_rx: mpsc::Receiver<()>) {
    while rebuild_rx.recv().await.is_some() {
        warn!("feed requested a rebuild after prolonged idle");
    }
}

async fn tick_consumer(engine: Arc<Engine>, mut tick_rx: mpsc::Receiver<(String, crate::model::Tick)>) {
    while let Some((symbol, tick)) = tick_rx.recv().await {
        engine.tick_volumes.record(&symbol, tick.volume);
        let mut builder = engine.candle_builder.lock().await;
        builder.on_tick(&symbol, tick.mid(), tick.volume, tick.ts_monotonic);
    }
}

/// Reconciles fire confirmations against the Exit FSM and the state
/// store (§6: "a FILLED confirmation carries everything the Exit FSM
/// needs to take over"). A CLOSED confirmation updates the bad-exit
/// streak from the reported `exit_r`; a FAILED confirmation is logged
/// and otherwise dropped, since nothing was ever opened.
async fn confirmation_reconciler(
    engine: Arc<Engine>,
    mut confirm_rx: mpsc::Receiver<(ConfirmationFrame, ConfirmationOutcome)>,
) {
    while let Some((frame, outcome)) = confirm_rx.recv().await {
        match outcome {
            ConfirmationOutcome::Success => {
                let Some(ticket) = frame.ticket else {
                    warn!(fire_id = %frame.fire_id, "FILLED confirmation missing ticket, discarding");
                    continue;
                };
                let (Some(symbol), Some(direction_str), Some(price), Some(sl), Some(tp)) =
                    (frame.symbol.clone(), frame.direction.clone(), frame.price, frame.sl_price, frame.tp_price)
                else {
                    warn!(fire_id = %frame.fire_id, "FILLED confirmation missing order fields, discarding");
                    continue;
                };
                let Some(direction) = Direction::parse(&direction_str) else { continue };
                let tier = frame.tier.unwrap_or_else(|| crate::exit::TIER_BEGINNER.to_string());
                let user_id = frame.user_id.unwrap_or_default();
                let lot = frame.volume.unwrap_or(0.0);
                let max_hold_min = frame.max_hold_min.unwrap_or_else(|| engine.tiers.resolve(&tier).max_hold_min);
                let symbol_spec = engine.symbols.get(&symbol);

                let fsm = ExitFsm::new(&engine.state_store);
                fsm.on_position_open(
                    ticket,
                    frame.fire_id.clone(),
                    user_id,
                    tier,
                    symbol.clone(),
                    direction,
                    price,
                    sl,
                    tp,
                    lot,
                    &symbol_spec,
                    max_hold_min,
                    Utc::now(),
                );
                engine.feed_bridge.track_open(ticket);
                engine.event_bus.publish(Event::new(
                    EventType::TradeExecuted,
                    "confirmation_reconciler",
                    serde_json::json!({ "ticket": ticket, "symbol": symbol, "fire_id": frame.fire_id }),
                    Utc::now(),
                ));
            }
            ConfirmationOutcome::Closed => {
                let Some(ticket) = frame.ticket else { continue };
                engine.state_store.close_position(ticket);
                engine.feed_bridge.untrack_closed(ticket);
                let exit_r = frame.exit_r.unwrap_or(0.0);
                engine.sentry.check_bad_exit(ticket, exit_r);
                engine.event_bus.publish(Event::new(
                    EventType::TradeConfirmed,
                    "confirmation_reconciler",
                    serde_json::json!({ "ticket": ticket, "exit_r": exit_r }),
                    Utc::now(),
                ));
            }
            ConfirmationOutcome::Failed => {
                warn!(fire_id = %frame.fire_id, "fire failed at the execution venue");
            }
        }
    }
}

/// Pattern scanner (§4.C/§4.D, §5 "cadence ~15s"): runs every detector
/// against every managed symbol's candle view, scores survivors, and
/// publishes anything that clears the Shield filter.
///
/// Detection and scoring are pure CPU-bound work over an immutable
/// snapshot of each symbol's candles, so the per-symbol fan-out runs on
/// Rayon's pool (`rayon::prelude::*`) rather than one `tokio::spawn` per
/// symbol; only the Shield consensus check and publish step need the
/// async runtime, and those run afterward against the collected results.
async fn scanner_loop(engine: Arc<Engine>, out_tx: mpsc::Sender<String>) {
    let mut ticker = tokio::time::interval(engine.scan_interval);
    loop {
        ticker.tick().await;
        engine.rollout.maybe_reload();
        let flags = engine.rollout.get();

        let symbols: Vec<String> = if engine.managed_symbols.is_empty() {
            let builder = engine.candle_builder.lock().await;
            builder.symbols().cloned().collect()
        } else {
            engine.managed_symbols.clone()
        };

        let mut views = Vec::with_capacity(symbols.len());
        {
            let builder = engine.candle_builder.lock().await;
            for symbol in &symbols {
                let m1 = builder.view_m1(symbol);
                if m1.is_empty() {
                    continue;
                }
                let m5 = builder.view_m5(symbol);
                let m15 = builder.view_m15(symbol);
                views.push((symbol.clone(), m1, m5, m15));
            }
        }

        let now = Utc::now();
        let session = Session::from_utc_hour(now.hour());
        let scored: Vec<(String, scoring::ScoredCandidate)> = views
            .par_iter()
            .flat_map(|(symbol, m1, m5, m15)| score_symbol(&engine, symbol, m1, m5, m15, session, now, &flags))
            .collect();

        for (symbol, scored) in scored {
            shield_and_publish(&engine, &symbol, scored, session, now, &out_tx).await;
        }
    }
}

/// Detector + scoring fan-out for one symbol (runs on the Rayon pool).
/// Synchronous end-to-end: no network I/O, no lock held across the call
/// since `views` was snapshotted out of `candle_builder` beforehand.
fn score_symbol(
    engine: &Engine,
    symbol: &str,
    m1: &[crate::model::Candle],
    m5: &[crate::model::Candle],
    m15: &[crate::model::Candle],
    session: Session,
    now: chrono::DateTime<Utc>,
    flags: &crate::config::RolloutFlags,
) -> Vec<(String, scoring::ScoredCandidate)> {
    if scoring::chop::is_extreme_chop(m5) {
        return Vec::new();
    }

    let quote = engine.quotes.get(symbol);
    let spread = quote.map(|q| spread_pips(&engine.symbols.get(symbol), q.bid, q.ask)).unwrap_or(0.0);
    let news = engine.news.evaluate(symbol, now);
    let recent_tick_volumes = engine.tick_volumes.recent(symbol);
    let (is_optimal_pair, pair_quality_bonus) = scoring::session_intel::pair_quality(session, symbol);

    let input = DetectorInput { pair: symbol, m1, m5, m15, session };
    let candidates = patterns::run_all(input, flags.confidence_jitter_pct);

    let mut scored = Vec::new();
    for candidate in candidates {
        let ctx = ScoringContext {
            symbol,
            session,
            spread_pips: spread,
            recent_tick_volumes: &recent_tick_volumes,
            m1,
            m5,
            m15,
            is_optimal_pair,
            pair_quality_bonus,
            news: news.clone(),
            group_threshold: scoring::DEFAULT_GROUP_THRESHOLD,
            min_rr: flags.min_rr_ratio,
            now,
        };

        match scoring::evaluate_candidate(candidate, &ctx, &engine.combos, &engine.cooldown) {
            Ok(candidate) => scored.push((symbol.to_string(), candidate)),
            Err(rejection) => {
                metrics::counter!("scores_rejected_total").increment(1);
                tracing::debug!(symbol, %rejection, "candidate rejected");
            }
        }
    }
    scored
}

/// Shield consensus check and publication for one scored candidate; the
/// only part of the scan cycle that still needs the async runtime.
async fn shield_and_publish(
    engine: &Arc<Engine>,
    symbol: &str,
    scored: scoring::ScoredCandidate,
    session: Session,
    now: chrono::DateTime<Utc>,
    out_tx: &mpsc::Sender<String>,
) {
    let shield_outcome = engine.shield.evaluate(symbol, scored.signal.entry_price, now).await;
    if let ShieldOutcome::Rejected(reason) = &shield_outcome {
        tracing::debug!(symbol, %reason, "shield rejected candidate");
        return;
    }

    let symbol_spec = engine.symbols.get(symbol);
    let signal = match publisher::assemble_signal(&scored, &shield_outcome, &symbol_spec, session, now) {
        Ok(signal) => signal,
        Err(e) => {
            warn!(symbol, error = %e, "failed to assemble signal");
            return;
        }
    };

    publish_signal(engine, &signal, out_tx).await;
    engine.cooldown.record_publication(symbol, scoring::is_tier1(signal.pattern), now);
}

/// Emits the assembled signal onto the downstream bus (§6 "Downstream
/// signal (outbound PUB)") and the truth/tracking sinks.
async fn publish_signal(engine: &Arc<Engine>, signal: &crate::model::Signal, out_tx: &mpsc::Sender<String>) {
    match publisher::wire_frame(signal) {
        Ok(frame) => {
            if out_tx.send(frame).await.is_err() {
                warn!("downstream broadcaster channel closed, signal not published");
            }
        }
        Err(e) => error!(error = %e, "failed to serialize signal wire frame"),
    }

    if let Err(e) = engine.truth_log.append(signal) {
        error!(error = %e, "failed to append truth log");
    }
    let tracking = TrackingRecord {
        signal,
        atr: None,
        volatility_band: false,
        would_fire: true,
        fired: true,
    };
    if let Err(e) = engine.tracking_log.append(&tracking) {
        error!(error = %e, "failed to append tracking log");
    }

    engine.event_bus.publish(Event::new(
        EventType::SignalGenerated,
        "publisher",
        serde_json::json!({
            "signal_id": signal.signal_id,
            "symbol": signal.pair,
            "direction": signal.direction.as_str(),
            "confidence": signal.ml_tier,
            "pattern_type": signal.pattern.name().to_ascii_lowercase(),
        }),
        Utc::now(),
    ));

    info!(signal_id = %signal.signal_id, pair = %signal.pair, "published signal");
}

/// Exit-drive loop (§5: "the feed thread also drives the Exit FSM
/// debounced at 10 Hz"); here a dedicated loop ticking at the same
/// cadence against the debounced [`QuotesCache`] snapshot.
async fn exit_drive_loop(engine: Arc<Engine>) {
    let mut ticker = tokio::time::interval(TICK_RING_DEBOUNCE);
    loop {
        ticker.tick().await;
        let Some(drive_quotes) = engine.quotes.drain_for_drive(&engine.managed_symbols) else { continue };
        let fsm = ExitFsm::new(&engine.state_store);
        for position in engine.state_store.active_positions() {
            let Some(quote) = drive_quotes.get(&position.symbol) else { continue };
            let symbol_spec = engine.symbols.get(&position.symbol);
            let tier_config = engine.tiers.resolve(&position.tier);
            let market = MarketData { bid: quote.bid, ask: quote.ask, atr: None };
            let commands = fsm.on_tick(position.ticket, market, &symbol_spec, &tier_config);
            for command in commands {
                engine.command_bus.enqueue(command);
            }
        }
    }
}

async fn command_drain_loop(engine: Arc<Engine>) {
    let mut ticker = tokio::time::interval(COMMAND_DRAIN_EVERY);
    loop {
        ticker.tick().await;
        let sent = engine.command_bus.drain_ready().await;
        if sent > 0 {
            metrics::counter!("commands_sent_total").increment(sent as u64);
        }
    }
}

async fn timeout_scan_loop(engine: Arc<Engine>) {
    let mut ticker = tokio::time::interval(TIMEOUT_SCAN_EVERY);
    loop {
        ticker.tick().await;
        let commands = crate::exit::scan_timeouts(&engine.state_store, Utc::now());
        for command in commands {
            engine.command_bus.enqueue(command);
        }
    }
}

/// §4.A supplemented feature: periodically diffs the feed's known-open
/// ticket set against what the last frames reported, closing out any
/// position that vanished without an explicit confirmation.
async fn close_reconcile_loop(engine: Arc<Engine>) {
    let mut ticker = tokio::time::interval(CLOSE_RECONCILE_EVERY);
    loop {
        ticker.tick().await;
        let vanished = engine.feed_bridge.vanished_tickets(&[]);
        engine.feed_bridge.reset_close_round();
        for ticket in vanished {
            if engine.state_store.get_snapshot(ticket).is_some() {
                warn!(ticket, "position vanished from feed without confirmation, closing");
                engine.state_store.close_position(ticket);
                engine.feed_bridge.untrack_closed(ticket);
            }
        }
    }
}

async fn candle_cache_save_loop(engine: Arc<Engine>) {
    let path = engine.data_dir.join("candle_cache.json");
    let mut ticker = tokio::time::interval(CANDLE_CACHE_SAVE_EVERY);
    loop {
        ticker.tick().await;
        let (m1_data, m5_data, m15_data) = engine.candle_builder.lock().await.snapshot();
        let file = CandleCacheFile { timestamp: Utc::now(), m1_data, m5_data, m15_data };
        cache::save(&path, &file);
    }
}

fn restore_candle_cache(builder: &mut CandleBuilder, file: CandleCacheFile) {
    let CandleCacheFile { m1_data, mut m5_data, mut m15_data, .. } = file;
    for (symbol, m1) in m1_data {
        let m5 = m5_data.remove(&symbol).unwrap_or_default();
        let m15 = m15_data.remove(&symbol).unwrap_or_default();
        builder.seed(&symbol, m1, m5, m15);
    }
}

/// Managed symbols come from `ELITE_GUARD_SYMBOLS` (comma-separated);
/// an empty list means "whatever the feed has seen" (scanner falls back
/// to `CandleBuilder::symbols`).
fn managed_symbols_from_env() -> Vec<String> {
    std::env::var("ELITE_GUARD_SYMBOLS")
        .ok()
        .map(|raw| raw.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
        .unwrap_or_default()
}

/// Shield consensus sources come from `ELITE_GUARD_SHIELD_SOURCES`
/// (comma-separated `name=base_url` pairs); absent entirely, the filter
/// runs with zero sources and every evaluation passes through
/// unenhanced (§4.E "fewer than 3 sources responded").
fn shield_sources_from_env() -> Vec<Arc<dyn ConsensusSource>> {
    let Ok(raw) = std::env::var("ELITE_GUARD_SHIELD_SOURCES") else { return Vec::new() };
    raw.split(',')
        .filter_map(|entry| {
            let (name, url) = entry.split_once('=')?;
            Some(Arc::new(HttpQuoteSource::new(name.trim(), url.trim())) as Arc<dyn ConsensusSource>)
        })
        .collect()
}
