//! Plain-TCP transport for the four external channels named in §6: no
//! ZMQ/tungstenite crate is in this crate's dependency stack, so each
//! PULL/PUB/PUSH socket becomes a newline-delimited JSON TCP connection
//! instead, behind the same channel/trait boundaries the rest of the
//! engine already expects.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::{info, warn};

use crate::exit::CommandSink;
use crate::model::Command;

/// Accepts connections on an already-bound listener and forwards every
/// inbound line to `tx`. A dropped connection is not fatal: the accept
/// loop keeps running for the next one (§5 "feed reconnect is routine").
pub async fn run_upstream_listener(listener: TcpListener, tx: mpsc::Sender<String>) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "upstream accept error");
                continue;
            }
        };
        info!(%peer, "upstream source connected");
        let tx = tx.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stream).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if tx.send(line).await.is_err() {
                            return;
                        }
                    }
                    Ok(None) => {
                        info!(%peer, "upstream source disconnected");
                        return;
                    }
                    Err(e) => {
                        warn!(%peer, error = %e, "upstream read error");
                        return;
                    }
                }
            }
        });
    }
}

/// Fans every string pushed on `rx` out to every connection accepted on
/// `listener` (the PUB side of §6: republished raw frames plus, from
/// the publisher, `ELITE_GUARD_SIGNAL` lines). The listener is bound by
/// the caller up front so a bind failure can be treated as the one
/// fatal startup condition named in §7.
pub async fn run_downstream_broadcaster(listener: TcpListener, mut rx: mpsc::Receiver<String>) {
    let (tx, _) = broadcast::channel::<String>(1024);
    let accept_tx = tx.clone();
    tokio::spawn(async move {
        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(error = %e, "downstream accept error");
                    return;
                }
            };
            info!(%peer, "downstream subscriber connected");
            let mut sub_rx = accept_tx.subscribe();
            tokio::spawn(async move {
                let (_, mut writer) = stream.into_split();
                while let Ok(line) = sub_rx.recv().await {
                    if writer.write_all(line.as_bytes()).await.is_err() {
                        return;
                    }
                    if writer.write_all(b"\n").await.is_err() {
                        return;
                    }
                }
            });
        }
    });

    while let Some(line) = rx.recv().await {
        let _ = tx.send(line);
    }
}

/// Persistent outbound connection to the execution venue's command
/// channel (§6 command PUSH). Reconnects in the background on its own;
/// `send` fails fast if no connection is currently live rather than
/// blocking the command bus's own retry loop (§5 backpressure rule).
pub struct TcpCommandSink {
    writer: Arc<Mutex<Option<OwnedWriteHalf>>>,
}

impl TcpCommandSink {
    pub fn connect(addr: String) -> Arc<Self> {
        let writer = Arc::new(Mutex::new(None));
        let sink = Arc::new(TcpCommandSink { writer: writer.clone() });
        tokio::spawn(async move {
            loop {
                match TcpStream::connect(&addr).await {
                    Ok(stream) => {
                        info!(addr = %addr, "command channel connected");
                        let (_, w) = stream.into_split();
                        *writer.lock().await = Some(w);
                    }
                    Err(e) => {
                        warn!(addr = %addr, error = %e, "command channel connect failed, retrying");
                        tokio::time::sleep(Duration::from_secs(2)).await;
                        continue;
                    }
                }
                // Hold this connection until a write failure clears it.
                loop {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    if writer.lock().await.is_none() {
                        break;
                    }
                }
            }
        });
        sink
    }
}

#[async_trait]
impl CommandSink for TcpCommandSink {
    async fn send(&self, command: &Command) -> Result<(), String> {
        let line = serde_json::to_string(command).map_err(|e| e.to_string())?;
        let mut buf = line.into_bytes();
        buf.push(b'\n');
        let mut guard = self.writer.lock().await;
        let Some(writer) = guard.as_mut() else {
            return Err("command channel not connected".to_string());
        };
        if let Err(e) = writer.write_all(&buf).await {
            *guard = None;
            return Err(e.to_string());
        }
        Ok(())
    }
}

/// `CommandBus` holds its sink by value; the engine hands it the `Arc`
/// that `TcpCommandSink::connect` returns, since the background
/// reconnect task also needs a handle to the same writer.
#[async_trait]
impl CommandSink for Arc<TcpCommandSink> {
    async fn send(&self, command: &Command) -> Result<(), String> {
        self.as_ref().send(command).await
    }
}

/// A confirmation line (§6): `fire_id` is required (absent -> discard),
/// everything else is optional depending on the status. A `FILLED`
/// confirmation carries the full order the external fire system placed
/// (symbol, direction, entry price, sl/tp, tier, user_id, lot) since
/// opening a managed position is otherwise this crate's job alone — the
/// account/execution layer that decided to fire is out of scope (§1),
/// but it hands back everything the Exit FSM needs to take over.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmationFrame {
    pub fire_id: String,
    pub status: String,
    #[serde(default)]
    pub ticket: Option<u64>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub volume: Option<f64>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub direction: Option<String>,
    #[serde(default)]
    pub profit: Option<f64>,
    #[serde(default)]
    pub pips: Option<f64>,
    #[serde(default)]
    pub target_uuid: Option<String>,
    #[serde(default)]
    pub exit_r: Option<f64>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub tier: Option<String>,
    #[serde(default)]
    pub sl_price: Option<f64>,
    #[serde(default)]
    pub tp_price: Option<f64>,
    #[serde(default)]
    pub max_hold_min: Option<u32>,
}

/// Outcome of classifying a raw confirmation status string against the
/// vocabulary in §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationOutcome {
    Success,
    Failed,
    Closed,
}

pub fn classify_status(status: &str) -> Option<ConfirmationOutcome> {
    match status.to_ascii_uppercase().as_str() {
        "FILLED" | "SUCCESS" | "OK" | "FILLED_OK" => Some(ConfirmationOutcome::Success),
        "FAILED" | "REJECTED" | "ERROR" => Some(ConfirmationOutcome::Failed),
        "CLOSED" | "CLOSE" | "COMPLETED" | "TP_HIT" | "SL_HIT" => Some(ConfirmationOutcome::Closed),
        _ => None,
    }
}

/// Accepts confirmation connections on an already-bound listener,
/// parsing each line and forwarding `(frame, outcome)` to `tx` for the
/// engine to reconcile against `StateStore`/`Sentry`. A line missing
/// `fire_id` fails to deserialize and is discarded, per §6.
pub async fn run_confirmation_listener(
    listener: TcpListener,
    tx: mpsc::Sender<(ConfirmationFrame, ConfirmationOutcome)>,
) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "confirmation accept error");
                continue;
            }
        };
        let tx = tx.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stream).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let Ok(frame) = serde_json::from_str::<ConfirmationFrame>(&line) else {
                            warn!(%peer, "malformed confirmation frame, discarding");
                            continue;
                        };
                        let Some(outcome) = classify_status(&frame.status) else {
                            warn!(%peer, status = %frame.status, "unrecognized confirmation status");
                            continue;
                        };
                        if tx.send((frame, outcome)).await.is_err() {
                            return;
                        }
                    }
                    Ok(None) => return,
                    Err(e) => {
                        warn!(%peer, error = %e, "confirmation read error");
                        return;
                    }
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_every_documented_status() {
        assert_eq!(classify_status("FILLED_OK"), Some(ConfirmationOutcome::Success));
        assert_eq!(classify_status("rejected"), Some(ConfirmationOutcome::Failed));
        assert_eq!(classify_status("TP_HIT"), Some(ConfirmationOutcome::Closed));
        assert_eq!(classify_status("BOGUS"), None);
    }
}
