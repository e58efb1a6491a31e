//! Command Bus (§4.G, §5): priority queue with a processor enforcing a
//! minimum inter-command gap per ticket and a bounded retry policy with
//! exponential backoff plus jitter.
//!
//! Grounded on original source `command_bus.py`'s `CommandBus`
//! (`PriorityQueue` on `(priority, seq)`, `_can_send`'s per-ticket
//! min-gap map, backoff-with-jitter retry loop), reimplemented per
//! spec.md §9 as a `BinaryHeap` behind a `parking_lot::Mutex` instead of
//! a ZMQ PUSH socket (the execution venue is external to this crate,
//! §1) — sending is abstracted behind [`CommandSink`] so the processor
//! is testable without one.

use std::collections::{BinaryHeap, HashMap};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rand::Rng;
use tracing::{error, info, warn};

use crate::error::CommandBusError;
use crate::model::Command;

/// Where a ready-to-send command actually goes. The real implementation
/// is an outbound PUSH socket (§6); tests use an in-memory sink.
#[async_trait]
pub trait CommandSink: Send + Sync {
    async fn send(&self, command: &Command) -> Result<(), String>;
}

pub struct CommandBus<S: CommandSink> {
    sink: S,
    queue: parking_lot::Mutex<BinaryHeap<Command>>,
    last_sent: parking_lot::Mutex<HashMap<u64, Instant>>,
    min_gap: Duration,
    max_retries: u32,
    retry_backoff_ms: Vec<u64>,
}

impl<S: CommandSink> CommandBus<S> {
    pub fn new(sink: S, min_gap: Duration, max_retries: u32, retry_backoff_ms: Vec<u64>) -> Self {
        CommandBus {
            sink,
            queue: parking_lot::Mutex::new(BinaryHeap::new()),
            last_sent: parking_lot::Mutex::new(HashMap::new()),
            min_gap,
            max_retries,
            retry_backoff_ms,
        }
    }

    pub fn enqueue(&self, command: Command) {
        self.queue.lock().push(command);
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    /// Pops and sends ready commands, requeueing anything whose
    /// per-ticket min-gap hasn't elapsed (original's `_can_send` +
    /// "re-queue with slight delay"). Returns the number successfully
    /// sent this pass.
    pub async fn drain_ready(&self) -> usize {
        let mut sent = 0;
        let mut requeue = Vec::new();
        loop {
            let Some(command) = self.queue.lock().pop() else { break };
            if !self.can_send(command.ticket) {
                requeue.push(command);
                continue;
            }
            match self.send_with_retry(command).await {
                Ok(()) => sent += 1,
                Err(e) => error!(error = %e, "command exhausted retries, dropping"),
            }
        }
        let mut queue = self.queue.lock();
        for command in requeue {
            queue.push(command);
        }
        sent
    }

    fn can_send(&self, ticket: u64) -> bool {
        let last_sent = self.last_sent.lock();
        match last_sent.get(&ticket) {
            Some(last) => last.elapsed() >= self.min_gap,
            None => true,
        }
    }

    async fn send_with_retry(&self, mut command: Command) -> Result<(), CommandBusError> {
        loop {
            self.last_sent.lock().insert(command.ticket, Instant::now());
            match self.sink.send(&command).await {
                Ok(()) => {
                    info!(ticket = command.ticket, cmd = command.cmd_type.wire_name(), seq = command.seq, "sent command");
                    return Ok(());
                }
                Err(reason) => {
                    if command.retries >= self.max_retries {
                        return Err(CommandBusError::RetriesExhausted { ticket: command.ticket, retries: command.retries });
                    }
                    let backoff = backoff_for(&self.retry_backoff_ms, command.retries);
                    warn!(ticket = command.ticket, attempt = command.retries + 1, reason, "retrying command");
                    tokio::time::sleep(backoff).await;
                    command.retries += 1;
                }
            }
        }
    }
}

/// Backoff-with-jitter for retry `n` (0-indexed), clamped to the last
/// configured rung once `n` exceeds the table (`command_bus.py`:
/// `min(cmd.retries - 1, len(table) - 1)`).
fn backoff_for(table: &[u64], attempt: u32) -> Duration {
    let idx = (attempt as usize).min(table.len().saturating_sub(1));
    let base_ms = table.get(idx).copied().unwrap_or(150);
    let jitter = rand::thread_rng().gen_range(0.8..1.2);
    Duration::from_millis((base_ms as f64 * jitter) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CommandArgs;
    use parking_lot::Mutex as PMutex;
    use std::sync::Arc;

    struct RecordingSink {
        sent: Arc<PMutex<Vec<Command>>>,
        fail_first_n: std::sync::atomic::AtomicU32,
    }

    #[async_trait]
    impl CommandSink for RecordingSink {
        async fn send(&self, command: &Command) -> Result<(), String> {
            if self.fail_first_n.load(std::sync::atomic::Ordering::SeqCst) > 0 {
                self.fail_first_n.fetch_sub(1, std::sync::atomic::Ordering::SeqCst);
                return Err("simulated failure".to_string());
            }
            self.sent.lock().push(command.clone());
            Ok(())
        }
    }

    fn close_command(ticket: u64, seq: u64) -> Command {
        Command {
            fire_id: "f1".into(),
            ticket,
            seq,
            cmd_type: crate::model::CommandType::Close,
            args: CommandArgs::Close { reason: "test".into(), comment: "CLOSE".into() },
            ts_ms: 0,
            retries: 0,
            priority: 0,
            target_uuid: None,
        }
    }

    #[tokio::test]
    async fn sends_ready_command_immediately() {
        let sent = Arc::new(PMutex::new(Vec::new()));
        let sink = RecordingSink { sent: sent.clone(), fail_first_n: std::sync::atomic::AtomicU32::new(0) };
        let bus = CommandBus::new(sink, Duration::from_millis(0), 3, vec![150, 300, 600]);
        bus.enqueue(close_command(1, 1));
        let count = bus.drain_ready().await;
        assert_eq!(count, 1);
        assert_eq!(sent.lock().len(), 1);
    }

    #[tokio::test]
    async fn retries_then_succeeds() {
        let sent = Arc::new(PMutex::new(Vec::new()));
        let sink = RecordingSink { sent: sent.clone(), fail_first_n: std::sync::atomic::AtomicU32::new(2) };
        let bus = CommandBus::new(sink, Duration::from_millis(0), 3, vec![1, 1, 1]);
        bus.enqueue(close_command(1, 1));
        bus.drain_ready().await;
        assert_eq!(sent.lock().len(), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let sent = Arc::new(PMutex::new(Vec::new()));
        let sink = RecordingSink { sent: sent.clone(), fail_first_n: std::sync::atomic::AtomicU32::new(10) };
        let bus = CommandBus::new(sink, Duration::from_millis(0), 2, vec![1, 1]);
        bus.enqueue(close_command(1, 1));
        bus.drain_ready().await;
        assert!(sent.lock().is_empty());
    }

    #[tokio::test]
    async fn respects_per_ticket_min_gap() {
        let sent = Arc::new(PMutex::new(Vec::new()));
        let sink = RecordingSink { sent: sent.clone(), fail_first_n: std::sync::atomic::AtomicU32::new(0) };
        let bus = CommandBus::new(sink, Duration::from_secs(60), 3, vec![150]);
        bus.enqueue(close_command(1, 1));
        bus.drain_ready().await;
        bus.enqueue(close_command(1, 2));
        bus.drain_ready().await;
        // Second command requeued, not sent, because the gap hasn't elapsed.
        assert_eq!(sent.lock().len(), 1);
        assert!(!bus.is_empty());
    }
}
