// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only invocation log store.
//!
//! `append` never blocks the invocation path: entries land in a bounded
//! in-memory queue and a background task drains them to the sink. When the
//! queue is full the oldest entry is dropped and counted.

use fp_core::LogEntry;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Destination for drained log entries.
pub trait LogSink: Send + Sync + 'static {
    fn append(&self, entry: &LogEntry);
}

/// Sink collecting entries in memory, for tests and probes.
#[derive(Default)]
pub struct MemorySink {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl LogSink for MemorySink {
    fn append(&self, entry: &LogEntry) {
        self.entries.lock().push(entry.clone());
    }
}

/// Sink appending JSON lines to a file.
pub struct JsonlSink {
    file: Mutex<std::fs::File>,
}

impl JsonlSink {
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { file: Mutex::new(file) })
    }
}

impl LogSink for JsonlSink {
    fn append(&self, entry: &LogEntry) {
        let line = match serde_json::to_string(entry) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(error = %e, "unserializable log entry");
                return;
            }
        };
        let mut file = self.file.lock();
        if let Err(e) = writeln!(file, "{}", line) {
            tracing::warn!(error = %e, "log sink write failed");
        }
    }
}

/// Bounded buffer between workers and the sink.
pub struct LogStore {
    queue: Mutex<VecDeque<LogEntry>>,
    notify: Notify,
    dropped: AtomicU64,
    capacity: usize,
    cancel: CancellationToken,
}

impl LogStore {
    /// Create the store and start its writer task.
    pub fn spawn(capacity: usize, sink: Arc<dyn LogSink>) -> Arc<Self> {
        let store = Arc::new(Self {
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
            notify: Notify::new(),
            dropped: AtomicU64::new(0),
            capacity: capacity.max(1),
            cancel: CancellationToken::new(),
        });
        let writer = Arc::clone(&store);
        tokio::spawn(async move { writer.run(sink).await });
        store
    }

    /// Queue one entry. Never blocks; drops the oldest entry on overflow.
    pub fn append(&self, entry: LogEntry) {
        {
            let mut queue = self.queue.lock();
            if queue.len() >= self.capacity {
                queue.pop_front();
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
            queue.push_back(entry);
        }
        self.notify.notify_one();
    }

    /// Entries discarded because the buffer was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Stop the writer after a final drain.
    pub fn shutdown(&self) {
        self.cancel.cancel();
        self.notify.notify_one();
    }

    async fn run(&self, sink: Arc<dyn LogSink>) {
        loop {
            loop {
                let entry = self.queue.lock().pop_front();
                match entry {
                    Some(entry) => sink.append(&entry),
                    None => break,
                }
            }
            if self.cancel.is_cancelled() {
                return;
            }
            tokio::select! {
                _ = self.notify.notified() => {}
                _ = self.cancel.cancelled() => {}
            }
        }
    }
}

#[cfg(test)]
#[path = "logstore_tests.rs"]
mod tests;
