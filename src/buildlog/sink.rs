// src/buildlog/sink.rs

//! Unbounded, order-preserving hand-off of build log entries from the worker
//! thread to a polling consumer.
//!
//! Backed by an unbounded crossbeam channel: pushes never block and never
//! drop, and draining works from any thread without an async runtime. The
//! consumer side is expected to call [`LogSink::drain`] on a short fixed
//! timer.

use crossbeam_channel::{Receiver, Sender, unbounded};

use super::entry::LogEntry;

/// Cloneable handle to a shared log queue.
///
/// All clones push into and drain from the same queue. Entries pushed from a
/// single thread are drained in the order they were pushed.
#[derive(Debug, Clone)]
pub struct LogSink {
    tx: Sender<LogEntry>,
    rx: Receiver<LogEntry>,
}

impl LogSink {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    /// Enqueue an entry. Never blocks.
    pub fn push(&self, entry: LogEntry) {
        // Both ends live in `self`, so the channel can't be disconnected here.
        let _ = self.tx.send(entry);
    }

    /// Take everything currently queued, oldest first. Never blocks; returns
    /// an empty vector when nothing is pending.
    pub fn drain(&self) -> Vec<LogEntry> {
        self.rx.try_iter().collect()
    }

    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buildlog::Severity;

    fn messages(entries: Vec<LogEntry>) -> Vec<String> {
        entries.into_iter().map(|e| e.message).collect()
    }

    #[test]
    fn drain_on_empty_sink_returns_nothing() {
        let sink = LogSink::new();
        assert!(sink.drain().is_empty());
        assert_eq!(sink.pending(), 0);
    }

    #[test]
    fn interleaved_push_and_drain_keeps_order() {
        let sink = LogSink::new();
        let mut seen = Vec::new();

        seen.extend(messages(sink.drain()));
        sink.push(LogEntry::new(Severity::Info, "E1"));
        seen.extend(messages(sink.drain()));
        sink.push(LogEntry::new(Severity::Info, "E2"));
        sink.push(LogEntry::new(Severity::Info, "E3"));
        seen.extend(messages(sink.drain()));
        seen.extend(messages(sink.drain()));

        assert_eq!(seen, vec!["E1", "E2", "E3"]);
    }

    #[test]
    fn producer_thread_order_survives_concurrent_draining() {
        let sink = LogSink::new();
        let producer_sink = sink.clone();

        let producer = std::thread::spawn(move || {
            for i in 0..5_000 {
                producer_sink.push(LogEntry::new(Severity::Info, i.to_string()));
            }
        });

        let mut seen: Vec<usize> = Vec::new();
        while !producer.is_finished() || sink.pending() > 0 {
            seen.extend(sink.drain().into_iter().map(|e| e.message.parse::<usize>().unwrap()));
        }
        producer.join().unwrap();
        seen.extend(sink.drain().into_iter().map(|e| e.message.parse::<usize>().unwrap()));

        assert_eq!(seen, (0..5_000).collect::<Vec<_>>());
    }
}
