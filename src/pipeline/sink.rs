//! Event sink implementations.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::models::{CrawlEvent, EventSink};

/// Writes each event as one JSON line and flushes, so consumers see
/// events as they happen.
///
/// The first failed write closes the sink; later events are dropped.
pub struct JsonLinesSink<W: Write + Send> {
    writer: Mutex<W>,
    closed: AtomicBool,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
            closed: AtomicBool::new(false),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: Write + Send> EventSink for JsonLinesSink<W> {
    fn emit(&self, event: CrawlEvent) {
        if self.is_closed() {
            return;
        }
        let line = match event.to_json_line() {
            Ok(line) => line,
            Err(e) => {
                log::error!("Failed to serialize event: {}", e);
                return;
            }
        };
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = writeln!(writer, "{line}").and_then(|_| writer.flush()) {
            if !self.closed.swap(true, Ordering::SeqCst) {
                log::error!("Failed to write event, closing output: {}", e);
            }
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Keeps events in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<CrawlEvent>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<CrawlEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl EventSink for CollectingSink {
    fn emit(&self, event: CrawlEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}
