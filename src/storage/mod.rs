//! Record sinks
//!
//! The extraction engine hands every record to a [`RecordSink`] keyed by
//! stream name; what happens next (NDJSON files, a message bus, a test
//! buffer) is the sink's business.

mod ndjson;

pub use ndjson::NdjsonDirSink;

use eyre::Result;
use serde_json::Value;
use std::collections::BTreeMap;

/// Destination for extracted records.
pub trait RecordSink {
    /// Write one record for the named stream.
    ///
    /// # Errors
    /// Returns an error if the record cannot be persisted; the runner treats
    /// this as fatal.
    fn write(&mut self, stream: &str, record: &Value) -> Result<()>;

    /// Flush any buffered output. Called once at the end of a run.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Sink that buffers records in memory, keyed by stream name.
///
/// Useful for tests and for callers that post-process a whole run.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub records: BTreeMap<String, Vec<Value>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records captured for one stream, empty if the stream never ran.
    pub fn stream(&self, name: &str) -> &[Value] {
        self.records.get(name).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl RecordSink for MemorySink {
    fn write(&mut self, stream: &str, record: &Value) -> Result<()> {
        self.records
            .entry(stream.to_string())
            .or_default()
            .push(record.clone());
        Ok(())
    }
}
