//! NDJSON (Newline Delimited JSON) output

use super::RecordSink;
use eyre::{Context, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Sink that writes one `<stream>.ndjson` file per stream into a directory.
///
/// Files are created lazily on the first record of each stream and buffered
/// until [`RecordSink::flush`].
///
/// # Example
/// ```no_run
/// use googleads_extractor::storage::{NdjsonDirSink, RecordSink};
/// use serde_json::json;
///
/// # fn example() -> eyre::Result<()> {
/// let mut sink = NdjsonDirSink::new("output")?;
/// sink.write("ga_campaign", &json!({"campaign": {"id": "1"}}))?;
/// sink.flush()?;
/// # Ok(())
/// # }
/// ```
pub struct NdjsonDirSink {
    dir: PathBuf,
    writers: HashMap<String, BufWriter<File>>,
}

impl NdjsonDirSink {
    /// Create the output directory (if needed) and an empty sink over it.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
        Ok(Self {
            dir,
            writers: HashMap::new(),
        })
    }

    fn writer(&mut self, stream: &str) -> Result<&mut BufWriter<File>> {
        match self.writers.entry(stream.to_string()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let path = self.dir.join(format!("{stream}.ndjson"));
                let file = File::create(&path)
                    .with_context(|| format!("Failed to create {}", path.display()))?;
                log::debug!("Writing stream '{}' to {}", stream, path.display());
                Ok(entry.insert(BufWriter::new(file)))
            }
        }
    }
}

impl RecordSink for NdjsonDirSink {
    fn write(&mut self, stream: &str, record: &Value) -> Result<()> {
        let line = serde_json::to_string(record)?;
        let writer = self.writer(stream)?;
        writeln!(writer, "{}", line)
            .with_context(|| format!("Failed to write record for stream '{}'", stream))
    }

    fn flush(&mut self) -> Result<()> {
        for (stream, writer) in &mut self.writers {
            writer
                .flush()
                .with_context(|| format!("Failed to flush stream '{}'", stream))?;
        }
        Ok(())
    }
}
