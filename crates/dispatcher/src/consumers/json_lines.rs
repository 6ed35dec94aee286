//! JsonLinesConsumer - appends delivered values to a JSON lines file

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, error};

use contracts::Consumer;

use crate::error::DispatcherError;

/// Configuration for JsonLinesConsumer
#[derive(Debug, Clone)]
pub struct JsonLinesConfig {
    /// Output file
    pub path: PathBuf,
    /// Keep existing content instead of truncating
    pub append: bool,
}

impl JsonLinesConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        let path = params
            .get("path")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./output.jsonl"));
        let append = params
            .get("append")
            .is_some_and(|v| v.eq_ignore_ascii_case("true"));

        Self { path, append }
    }
}

#[derive(Serialize)]
struct Record<'a, K, V> {
    key: &'a K,
    value: &'a V,
}

/// Consumer that writes one `{"key": .., "value": ..}` object per line
///
/// Write failures are logged and counted; they never reach the dispatch loop.
pub struct JsonLinesConsumer {
    name: String,
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
    written: AtomicU64,
    failures: AtomicU64,
}

impl JsonLinesConsumer {
    /// Open (or create) the output file
    pub fn new(name: impl Into<String>, config: JsonLinesConfig) -> Result<Self, DispatcherError> {
        let name = name.into();
        let file = Self::open(&config)
            .map_err(|e| DispatcherError::consumer_creation(&name, e.to_string()))?;

        debug!(consumer = %name, path = %config.path.display(), "JsonLinesConsumer opened");

        Ok(Self {
            name,
            path: config.path,
            writer: Mutex::new(BufWriter::new(file)),
            written: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        })
    }

    /// Create from params map (for factory)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, DispatcherError> {
        Self::new(name, JsonLinesConfig::from_params(params))
    }

    fn open(config: &JsonLinesConfig) -> std::io::Result<File> {
        if let Some(parent) = config.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut options = OpenOptions::new();
        options.create(true);
        if config.append {
            options.append(true);
        } else {
            options.write(true).truncate(true);
        }
        options.open(&config.path)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Lines written successfully
    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    /// Values that could not be written
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Flush buffered lines to disk
    pub fn flush(&self) -> std::io::Result<()> {
        self.writer.lock().flush()
    }

    fn write_record<K: Serialize, V: Serialize>(&self, key: &K, value: &V) -> std::io::Result<()> {
        let mut writer = self.writer.lock();
        serde_json::to_writer(&mut *writer, &Record { key, value })
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        writer.write_all(b"\n")
    }
}

impl<K, V> Consumer<K, V> for JsonLinesConsumer
where
    K: Serialize,
    V: Serialize,
{
    fn consume(&self, key: &K, value: V) {
        match self.write_record(key, &value) {
            Ok(()) => {
                self.written.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                error!(consumer = %self.name, error = %e, "Write failed");
            }
        }
    }
}

impl Drop for JsonLinesConsumer {
    fn drop(&mut self) {
        if let Err(e) = self.writer.get_mut().flush() {
            error!(consumer = %self.name, error = %e, "Flush failed on drop");
        }
    }
}
