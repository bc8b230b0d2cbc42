//! Structured logging.
//!
//! # Responsibilities
//! - Render one JSON object per line: `timestamp`, `level`, `message`,
//!   `service`, then caller fields merged at the top level
//! - Drop records below the configured minimum level
//! - Never fail: unserializable fields degrade to their debug string
//!
//! # Design Decisions
//! - The logger is a value carried in application state, not a global
//! - Output goes through a `MakeWriter` so tests can capture records
//! - Internal diagnostics stay on `tracing`; this is the service's own
//!   record stream

use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::fmt::MakeWriter;

/// Severity of a structured record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Case-insensitive parse; `warning` is accepted for [`LogLevel::Warn`].
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warn),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    /// Upper-case name as written to the `level` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-supplied key/value pairs attached to a record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields(Map<String, Value>);

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field. A value serde cannot represent is stored as its debug
    /// string instead.
    pub fn with<T>(mut self, key: impl Into<String>, value: T) -> Self
    where
        T: Serialize + fmt::Debug,
    {
        let value = serde_json::to_value(&value).unwrap_or_else(|_| Value::String(format!("{value:?}")));
        self.0.insert(key.into(), value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for Fields {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// One structured log record.
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub timestamp: String,
    pub level: LogLevel,
    pub message: String,
    pub service: String,
    pub fields: Fields,
}

impl LogRecord {
    pub fn new(level: LogLevel, message: impl Into<String>, service: impl Into<String>, fields: Fields) -> Self {
        Self {
            timestamp: now_rfc3339(),
            level,
            message: message.into(),
            service: service.into(),
            fields,
        }
    }

    /// Render as a single JSON line (no trailing newline).
    pub fn to_json_line(&self) -> String {
        let mut object = Map::new();
        object.insert("timestamp".into(), Value::String(self.timestamp.clone()));
        object.insert("level".into(), Value::String(self.level.as_str().into()));
        object.insert("message".into(), Value::String(self.message.clone()));
        object.insert("service".into(), Value::String(self.service.clone()));
        for (key, value) in &self.fields.0 {
            object.insert(key.clone(), value.clone());
        }
        Value::Object(object).to_string()
    }
}

/// ISO-8601 UTC timestamp with millisecond precision.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Structured JSON-lines logger.
///
/// Cheap to clone; all clones share one sink.
#[derive(Clone)]
pub struct Logger {
    inner: Arc<LoggerInner>,
}

struct LoggerInner {
    service: String,
    min_level: LogLevel,
    writer: BoxMakeWriter,
}

impl Logger {
    /// Logger writing to standard output.
    pub fn stdout(service: impl Into<String>, min_level: LogLevel) -> Self {
        Self::with_writer(service, min_level, io::stdout)
    }

    /// Logger writing to an arbitrary sink.
    pub fn with_writer<W>(service: impl Into<String>, min_level: LogLevel, writer: W) -> Self
    where
        W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(LoggerInner {
                service: service.into(),
                min_level,
                writer: BoxMakeWriter::new(writer),
            }),
        }
    }

    pub fn service(&self) -> &str {
        &self.inner.service
    }

    pub fn log(&self, level: LogLevel, message: &str, fields: Fields) {
        if level < self.inner.min_level {
            return;
        }
        let record = LogRecord::new(level, message, self.inner.service.as_str(), fields);
        let mut line = record.to_json_line();
        line.push('\n');

        let mut writer = self.inner.writer.make_writer();
        if let Err(e) = writer.write_all(line.as_bytes()).and_then(|_| writer.flush()) {
            tracing::warn!(error = %e, "Failed to write log record");
        }
    }

    pub fn debug(&self, message: &str, fields: Fields) {
        self.log(LogLevel::Debug, message, fields);
    }

    pub fn info(&self, message: &str, fields: Fields) {
        self.log(LogLevel::Info, message, fields);
    }

    pub fn warn(&self, message: &str, fields: Fields) {
        self.log(LogLevel::Warn, message, fields);
    }

    pub fn error(&self, message: &str, fields: Fields) {
        self.log(LogLevel::Error, message, fields);
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("service", &self.inner.service)
            .field("min_level", &self.inner.min_level)
            .finish_non_exhaustive()
    }
}

/// In-memory sink that keeps every line written to it.
///
/// Used by tests to inspect the record stream.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, as text.
    pub fn contents(&self) -> String {
        let buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&buffer).into_owned()
    }

    /// Every line parsed as JSON; lines that do not parse are skipped.
    pub fn records(&self) -> Vec<Value> {
        self.contents()
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }

    /// Records whose `message` equals `message`.
    pub fn records_with_message(&self, message: &str) -> Vec<Value> {
        self.records()
            .into_iter()
            .filter(|record| record["message"] == message)
            .collect()
    }
}

impl<'a> MakeWriter<'a> for MemorySink {
    type Writer = MemoryWriter;

    fn make_writer(&'a self) -> Self::Writer {
        MemoryWriter {
            buffer: Arc::clone(&self.buffer),
        }
    }
}

/// Writer handed out by [`MemorySink`].
#[derive(Debug)]
pub struct MemoryWriter {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
