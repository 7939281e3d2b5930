//! Structured logging.
//!
//! # Responsibilities
//! - Emit one JSON object per line for every application event
//! - Filter events below the minimum level read from `LOG_LEVEL`
//! - Bind fixed fields (request ID) into child loggers
//!
//! # Design Decisions
//! - Base fields (`level`, `message`, `service`, `timestamp`) always come first
//!   and cannot be overwritten; colliding metadata keys are renamed `meta_<key>`
//! - Logging never fails the caller: serialization errors degrade to a fixed
//!   fallback line and sink write errors are dropped
//! - Output goes through a `LogSink` so tests can capture lines in memory

use std::fmt;
use std::io::Write;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::ObservabilityConfig;

/// Service tag stamped on every event.
pub const SERVICE_NAME: &str = "solarlink-app";

/// Environment variable holding the minimum emitted level.
pub const LOG_LEVEL_ENV: &str = "LOG_LEVEL";

/// Binding key carrying the correlation ID.
pub const REQUEST_ID_FIELD: &str = "requestId";

const RESERVED_KEYS: [&str; 4] = ["level", "message", "service", "timestamp"];

/// Key-value metadata attached to an event.
pub type Fields = Map<String, Value>;

/// Event severity, ordered `Debug < Info < Warn < Error`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
        }
    }

    /// Parse a configured level, falling back to `Info` when unset or unrecognized.
    pub fn parse_or_default(value: Option<&str>) -> Self {
        value.and_then(|v| v.parse().ok()).unwrap_or_default()
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized log level `{0}`")]
pub struct ParseLevelError(String);

impl FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "warn" => Ok(Level::Warn),
            "error" => Ok(Level::Error),
            _ => Err(ParseLevelError(s.to_string())),
        }
    }
}

/// Destination for serialized log lines.
pub trait LogSink: Send + Sync {
    /// Write one line. Implementations must not panic and swallow I/O errors.
    fn write_line(&self, line: &str);
}

/// Writes lines to the process standard output.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl LogSink for StdoutSink {
    fn write_line(&self, line: &str) {
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "{}", line);
    }
}

/// Captures lines in memory. Clones share the same buffer.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw lines written so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    /// Lines parsed back into JSON values; unparsable lines are skipped.
    pub fn records(&self) -> Vec<Value> {
        self.lines
            .lock()
            .iter()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }

    pub fn clear(&self) {
        self.lines.lock().clear();
    }
}

impl LogSink for MemorySink {
    fn write_line(&self, line: &str) {
        self.lines.lock().push(line.to_string());
    }
}

/// Leveled JSON-lines logger.
///
/// Cheap to clone; children share the parent's sink and minimum level.
#[derive(Clone)]
pub struct StructuredLogger {
    min_level: Level,
    bindings: Arc<Fields>,
    sink: Arc<dyn LogSink>,
}

impl fmt::Debug for StructuredLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StructuredLogger")
            .field("min_level", &self.min_level)
            .field("bindings", &self.bindings)
            .finish_non_exhaustive()
    }
}

impl StructuredLogger {
    pub fn new(min_level: Level, sink: Arc<dyn LogSink>) -> Self {
        Self {
            min_level,
            bindings: Arc::new(Fields::new()),
            sink,
        }
    }

    /// Logger at the configured level. `LOG_LEVEL` has already been folded
    /// into the config by the loader; unrecognized values mean `info`.
    pub fn from_config(config: &ObservabilityConfig, sink: Arc<dyn LogSink>) -> Self {
        Self::new(Level::parse_or_default(Some(&config.log_level)), sink)
    }

    /// Effective minimum level.
    pub fn level(&self) -> Level {
        self.min_level
    }

    pub fn enabled(&self, level: Level) -> bool {
        level >= self.min_level
    }

    /// Fixed fields added to every event, including the service tag.
    pub fn bindings(&self) -> Fields {
        let mut out = Fields::new();
        out.insert("service".into(), Value::from(SERVICE_NAME));
        for (key, value) in self.bindings.iter() {
            out.insert(key.clone(), value.clone());
        }
        out
    }

    /// Child logger with extra bound fields. Later bindings replace earlier ones.
    pub fn child(&self, fields: Fields) -> Self {
        let mut bindings = (*self.bindings).clone();
        for (key, value) in fields {
            insert_field(&mut bindings, key, value);
        }
        Self {
            min_level: self.min_level,
            bindings: Arc::new(bindings),
            sink: self.sink.clone(),
        }
    }

    /// Child logger bound to a request correlation ID.
    pub fn for_request(&self, request_id: &str) -> Self {
        let mut fields = Fields::new();
        fields.insert(REQUEST_ID_FIELD.into(), Value::from(request_id));
        self.child(fields)
    }

    /// Emit an event with optional typed metadata.
    pub fn log(&self, level: Level, message: &str, metadata: Option<&Fields>) {
        if !self.enabled(level) {
            return;
        }
        self.emit(level, message, metadata.cloned().unwrap_or_default());
    }

    /// Emit an event with any serializable metadata.
    ///
    /// Objects are merged field by field, `null` adds nothing, and any other
    /// value is stored under `meta`.
    pub fn log_with<T: Serialize + ?Sized>(&self, level: Level, message: &str, metadata: &T) {
        if !self.enabled(level) {
            return;
        }
        match serde_json::to_value(metadata) {
            Ok(Value::Object(fields)) => self.emit(level, message, fields),
            Ok(Value::Null) => self.emit(level, message, Fields::new()),
            Ok(other) => {
                let mut fields = Fields::new();
                fields.insert("meta".into(), other);
                self.emit(level, message, fields);
            }
            Err(e) => self.emit_fallback(message, &e),
        }
    }

    pub fn debug<T: Serialize>(&self, message: &str, metadata: T) {
        self.log_with(Level::Debug, message, &metadata);
    }

    pub fn info<T: Serialize>(&self, message: &str, metadata: T) {
        self.log_with(Level::Info, message, &metadata);
    }

    pub fn warn<T: Serialize>(&self, message: &str, metadata: T) {
        self.log_with(Level::Warn, message, &metadata);
    }

    pub fn error<T: Serialize>(&self, message: &str, metadata: T) {
        self.log_with(Level::Error, message, &metadata);
    }

    fn emit(&self, level: Level, message: &str, metadata: Fields) {
        let mut event = base_event(level, message);
        for (key, value) in self.bindings.iter() {
            insert_field(&mut event, key.clone(), value.clone());
        }
        for (key, value) in metadata {
            insert_field(&mut event, key, value);
        }
        match serde_json::to_string(&event) {
            Ok(line) => self.sink.write_line(&line),
            Err(e) => self.emit_fallback(message, &e),
        }
    }

    fn emit_fallback(&self, message: &str, error: &serde_json::Error) {
        let mut event = base_event(Level::Error, "log_serialization_failed");
        for (key, value) in self.bindings.iter() {
            insert_field(&mut event, key.clone(), value.clone());
        }
        event.insert("original_message".into(), Value::from(message));
        event.insert("error".into(), Value::from(error.to_string()));
        if let Ok(line) = serde_json::to_string(&event) {
            self.sink.write_line(&line);
        }
    }
}

fn base_event(level: Level, message: &str) -> Fields {
    let mut event = Fields::new();
    event.insert("level".into(), Value::from(level.as_str()));
    event.insert("message".into(), Value::from(message));
    event.insert("service".into(), Value::from(SERVICE_NAME));
    event.insert("timestamp".into(), Value::from(timestamp()));
    event
}

/// Insert a field, renaming keys that collide with the base fields.
fn insert_field(target: &mut Fields, key: String, value: Value) {
    if RESERVED_KEYS.contains(&key.as_str()) {
        target.insert(format!("meta_{}", key), value);
    } else {
        target.insert(key, value);
    }
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
