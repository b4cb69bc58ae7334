use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Severity of an [`Entry`].
///
/// The set is closed and totally ordered from `Debug` to `Fatal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
    Critical,
    Fatal,
}

impl Level {
    pub const ALL: [Level; 6] = [
        Level::Debug,
        Level::Info,
        Level::Warn,
        Level::Error,
        Level::Critical,
        Level::Fatal,
    ];

    /// Canonical short name, as printed inside the level tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Critical => "CRITICAL",
            Level::Fatal => "FATAL",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&tracing::Level> for Level {
    fn from(level: &tracing::Level) -> Self {
        match *level {
            tracing::Level::TRACE | tracing::Level::DEBUG => Level::Debug,
            tracing::Level::INFO => Level::Info,
            tracing::Level::WARN => Level::Warn,
            tracing::Level::ERROR => Level::Error,
        }
    }
}

/// Error returned when a string is not one of the canonical level names.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown log level {0:?}")]
pub struct ParseLevelError(pub String);

impl FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Level::ALL
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseLevelError(s.to_string()))
    }
}

/// 128-bit trace identifier, displayed as 32 lowercase hex digits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TraceId(pub u128);

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

/// 64-bit span identifier, displayed as 16 lowercase hex digits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SpanId(pub u64);

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Tracing identifiers attached to an entry.
///
/// [`SpanContext::EMPTY`] means no tracing context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SpanContext {
    pub trace_id: TraceId,
    pub span_id: SpanId,
}

impl SpanContext {
    pub const EMPTY: SpanContext = SpanContext {
        trace_id: TraceId(0),
        span_id: SpanId(0),
    };

    pub fn new(trace_id: TraceId, span_id: SpanId) -> Self {
        Self { trace_id, span_id }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::EMPTY
    }
}

/// A single structured key/value pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub key: String,
    pub value: serde_json::Value,
}

impl Field {
    /// Encode `value` into a field.
    ///
    /// A value that fails to serialize is kept as a string describing the
    /// failure rather than dropped.
    pub fn new(key: impl Into<String>, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value)
            .unwrap_or_else(|e| serde_json::Value::String(format!("!ERROR: {}", e)));
        Self { key: key.into(), value }
    }
}

/// Structured log entry consumed by the formatter.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub level: Level,
    pub time: DateTime<Utc>,
    pub file: String,
    pub line: u32,
    /// Subsystem tag; empty when absent.
    pub component: String,
    pub message: String,
    pub span_context: SpanContext,
    /// Insertion-ordered fields.
    pub fields: Vec<Field>,
}

impl Entry {
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            level,
            time: Utc::now(),
            file: String::new(),
            line: 0,
            component: String::new(),
            message: message.into(),
            span_context: SpanContext::EMPTY,
            fields: Vec::new(),
        }
    }

    pub fn with_time(mut self, time: DateTime<Utc>) -> Self {
        self.time = time;
        self
    }

    pub fn with_location(mut self, file: impl Into<String>, line: u32) -> Self {
        self.file = file.into();
        self.line = line;
        self
    }

    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = component.into();
        self
    }

    pub fn with_span_context(mut self, span_context: SpanContext) -> Self {
        self.span_context = span_context;
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        self.fields.push(Field::new(key, value));
        self
    }
}
