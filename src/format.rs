use crate::record::{Entry, Field, Level};
use crate::sink::Sink;
use crate::value;
use chrono::Local;
use serde_json::Value;
use yansi::{Color, Condition, Paint};

/// Like a syslog stamp, but the day of month is always zero padded.
pub const TIMESTAMP_FORMAT: &str = "%b %d %H:%M:%S%.3f";

/// Turns an [`Entry`] into the text written to a sink.
pub trait Formatter: Send + Sync {
    fn format(&self, entry: &Entry) -> String;
}

/// The human-readable layout produced by [`format_entry`].
#[derive(Debug, Clone, Copy, Default)]
pub struct HumanFormatter {
    pub enable_color: bool,
}

impl HumanFormatter {
    pub fn new(enable_color: bool) -> Self {
        Self { enable_color }
    }
}

impl Formatter for HumanFormatter {
    fn format(&self, entry: &Entry) -> String {
        format_entry(entry, self.enable_color)
    }
}

/// Format `entry` as `[LEVEL] {file:line} (component) Jan 02 15:04:05.000: message`
/// followed, when there are fields, by a newline and the field block.
///
/// The timestamp is the entry's instant in the local time zone.
///
/// The result never ends with a newline; the sink's caller adds its own
/// record separator.
pub fn format_entry(entry: &Entry, enable_color: bool) -> String {
    let mut out = String::new();

    let level = entry.level.as_str();
    out.push('[');
    out.push_str(&paint_if(level, level_color(entry.level), enable_color));
    out.push_str("] ");

    let loc = format!("{}:{}", basename(&entry.file), entry.line);
    out.push('{');
    out.push_str(&paint_if(&loc, Color::Green, enable_color));
    out.push_str("} ");

    if !entry.component.is_empty() {
        let component = quote_key(&entry.component);
        out.push('(');
        out.push_str(&paint_if(&component, Color::Magenta, enable_color));
        out.push_str(") ");
    }

    out.push_str(
        &entry
            .time
            .with_timezone(&Local)
            .format(TIMESTAMP_FORMAT)
            .to_string(),
    );
    out.push_str(": ");
    out.push_str(&quote(&entry.message));

    let encoded = if entry.span_context.is_empty() {
        value::encode(&entry.fields)
    } else {
        let mut fields = Vec::with_capacity(entry.fields.len() + 2);
        fields.push(Field::new("trace", entry.span_context.trace_id.to_string()));
        fields.push(Field::new("span", entry.span_context.span_id.to_string()));
        fields.extend(entry.fields.iter().cloned());
        value::encode(&fields)
    };
    if let Value::Object(map) = encoded {
        if !map.is_empty() {
            out.push('\n');
            out.push_str(&value::render(&map));
        }
    }

    out
}

fn level_color(level: Level) -> Color {
    match level {
        Level::Debug | Level::Info => Color::Blue,
        Level::Warn => Color::Yellow,
        Level::Error => Color::Red,
        Level::Critical | Level::Fatal => Color::BrightRed,
    }
}

// The per-value condition keeps yansi's global switch from overriding the
// caller's choice.
fn paint_if(text: &str, color: Color, enable_color: bool) -> String {
    if enable_color {
        text.fg(color).whenever(Condition::ALWAYS).to_string()
    } else {
        text.to_string()
    }
}

// Last path element, ignoring trailing separators. `.` for an empty path
// and a single separator for a path made only of separators.
fn basename(path: &str) -> &str {
    if path.is_empty() {
        return ".";
    }
    let trimmed = path.trim_end_matches(['/', '\\']);
    if trimmed.is_empty() {
        return &path[..1];
    }
    trimmed.rsplit(['/', '\\']).next().unwrap_or(trimmed)
}

fn needs_quote(s: &str) -> bool {
    s.is_empty()
        || s
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || c == '"' || c == '\\')
}

fn json_quote(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("{:?}", s))
}

/// Quote `s` as a JSON string literal if it would be ambiguous bare.
pub fn quote(s: &str) -> String {
    if needs_quote(s) {
        json_quote(s)
    } else {
        s.to_string()
    }
}

/// Like [`quote`], but also quotes strings containing `:` since keys are
/// followed by `: ` in the field block.
pub fn quote_key(s: &str) -> String {
    if needs_quote(s) || s.contains(':') {
        json_quote(s)
    } else {
        s.to_string()
    }
}

/// Whether `sink` is an interactive terminal. False for anything without
/// an OS handle.
pub fn is_tty<S: Sink + ?Sized>(sink: &S) -> bool {
    sink.is_terminal()
}
