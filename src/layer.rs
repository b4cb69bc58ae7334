use crate::format::{Formatter, HumanFormatter};
use crate::record::{Entry, Field, Level, SpanContext, SpanId, TraceId};
use crate::sink::Sink;
use crate::sync_writer::SyncWriter;
use chrono::Utc;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// `tracing_subscriber` layer that renders every event with a
/// [`Formatter`] and writes it, newline terminated, through a shared
/// [`SyncWriter`].
///
/// Writing happens on the thread that emitted the event. Events at or
/// above the sync level are followed by a best-effort
/// [`SyncWriter::sync`].
pub struct HumanLayer<W, F = HumanFormatter> {
    writer: Arc<SyncWriter<W>>,
    formatter: F,
    sink_name: String,
    sync_level: Level,
    /// Total events seen by the layer.
    pub total_events: Arc<AtomicU64>,
    /// Events fully written to the sink.
    pub written_events: Arc<AtomicU64>,
    /// Events dropped because the sink returned an error. Each drop is also
    /// reported on the writer's diagnostics handle.
    pub failed_writes: Arc<AtomicU64>,
}

impl<W: Sink> HumanLayer<W> {
    /// Create a layer writing to `writer` with the human layout.
    ///
    /// The sink name used in sync diagnostics defaults to `"sink"` and the
    /// sync level to [`Level::Error`].
    pub fn new(writer: Arc<SyncWriter<W>>, enable_color: bool) -> Self {
        Self {
            writer,
            formatter: HumanFormatter::new(enable_color),
            sink_name: "sink".to_string(),
            sync_level: Level::Error,
            total_events: Arc::new(AtomicU64::new(0)),
            written_events: Arc::new(AtomicU64::new(0)),
            failed_writes: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl<W: Sink, F: Formatter> HumanLayer<W, F> {
    /// Replace the formatter, keeping the writer, settings and counters.
    pub fn with_formatter<G: Formatter>(self, formatter: G) -> HumanLayer<W, G> {
        HumanLayer {
            writer: self.writer,
            formatter,
            sink_name: self.sink_name,
            sync_level: self.sync_level,
            total_events: self.total_events,
            written_events: self.written_events,
            failed_writes: self.failed_writes,
        }
    }

    pub fn with_sink_name(self, sink_name: impl Into<String>) -> Self {
        Self {
            sink_name: sink_name.into(),
            ..self
        }
    }

    pub fn with_sync_level(self, sync_level: Level) -> Self {
        Self { sync_level, ..self }
    }

    pub fn writer(&self) -> &Arc<SyncWriter<W>> {
        &self.writer
    }

    fn write_entry(&self, entry: &Entry) {
        let mut line = self.formatter.format(entry);
        line.push('\n');

        match self.writer.write_all(line.as_bytes()) {
            Ok(()) => {
                self.written_events.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.failed_writes.fetch_add(1, Ordering::Relaxed);
                self.writer.report(format_args!(
                    "failed to write log record to {}: {}",
                    self.sink_name, e
                ));
            }
        }

        if entry.level >= self.sync_level {
            self.writer.sync(&self.sink_name);
        }
    }
}

impl<S, W, F> Layer<S> for HumanLayer<W, F>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
    W: Sink + Send + 'static,
    F: Formatter + 'static,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        self.total_events.fetch_add(1, Ordering::Relaxed);

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        // Innermost span first, root last.
        let span_context = ctx
            .event_scope(event)
            .map(|scope| scope.map(|span| span.id().into_u64()).collect::<Vec<_>>())
            .and_then(|ids| match (ids.first(), ids.last()) {
                (Some(&leaf), Some(&root)) => Some(SpanContext::new(
                    TraceId(u128::from(root)),
                    SpanId(leaf),
                )),
                _ => None,
            })
            .unwrap_or(SpanContext::EMPTY);

        let meta = event.metadata();
        let entry = Entry {
            level: Level::from(meta.level()),
            time: Utc::now(),
            file: meta.file().unwrap_or("<unknown>").to_string(),
            line: meta.line().unwrap_or(0),
            component: visitor.component.unwrap_or_default(),
            message: visitor.message.unwrap_or_default(),
            span_context,
            fields: visitor.fields,
        };

        self.write_entry(&entry);
    }
}

use tracing::field::{Field as TracingField, Visit};

/// Collects an event's fields in record order. `message` and `component`
/// are pulled out into their own slots.
#[derive(Default)]
pub struct FieldVisitor {
    pub fields: Vec<Field>,
    pub message: Option<String>,
    pub component: Option<String>,
}

impl FieldVisitor {
    fn record_value(&mut self, field: &TracingField, value: serde_json::Value) {
        match (field.name(), value) {
            ("message", serde_json::Value::String(s)) => self.message = Some(s),
            ("component", serde_json::Value::String(s)) => self.component = Some(s),
            (name, value) => self.fields.push(Field {
                key: name.to_string(),
                value,
            }),
        }
    }
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &TracingField, value: &str) {
        self.record_value(field, serde_json::Value::String(value.to_string()));
    }

    fn record_i64(&mut self, field: &TracingField, value: i64) {
        self.record_value(field, serde_json::Value::from(value));
    }

    fn record_u64(&mut self, field: &TracingField, value: u64) {
        self.record_value(field, serde_json::Value::from(value));
    }

    fn record_f64(&mut self, field: &TracingField, value: f64) {
        self.record_value(field, serde_json::Value::from(value));
    }

    fn record_bool(&mut self, field: &TracingField, value: bool) {
        self.record_value(field, serde_json::Value::from(value));
    }

    fn record_debug(&mut self, field: &TracingField, value: &dyn std::fmt::Debug) {
        self.record_value(field, serde_json::Value::String(format!("{:?}", value)));
    }
}
