//! JSONL rendering of tracing events.
//!
//! Each event becomes one object: `ts`, `level`, `event` (the target),
//! correlation ids inherited from enclosing spans, `message`, and any other
//! fields under `fields`.

use std::io::{self, Write};
use std::sync::Mutex;

use serde_json::{Map, Value};
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

use super::events::Level;

/// Command output can run to megabytes; string fields are cut here.
const MAX_FIELD_CHARS: usize = 4096;

/// Span fields lifted to the top level of every event beneath the span.
const INHERITED: [&str; 4] = ["run_id", "host_id", "stage", "capability"];

/// Inherited fields recorded on a span, stored in its extensions.
#[derive(Default)]
struct Inherited(Map<String, Value>);

/// Collects fields into a JSON map, pulling `message` out separately.
#[derive(Default)]
struct Collector {
    fields: Map<String, Value>,
    message: Option<String>,
}

impl Collector {
    fn put(&mut self, field: &Field, value: Value) {
        if field.name() == "message" {
            self.message = Some(match value {
                Value::String(s) => s,
                other => other.to_string(),
            });
        } else {
            self.fields.insert(field.name().to_string(), value);
        }
    }
}

impl Visit for Collector {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, Value::String(clip(value.to_string())));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.put(field, Value::String(clip(format!("{:?}", value))));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.put(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, Value::Bool(value));
    }
}

fn clip(mut value: String) -> String {
    if value.len() <= MAX_FIELD_CHARS {
        return value;
    }
    let mut end = MAX_FIELD_CHARS;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    value.truncate(end);
    value.push_str("...(truncated)");
    value
}

/// A `Layer` writing one JSON object per event.
pub struct JsonlLayer<W = io::Stderr> {
    out: Mutex<W>,
}

impl JsonlLayer<io::Stderr> {
    pub fn stderr() -> Self {
        JsonlLayer::new(io::stderr())
    }
}

impl<W: Write> JsonlLayer<W> {
    pub fn new(out: W) -> Self {
        JsonlLayer {
            out: Mutex::new(out),
        }
    }
}

impl<S, W> Layer<S> for JsonlLayer<W>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: Write + 'static,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let mut collector = Collector::default();
        attrs.record(&mut collector);
        collector.fields.retain(|key, _| INHERITED.contains(&key.as_str()));

        if let Some(span) = ctx.span(id) {
            span.extensions_mut().insert(Inherited(collector.fields));
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let meta = event.metadata();
        let mut line = Map::new();
        line.insert("ts".into(), Value::String(chrono::Utc::now().to_rfc3339()));
        line.insert("level".into(), serde_json::json!(Level::from(*meta.level())));
        line.insert("event".into(), Value::String(meta.target().to_string()));

        if let Some(scope) = ctx.event_scope(event) {
            let mut innermost = None;
            // Outer spans first so inner values overwrite them.
            for span in scope.from_root() {
                innermost = Some(span.name());
                if let Some(Inherited(fields)) = span.extensions().get::<Inherited>() {
                    line.extend(fields.clone());
                }
            }
            if let Some(name) = innermost {
                line.insert("span".into(), Value::String(name.to_string()));
            }
        }

        let mut collector = Collector::default();
        event.record(&mut collector);
        // Ids passed on the event itself win over the span's.
        for key in INHERITED {
            if let Some(value) = collector.fields.remove(key) {
                line.insert(key.into(), value);
            }
        }
        if let Some(message) = collector.message {
            line.insert("message".into(), Value::String(message));
        }
        if !collector.fields.is_empty() {
            line.insert("fields".into(), Value::Object(collector.fields));
        }

        if let Ok(mut out) = self.out.lock() {
            let _ = writeln!(out, "{}", Value::Object(line));
        }
    }
}
