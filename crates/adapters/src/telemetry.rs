//! Telemetry adapters: JSON metric lines, or debug-level `tracing` events.

use crate::log_sink::LogSink;
use clone_pipeline_domain::now_epoch_ms;
use clone_pipeline_ports::{TelemetryPort, TelemetryTags, TelemetryTimer};
use clone_pipeline_shared::{REDACTED, is_secret_key};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// Telemetry adapter that writes one JSON line per metric.
#[derive(Clone)]
pub struct JsonTelemetry {
    sink: Arc<dyn LogSink>,
    base_tags: TelemetryTags,
}

impl JsonTelemetry {
    /// Create a telemetry adapter backed by `sink`.
    #[must_use]
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self {
            sink,
            base_tags: TelemetryTags::new(),
        }
    }

    /// Tags applied to every metric (e.g. `queue=clone`).
    #[must_use]
    pub fn with_base_tags(mut self, tags: TelemetryTags) -> Self {
        self.base_tags = tags;
        self
    }

    fn emit(&self, metric_type: &str, name: &str, value: u64, tags: Option<&TelemetryTags>) {
        let tags = merge_tags(&self.base_tags, tags);
        self.sink
            .write_line(&metric_line(metric_type, name, value, &tags));
    }
}

impl TelemetryPort for JsonTelemetry {
    fn increment_counter(&self, name: &str, value: u64, tags: Option<&TelemetryTags>) {
        self.emit("counter", name, value, tags);
    }

    fn record_timer_ms(&self, name: &str, duration_ms: u64, tags: Option<&TelemetryTags>) {
        self.emit("timer", name, duration_ms, tags);
    }

    fn start_timer(&self, name: &str, tags: Option<&TelemetryTags>) -> Box<dyn TelemetryTimer> {
        Box::new(JsonTelemetryTimer {
            telemetry: self.clone(),
            name: name.into(),
            tags: tags.cloned(),
            started_at: Instant::now(),
            stopped: AtomicBool::new(false),
        })
    }
}

struct JsonTelemetryTimer {
    telemetry: JsonTelemetry,
    name: Box<str>,
    tags: Option<TelemetryTags>,
    started_at: Instant,
    stopped: AtomicBool,
}

impl TelemetryTimer for JsonTelemetryTimer {
    fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        let elapsed = u64::try_from(self.started_at.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.telemetry
            .record_timer_ms(&self.name, elapsed, self.tags.as_ref());
    }
}

/// Telemetry adapter that emits each metric as a debug `tracing` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTelemetry;

impl TracingTelemetry {
    /// Create the adapter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl TelemetryPort for TracingTelemetry {
    fn increment_counter(&self, name: &str, value: u64, tags: Option<&TelemetryTags>) {
        let tags = render_tags(&merge_tags(&TelemetryTags::new(), tags));
        tracing::debug!(metric = name, kind = "counter", value, tags = %tags);
    }

    fn record_timer_ms(&self, name: &str, duration_ms: u64, tags: Option<&TelemetryTags>) {
        let tags = render_tags(&merge_tags(&TelemetryTags::new(), tags));
        tracing::debug!(metric = name, kind = "timer", duration_ms, tags = %tags);
    }

    fn start_timer(&self, name: &str, tags: Option<&TelemetryTags>) -> Box<dyn TelemetryTimer> {
        Box::new(TracingTelemetryTimer {
            name: name.into(),
            tags: tags.cloned(),
            started_at: Instant::now(),
            stopped: AtomicBool::new(false),
        })
    }
}

struct TracingTelemetryTimer {
    name: Box<str>,
    tags: Option<TelemetryTags>,
    started_at: Instant,
    stopped: AtomicBool,
}

impl TelemetryTimer for TracingTelemetryTimer {
    fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        let elapsed = u64::try_from(self.started_at.elapsed().as_millis()).unwrap_or(u64::MAX);
        TracingTelemetry.record_timer_ms(&self.name, elapsed, self.tags.as_ref());
    }
}

fn render_tags(tags: &TelemetryTags) -> String {
    tags.iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join(",")
}

fn metric_line(metric_type: &str, name: &str, value: u64, tags: &TelemetryTags) -> String {
    let mut payload = Map::new();
    payload.insert("type".to_owned(), Value::from("metric"));
    payload.insert("timestampMs".to_owned(), Value::from(now_epoch_ms()));
    payload.insert("metricType".to_owned(), Value::from(metric_type));
    payload.insert("name".to_owned(), Value::from(name));
    payload.insert("value".to_owned(), Value::from(value));
    if metric_type == "timer" {
        payload.insert("unit".to_owned(), Value::from("ms"));
    }
    if !tags.is_empty() {
        let tags = tags
            .iter()
            .map(|(key, value)| (key.to_string(), Value::from(&**value)))
            .collect();
        payload.insert("tags".to_owned(), Value::Object(tags));
    }
    let mut line = Value::Object(payload).to_string();
    line.push('\n');
    line
}

fn merge_tags(base: &TelemetryTags, extra: Option<&TelemetryTags>) -> TelemetryTags {
    let mut merged = base.clone();
    if let Some(extra) = extra {
        merged.extend(extra.iter().map(|(key, value)| (key.clone(), value.clone())));
    }
    for (key, value) in &mut merged {
        if is_secret_key(key) {
            *value = REDACTED.into();
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_sink::MemoryLogSink;
    use clone_pipeline_ports::telemetry_tags;

    fn parsed(sink: &MemoryLogSink) -> Result<Vec<Value>, serde_json::Error> {
        sink.take()
            .iter()
            .map(|line| serde_json::from_str(line.trim()))
            .collect()
    }

    #[test]
    fn emits_counters_and_timers_once() -> Result<(), Box<dyn std::error::Error>> {
        let sink = Arc::new(MemoryLogSink::new());
        let telemetry = JsonTelemetry::new(sink.clone())
            .with_base_tags(telemetry_tags(&[("queue", "clone")]));

        telemetry.increment_counter("clone.enqueued", 2, None);
        let timer = telemetry.start_timer("clone.execute", None);
        timer.stop();
        timer.stop();

        let lines = parsed(&sink)?;
        assert_eq!(lines.len(), 2);
        let counter = lines.first().ok_or("missing counter")?;
        assert_eq!(counter.get("name"), Some(&Value::from("clone.enqueued")));
        assert_eq!(counter.get("value"), Some(&Value::from(2)));
        assert_eq!(counter.pointer("/tags/queue"), Some(&Value::from("clone")));
        let timer = lines.get(1).ok_or("missing timer")?;
        assert_eq!(timer.get("metricType"), Some(&Value::from("timer")));
        assert_eq!(timer.get("unit"), Some(&Value::from("ms")));
        Ok(())
    }

    #[test]
    fn secret_tags_are_redacted() -> Result<(), Box<dyn std::error::Error>> {
        let sink = Arc::new(MemoryLogSink::new());
        let telemetry = JsonTelemetry::new(sink.clone());
        telemetry.increment_counter("x", 1, Some(&telemetry_tags(&[("authToken", "abc")])));

        let lines = parsed(&sink)?;
        let line = lines.first().ok_or("missing line")?;
        assert_eq!(line.pointer("/tags/authToken"), Some(&Value::from(REDACTED)));
        Ok(())
    }

    #[test]
    fn tracing_tags_render_sorted_and_redacted() {
        let tags = merge_tags(
            &TelemetryTags::new(),
            Some(&telemetry_tags(&[("queue", "clone"), ("apiKey", "abc")])),
        );
        assert_eq!(render_tags(&tags), format!("apiKey={REDACTED},queue=clone"));
    }
}
