//! Logger and telemetry selection for local runs.
//!
//! By default events go through `tracing` so the subscriber installed by the
//! binary decides their format. `CPL_EVENT_SINK=stderr` switches to the JSON
//! line adapters instead, which bypass the subscriber.

use clone_pipeline_adapters::{
    JsonLogger, JsonTelemetry, LogSink, StderrLogSink, TracingLogger, TracingTelemetry,
};
use clone_pipeline_ports::{LogFields, LogLevel, LoggerPort, TelemetryPort};
use clone_pipeline_shared::RequestContext;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

const EVENT_SINK_ENV: &str = "CPL_EVENT_SINK";
const LOG_LEVEL_ENV: &str = "CPL_LOG_LEVEL";

/// Logger and telemetry handed to use cases.
#[derive(Clone)]
pub struct Observability {
    /// Structured logger.
    pub logger: Option<Arc<dyn LoggerPort>>,
    /// Metrics sink.
    pub telemetry: Option<Arc<dyn TelemetryPort>>,
}

impl Observability {
    /// No logging and no metrics.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            logger: None,
            telemetry: None,
        }
    }

    /// Select adapters from the process environment.
    #[must_use]
    pub fn from_std_env() -> Self {
        Self::from_env_map(&std::env::vars().collect())
    }

    /// Select adapters from an explicit env map.
    #[must_use]
    pub fn from_env_map(env: &BTreeMap<String, String>) -> Self {
        let sink = env.get(EVENT_SINK_ENV).map(|value| value.trim().to_ascii_lowercase());
        match sink.as_deref() {
            Some("off" | "none") => Self::disabled(),
            Some("stderr" | "json") => {
                let sink: Arc<dyn LogSink> = Arc::new(StderrLogSink);
                let level = parse_log_level(env.get(LOG_LEVEL_ENV).map(String::as_str));
                Self {
                    logger: Some(Arc::new(
                        JsonLogger::new(Arc::clone(&sink)).with_min_level(level),
                    )),
                    telemetry: Some(Arc::new(JsonTelemetry::new(sink))),
                }
            },
            _ => Self {
                logger: Some(Arc::new(TracingLogger::new())),
                telemetry: Some(Arc::new(TracingTelemetry::new())),
            },
        }
    }

    /// Logger carrying the request's correlation id on every event.
    #[must_use]
    pub fn scoped_logger(&self, ctx: &RequestContext) -> Option<Arc<dyn LoggerPort>> {
        let logger = self.logger.as_ref()?;
        let mut fields = LogFields::new();
        fields.insert(
            "correlationId".into(),
            Value::String(ctx.correlation_id().as_str().to_owned()),
        );
        Some(Arc::from(logger.child(fields)))
    }
}

fn parse_log_level(value: Option<&str>) -> LogLevel {
    match value.map(str::to_ascii_lowercase).as_deref() {
        Some("debug" | "trace") => LogLevel::Debug,
        Some("warn") => LogLevel::Warn,
        Some("error") => LogLevel::Error,
        _ => LogLevel::Info,
    }
}
