//! In-memory port implementations.
//!
//! These doubles record every call so tests can assert on the exact sequence
//! of writes a use case performs.

use clone_pipeline_domain::{DiskUsage, IndexJobPayload, Job, RepositoryRecord, RepositoryUri};
use clone_pipeline_ports::{
    BoxFuture, DiskUsageProbePort, DiskWatermarkPort, IndexQueuePort, LogEvent, LogFields,
    LoggerPort, StatusPatch, StatusStorePort, TelemetryPort, TelemetryTags, TelemetryTimer,
};
use clone_pipeline_shared::{ErrorCode, ErrorEnvelope, RequestContext, Result};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// A no-op logger implementation.
#[derive(Debug, Default)]
pub struct NoopLogger;

impl LoggerPort for NoopLogger {
    fn log(&self, _event: LogEvent) {}

    fn child(&self, _fields: LogFields) -> Box<dyn LoggerPort> {
        Box::new(Self)
    }
}

/// Logger that keeps every event in memory.
#[derive(Debug, Default, Clone)]
pub struct RecordingLogger {
    events: Arc<Mutex<Vec<LogEvent>>>,
    base: LogFields,
}

impl RecordingLogger {
    /// Create an empty logger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Events logged so far.
    pub fn events(&self) -> Vec<LogEvent> {
        lock(&self.events).clone()
    }

    /// Returns true if an event with `name` was logged.
    pub fn has_event(&self, name: &str) -> bool {
        lock(&self.events).iter().any(|event| &*event.event == name)
    }
}

impl LoggerPort for RecordingLogger {
    fn log(&self, mut event: LogEvent) {
        if !self.base.is_empty() {
            let mut fields = self.base.clone();
            fields.extend(event.fields.take().unwrap_or_default());
            event.fields = Some(fields);
        }
        lock(&self.events).push(event);
    }

    fn child(&self, fields: LogFields) -> Box<dyn LoggerPort> {
        let mut base = self.base.clone();
        base.extend(fields);
        Box::new(Self {
            events: Arc::clone(&self.events),
            base,
        })
    }
}

/// A no-op telemetry timer.
#[derive(Debug, Default)]
pub struct NoopTimer;

impl TelemetryTimer for NoopTimer {
    fn stop(&self) {}
}

/// A no-op telemetry implementation.
#[derive(Debug, Default)]
pub struct NoopTelemetry;

impl TelemetryPort for NoopTelemetry {
    fn increment_counter(&self, _name: &str, _value: u64, _tags: Option<&TelemetryTags>) {}

    fn record_timer_ms(&self, _name: &str, _duration_ms: u64, _tags: Option<&TelemetryTags>) {}

    fn start_timer(&self, _name: &str, _tags: Option<&TelemetryTags>) -> Box<dyn TelemetryTimer> {
        Box::new(NoopTimer)
    }
}

/// Telemetry sink that sums counters and counts started timers.
#[derive(Debug, Default)]
pub struct RecordingTelemetry {
    counters: Mutex<BTreeMap<String, u64>>,
    timers: Mutex<BTreeMap<String, u64>>,
}

impl RecordingTelemetry {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of a counter (0 when never incremented).
    pub fn counter(&self, name: &str) -> u64 {
        lock(&self.counters).get(name).copied().unwrap_or(0)
    }

    /// Number of times a timer was started.
    pub fn timer_starts(&self, name: &str) -> u64 {
        lock(&self.timers).get(name).copied().unwrap_or(0)
    }
}

impl TelemetryPort for RecordingTelemetry {
    fn increment_counter(&self, name: &str, value: u64, _tags: Option<&TelemetryTags>) {
        *lock(&self.counters).entry(name.to_owned()).or_default() += value;
    }

    fn record_timer_ms(&self, name: &str, _duration_ms: u64, _tags: Option<&TelemetryTags>) {
        *lock(&self.timers).entry(name.to_owned()).or_default() += 1;
    }

    fn start_timer(&self, name: &str, _tags: Option<&TelemetryTags>) -> Box<dyn TelemetryTimer> {
        *lock(&self.timers).entry(name.to_owned()).or_default() += 1;
        Box::new(NoopTimer)
    }
}

/// One call observed by [`RecordingStatusStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusCall {
    /// `index(record)`.
    Index(RepositoryRecord),
    /// `update(uri, patch)`.
    Update {
        /// Target repository.
        uri: RepositoryUri,
        /// Applied patch.
        patch: StatusPatch,
    },
}

impl StatusCall {
    /// Returns the patch when this is an update.
    pub fn patch(&self) -> Option<&StatusPatch> {
        match self {
            Self::Update { patch, .. } => Some(patch),
            Self::Index(_) => None,
        }
    }
}

/// Status store that applies patches in memory and records every call.
#[derive(Debug, Default)]
pub struct RecordingStatusStore {
    records: Mutex<HashMap<RepositoryUri, RepositoryRecord>>,
    calls: Mutex<Vec<StatusCall>>,
    fail_writes: AtomicBool,
}

impl RecordingStatusStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call so far, in order.
    pub fn calls(&self) -> Vec<StatusCall> {
        lock(&self.calls).clone()
    }

    /// Number of `index` calls.
    pub fn index_count(&self) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|call| matches!(call, StatusCall::Index(_)))
            .count()
    }

    /// Patches passed to `update`, in order.
    pub fn patches(&self) -> Vec<StatusPatch> {
        lock(&self.calls)
            .iter()
            .filter_map(StatusCall::patch)
            .cloned()
            .collect()
    }

    /// Current stored record.
    pub fn record(&self, uri: &RepositoryUri) -> Option<RepositoryRecord> {
        lock(&self.records).get(uri).cloned()
    }

    /// Seed a record without recording a call.
    pub fn seed(&self, record: RepositoryRecord) {
        lock(&self.records).insert(record.uri.clone(), record);
    }

    /// When true, every write is recorded and then fails.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn write_failure(&self) -> Option<ErrorEnvelope> {
        self.fail_writes
            .load(Ordering::SeqCst)
            .then(crate::errors::status_write_error)
    }
}

impl StatusStorePort for RecordingStatusStore {
    fn index<'a>(
        &'a self,
        ctx: &'a RequestContext,
        record: RepositoryRecord,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            ctx.ensure_not_cancelled("recording_status_store.index")?;
            lock(&self.calls).push(StatusCall::Index(record.clone()));
            if let Some(error) = self.write_failure() {
                return Err(error);
            }
            lock(&self.records).insert(record.uri.clone(), record);
            Ok(())
        })
    }

    fn update<'a>(
        &'a self,
        ctx: &'a RequestContext,
        uri: &'a RepositoryUri,
        patch: StatusPatch,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            ctx.ensure_not_cancelled("recording_status_store.update")?;
            lock(&self.calls).push(StatusCall::Update {
                uri: uri.clone(),
                patch: patch.clone(),
            });
            if let Some(error) = self.write_failure() {
                return Err(error);
            }
            let mut records = lock(&self.records);
            let record = records.get_mut(uri).ok_or_else(|| {
                ErrorEnvelope::expected(ErrorCode::not_found(), "status record not found")
                    .with_metadata("uri", uri.as_str())
            })?;
            patch.apply_to(record);
            Ok(())
        })
    }

    fn get<'a>(
        &'a self,
        ctx: &'a RequestContext,
        uri: &'a RepositoryUri,
    ) -> BoxFuture<'a, Result<Option<RepositoryRecord>>> {
        Box::pin(async move {
            ctx.ensure_not_cancelled("recording_status_store.get")?;
            Ok(lock(&self.records).get(uri).cloned())
        })
    }
}

/// Watermark with a scripted answer that counts how often it was asked.
#[derive(Debug)]
pub struct CountingWatermark {
    low: AtomicBool,
    failure: Option<ErrorEnvelope>,
    label: Option<Box<str>>,
    calls: AtomicUsize,
}

impl CountingWatermark {
    /// Always answer `low`.
    pub fn new(low: bool) -> Self {
        Self {
            low: AtomicBool::new(low),
            failure: None,
            label: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Always fail with `error`.
    pub fn failing(error: ErrorEnvelope) -> Self {
        Self {
            failure: Some(error),
            ..Self::new(false)
        }
    }

    /// Report `label` as the threshold.
    #[must_use]
    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Change the answer.
    pub fn set_low(&self, low: bool) {
        self.low.store(low, Ordering::SeqCst);
    }

    /// Number of checks so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DiskWatermarkPort for CountingWatermark {
    fn is_low_watermark<'a>(&'a self, _ctx: &'a RequestContext) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.failure {
                Some(error) => Err(error.clone()),
                None => Ok(self.low.load(Ordering::SeqCst)),
            }
        })
    }

    fn threshold_label(&self) -> Option<Box<str>> {
        self.label.clone()
    }
}

/// Disk probe returning a fixed answer.
#[derive(Debug)]
pub struct ScriptedDiskProbe {
    answer: Result<DiskUsage>,
    calls: AtomicUsize,
    paths: Mutex<Vec<PathBuf>>,
}

impl ScriptedDiskProbe {
    /// Always report `usage`.
    pub fn fixed(usage: DiskUsage) -> Self {
        Self::with_answer(Ok(usage))
    }

    /// Always fail with `error`.
    pub fn failing(error: ErrorEnvelope) -> Self {
        Self::with_answer(Err(error))
    }

    fn with_answer(answer: Result<DiskUsage>) -> Self {
        Self {
            answer,
            calls: AtomicUsize::new(0),
            paths: Mutex::new(Vec::new()),
        }
    }

    /// Number of probes so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Paths probed so far.
    pub fn paths(&self) -> Vec<PathBuf> {
        lock(&self.paths).clone()
    }
}

impl DiskUsageProbePort for ScriptedDiskProbe {
    fn probe<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        path: &'a Path,
    ) -> BoxFuture<'a, Result<DiskUsage>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            lock(&self.paths).push(path.to_path_buf());
            self.answer.clone()
        })
    }
}

/// Index queue that keeps every enqueued job.
#[derive(Debug, Default)]
pub struct RecordingIndexQueue {
    jobs: Mutex<Vec<Job<IndexJobPayload>>>,
    failure: Option<ErrorEnvelope>,
}

impl RecordingIndexQueue {
    /// Create an accepting queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue that rejects every job with `error`.
    pub fn failing(error: ErrorEnvelope) -> Self {
        Self {
            jobs: Mutex::new(Vec::new()),
            failure: Some(error),
        }
    }

    /// Accepted jobs, in order.
    pub fn jobs(&self) -> Vec<Job<IndexJobPayload>> {
        lock(&self.jobs).clone()
    }

    /// Payloads of accepted jobs, in order.
    pub fn payloads(&self) -> Vec<IndexJobPayload> {
        lock(&self.jobs)
            .iter()
            .map(|job| job.payload.clone())
            .collect()
    }
}

impl IndexQueuePort for RecordingIndexQueue {
    fn enqueue_index_job<'a>(
        &'a self,
        ctx: &'a RequestContext,
        job: Job<IndexJobPayload>,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            ctx.ensure_not_cancelled("recording_index_queue.enqueue")?;
            if let Some(error) = &self.failure {
                return Err(error.clone());
            }
            lock(&self.jobs).push(job);
            Ok(())
        })
    }
}
