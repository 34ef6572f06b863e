//! Composition root: adapters and the clone worker wired from config.

use crate::{InfraResult, Observability};
use clone_pipeline_adapters::{
    Fs2DiskUsageProbe, FsStatusStore, GitCliRepositoryServiceFactory, InProcessQueue,
    InProcessQueueConfig, JsonlIndexQueue, TokioScheduler,
};
use clone_pipeline_app::{
    CancelCloneDeps, CancellationRegistry, CloneWorker, CloneWorkerDeps, CloneWorkerSettings,
    WatermarkAdmission, WatermarkAdmissionConfig, WatermarkAdmissionDeps,
};
use clone_pipeline_config::ValidatedPipelineConfig;
use clone_pipeline_ports::{
    DiskUsageProbePort, DiskWatermarkPort, IndexQueuePort, LoggerPort,
    RepositoryServiceFactoryPort, SchedulerPort, StatusStorePort, TelemetryPort,
};
use std::sync::Arc;

/// Port implementations the pipeline is assembled from.
#[derive(Clone)]
pub struct PipelinePorts {
    /// Status record store.
    pub status_store: Arc<dyn StatusStorePort>,
    /// Repository service factory.
    pub repository_factory: Arc<dyn RepositoryServiceFactoryPort>,
    /// Downstream index queue.
    pub index_queue: Arc<dyn IndexQueuePort>,
    /// Disk probe behind the watermark admission.
    pub disk_probe: Arc<dyn DiskUsageProbePort>,
    /// Deferred task runner.
    pub scheduler: Arc<dyn SchedulerPort>,
    /// Structured logger.
    pub logger: Option<Arc<dyn LoggerPort>>,
    /// Metrics sink.
    pub telemetry: Option<Arc<dyn TelemetryPort>>,
}

impl PipelinePorts {
    /// Filesystem, git CLI, and tokio adapters configured from `config`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn from_config(
        config: &ValidatedPipelineConfig,
        observability: &Observability,
    ) -> InfraResult<Self> {
        Ok(Self {
            status_store: Arc::new(FsStatusStore::new(config.status_path())),
            repository_factory: Arc::new(GitCliRepositoryServiceFactory::new(
                &*config.clone.git_binary,
            )),
            index_queue: Arc::new(JsonlIndexQueue::new(config.index_queue_path())),
            disk_probe: Arc::new(Fs2DiskUsageProbe::new()),
            scheduler: Arc::new(TokioScheduler::from_current()?),
            logger: observability.logger.clone(),
            telemetry: observability.telemetry.clone(),
        })
    }
}

/// A running clone pipeline.
pub struct Pipeline {
    /// Clone queue driving the worker hooks.
    pub queue: InProcessQueue<CloneWorker>,
    /// Cancel handles of in-flight clones.
    pub registry: Arc<CancellationRegistry>,
    /// Disk admission policy.
    pub watermark: Arc<dyn DiskWatermarkPort>,
    /// Ports the pipeline was built from.
    pub ports: PipelinePorts,
}

impl Pipeline {
    /// Dependencies of the cancel use case.
    #[must_use]
    pub fn cancel_deps(&self) -> CancelCloneDeps {
        CancelCloneDeps {
            registry: Arc::clone(&self.registry),
            status_store: Arc::clone(&self.ports.status_store),
            logger: self.ports.logger.clone(),
        }
    }

    /// Stop the queue, then wait for deferred index enqueues.
    pub async fn shutdown(&self) {
        self.queue.shutdown().await;
        self.ports.scheduler.drain().await;
    }
}

/// Watermark admission configured from `config`.
#[must_use]
pub fn build_watermark(
    config: &ValidatedPipelineConfig,
    ports: &PipelinePorts,
) -> Arc<dyn DiskWatermarkPort> {
    Arc::new(WatermarkAdmission::new(
        WatermarkAdmissionDeps {
            probe: Arc::clone(&ports.disk_probe),
            logger: ports.logger.clone(),
            telemetry: ports.telemetry.clone(),
        },
        WatermarkAdmissionConfig {
            enabled: config.disk.threshold_enabled,
            threshold: config.watermark_threshold(),
            path: config.repo_path(),
        },
    ))
}

/// Wire the worker and start the clone queue.
///
/// Must be called from within a tokio runtime.
pub fn build_pipeline(
    config: &ValidatedPipelineConfig,
    ports: PipelinePorts,
) -> InfraResult<Pipeline> {
    let registry = Arc::new(CancellationRegistry::new());
    let watermark = build_watermark(config, &ports);

    let worker = CloneWorker::new(
        CloneWorkerDeps {
            status_store: Arc::clone(&ports.status_store),
            watermark: Arc::clone(&watermark),
            repository_factory: Arc::clone(&ports.repository_factory),
            index_queue: Arc::clone(&ports.index_queue),
            scheduler: Arc::clone(&ports.scheduler),
            registry: Arc::clone(&registry),
            logger: ports.logger.clone(),
            telemetry: ports.telemetry.clone(),
        },
        CloneWorkerSettings {
            repo_root: config.repo_path(),
            url_policy: config.url_policy().clone(),
            progress_interval: config.progress_interval(),
            index_debounce: config.index_debounce(),
        },
    );

    let queue = InProcessQueue::start(
        Arc::new(worker),
        InProcessQueueConfig {
            default_timeout: config.clone_timeout(),
            retry: config.retry_policy(),
        },
        ports.logger.clone(),
    )?;

    Ok(Pipeline {
        queue,
        registry,
        watermark,
        ports,
    })
}
