//! Task Dispatcher.
//!
//! Routes a document to the inline or background lane by its classified
//! tier. Each lane has its own worker permits, so a background backlog never
//! delays inline work. Background admission is capped: once `workers +
//! queue_depth` jobs are running or waiting, new ones are refused.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::Instrument;
use uuid::Uuid;
use vouch_core::{ExtractionSchema, JobDescriptor, Tier};

use crate::config::{human_duration, DispatchConfig};
use crate::documents::{Classifier, DocumentError, TextLoader};
use crate::extraction::{ExtractionError, ExtractionService};

/// Message returned for work shed to the background lane.
pub const DEFERRED_MESSAGE: &str =
    "Analysis on this PDF would take about 60 secs so please check back";

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error("Worker pool closed")]
    PoolClosed,
}

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Classification failed: {0}")]
    Classification(#[source] DocumentError),

    #[error("Unsupported document category: {0}")]
    UnsupportedCategory(i64),

    #[error("Analysis did not finish within {0:?}")]
    Timeout(Duration),

    #[error("Analysis failed: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("Analysis worker stopped: {0}")]
    Worker(String),

    #[error(transparent)]
    QueueFull(#[from] QueueFull),
}

/// Refusal to admit another background job.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Background analysis queue is full ({capacity} jobs admitted)")]
pub struct QueueFull {
    pub capacity: usize,
}

/// What the dispatcher hands back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DispatchOutcome {
    Completed {
        result: JsonValue,
    },
    Pending {
        message: String,
        job_id: Uuid,
        #[serde(with = "human_duration")]
        estimated_completion: Duration,
    },
}

/// Does the actual work for one job.
#[async_trait]
pub trait DocumentAnalyzer: Send + Sync {
    async fn analyze(&self, job: &JobDescriptor) -> Result<JsonValue, AnalysisError>;
}

/// Loads the statement text and extracts bank-statement entities.
pub struct StatementAnalyzer {
    loader: Arc<dyn TextLoader>,
    extractor: Arc<dyn ExtractionService>,
}

impl StatementAnalyzer {
    pub fn new(loader: Arc<dyn TextLoader>, extractor: Arc<dyn ExtractionService>) -> Self {
        Self { loader, extractor }
    }
}

#[async_trait]
impl DocumentAnalyzer for StatementAnalyzer {
    async fn analyze(&self, job: &JobDescriptor) -> Result<JsonValue, AnalysisError> {
        let text = self.loader.load_text(&job.url).await?;
        let entities = self
            .extractor
            .extract(ExtractionSchema::BankStatement, &text)
            .await?;
        Ok(JsonValue::Object(entities))
    }
}

/// A submitted job.
pub struct JobHandle {
    pub job_id: Uuid,
    handle: JoinHandle<Result<JsonValue, AnalysisError>>,
}

impl JobHandle {
    pub fn new(job_id: Uuid, handle: JoinHandle<Result<JsonValue, AnalysisError>>) -> Self {
        Self { job_id, handle }
    }

    /// Wait for the job's own result.
    pub async fn join(self) -> Result<JsonValue, DispatchError> {
        match self.handle.await {
            Ok(result) => Ok(result?),
            Err(e) => Err(DispatchError::Worker(e.to_string())),
        }
    }

    /// Let the job run on without anyone waiting for it.
    pub fn detach(self) -> Uuid {
        self.job_id
    }
}

/// Runs jobs somewhere other than the caller's task.
pub trait BackgroundExecutor: Send + Sync {
    fn submit(&self, job: JobDescriptor) -> Result<JobHandle, QueueFull>;
}

/// Tokio tasks gated per lane by semaphores.
///
/// Tier 1/2 jobs take an inline permit. Tier 3 jobs must first be admitted
/// (at most `workers + queue_depth` at once) and then wait for a background
/// permit.
pub struct TokioExecutor {
    analyzer: Arc<dyn DocumentAnalyzer>,
    inline: Arc<Semaphore>,
    background: Arc<Semaphore>,
    admitted: Arc<Semaphore>,
    capacity: usize,
}

impl TokioExecutor {
    /// `workers` permits per lane and the default queue depth.
    pub fn new(analyzer: Arc<dyn DocumentAnalyzer>, workers: usize) -> Self {
        Self::with_lanes(analyzer, workers, workers, DispatchConfig::default().queue_depth)
    }

    pub fn from_config(analyzer: Arc<dyn DocumentAnalyzer>, config: &DispatchConfig) -> Self {
        Self::with_lanes(analyzer, config.inline_workers, config.workers, config.queue_depth)
    }

    pub fn with_lanes(
        analyzer: Arc<dyn DocumentAnalyzer>,
        inline_workers: usize,
        workers: usize,
        queue_depth: usize,
    ) -> Self {
        let workers = workers.max(1);
        let capacity = workers + queue_depth;
        Self {
            analyzer,
            inline: Arc::new(Semaphore::new(inline_workers.max(1))),
            background: Arc::new(Semaphore::new(workers)),
            admitted: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Background workers currently free.
    pub fn available_workers(&self) -> usize {
        self.background.available_permits()
    }

    pub fn available_inline_workers(&self) -> usize {
        self.inline.available_permits()
    }
}

impl BackgroundExecutor for TokioExecutor {
    fn submit(&self, job: JobDescriptor) -> Result<JobHandle, QueueFull> {
        let (lane, admission) = match job.tier {
            Tier::Basic | Tier::Standard => (Arc::clone(&self.inline), None),
            Tier::Extended => {
                let admission = Arc::clone(&self.admitted).try_acquire_owned().map_err(|_| {
                    tracing::warn!(capacity = self.capacity, document_id = %job.document_id, "Background queue full");
                    QueueFull {
                        capacity: self.capacity,
                    }
                })?;
                (Arc::clone(&self.background), Some(admission))
            }
        };

        let job_id = Uuid::new_v4();
        let analyzer = Arc::clone(&self.analyzer);
        let span = tracing::info_span!(
            "analysis",
            %job_id,
            document_id = %job.document_id,
            tier = %job.tier
        );

        let handle = tokio::spawn(
            async move {
                let _admission = admission;
                let _permit = lane
                    .acquire_owned()
                    .await
                    .map_err(|_| AnalysisError::PoolClosed)?;

                tracing::debug!("Analysis started");
                let result = analyzer.analyze(&job).await;
                match &result {
                    Ok(_) => tracing::info!("Analysis completed"),
                    Err(e) => tracing::warn!(error = %e, "Analysis failed"),
                }
                result
            }
            .instrument(span),
        );

        Ok(JobHandle::new(job_id, handle))
    }
}

pub struct TaskDispatcher {
    classifier: Arc<dyn Classifier>,
    executor: Arc<dyn BackgroundExecutor>,
    sync_timeout: Duration,
    deferred_estimate: Duration,
}

impl TaskDispatcher {
    pub fn new(
        classifier: Arc<dyn Classifier>,
        executor: Arc<dyn BackgroundExecutor>,
        config: &DispatchConfig,
    ) -> Self {
        Self {
            classifier,
            executor,
            sync_timeout: config.sync_timeout,
            deferred_estimate: config.deferred_estimate,
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn dispatch(&self, document_id: &str) -> Result<DispatchOutcome, DispatchError> {
        let classification = self
            .classifier
            .classify(document_id)
            .await
            .map_err(DispatchError::Classification)?;

        let job = JobDescriptor::from_classification(document_id, classification).map_err(|e| {
            tracing::warn!(tier = e.0, "Unsupported document category");
            DispatchError::UnsupportedCategory(e.0)
        })?;

        match job.tier {
            Tier::Basic | Tier::Standard => {
                let handle = self.executor.submit(job)?;
                let job_id = handle.job_id;
                match tokio::time::timeout(self.sync_timeout, handle.join()).await {
                    Ok(result) => Ok(DispatchOutcome::Completed { result: result? }),
                    Err(_) => {
                        tracing::warn!(%job_id, timeout = ?self.sync_timeout, "Inline analysis timed out");
                        Err(DispatchError::Timeout(self.sync_timeout))
                    }
                }
            }
            Tier::Extended => {
                let job_id = self.executor.submit(job)?.detach();
                tracing::info!(%job_id, "Analysis deferred");
                Ok(DispatchOutcome::Pending {
                    message: DEFERRED_MESSAGE.to_string(),
                    job_id,
                    estimated_completion: self.deferred_estimate,
                })
            }
        }
    }
}
