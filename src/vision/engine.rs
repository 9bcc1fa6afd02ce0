//! 视觉推理工作池
//!
//! 检测器与分类器实现不保证线程安全，因此每个 worker 持有一份独立的
//! `VisionPipeline`，请求通过信号量签出一个空闲 pipeline，
//! 在阻塞线程池中完成 CPU 计算后归还。worker 数为 1 时退化为串行队列。

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use super::decoder::decode_base64_payload;
use super::error::VisionError;
use super::metrics::VisionMetrics;
use super::pipeline::VisionPipeline;
use super::types::VisionResult;

type FreeList = Arc<Mutex<Vec<VisionPipeline>>>;

pub struct VisionEngine {
    free: FreeList,
    permits: Arc<Semaphore>,
    size: usize,
    metrics: Arc<VisionMetrics>,
}

/// A checked-out pipeline. Returned to the free list on drop, even when the
/// blocking task unwinds, so the pool never shrinks.
struct Checkout {
    pipeline: Option<VisionPipeline>,
    free: FreeList,
    _permit: OwnedSemaphorePermit,
}

impl Drop for Checkout {
    fn drop(&mut self) {
        if let Some(pipeline) = self.pipeline.take() {
            self.free
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(pipeline);
        }
    }
}

impl VisionEngine {
    pub fn new(pipelines: Vec<VisionPipeline>) -> Self {
        let size = pipelines.len();
        Self {
            free: Arc::new(Mutex::new(pipelines)),
            permits: Arc::new(Semaphore::new(size)),
            size,
            metrics: Arc::new(VisionMetrics::new()),
        }
    }

    /// Build `workers` pipelines from a factory. Any factory error is fatal.
    pub fn build<F>(workers: usize, mut factory: F) -> Result<Self, VisionError>
    where
        F: FnMut(usize) -> Result<VisionPipeline, VisionError>,
    {
        let pipelines = (0..workers.max(1))
            .map(&mut factory)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(pipelines))
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    pub fn metrics(&self) -> &VisionMetrics {
        &self.metrics
    }

    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }

    /// Stop handing out pipelines; pending and future calls fail with `PoolClosed`.
    pub fn close(&self) {
        self.permits.close();
    }

    async fn checkout(&self) -> Result<Checkout, VisionError> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| VisionError::PoolClosed)?;
        let pipeline = self
            .free
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()
            .ok_or(VisionError::PoolClosed)?;
        Ok(Checkout {
            pipeline: Some(pipeline),
            free: self.free.clone(),
            _permit: permit,
        })
    }

    /// Classify one encoded frame on a pooled worker.
    ///
    /// If the caller stops waiting, the blocking work still finishes and the
    /// result is dropped; the pipeline goes back to the pool either way.
    pub async fn classify(&self, frame: Vec<u8>) -> Result<VisionResult, VisionError> {
        let mut checkout = self.checkout().await?;
        let metrics = self.metrics.clone();

        let task = tokio::task::spawn_blocking(move || {
            let start = Instant::now();
            let outcome = match checkout.pipeline.as_mut() {
                Some(pipeline) => pipeline.classify(&frame),
                None => Err(VisionError::PoolClosed),
            };
            metrics.record(&outcome, start.elapsed());
            outcome
        });

        match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(error = %e, "Vision worker task failed");
                Err(VisionError::Worker(e.to_string()))
            }
        }
    }

    /// Classify a base64 frame field. Payloads that fail base64 decoding are
    /// rejected without taking a worker but still counted as decode errors.
    pub async fn classify_base64(&self, encoded: &str) -> Result<VisionResult, VisionError> {
        match decode_base64_payload(encoded) {
            Ok(bytes) => self.classify(bytes).await,
            Err(e) => {
                self.metrics.record_rejected();
                Err(e.into())
            }
        }
    }
}
