use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::VisionError;
use super::types::VisionResult;

/// 延迟分桶上界（微秒）
const LATENCY_BUCKETS: [u64; 6] = [5_000, 20_000, 50_000, 100_000, 250_000, u64::MAX];
const BUCKET_MIDPOINTS_MS: [f64; 6] = [2.5, 12.5, 35.0, 75.0, 175.0, 500.0];

/// Frame-level counters for the vision engine.
pub struct VisionMetrics {
    frames: AtomicU64,
    faces: AtomicU64,
    no_face: AtomicU64,
    decode_errors: AtomicU64,
    failures: AtomicU64,
    total_latency_us: AtomicU64,
    last_frame_at: AtomicI64,
    latency_buckets: [AtomicU64; 6],
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub frames: u64,
    pub faces: u64,
    pub no_face: u64,
    pub decode_errors: u64,
    pub failures: u64,
    pub avg_latency_ms: f64,
    pub p50_latency_ms: f64,
    pub p95_latency_ms: f64,
    pub last_frame_at: i64,
}

impl Default for VisionMetrics {
    fn default() -> Self {
        Self {
            frames: AtomicU64::new(0),
            faces: AtomicU64::new(0),
            no_face: AtomicU64::new(0),
            decode_errors: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            total_latency_us: AtomicU64::new(0),
            last_frame_at: AtomicI64::new(0),
            latency_buckets: Default::default(),
        }
    }
}

impl VisionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, outcome: &Result<VisionResult, VisionError>, latency: Duration) {
        let latency_us = u64::try_from(latency.as_micros()).unwrap_or(u64::MAX);
        self.frames.fetch_add(1, Ordering::Relaxed);
        self.total_latency_us.fetch_add(latency_us, Ordering::Relaxed);
        self.record_latency_bucket(latency_us);
        self.last_frame_at
            .store(chrono::Utc::now().timestamp_millis(), Ordering::Relaxed);

        match outcome {
            Ok(result) if result.has_face() => {
                self.faces.fetch_add(1, Ordering::Relaxed);
            }
            Ok(_) => {
                self.no_face.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) if e.is_client_error() => {
                self.decode_errors.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// 未进入工作池就被拒绝的帧（base64 或消息格式错误），不参与延迟统计
    pub fn record_rejected(&self) {
        self.frames.fetch_add(1, Ordering::Relaxed);
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
        self.last_frame_at
            .store(chrono::Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    fn record_latency_bucket(&self, latency_us: u64) {
        for (i, &threshold) in LATENCY_BUCKETS.iter().enumerate() {
            if latency_us <= threshold {
                self.latency_buckets[i].fetch_add(1, Ordering::Relaxed);
                return;
            }
        }
    }

    fn percentile(&self, pct: f64) -> f64 {
        let counts: Vec<u64> = self
            .latency_buckets
            .iter()
            .map(|b| b.load(Ordering::Relaxed))
            .collect();
        let total: u64 = counts.iter().sum();
        if total == 0 {
            return 0.0;
        }
        let target = (pct / 100.0 * total as f64).ceil() as u64;
        let mut cumulative = 0u64;
        for (i, &count) in counts.iter().enumerate() {
            cumulative += count;
            if cumulative >= target {
                return BUCKET_MIDPOINTS_MS[i];
            }
        }
        BUCKET_MIDPOINTS_MS[5]
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let frames = self.frames.load(Ordering::Relaxed);
        let timed: u64 = self
            .latency_buckets
            .iter()
            .map(|b| b.load(Ordering::Relaxed))
            .sum();
        let total_us = self.total_latency_us.load(Ordering::Relaxed);
        MetricsSnapshot {
            frames,
            faces: self.faces.load(Ordering::Relaxed),
            no_face: self.no_face.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            avg_latency_ms: if timed > 0 {
                total_us as f64 / timed as f64 / 1000.0
            } else {
                0.0
            },
            p50_latency_ms: self.percentile(50.0),
            p95_latency_ms: self.percentile(95.0),
            last_frame_at: self.last_frame_at.load(Ordering::Relaxed),
        }
    }
}
