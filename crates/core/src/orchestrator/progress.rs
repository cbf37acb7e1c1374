//! Job progress tracking.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;

/// Progress stays below this until every stage has exited.
pub const MAX_RUNNING_PERCENT: f64 = 99.99;

/// Progress update sent to an attached listener.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobProgress {
    pub job_id: String,
    /// 0.0 - 100.0
    pub percent: f64,
    pub frame: u64,
    pub total_frames: u64,
}

/// Monotonic progress of one job.
///
/// Stored as hundredths of a percent so concurrent drains can raise it with
/// `fetch_max` without locking.
#[derive(Debug)]
pub struct ProgressTracker {
    job_id: String,
    total_frames: AtomicU64,
    hundredths: AtomicU64,
    frame: AtomicU64,
    listener: Option<mpsc::Sender<JobProgress>>,
}

impl ProgressTracker {
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            total_frames: AtomicU64::new(0),
            hundredths: AtomicU64::new(0),
            frame: AtomicU64::new(0),
            listener: None,
        }
    }

    /// Attaches a listener. Updates are sent with `try_send` and dropped when
    /// the channel is full.
    pub fn with_listener(mut self, tx: mpsc::Sender<JobProgress>) -> Self {
        self.listener = Some(tx);
        self
    }

    /// Sets the number of frames the running stage is expected to produce.
    pub fn set_total_frames(&self, total: u64) {
        self.total_frames.store(total, Ordering::Relaxed);
    }

    pub fn total_frames(&self) -> u64 {
        self.total_frames.load(Ordering::Relaxed)
    }

    /// Records a frame counter read from a stage's status line.
    pub fn record_frame(&self, frame: u64) {
        self.frame.fetch_max(frame, Ordering::Relaxed);
        let total = self.total_frames();
        if total == 0 {
            return;
        }
        self.raise(frame as f64 / total as f64 * 100.0);
    }

    /// Records a percentage reported directly by a stage.
    pub fn record_percent(&self, percent: f64) {
        self.raise(percent);
    }

    /// Marks every stage as exited.
    pub fn complete(&self) {
        self.hundredths.store(10_000, Ordering::Relaxed);
        self.notify();
    }

    pub fn percent(&self) -> f64 {
        self.hundredths.load(Ordering::Relaxed) as f64 / 100.0
    }

    pub fn frame(&self) -> u64 {
        self.frame.load(Ordering::Relaxed)
    }

    fn raise(&self, percent: f64) {
        if !percent.is_finite() {
            return;
        }
        let capped = percent.clamp(0.0, MAX_RUNNING_PERCENT);
        let value = (capped * 100.0).round() as u64;
        let previous = self.hundredths.fetch_max(value, Ordering::Relaxed);
        if value > previous {
            self.notify();
        }
    }

    fn notify(&self) {
        if let Some(ref tx) = self.listener {
            let _ = tx.try_send(JobProgress {
                job_id: self.job_id.clone(),
                percent: self.percent(),
                frame: self.frame(),
                total_frames: self.total_frames(),
            });
        }
    }
}
