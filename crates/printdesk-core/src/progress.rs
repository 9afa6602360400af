//! Completion percentage from elapsed wall-clock time against the expected
//! duration. Reaching 100% on a printing job triggers auto-completion.

use chrono::{DateTime, Utc};

use crate::error::{FleetError, Result};
use crate::timefmt::minutes_between;
use crate::types::{JobStatus, PrintJob};
use crate::Fleet;

/// Percent complete, always within `[0, 100]`.
pub fn compute_progress(job: &PrintJob, now: DateTime<Utc>) -> f64 {
    if job.real_time_stop.is_some() || job.status.is_terminal() {
        return 100.0;
    }

    let elapsed = minutes_between(job.start_time, now);
    let total = match job.calculated_time_stop {
        Some(stop) => minutes_between(job.start_time, stop),
        None => job.printing_time,
    };
    if !total.is_finite() || total <= 0.0 {
        return 100.0;
    }

    (elapsed / total * 100.0).clamp(0.0, 100.0)
}

/// Whether `job` should be auto-completed at `now`. Paused jobs never are.
pub fn is_due(job: &PrintJob, now: DateTime<Utc>) -> bool {
    job.is_open() && job.status == JobStatus::Printing && compute_progress(job, now) >= 100.0
}

impl Fleet {
    /// Completes `job` with `auto_complete = true` if it has run its expected
    /// duration, returning the re-read job. `None` when nothing was done,
    /// including when a concurrent writer closed the job first.
    pub async fn maybe_auto_complete(&self, job: &PrintJob) -> Result<Option<PrintJob>> {
        if !is_due(job, self.now()) {
            return Ok(None);
        }

        match self.complete_job(job.id, true).await {
            Ok(done) => {
                tracing::info!(
                    job_id = %job.id,
                    printer_id = %job.printer_id,
                    "print job auto-completed"
                );
                Ok(Some(done))
            }
            Err(FleetError::AlreadyClosed { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }
}
