//! Print-job state machine.
//!
//! ```text
//! (none) --start--> printing            printer: idle -> printing
//! printing --pause--> paused            printer -> paused
//! paused --resume--> printing           printer -> printing, pause folded into downtime
//! printing|paused --complete--> completed   printer -> idle | waiting_confirmation (auto)
//! printing|paused --cancel--> cancelled     printer -> idle
//! ```
//!
//! Closing a job credits the printer with wall-clock time since start less
//! pause time. Every write is a single [`Transition`] guarded by "job still
//! open", so a job is credited at most once.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{FleetError, Result};
use crate::patch::{JobPatch, PrinterPatch};
use crate::store::{Credit, Transition};
use crate::timefmt::{add_minutes, hours_to_minutes, minutes_between};
use crate::types::{
    FleetEvent, JobId, JobStatus, ModelId, PrintJob, Printer, PrinterId, PrinterStatus,
};
use crate::Fleet;

/// Expected duration supplied by a caller instead of the model's.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrintTime {
    Minutes(f64),
    Hours(f64),
}

impl PrintTime {
    pub fn as_minutes(self) -> f64 {
        match self {
            PrintTime::Minutes(m) => m,
            PrintTime::Hours(h) => hours_to_minutes(h),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StartOptions {
    pub printing_time: Option<PrintTime>,
}

/// Expected stop of a job started at `start`. Rejects durations that are
/// negative, not finite, or past the representable date range.
pub(crate) fn expected_stop(start: DateTime<Utc>, printing_time: f64) -> Result<DateTime<Utc>> {
    if !printing_time.is_finite() || printing_time < 0.0 {
        return Err(FleetError::Validation(format!(
            "printing_time must be a non-negative number of minutes, got {printing_time}"
        )));
    }
    add_minutes(start, printing_time).ok_or_else(|| {
        FleetError::Validation(format!("printing_time of {printing_time} minutes is out of range"))
    })
}

/// Patch that takes an open job out of the active lifecycle at `now`, plus
/// the print minutes to credit the printer with.
fn closing(job: &PrintJob, now: DateTime<Utc>, status: JobStatus) -> (JobPatch, f64) {
    let patch = JobPatch {
        status: Some(status),
        pause_time: Some(None),
        real_time_stop: Some(Some(now)),
        downtime: Some(job.downtime_at(now)),
        ..JobPatch::default()
    };
    (patch, job.net_minutes_at(now))
}

impl Fleet {
    pub async fn start_job(
        &self,
        printer_id: PrinterId,
        model_id: ModelId,
        options: StartOptions,
    ) -> Result<PrintJob> {
        let printer = self.require_printer(printer_id).await?;
        if printer.status != PrinterStatus::Idle {
            return Err(FleetError::InvalidState(format!(
                "printer {printer_id} is {}, expected idle",
                printer.status
            )));
        }
        let model = self
            .store
            .get_model(model_id)
            .await?
            .ok_or_else(|| FleetError::not_found("model", model_id))?;

        let printing_time = options
            .printing_time
            .map(PrintTime::as_minutes)
            .unwrap_or(model.printing_time);
        let now = self.now();
        let stop = expected_stop(now, printing_time)?;

        let job = PrintJob {
            id: JobId::new(),
            printer_id,
            model_id,
            studio_id: printer.studio_id,
            status: JobStatus::Printing,
            start_time: now,
            pause_time: None,
            calculated_time_stop: Some(stop),
            real_time_stop: None,
            printing_time,
            downtime: 0.0,
            stop_reason: None,
        };

        self.store
            .apply(
                Transition::new(printer_id)
                    .expect_status(PrinterStatus::Idle)
                    .printer(PrinterPatch::status(PrinterStatus::Printing))
                    .insert_job(job.clone())
                    .event(FleetEvent::new(
                        printer_id,
                        Some(job.id),
                        "job.start",
                        Some(json!({ "model_id": model_id, "printing_time": printing_time })),
                        now,
                    )),
            )
            .await?;

        tracing::info!(
            job_id = %job.id,
            %printer_id,
            %model_id,
            printing_time,
            "print job started"
        );
        Ok(job)
    }

    pub async fn pause_job(&self, job_id: JobId) -> Result<PrintJob> {
        let job = self.require_open_job(job_id).await?;
        if job.status == JobStatus::Paused {
            return Err(FleetError::InvalidState(format!("job {job_id} is already paused")));
        }

        let now = self.now();
        let patch = JobPatch {
            status: Some(JobStatus::Paused),
            pause_time: Some(Some(now)),
            ..JobPatch::default()
        };
        self.store
            .apply(
                Transition::new(job.printer_id)
                    .printer(PrinterPatch::status(PrinterStatus::Paused))
                    .update_open_job(job_id, patch)
                    .event(FleetEvent::new(job.printer_id, Some(job_id), "job.pause", None, now)),
            )
            .await?;

        tracing::info!(%job_id, printer_id = %job.printer_id, "print job paused");
        self.require_job(job_id).await
    }

    /// Resumes a job. The pause length is added to the job's downtime and the
    /// expected stop slides forward by the same amount.
    pub async fn resume_job(&self, job_id: JobId) -> Result<PrintJob> {
        let job = self.require_open_job(job_id).await?;
        let now = self.now();

        let mut patch = JobPatch {
            status: Some(JobStatus::Printing),
            pause_time: Some(None),
            ..JobPatch::default()
        };
        let mut paused_minutes = 0.0;
        if let Some(paused_at) = job.pause_time {
            let pause = (now - paused_at).max(chrono::Duration::zero());
            paused_minutes = minutes_between(paused_at, now).max(0.0);
            patch.downtime = Some(job.downtime + paused_minutes);
            let slid = match job.calculated_time_stop {
                Some(stop) => Some(stop.checked_add_signed(pause).ok_or_else(|| {
                    FleetError::Validation(format!("job {job_id} expected stop is out of range"))
                })?),
                None => None,
            };
            patch.calculated_time_stop = Some(slid);
        }

        self.store
            .apply(
                Transition::new(job.printer_id)
                    .printer(PrinterPatch::status(PrinterStatus::Printing))
                    .update_open_job(job_id, patch)
                    .event(FleetEvent::new(
                        job.printer_id,
                        Some(job_id),
                        "job.resume",
                        Some(json!({ "paused_minutes": paused_minutes })),
                        now,
                    )),
            )
            .await?;

        tracing::info!(%job_id, printer_id = %job.printer_id, paused_minutes, "print job resumed");
        self.require_job(job_id).await
    }

    /// Completes an open job. With `auto_complete` the printer waits for an
    /// operator to confirm before it becomes idle again.
    pub async fn complete_job(&self, job_id: JobId, auto_complete: bool) -> Result<PrintJob> {
        let job = self.require_open_job(job_id).await?;
        let now = self.now();
        let (patch, credited) = closing(&job, now, JobStatus::Completed);
        let (printer_status, action) = if auto_complete {
            (PrinterStatus::WaitingConfirmation, "job.auto_complete")
        } else {
            (PrinterStatus::Idle, "job.complete")
        };

        self.store
            .apply(
                Transition::new(job.printer_id)
                    .printer(PrinterPatch::status(printer_status))
                    .credit(Credit {
                        print_minutes: credited,
                        ..Credit::default()
                    })
                    .update_open_job(job_id, patch)
                    .event(FleetEvent::new(
                        job.printer_id,
                        Some(job_id),
                        action,
                        Some(json!({ "credited_minutes": credited })),
                        now,
                    )),
            )
            .await?;

        tracing::info!(
            %job_id,
            printer_id = %job.printer_id,
            credited,
            auto_complete,
            "print job completed"
        );
        self.require_job(job_id).await
    }

    /// Cancels an open job. Time actually spent printing is still credited.
    pub async fn cancel_job(&self, job_id: JobId, reason: Option<String>) -> Result<PrintJob> {
        let job = self.require_open_job(job_id).await?;
        let now = self.now();
        let (mut patch, credited) = closing(&job, now, JobStatus::Cancelled);
        if reason.is_some() {
            patch.stop_reason = Some(reason.clone());
        }

        self.store
            .apply(
                Transition::new(job.printer_id)
                    .printer(PrinterPatch::status(PrinterStatus::Idle))
                    .credit(Credit {
                        print_minutes: credited,
                        ..Credit::default()
                    })
                    .update_open_job(job_id, patch)
                    .event(FleetEvent::new(
                        job.printer_id,
                        Some(job_id),
                        "job.cancel",
                        Some(json!({ "credited_minutes": credited, "reason": reason })),
                        now,
                    )),
            )
            .await?;

        tracing::info!(%job_id, printer_id = %job.printer_id, credited, "print job cancelled");
        self.require_job(job_id).await
    }

    /// Operator acknowledgement that a printer is free again.
    ///
    /// Accepted from any status but idle. An open job is completed and
    /// credited; otherwise the most recently stopped job is marked completed
    /// unless it was cancelled.
    pub async fn confirm_printer(&self, printer_id: PrinterId) -> Result<Printer> {
        let printer = self.require_printer(printer_id).await?;
        if printer.status == PrinterStatus::Idle {
            return Err(FleetError::InvalidState(format!(
                "printer {printer_id} is idle, nothing to confirm"
            )));
        }
        if printer.status != PrinterStatus::WaitingConfirmation {
            tracing::warn!(
                %printer_id,
                status = %printer.status,
                "confirming printer outside waiting_confirmation"
            );
        }

        let now = self.now();
        let mut patch = PrinterPatch::status(PrinterStatus::Idle);
        if printer.status.is_active() {
            // Time spent printing is never idle time, job or not.
            patch.downtime_accrued_at = Some(Some(now));
        }
        let mut transition = Transition::new(printer_id)
            .expect_status(printer.status)
            .printer(patch);
        let mut job_id = None;
        let mut credited = 0.0;

        if let Some(open) = self.open_job_for(printer_id).await? {
            let (patch, minutes) = closing(&open, now, JobStatus::Completed);
            credited = minutes;
            job_id = Some(open.id);
            transition = transition
                .credit(Credit {
                    print_minutes: minutes,
                    ..Credit::default()
                })
                .update_open_job(open.id, patch);
        } else if let Some(last) = self.last_stopped_job(printer_id).await? {
            if last.status != JobStatus::Cancelled && last.status != JobStatus::Completed {
                let patch = JobPatch {
                    status: Some(JobStatus::Completed),
                    ..JobPatch::default()
                };
                transition = transition.update_job(last.id, patch);
            }
            job_id = Some(last.id);
        }

        self.store
            .apply(transition.event(FleetEvent::new(
                printer_id,
                job_id,
                "printer.confirm",
                Some(json!({ "credited_minutes": credited })),
                now,
            )))
            .await?;

        tracing::info!(%printer_id, job_id = ?job_id, credited, "printer confirmed");
        self.require_printer(printer_id).await
    }

    /// Confirms a single job as completed, closing it first if still open.
    pub async fn confirm_job(&self, job_id: JobId) -> Result<PrintJob> {
        let job = self.require_job(job_id).await?;
        if job.status == JobStatus::Cancelled {
            return Err(FleetError::InvalidState(format!(
                "job {job_id} was cancelled and cannot be confirmed"
            )));
        }
        let printer = self.require_printer(job.printer_id).await?;
        let now = self.now();

        let mut transition = Transition::new(job.printer_id);
        let mut credited = 0.0;
        if job.is_open() {
            let (patch, minutes) = closing(&job, now, JobStatus::Completed);
            credited = minutes;
            transition = transition
                .printer(PrinterPatch::status(PrinterStatus::Idle))
                .credit(Credit {
                    print_minutes: minutes,
                    ..Credit::default()
                })
                .update_open_job(job_id, patch);
        } else {
            let patch = JobPatch {
                status: Some(JobStatus::Completed),
                ..JobPatch::default()
            };
            transition = transition.update_job(job_id, patch);
            // Only release the printer if it is still waiting on this job.
            if printer.status == PrinterStatus::WaitingConfirmation {
                transition = transition
                    .expect_status(PrinterStatus::WaitingConfirmation)
                    .printer(PrinterPatch::status(PrinterStatus::Idle));
            }
        }

        self.store
            .apply(transition.event(FleetEvent::new(
                job.printer_id,
                Some(job_id),
                "job.confirm",
                Some(json!({ "credited_minutes": credited })),
                now,
            )))
            .await?;

        tracing::info!(%job_id, printer_id = %job.printer_id, credited, "print job confirmed");
        self.require_job(job_id).await
    }

    /// Operator keeps printing after an auto-completion. The completed job
    /// stays closed.
    pub async fn resume_printer(&self, printer_id: PrinterId) -> Result<Printer> {
        let printer = self.require_printer(printer_id).await?;
        if printer.status != PrinterStatus::WaitingConfirmation {
            return Err(FleetError::InvalidState(format!(
                "printer {printer_id} is {}, expected waiting_confirmation",
                printer.status
            )));
        }

        let now = self.now();
        self.store
            .apply(
                Transition::new(printer_id)
                    .expect_status(PrinterStatus::WaitingConfirmation)
                    .printer(PrinterPatch::status(PrinterStatus::Printing))
                    .event(FleetEvent::new(printer_id, None, "printer.resume", None, now)),
            )
            .await?;

        tracing::info!(%printer_id, "printer resumed after auto-completion");
        self.require_printer(printer_id).await
    }
}
