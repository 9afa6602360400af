//! Read models that join a job with its printer and model and attach derived
//! values (progress, formatted durations).

use serde::Serialize;

use crate::error::Result;
use crate::progress::compute_progress;
use crate::store::JobQuery;
use crate::timefmt::minutes_to_hhmm;
use crate::types::{JobId, PrintJob, Printer, PrinterId};
use crate::Fleet;

pub const UNKNOWN_PRINTER: &str = "Unknown Printer";
pub const UNKNOWN_MODEL: &str = "Unknown Model";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobDetail {
    #[serde(flatten)]
    pub job: PrintJob,
    pub progress: f64,
    pub printer_name: String,
    pub model_name: String,
    /// Expected duration as `HH:MM`.
    pub printing_time_hhmm: String,
    /// Pause time as `HH:MM`, including a pause still in progress.
    pub downtime_hhmm: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrinterDetail {
    #[serde(flatten)]
    pub printer: Printer,
    pub open_job_id: Option<JobId>,
    pub total_print_time_hhmm: String,
    pub total_downtime_hhmm: String,
}

impl Fleet {
    /// Reads a job with its display fields. A printing job that has reached
    /// its expected duration is auto-completed first.
    pub async fn job_detail(&self, job_id: JobId) -> Result<JobDetail> {
        let job = self.require_job(job_id).await?;
        self.enrich(job).await
    }

    /// Details for a page of jobs. A record that cannot be enriched is still
    /// listed, with zero progress and placeholder names.
    pub async fn list_job_details(&self, query: &JobQuery) -> Result<Vec<JobDetail>> {
        let jobs = self.store.list_jobs(query).await?;
        let mut details = Vec::with_capacity(jobs.len());
        for job in jobs {
            match self.enrich(job.clone()).await {
                Ok(detail) => details.push(detail),
                Err(err) => {
                    tracing::warn!(%err, job_id = %job.id, "failed to enrich print job");
                    details.push(JobDetail {
                        printing_time_hhmm: minutes_to_hhmm(job.printing_time),
                        downtime_hhmm: minutes_to_hhmm(job.downtime),
                        job,
                        progress: 0.0,
                        printer_name: UNKNOWN_PRINTER.to_string(),
                        model_name: UNKNOWN_MODEL.to_string(),
                    });
                }
            }
        }
        Ok(details)
    }

    pub async fn printer_detail(&self, printer_id: PrinterId) -> Result<PrinterDetail> {
        let printer = self.require_printer(printer_id).await?;
        let open_job_id = self.open_job_for(printer_id).await?.map(|job| job.id);
        Ok(PrinterDetail {
            total_print_time_hhmm: minutes_to_hhmm(printer.total_print_time),
            total_downtime_hhmm: minutes_to_hhmm(printer.total_downtime),
            printer,
            open_job_id,
        })
    }

    async fn enrich(&self, job: PrintJob) -> Result<JobDetail> {
        let job = match self.maybe_auto_complete(&job).await? {
            Some(done) => done,
            None => job,
        };

        let printer_name = self
            .store
            .get_printer(job.printer_id)
            .await?
            .map(|p| p.name)
            .unwrap_or_else(|| UNKNOWN_PRINTER.to_string());
        let model_name = self
            .store
            .get_model(job.model_id)
            .await?
            .map(|m| m.name)
            .unwrap_or_else(|| UNKNOWN_MODEL.to_string());

        let now = self.now();
        Ok(JobDetail {
            progress: compute_progress(&job, now),
            printing_time_hhmm: minutes_to_hhmm(job.printing_time),
            downtime_hhmm: minutes_to_hhmm(job.downtime_at(now)),
            printer_name,
            model_name,
            job,
        })
    }
}
