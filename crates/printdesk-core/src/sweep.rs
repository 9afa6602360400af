//! Periodic pass over the fleet: auto-complete jobs that ran their expected
//! duration and accrue downtime for printers that are not printing.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::store::{JobQuery, PrinterQuery};
use crate::Fleet;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepReport {
    pub started_at: DateTime<Utc>,
    pub jobs_checked: u64,
    pub jobs_completed: u64,
    pub printers_checked: u64,
    pub printers_accrued: u64,
    /// Records that failed and were skipped.
    pub failures: u64,
}

impl SweepReport {
    fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            jobs_checked: 0,
            jobs_completed: 0,
            printers_checked: 0,
            printers_accrued: 0,
            failures: 0,
        }
    }
}

impl Fleet {
    /// One sweep. Listing failures abort the tick; per-record failures are
    /// logged, counted and skipped.
    pub async fn tick(&self) -> Result<SweepReport> {
        let mut report = SweepReport::new(self.now());
        self.sweep_auto_complete(&mut report).await?;
        self.sweep_downtime(&mut report).await?;

        if report.jobs_completed > 0 || report.failures > 0 {
            tracing::info!(
                jobs_completed = report.jobs_completed,
                printers_accrued = report.printers_accrued,
                failures = report.failures,
                "fleet sweep finished"
            );
        }
        Ok(report)
    }

    /// Downtime accrual only, without auto-completion.
    pub async fn tick_downtime_sweep(&self) -> Result<SweepReport> {
        let mut report = SweepReport::new(self.now());
        self.sweep_downtime(&mut report).await?;
        Ok(report)
    }

    async fn sweep_auto_complete(&self, report: &mut SweepReport) -> Result<()> {
        for job in self.store.list_jobs(&JobQuery::open()).await? {
            report.jobs_checked += 1;
            match self.maybe_auto_complete(&job).await {
                Ok(Some(_)) => report.jobs_completed += 1,
                Ok(None) => {}
                Err(err) => {
                    report.failures += 1;
                    tracing::warn!(%err, job_id = %job.id, "auto-completion failed");
                }
            }
        }
        Ok(())
    }

    async fn sweep_downtime(&self, report: &mut SweepReport) -> Result<()> {
        for printer in self.store.list_printers(&PrinterQuery::default()).await? {
            report.printers_checked += 1;
            if printer.status.is_active() {
                continue;
            }
            match self.accrue_downtime(printer.id).await {
                Ok(_) => report.printers_accrued += 1,
                Err(err) => {
                    report.failures += 1;
                    tracing::warn!(%err, printer_id = %printer.id, "downtime accrual failed");
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::StartOptions;
    use crate::testing::{Harness, at};
    use crate::types::{JobStatus, PrinterStatus};

    #[tokio::test]
    async fn tick_completes_due_jobs_and_accrues_idle_printers() {
        let h = Harness::new();
        let busy = h.printer("busy").await;
        let idle = h.printer("idle").await;
        let m = h.model(30.0).await;
        let job = h.fleet.start_job(busy.id, m.id, StartOptions::default()).await.unwrap();

        h.at(10);
        let report = h.fleet.tick().await.unwrap();
        assert_eq!(report.started_at, at(10));
        assert_eq!(report.jobs_checked, 1);
        assert_eq!(report.jobs_completed, 0);
        assert_eq!(report.printers_checked, 2);
        assert_eq!(report.printers_accrued, 1);
        assert_eq!(h.printer_now(idle.id).await.total_downtime, 10.0);

        h.at(31);
        let report = h.fleet.tick().await.unwrap();
        assert_eq!(report.jobs_completed, 1);
        assert_eq!(report.failures, 0);
        assert_eq!(h.job_now(job.id).await.status, JobStatus::Completed);

        let busy = h.printer_now(busy.id).await;
        assert_eq!(busy.status, PrinterStatus::WaitingConfirmation);
        assert_eq!(busy.total_print_time, 31.0);
        assert_eq!(h.printer_now(idle.id).await.total_downtime, 31.0);
    }

    #[tokio::test]
    async fn downtime_sweep_leaves_due_jobs_alone() {
        let h = Harness::new();
        let busy = h.printer("busy").await;
        let idle = h.printer("idle").await;
        let m = h.model(5.0).await;
        let job = h.fleet.start_job(busy.id, m.id, StartOptions::default()).await.unwrap();

        h.at(20);
        let report = h.fleet.tick_downtime_sweep().await.unwrap();
        assert_eq!(report.jobs_checked, 0);
        assert_eq!(report.printers_accrued, 1);
        assert!(h.job_now(job.id).await.is_open());
        assert_eq!(h.printer_now(idle.id).await.total_downtime, 20.0);
    }

    #[tokio::test]
    async fn repeated_ticks_are_idempotent_for_completed_jobs() {
        let h = Harness::new();
        let p = h.printer("p1").await;
        let m = h.model(5.0).await;
        h.fleet.start_job(p.id, m.id, StartOptions::default()).await.unwrap();

        h.at(6);
        h.fleet.tick().await.unwrap();
        let report = h.fleet.tick().await.unwrap();
        assert_eq!(report.jobs_checked, 0);
        assert_eq!(report.jobs_completed, 0);
        assert_eq!(h.printer_now(p.id).await.total_print_time, 6.0);
    }
}
