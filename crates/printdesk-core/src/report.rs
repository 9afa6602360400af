//! Aggregates over print jobs, per printer and per UTC day.

use chrono::{NaiveDate, TimeZone, Utc};
use serde::Serialize;

use crate::error::{FleetError, Result};
use crate::store::JobQuery;
use crate::timefmt::minutes_to_hhmm;
use crate::types::{JobStatus, PrintJob, PrinterId};
use crate::Fleet;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JobTally {
    pub jobs: u64,
    pub completed: u64,
    pub cancelled: u64,
    pub open: u64,
    /// Net print minutes of closed jobs.
    pub print_minutes: f64,
}

impl JobTally {
    fn add(&mut self, job: &PrintJob) {
        self.jobs += 1;
        match job.status {
            JobStatus::Completed => self.completed += 1,
            JobStatus::Cancelled => self.cancelled += 1,
            _ => {}
        }
        match job.net_print_minutes() {
            Some(minutes) => self.print_minutes += minutes,
            None => self.open += 1,
        }
    }

    fn closed(&self) -> u64 {
        self.jobs - self.open
    }
}

impl<'a> FromIterator<&'a PrintJob> for JobTally {
    fn from_iter<I: IntoIterator<Item = &'a PrintJob>>(iter: I) -> Self {
        let mut tally = JobTally::default();
        for job in iter {
            tally.add(job);
        }
        tally
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrinterReport {
    pub printer_id: PrinterId,
    pub printer_name: String,
    #[serde(flatten)]
    pub tally: JobTally,
    pub total_print_time: f64,
    pub total_downtime: f64,
    pub total_print_time_hhmm: String,
    pub total_downtime_hhmm: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyReport {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub tally: JobTally,
    /// Mean net minutes over closed jobs; 0 when none closed.
    pub average_print_minutes: f64,
    pub print_time_hhmm: String,
}

impl Fleet {
    pub async fn printer_report(&self, printer_id: PrinterId) -> Result<PrinterReport> {
        let printer = self.require_printer(printer_id).await?;
        let jobs = self.store.list_jobs(&JobQuery::for_printer(printer_id)).await?;
        let tally: JobTally = jobs.iter().collect();

        Ok(PrinterReport {
            printer_id,
            printer_name: printer.name,
            tally,
            total_print_time: printer.total_print_time,
            total_downtime: printer.total_downtime,
            total_print_time_hhmm: minutes_to_hhmm(printer.total_print_time),
            total_downtime_hhmm: minutes_to_hhmm(printer.total_downtime),
        })
    }

    /// Jobs whose `start_time` falls on `date` (UTC).
    pub async fn daily_report(&self, date: NaiveDate) -> Result<DailyReport> {
        let from = date
            .and_hms_opt(0, 0, 0)
            .map(|t| Utc.from_utc_datetime(&t))
            .ok_or_else(|| FleetError::Validation(format!("invalid report date {date}")))?;
        let to = date
            .succ_opt()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|t| Utc.from_utc_datetime(&t))
            .ok_or_else(|| FleetError::Validation(format!("invalid report date {date}")))?;

        let query = JobQuery {
            started: Some((from, to)),
            ..JobQuery::default()
        };
        let jobs = self.store.list_jobs(&query).await?;
        let tally: JobTally = jobs.iter().collect();
        let closed = tally.closed();
        let average_print_minutes = if closed == 0 {
            0.0
        } else {
            tally.print_minutes / closed as f64
        };

        tracing::debug!(%date, jobs = tally.jobs, "daily report built");
        Ok(DailyReport {
            date,
            print_time_hhmm: minutes_to_hhmm(tally.print_minutes),
            average_print_minutes,
            tally,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::StartOptions;
    use crate::testing::{Harness, t0};

    #[tokio::test]
    async fn printer_report_counts_by_outcome() {
        let h = Harness::new();
        let p = h.printer("p1").await;
        let m = h.model(60.0).await;

        let a = h.fleet.start_job(p.id, m.id, StartOptions::default()).await.unwrap();
        h.at(30);
        h.fleet.complete_job(a.id, false).await.unwrap();
        let b = h.fleet.start_job(p.id, m.id, StartOptions::default()).await.unwrap();
        h.at(40);
        h.fleet.cancel_job(b.id, None).await.unwrap();
        h.fleet.start_job(p.id, m.id, StartOptions::default()).await.unwrap();

        let report = h.fleet.printer_report(p.id).await.unwrap();
        assert_eq!(report.tally.jobs, 3);
        assert_eq!(report.tally.completed, 1);
        assert_eq!(report.tally.cancelled, 1);
        assert_eq!(report.tally.open, 1);
        assert_eq!(report.tally.print_minutes, 40.0);
        assert_eq!(report.total_print_time, 40.0);
        assert_eq!(report.total_print_time_hhmm, "00:40");
    }

    #[tokio::test]
    async fn printer_report_for_unknown_printer_is_not_found() {
        let h = Harness::new();
        let err = h.fleet.printer_report(PrinterId::new()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn daily_report_only_counts_jobs_started_that_day() {
        let h = Harness::new();
        let p = h.printer("p1").await;
        let m = h.model(60.0).await;

        let a = h.fleet.start_job(p.id, m.id, StartOptions::default()).await.unwrap();
        h.at(20);
        h.fleet.complete_job(a.id, false).await.unwrap();
        let b = h.fleet.start_job(p.id, m.id, StartOptions::default()).await.unwrap();
        h.at(60);
        h.fleet.complete_job(b.id, false).await.unwrap();

        // Two days later.
        h.at(2 * 24 * 60);
        let c = h.fleet.start_job(p.id, m.id, StartOptions::default()).await.unwrap();
        h.at(2 * 24 * 60 + 10);
        h.fleet.cancel_job(c.id, None).await.unwrap();

        let report = h.fleet.daily_report(t0().date_naive()).await.unwrap();
        assert_eq!(report.tally.jobs, 2);
        assert_eq!(report.tally.completed, 2);
        assert_eq!(report.tally.print_minutes, 60.0);
        assert_eq!(report.average_print_minutes, 30.0);
        assert_eq!(report.print_time_hhmm, "01:00");
    }

    #[tokio::test]
    async fn empty_day_has_zero_average() {
        let h = Harness::new();
        let report = h
            .fleet
            .daily_report(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap())
            .await
            .unwrap();
        assert_eq!(report.tally, JobTally::default());
        assert_eq!(report.average_print_minutes, 0.0);
    }
}
