//! Idle downtime accrual for printers that are not printing.

use chrono::{DateTime, Utc};

use crate::error::{FleetError, Result};
use crate::patch::PrinterPatch;
use crate::store::{Credit, Transition};
use crate::timefmt::minutes_between;
use crate::types::{Printer, PrinterId};
use crate::Fleet;

/// Start of the idle interval not yet counted into `total_downtime`.
///
/// The later of the last job stop (or printer creation) and the previous
/// accrual.
pub fn idle_baseline(printer: &Printer, last_stop: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let since = last_stop.unwrap_or(printer.created_at);
    match printer.downtime_accrued_at {
        Some(accrued) if accrued > since => accrued,
        _ => since,
    }
}

impl Fleet {
    /// Adds the idle time since the baseline to the printer's downtime and
    /// returns the new total. Unknown printers report 0 and active printers
    /// report the stored total unchanged.
    pub async fn accrue_downtime(&self, printer_id: PrinterId) -> Result<f64> {
        let Some(printer) = self.store.get_printer(printer_id).await? else {
            return Ok(0.0);
        };
        if printer.status.is_active() {
            return Ok(printer.total_downtime);
        }

        let last_stop = self
            .last_stopped_job(printer_id)
            .await?
            .and_then(|job| job.real_time_stop);
        let now = self.now();
        let minutes = minutes_between(idle_baseline(&printer, last_stop), now).max(0.0);

        let transition = Transition::new(printer_id)
            .expect_status(printer.status)
            .printer(PrinterPatch {
                downtime_accrued_at: Some(Some(now)),
                ..PrinterPatch::default()
            })
            .credit(Credit {
                downtime_minutes: minutes,
                ..Credit::default()
            });

        match self.store.apply(transition).await {
            Ok(()) => {}
            Err(FleetError::InvalidState(_)) => {
                tracing::debug!(%printer_id, "printer changed status during accrual, skipping");
                return Ok(self
                    .store
                    .get_printer(printer_id)
                    .await?
                    .map(|p| p.total_downtime)
                    .unwrap_or(printer.total_downtime));
            }
            Err(err) => return Err(err),
        }

        let total = printer.total_downtime + minutes;
        tracing::debug!(%printer_id, minutes, total, "downtime accrued");
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::machine::StartOptions;
    use crate::patch::JobPatch;
    use crate::store::{FleetStore, JobQuery, MemoryStore, PrinterQuery};
    use crate::testing::{Harness, at};
    use crate::types::{
        FleetEvent, JobId, Model, ModelId, NewPrinter, ParameterId, PrintJob, PrinterParameter,
        PrinterStatus,
    };
    use crate::ManualClock;

    #[tokio::test]
    async fn fresh_printer_accrues_from_creation() {
        let h = Harness::new();
        let p = h.printer("p1").await;

        h.at(45);
        assert_eq!(h.fleet.accrue_downtime(p.id).await.unwrap(), 45.0);
        let stored = h.printer_now(p.id).await;
        assert_eq!(stored.total_downtime, 45.0);
        assert_eq!(stored.downtime_accrued_at, Some(at(45)));
    }

    #[tokio::test]
    async fn repeated_accruals_never_double_count() {
        let h = Harness::new();
        let p = h.printer("p1").await;

        let mut previous = 0.0;
        for minute in [10, 10, 25, 60, 61] {
            h.at(minute);
            let total = h.fleet.accrue_downtime(p.id).await.unwrap();
            assert!(total >= previous);
            previous = total;
        }
        assert_eq!(previous, 61.0);
        assert_eq!(h.printer_now(p.id).await.total_downtime, 61.0);
    }

    #[tokio::test]
    async fn interval_starts_at_last_job_stop() {
        let h = Harness::new();
        let p = h.printer("p1").await;
        let m = h.model(30.0).await;

        h.at(100);
        let job = h.fleet.start_job(p.id, m.id, StartOptions::default()).await.unwrap();
        assert_eq!(h.fleet.accrue_downtime(p.id).await.unwrap(), 0.0);

        h.at(130);
        h.fleet.complete_job(job.id, false).await.unwrap();
        h.at(150);
        assert_eq!(h.fleet.accrue_downtime(p.id).await.unwrap(), 20.0);
    }

    #[tokio::test]
    async fn active_printers_report_stored_total() {
        let h = Harness::new();
        let p = h.printer("p1").await;
        let m = h.model(30.0).await;

        h.at(5);
        h.fleet.accrue_downtime(p.id).await.unwrap();
        h.fleet.start_job(p.id, m.id, StartOptions::default()).await.unwrap();
        h.at(20);
        assert_eq!(h.fleet.accrue_downtime(p.id).await.unwrap(), 5.0);
        assert_eq!(h.printer_now(p.id).await.status, PrinterStatus::Printing);
    }

    #[tokio::test]
    async fn unknown_printer_reports_zero() {
        let h = Harness::new();
        assert_eq!(h.fleet.accrue_downtime(PrinterId::new()).await.unwrap(), 0.0);
    }

    /// Store whose printer leaves its status between the accrual's read and
    /// its write.
    struct StatusFlipStore {
        inner: MemoryStore,
        flip_to: PrinterStatus,
    }

    #[async_trait]
    impl FleetStore for StatusFlipStore {
        async fn create_printer(&self, printer: Printer) -> Result<Printer> {
            self.inner.create_printer(printer).await
        }
        async fn get_printer(&self, id: PrinterId) -> Result<Option<Printer>> {
            self.inner.get_printer(id).await
        }
        async fn update_printer(
            &self,
            id: PrinterId,
            patch: PrinterPatch,
        ) -> Result<Option<Printer>> {
            self.inner.update_printer(id, patch).await
        }
        async fn delete_printer(&self, id: PrinterId) -> Result<Option<Printer>> {
            self.inner.delete_printer(id).await
        }
        async fn list_printers(&self, query: &PrinterQuery) -> Result<Vec<Printer>> {
            self.inner.list_printers(query).await
        }
        async fn add_parameter(&self, parameter: PrinterParameter) -> Result<PrinterParameter> {
            self.inner.add_parameter(parameter).await
        }
        async fn list_parameters(&self, printer_id: PrinterId) -> Result<Vec<PrinterParameter>> {
            self.inner.list_parameters(printer_id).await
        }
        async fn delete_parameter(
            &self,
            printer_id: PrinterId,
            id: ParameterId,
        ) -> Result<Option<PrinterParameter>> {
            self.inner.delete_parameter(printer_id, id).await
        }
        async fn create_model(&self, model: Model) -> Result<Model> {
            self.inner.create_model(model).await
        }
        async fn get_model(&self, id: ModelId) -> Result<Option<Model>> {
            self.inner.get_model(id).await
        }
        async fn get_job(&self, id: JobId) -> Result<Option<PrintJob>> {
            self.inner.get_job(id).await
        }
        async fn update_job(&self, id: JobId, patch: JobPatch) -> Result<Option<PrintJob>> {
            self.inner.update_job(id, patch).await
        }
        async fn delete_job(&self, id: JobId) -> Result<Option<PrintJob>> {
            self.inner.delete_job(id).await
        }
        async fn list_jobs(&self, query: &JobQuery) -> Result<Vec<PrintJob>> {
            self.inner.list_jobs(query).await
        }
        async fn apply(&self, transition: Transition) -> Result<()> {
            self.inner
                .update_printer(transition.printer_id, PrinterPatch::status(self.flip_to))
                .await?;
            self.inner.apply(transition).await
        }
        async fn list_events(&self, printer_id: PrinterId) -> Result<Vec<FleetEvent>> {
            self.inner.list_events(printer_id).await
        }
    }

    #[tokio::test]
    async fn accrual_is_skipped_when_status_changes_underneath() {
        let store = Arc::new(StatusFlipStore {
            inner: MemoryStore::new(),
            flip_to: PrinterStatus::Printing,
        });
        let clock = Arc::new(ManualClock::new(at(0)));
        let fleet = Fleet::new(store.clone(), clock.clone());
        let p = fleet
            .create_printer(NewPrinter {
                name: "p1".into(),
                hardware_model: None,
                studio_id: None,
            })
            .await
            .unwrap();

        clock.set(at(40));
        assert_eq!(fleet.accrue_downtime(p.id).await.unwrap(), 0.0);

        let stored = store.get_printer(p.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PrinterStatus::Printing);
        assert_eq!(stored.total_downtime, 0.0);
        assert_eq!(stored.downtime_accrued_at, None);
    }

    #[test]
    fn baseline_prefers_latest_marker() {
        let printer = Printer {
            id: PrinterId::new(),
            name: "p".into(),
            hardware_model: None,
            studio_id: None,
            status: PrinterStatus::Idle,
            total_print_time: 0.0,
            total_downtime: 0.0,
            created_at: at(0),
            downtime_accrued_at: Some(at(50)),
        };
        assert_eq!(idle_baseline(&printer, None), at(50));
        assert_eq!(idle_baseline(&printer, Some(at(70))), at(70));
        assert_eq!(idle_baseline(&printer, Some(at(20))), at(50));
    }
}
