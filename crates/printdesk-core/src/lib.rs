//! Printer fleet state: print-job lifecycle, printer status, and time
//! accounting (print time, pause time, idle downtime).
//!
//! [`Fleet`] is the entry point. It owns a [`FleetStore`] and a [`Clock`] and
//! exposes the job state machine, the downtime calculator, the progress
//! engine and the periodic sweep.

use std::sync::Arc;

use chrono::{DateTime, Utc};

pub mod clock;
pub mod detail;
pub mod downtime;
pub mod error;
pub mod machine;
pub mod params;
pub mod patch;
pub mod progress;
pub mod report;
pub mod store;
pub mod sweep;
pub mod timefmt;
pub mod types;

#[cfg(test)]
mod testing;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{FleetError, Result};
pub use patch::{JobPatch, PrinterPatch};
pub use store::{FleetStore, JobQuery, MemoryStore, PrinterQuery};
pub use types::{
    FleetEvent, JobId, JobStatus, Model, ModelId, NewModel, NewParameter, NewPrinter, ParameterId,
    PrintJob, Printer, PrinterId, PrinterParameter, PrinterStatus, StudioId,
};

#[derive(Clone)]
pub struct Fleet {
    store: Arc<dyn FleetStore>,
    clock: Arc<dyn Clock>,
}

impl Fleet {
    pub fn new(store: Arc<dyn FleetStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn with_system_clock(store: Arc<dyn FleetStore>) -> Self {
        Self::new(store, Arc::new(SystemClock))
    }

    pub fn store(&self) -> &dyn FleetStore {
        &*self.store
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub async fn create_printer(&self, new: NewPrinter) -> Result<Printer> {
        if new.name.trim().is_empty() {
            return Err(FleetError::Validation("printer name must not be empty".into()));
        }
        let printer = Printer {
            id: PrinterId::new(),
            name: new.name,
            hardware_model: new.hardware_model,
            studio_id: new.studio_id,
            status: PrinterStatus::Idle,
            total_print_time: 0.0,
            total_downtime: 0.0,
            created_at: self.now(),
            downtime_accrued_at: None,
        };
        let printer = self.store.create_printer(printer).await?;
        tracing::info!(printer_id = %printer.id, name = %printer.name, "printer created");
        Ok(printer)
    }

    pub async fn create_model(&self, new: NewModel) -> Result<Model> {
        machine::expected_stop(self.now(), new.printing_time)?;
        self.store
            .create_model(Model {
                id: ModelId::new(),
                name: new.name,
                printing_time: new.printing_time,
                studio_id: new.studio_id,
            })
            .await
    }

    pub(crate) async fn require_printer(&self, id: PrinterId) -> Result<Printer> {
        self.store
            .get_printer(id)
            .await?
            .ok_or_else(|| FleetError::not_found("printer", id))
    }

    pub(crate) async fn require_job(&self, id: JobId) -> Result<PrintJob> {
        self.store
            .get_job(id)
            .await?
            .ok_or_else(|| FleetError::not_found("job", id))
    }

    pub(crate) async fn require_open_job(&self, id: JobId) -> Result<PrintJob> {
        let job = self.require_job(id).await?;
        if !job.is_open() {
            return Err(FleetError::AlreadyClosed { id });
        }
        Ok(job)
    }

    pub(crate) async fn open_job_for(&self, printer_id: PrinterId) -> Result<Option<PrintJob>> {
        let mut query = JobQuery::for_printer(printer_id);
        query.state = store::JobState::Open;
        query.limit = Some(1);
        Ok(self.store.list_jobs(&query).await?.into_iter().next())
    }

    pub(crate) async fn last_stopped_job(&self, printer_id: PrinterId) -> Result<Option<PrintJob>> {
        Ok(self
            .store
            .list_jobs(&JobQuery::last_stopped(printer_id))
            .await?
            .into_iter()
            .next())
    }
}
