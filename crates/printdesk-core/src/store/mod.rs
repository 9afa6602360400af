//! Persistence port used by [`crate::Fleet`].
//!
//! Plain CRUD goes through the per-record methods. Every state-machine write
//! goes through [`FleetStore::apply`], which must commit the whole
//! [`Transition`] or nothing.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::patch::{JobPatch, PrinterPatch};
use crate::types::{
    FleetEvent, JobId, Model, ModelId, ParameterId, PrintJob, Printer, PrinterId,
    PrinterParameter, PrinterStatus, StudioId,
};

pub mod memory;

pub use memory::MemoryStore;

#[async_trait]
pub trait FleetStore: Send + Sync {
    /// Inserts a new printer. Names are not unique.
    async fn create_printer(&self, printer: Printer) -> Result<Printer>;
    async fn get_printer(&self, id: PrinterId) -> Result<Option<Printer>>;
    async fn update_printer(&self, id: PrinterId, patch: PrinterPatch) -> Result<Option<Printer>>;
    /// Removes the printer and its parameters.
    async fn delete_printer(&self, id: PrinterId) -> Result<Option<Printer>>;
    async fn list_printers(&self, query: &PrinterQuery) -> Result<Vec<Printer>>;

    async fn add_parameter(&self, parameter: PrinterParameter) -> Result<PrinterParameter>;
    /// Oldest first.
    async fn list_parameters(&self, printer_id: PrinterId) -> Result<Vec<PrinterParameter>>;
    /// `None` when no parameter `id` belongs to `printer_id`.
    async fn delete_parameter(
        &self,
        printer_id: PrinterId,
        id: ParameterId,
    ) -> Result<Option<PrinterParameter>>;

    async fn create_model(&self, model: Model) -> Result<Model>;
    async fn get_model(&self, id: ModelId) -> Result<Option<Model>>;

    async fn get_job(&self, id: JobId) -> Result<Option<PrintJob>>;
    async fn update_job(&self, id: JobId, patch: JobPatch) -> Result<Option<PrintJob>>;
    async fn delete_job(&self, id: JobId) -> Result<Option<PrintJob>>;
    async fn list_jobs(&self, query: &JobQuery) -> Result<Vec<PrintJob>>;

    /// Atomically applies a state transition.
    ///
    /// Checked in this order; the first failing check aborts and nothing is
    /// stored:
    /// - the printer exists (`NotFound`),
    /// - `expect_printer_status` matches when set (`InvalidState`),
    /// - for an insert, the printer has no open job (`InvalidState`),
    /// - for an update, the job exists (`NotFound`) and, with `require_open`,
    ///   is still open (`AlreadyClosed`).
    async fn apply(&self, transition: Transition) -> Result<()>;

    async fn list_events(&self, printer_id: PrinterId) -> Result<Vec<FleetEvent>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrinterSort {
    Name,
    HardwareModel,
    Status,
    TotalPrintTime,
    TotalDowntime,
    CreatedAt,
}

impl FromStr for PrinterSort {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "name" => Ok(PrinterSort::Name),
            "hardware_model" | "model" => Ok(PrinterSort::HardwareModel),
            "status" => Ok(PrinterSort::Status),
            "total_print_time" => Ok(PrinterSort::TotalPrintTime),
            "total_downtime" => Ok(PrinterSort::TotalDowntime),
            "created_at" => Ok(PrinterSort::CreatedAt),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrinterQuery {
    pub studio_id: Option<StudioId>,
    pub sort: Option<PrinterSort>,
    pub descending: bool,
    pub skip: u64,
    pub limit: Option<u64>,
}

impl PrinterQuery {
    /// Sorts by a column name; unknown names leave the query unsorted.
    pub fn sorted_by(mut self, column: &str, descending: bool) -> Self {
        self.sort = column.parse().ok();
        self.descending = descending;
        self
    }

    pub fn page(mut self, skip: u64, limit: u64) -> Self {
        self.skip = skip;
        self.limit = Some(limit);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobSort {
    StartTime,
    RealTimeStop,
    CalculatedTimeStop,
    Status,
    PrintingTime,
    Downtime,
}

impl FromStr for JobSort {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "start_time" => Ok(JobSort::StartTime),
            "real_time_stop" => Ok(JobSort::RealTimeStop),
            "calculated_time_stop" => Ok(JobSort::CalculatedTimeStop),
            "status" => Ok(JobSort::Status),
            "printing_time" => Ok(JobSort::PrintingTime),
            "downtime" => Ok(JobSort::Downtime),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    #[default]
    Any,
    /// No `real_time_stop`.
    Open,
    /// Has a `real_time_stop`.
    Stopped,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobQuery {
    pub printer_id: Option<PrinterId>,
    pub studio_id: Option<StudioId>,
    pub state: JobState,
    /// Half-open `[from, to)` range on `start_time`.
    pub started: Option<(DateTime<Utc>, DateTime<Utc>)>,
    pub sort: Option<JobSort>,
    pub descending: bool,
    pub skip: u64,
    pub limit: Option<u64>,
}

impl JobQuery {
    pub fn for_printer(printer_id: PrinterId) -> Self {
        Self {
            printer_id: Some(printer_id),
            ..Self::default()
        }
    }

    pub fn open() -> Self {
        Self {
            state: JobState::Open,
            ..Self::default()
        }
    }

    /// The most recently stopped job of a printer.
    pub fn last_stopped(printer_id: PrinterId) -> Self {
        Self {
            printer_id: Some(printer_id),
            state: JobState::Stopped,
            sort: Some(JobSort::RealTimeStop),
            descending: true,
            limit: Some(1),
            ..Self::default()
        }
    }

    pub fn sorted_by(mut self, column: &str, descending: bool) -> Self {
        self.sort = column.parse().ok();
        self.descending = descending;
        self
    }

    pub fn page(mut self, skip: u64, limit: u64) -> Self {
        self.skip = skip;
        self.limit = Some(limit);
        self
    }
}

/// Increments added to the printer's counters, in minutes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Credit {
    pub print_minutes: f64,
    pub downtime_minutes: f64,
}

impl Credit {
    pub fn is_zero(&self) -> bool {
        self.print_minutes == 0.0 && self.downtime_minutes == 0.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobWrite {
    Insert(PrintJob),
    Update {
        id: JobId,
        patch: JobPatch,
        require_open: bool,
    },
}

/// One atomic unit of state-machine work against a single printer.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub printer_id: PrinterId,
    pub expect_printer_status: Option<PrinterStatus>,
    pub printer: PrinterPatch,
    pub credit: Credit,
    pub job: Option<JobWrite>,
    pub event: Option<FleetEvent>,
}

impl Transition {
    pub fn new(printer_id: PrinterId) -> Self {
        Self {
            printer_id,
            expect_printer_status: None,
            printer: PrinterPatch::default(),
            credit: Credit::default(),
            job: None,
            event: None,
        }
    }

    pub fn expect_status(mut self, status: PrinterStatus) -> Self {
        self.expect_printer_status = Some(status);
        self
    }

    pub fn printer(mut self, patch: PrinterPatch) -> Self {
        self.printer = patch;
        self
    }

    pub fn credit(mut self, credit: Credit) -> Self {
        self.credit = credit;
        self
    }

    pub fn insert_job(mut self, job: PrintJob) -> Self {
        self.job = Some(JobWrite::Insert(job));
        self
    }

    /// Updates a job that must still be open when the write happens.
    pub fn update_open_job(mut self, id: JobId, patch: JobPatch) -> Self {
        self.job = Some(JobWrite::Update {
            id,
            patch,
            require_open: true,
        });
        self
    }

    pub fn update_job(mut self, id: JobId, patch: JobPatch) -> Self {
        self.job = Some(JobWrite::Update {
            id,
            patch,
            require_open: false,
        });
        self
    }

    pub fn event(mut self, event: FleetEvent) -> Self {
        self.event = Some(event);
        self
    }
}
