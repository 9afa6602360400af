use std::cmp::Ordering;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{
    FleetStore, JobQuery, JobSort, JobState, JobWrite, PrinterQuery, PrinterSort, Transition,
};
use crate::error::{FleetError, Result};
use crate::patch::{JobPatch, PrinterPatch};
use crate::types::{
    FleetEvent, JobId, Model, ModelId, ParameterId, PrintJob, Printer, PrinterId, PrinterParameter,
};

#[derive(Debug, Default)]
struct Tables {
    printers: Vec<Printer>,
    parameters: Vec<PrinterParameter>,
    models: Vec<Model>,
    jobs: Vec<PrintJob>,
    events: Vec<FleetEvent>,
}

/// In-process store. Rows keep insertion order; one lock covers every table
/// so `apply` is trivially atomic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn page<T>(rows: Vec<T>, skip: u64, limit: Option<u64>) -> Vec<T> {
    let take = limit.map(|l| l as usize).unwrap_or(usize::MAX);
    rows.into_iter().skip(skip as usize).take(take).collect()
}

fn cmp_printers(a: &Printer, b: &Printer, sort: PrinterSort) -> Ordering {
    match sort {
        PrinterSort::Name => a.name.cmp(&b.name),
        PrinterSort::HardwareModel => a.hardware_model.cmp(&b.hardware_model),
        PrinterSort::Status => a.status.as_str().cmp(b.status.as_str()),
        PrinterSort::TotalPrintTime => a.total_print_time.total_cmp(&b.total_print_time),
        PrinterSort::TotalDowntime => a.total_downtime.total_cmp(&b.total_downtime),
        PrinterSort::CreatedAt => a.created_at.cmp(&b.created_at),
    }
}

fn cmp_jobs(a: &PrintJob, b: &PrintJob, sort: JobSort) -> Ordering {
    match sort {
        JobSort::StartTime => a.start_time.cmp(&b.start_time),
        JobSort::RealTimeStop => a.real_time_stop.cmp(&b.real_time_stop),
        JobSort::CalculatedTimeStop => a.calculated_time_stop.cmp(&b.calculated_time_stop),
        JobSort::Status => a.status.as_str().cmp(b.status.as_str()),
        JobSort::PrintingTime => a.printing_time.total_cmp(&b.printing_time),
        JobSort::Downtime => a.downtime.total_cmp(&b.downtime),
    }
}

fn job_matches(job: &PrintJob, query: &JobQuery) -> bool {
    if query.printer_id.is_some_and(|id| job.printer_id != id) {
        return false;
    }
    if query.studio_id.is_some_and(|id| job.studio_id != Some(id)) {
        return false;
    }
    match query.state {
        JobState::Any => {}
        JobState::Open if !job.is_open() => return false,
        JobState::Stopped if job.is_open() => return false,
        _ => {}
    }
    if let Some((from, to)) = query.started {
        if job.start_time < from || job.start_time >= to {
            return false;
        }
    }
    true
}

#[async_trait]
impl FleetStore for MemoryStore {
    async fn create_printer(&self, printer: Printer) -> Result<Printer> {
        self.lock().printers.push(printer.clone());
        Ok(printer)
    }

    async fn get_printer(&self, id: PrinterId) -> Result<Option<Printer>> {
        Ok(self.lock().printers.iter().find(|p| p.id == id).cloned())
    }

    async fn update_printer(&self, id: PrinterId, patch: PrinterPatch) -> Result<Option<Printer>> {
        patch.validate()?;
        let mut tables = self.lock();
        let Some(printer) = tables.printers.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };
        patch.apply_to(printer);
        Ok(Some(printer.clone()))
    }

    async fn delete_printer(&self, id: PrinterId) -> Result<Option<Printer>> {
        let mut tables = self.lock();
        let Some(pos) = tables.printers.iter().position(|p| p.id == id) else {
            return Ok(None);
        };
        tables.parameters.retain(|param| param.printer_id != id);
        Ok(Some(tables.printers.remove(pos)))
    }

    async fn list_printers(&self, query: &PrinterQuery) -> Result<Vec<Printer>> {
        let mut rows: Vec<Printer> = self
            .lock()
            .printers
            .iter()
            .filter(|p| query.studio_id.is_none() || p.studio_id == query.studio_id)
            .cloned()
            .collect();
        if let Some(sort) = query.sort {
            rows.sort_by(|a, b| {
                let ord = cmp_printers(a, b, sort);
                if query.descending { ord.reverse() } else { ord }
            });
        }
        Ok(page(rows, query.skip, query.limit))
    }

    async fn add_parameter(&self, parameter: PrinterParameter) -> Result<PrinterParameter> {
        self.lock().parameters.push(parameter.clone());
        Ok(parameter)
    }

    async fn list_parameters(&self, printer_id: PrinterId) -> Result<Vec<PrinterParameter>> {
        Ok(self
            .lock()
            .parameters
            .iter()
            .filter(|param| param.printer_id == printer_id)
            .cloned()
            .collect())
    }

    async fn delete_parameter(
        &self,
        printer_id: PrinterId,
        id: ParameterId,
    ) -> Result<Option<PrinterParameter>> {
        let mut tables = self.lock();
        let Some(pos) = tables
            .parameters
            .iter()
            .position(|param| param.id == id && param.printer_id == printer_id)
        else {
            return Ok(None);
        };
        Ok(Some(tables.parameters.remove(pos)))
    }

    async fn create_model(&self, model: Model) -> Result<Model> {
        self.lock().models.push(model.clone());
        Ok(model)
    }

    async fn get_model(&self, id: ModelId) -> Result<Option<Model>> {
        Ok(self.lock().models.iter().find(|m| m.id == id).cloned())
    }

    async fn get_job(&self, id: JobId) -> Result<Option<PrintJob>> {
        Ok(self.lock().jobs.iter().find(|j| j.id == id).cloned())
    }

    async fn update_job(&self, id: JobId, patch: JobPatch) -> Result<Option<PrintJob>> {
        let mut tables = self.lock();
        let Some(job) = tables.jobs.iter_mut().find(|j| j.id == id) else {
            return Ok(None);
        };
        *job = patch.patched(job)?;
        Ok(Some(job.clone()))
    }

    async fn delete_job(&self, id: JobId) -> Result<Option<PrintJob>> {
        let mut tables = self.lock();
        let Some(pos) = tables.jobs.iter().position(|j| j.id == id) else {
            return Ok(None);
        };
        Ok(Some(tables.jobs.remove(pos)))
    }

    async fn list_jobs(&self, query: &JobQuery) -> Result<Vec<PrintJob>> {
        let mut rows: Vec<PrintJob> = self
            .lock()
            .jobs
            .iter()
            .filter(|j| job_matches(j, query))
            .cloned()
            .collect();
        if let Some(sort) = query.sort {
            rows.sort_by(|a, b| {
                let ord = cmp_jobs(a, b, sort);
                if query.descending { ord.reverse() } else { ord }
            });
        }
        Ok(page(rows, query.skip, query.limit))
    }

    async fn apply(&self, transition: Transition) -> Result<()> {
        transition.printer.validate()?;
        let mut tables = self.lock();

        let printer_idx = tables
            .printers
            .iter()
            .position(|p| p.id == transition.printer_id)
            .ok_or_else(|| FleetError::not_found("printer", transition.printer_id))?;

        if let Some(expected) = transition.expect_printer_status {
            let actual = tables.printers[printer_idx].status;
            if actual != expected {
                return Err(FleetError::InvalidState(format!(
                    "printer {} is {actual}, expected {expected}",
                    transition.printer_id
                )));
            }
        }

        // Resolve the job write fully before touching any table.
        let job_write = match transition.job {
            Some(JobWrite::Insert(job)) => {
                let has_open = job.is_open()
                    && tables
                        .jobs
                        .iter()
                        .any(|j| j.printer_id == job.printer_id && j.is_open());
                if has_open {
                    return Err(FleetError::InvalidState(format!(
                        "printer {} already has an open job",
                        job.printer_id
                    )));
                }
                Some((None, job))
            }
            Some(JobWrite::Update {
                id,
                patch,
                require_open,
            }) => {
                let idx = tables
                    .jobs
                    .iter()
                    .position(|j| j.id == id)
                    .ok_or_else(|| FleetError::not_found("job", id))?;
                let current = &tables.jobs[idx];
                if require_open && !current.is_open() {
                    return Err(FleetError::AlreadyClosed { id });
                }
                Some((Some(idx), patch.patched(current)?))
            }
            None => None,
        };

        let printer = &mut tables.printers[printer_idx];
        transition.printer.apply_to(printer);
        printer.total_print_time += transition.credit.print_minutes;
        printer.total_downtime += transition.credit.downtime_minutes;

        match job_write {
            Some((Some(idx), job)) => tables.jobs[idx] = job,
            Some((None, job)) => tables.jobs.push(job),
            None => {}
        }
        if let Some(event) = transition.event {
            tables.events.push(event);
        }
        Ok(())
    }

    async fn list_events(&self, printer_id: PrinterId) -> Result<Vec<FleetEvent>> {
        Ok(self
            .lock()
            .events
            .iter()
            .filter(|e| e.printer_id == printer_id)
            .cloned()
            .collect())
    }
}
