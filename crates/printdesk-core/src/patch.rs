//! Typed partial updates. A `None` field is left untouched; nested options
//! distinguish "leave" (`None`) from "clear" (`Some(None)`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{FleetError, Result};
use crate::types::{JobStatus, PrintJob, Printer, PrinterStatus, StudioId};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrinterPatch {
    pub name: Option<String>,
    pub hardware_model: Option<Option<String>>,
    pub studio_id: Option<Option<StudioId>>,
    pub status: Option<PrinterStatus>,
    pub total_print_time: Option<f64>,
    pub total_downtime: Option<f64>,
    pub downtime_accrued_at: Option<Option<DateTime<Utc>>>,
}

impl PrinterPatch {
    pub fn status(status: PrinterStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(FleetError::Validation("printer name must not be empty".into()));
            }
        }
        check_minutes("total_print_time", self.total_print_time)?;
        check_minutes("total_downtime", self.total_downtime)?;
        Ok(())
    }

    pub fn apply_to(&self, printer: &mut Printer) {
        if let Some(name) = &self.name {
            printer.name = name.clone();
        }
        if let Some(model) = &self.hardware_model {
            printer.hardware_model = model.clone();
        }
        if let Some(studio_id) = self.studio_id {
            printer.studio_id = studio_id;
        }
        if let Some(status) = self.status {
            printer.status = status;
        }
        if let Some(v) = self.total_print_time {
            printer.total_print_time = v;
        }
        if let Some(v) = self.total_downtime {
            printer.total_downtime = v;
        }
        if let Some(at) = self.downtime_accrued_at {
            printer.downtime_accrued_at = at;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobPatch {
    pub status: Option<JobStatus>,
    pub pause_time: Option<Option<DateTime<Utc>>>,
    pub calculated_time_stop: Option<Option<DateTime<Utc>>>,
    pub real_time_stop: Option<Option<DateTime<Utc>>>,
    pub printing_time: Option<f64>,
    pub downtime: Option<f64>,
    pub stop_reason: Option<Option<String>>,
}

impl JobPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn validate(&self) -> Result<()> {
        check_minutes("printing_time", self.printing_time)?;
        check_minutes("downtime", self.downtime)?;
        Ok(())
    }

    pub fn apply_to(&self, job: &mut PrintJob) {
        if let Some(status) = self.status {
            job.status = status;
        }
        if let Some(t) = self.pause_time {
            job.pause_time = t;
        }
        if let Some(t) = self.calculated_time_stop {
            job.calculated_time_stop = t;
        }
        if let Some(t) = self.real_time_stop {
            job.real_time_stop = t;
        }
        if let Some(v) = self.printing_time {
            job.printing_time = v;
        }
        if let Some(v) = self.downtime {
            job.downtime = v;
        }
        if let Some(reason) = &self.stop_reason {
            job.stop_reason = reason.clone();
        }
    }

    /// Applies the patch to a copy of `job` and checks the result still obeys
    /// the job lifecycle rules.
    pub fn patched(&self, job: &PrintJob) -> Result<PrintJob> {
        self.validate()?;
        let mut next = job.clone();
        self.apply_to(&mut next);
        next.check_lifecycle().map_err(FleetError::Validation)?;
        Ok(next)
    }
}

fn check_minutes(field: &str, value: Option<f64>) -> Result<()> {
    match value {
        Some(v) if !v.is_finite() || v < 0.0 => Err(FleetError::Validation(format!(
            "{field} must be a non-negative number of minutes, got {v}"
        ))),
        _ => Ok(()),
    }
}
