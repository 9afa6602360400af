use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::timefmt;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }
    };
}

id_type!(PrinterId);
id_type!(JobId);
id_type!(ModelId);
id_type!(ParameterId);
id_type!(
    /// Tenant boundary. Only carried as a foreign key here.
    StudioId
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrinterStatus {
    Idle,
    Printing,
    Paused,
    #[serde(alias = "waiting")]
    WaitingConfirmation,
    Error,
}

impl PrinterStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PrinterStatus::Idle => "idle",
            PrinterStatus::Printing => "printing",
            PrinterStatus::Paused => "paused",
            PrinterStatus::WaitingConfirmation => "waiting_confirmation",
            PrinterStatus::Error => "error",
        }
    }

    /// Printing or paused mid-job. Downtime never accrues in these states.
    pub fn is_active(self) -> bool {
        matches!(self, PrinterStatus::Printing | PrinterStatus::Paused)
    }
}

impl fmt::Display for PrinterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown status: {}", self.0)
    }
}

impl std::error::Error for UnknownStatus {}

impl FromStr for PrinterStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "idle" => Ok(PrinterStatus::Idle),
            "printing" => Ok(PrinterStatus::Printing),
            "paused" => Ok(PrinterStatus::Paused),
            "waiting" | "waiting_confirmation" => Ok(PrinterStatus::WaitingConfirmation),
            "error" => Ok(PrinterStatus::Error),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Printing,
    Paused,
    WaitingConfirmation,
    Completed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Printing => "printing",
            JobStatus::Paused => "paused",
            JobStatus::WaitingConfirmation => "waiting_confirmation",
            JobStatus::Completed => "completed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Cancelled)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "printing" => Ok(JobStatus::Printing),
            "paused" => Ok(JobStatus::Paused),
            "waiting_confirmation" | "pending_completion" => Ok(JobStatus::WaitingConfirmation),
            "completed" => Ok(JobStatus::Completed),
            "cancelled" | "aborted" => Ok(JobStatus::Cancelled),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Printer {
    pub id: PrinterId,
    pub name: String,
    pub hardware_model: Option<String>,
    pub studio_id: Option<StudioId>,
    pub status: PrinterStatus,
    /// Minutes.
    pub total_print_time: f64,
    /// Minutes.
    pub total_downtime: f64,
    pub created_at: DateTime<Utc>,
    /// Idle time before this instant is already part of `total_downtime`.
    pub downtime_accrued_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub id: ModelId,
    pub name: String,
    /// Expected duration in minutes.
    pub printing_time: f64,
    pub studio_id: Option<StudioId>,
}

/// One attempt to print a [`Model`] on a [`Printer`].
///
/// A job is open while `real_time_stop` is unset. Durations are minutes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrintJob {
    pub id: JobId,
    pub printer_id: PrinterId,
    pub model_id: ModelId,
    pub studio_id: Option<StudioId>,
    pub status: JobStatus,
    pub start_time: DateTime<Utc>,
    pub pause_time: Option<DateTime<Utc>>,
    pub calculated_time_stop: Option<DateTime<Utc>>,
    pub real_time_stop: Option<DateTime<Utc>>,
    pub printing_time: f64,
    pub downtime: f64,
    pub stop_reason: Option<String>,
}

impl PrintJob {
    pub fn is_open(&self) -> bool {
        self.real_time_stop.is_none()
    }

    /// Wall-clock minutes between `start_time` and `stop`, less pause time.
    ///
    /// A pause still in progress at `stop` counts as pause time.
    pub fn net_minutes_at(&self, stop: DateTime<Utc>) -> f64 {
        let elapsed = timefmt::minutes_between(self.start_time, stop);
        (elapsed - self.downtime_at(stop)).max(0.0)
    }

    /// Pause minutes including an open pause up to `at`.
    pub fn downtime_at(&self, at: DateTime<Utc>) -> f64 {
        let open_pause = self
            .pause_time
            .map(|p| timefmt::minutes_between(p, at).max(0.0))
            .unwrap_or(0.0);
        self.downtime + open_pause
    }

    /// Net print minutes of a closed job; `None` while it is open.
    pub fn net_print_minutes(&self) -> Option<f64> {
        self.real_time_stop.map(|stop| self.net_minutes_at(stop))
    }

    /// Status and stop time must agree: active jobs have no stop time and
    /// terminal jobs have one.
    pub fn check_lifecycle(&self) -> Result<(), String> {
        match (self.status, self.real_time_stop) {
            (JobStatus::Printing | JobStatus::Paused, Some(_)) => Err(format!(
                "job {} is {} but has a stop time",
                self.id, self.status
            )),
            (JobStatus::Completed | JobStatus::Cancelled, None) => Err(format!(
                "job {} is {} but has no stop time",
                self.id, self.status
            )),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPrinter {
    pub name: String,
    pub hardware_model: Option<String>,
    pub studio_id: Option<StudioId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewModel {
    pub name: String,
    pub printing_time: f64,
    pub studio_id: Option<StudioId>,
}

/// Free-form per-printer setting such as nozzle diameter or bed surface.
/// Names are not unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrinterParameter {
    pub id: ParameterId,
    pub printer_id: PrinterId,
    pub name: String,
    pub value: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewParameter {
    pub name: String,
    pub value: Option<String>,
}

/// State transition record, written together with the transition itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetEvent {
    pub id: Uuid,
    pub printer_id: PrinterId,
    pub job_id: Option<JobId>,
    pub action: String,
    pub meta: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl FleetEvent {
    pub fn new(
        printer_id: PrinterId,
        job_id: Option<JobId>,
        action: &str,
        meta: Option<serde_json::Value>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            printer_id,
            job_id,
            action: action.to_string(),
            meta,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(minutes: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap() + chrono::Duration::minutes(minutes)
    }

    fn job() -> PrintJob {
        PrintJob {
            id: JobId::new(),
            printer_id: PrinterId::new(),
            model_id: ModelId::new(),
            studio_id: None,
            status: JobStatus::Printing,
            start_time: at(0),
            pause_time: None,
            calculated_time_stop: Some(at(120)),
            real_time_stop: None,
            printing_time: 120.0,
            downtime: 0.0,
            stop_reason: None,
        }
    }

    #[test]
    fn printer_status_accepts_legacy_waiting() {
        assert_eq!(
            "waiting".parse::<PrinterStatus>().unwrap(),
            PrinterStatus::WaitingConfirmation
        );
        assert_eq!(
            "Waiting_Confirmation".parse::<PrinterStatus>().unwrap(),
            PrinterStatus::WaitingConfirmation
        );
        assert!("melting".parse::<PrinterStatus>().is_err());
    }

    #[test]
    fn status_strings_round_trip_through_serde() {
        let json = serde_json::to_string(&PrinterStatus::WaitingConfirmation).unwrap();
        assert_eq!(json, "\"waiting_confirmation\"");
        let legacy: PrinterStatus = serde_json::from_str("\"waiting\"").unwrap();
        assert_eq!(legacy, PrinterStatus::WaitingConfirmation);
    }

    #[test]
    fn only_printing_and_paused_are_active() {
        assert!(PrinterStatus::Printing.is_active());
        assert!(PrinterStatus::Paused.is_active());
        assert!(!PrinterStatus::Idle.is_active());
        assert!(!PrinterStatus::WaitingConfirmation.is_active());
        assert!(!PrinterStatus::Error.is_active());
    }

    #[test]
    fn net_minutes_subtracts_recorded_and_open_pause() {
        let mut j = job();
        j.downtime = 5.0;
        assert_eq!(j.net_minutes_at(at(20)), 15.0);

        j.pause_time = Some(at(18));
        assert_eq!(j.net_minutes_at(at(20)), 13.0);
        assert_eq!(j.net_print_minutes(), None);
    }

    #[test]
    fn lifecycle_check_rejects_mismatched_stop_time() {
        let mut j = job();
        assert!(j.check_lifecycle().is_ok());

        j.real_time_stop = Some(at(30));
        assert!(j.check_lifecycle().is_err());

        j.status = JobStatus::Completed;
        assert!(j.check_lifecycle().is_ok());

        j.real_time_stop = None;
        assert!(j.check_lifecycle().is_err());
    }
}
