use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::{
    Fleet, FleetStore, JobId, ManualClock, MemoryStore, Model, NewModel, NewPrinter, PrintJob,
    Printer, PrinterId,
};

pub(crate) fn t0() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

pub(crate) fn at(minutes: i64) -> DateTime<Utc> {
    t0() + Duration::minutes(minutes)
}

pub(crate) struct Harness {
    pub fleet: Fleet,
    pub clock: Arc<ManualClock>,
    pub store: Arc<MemoryStore>,
}

impl Harness {
    pub fn new() -> Self {
        let clock = Arc::new(ManualClock::new(t0()));
        let store = Arc::new(MemoryStore::new());
        let fleet = Fleet::new(store.clone(), clock.clone());
        Self {
            fleet,
            clock,
            store,
        }
    }

    /// Moves the clock to `minutes` after `t0`.
    pub fn at(&self, minutes: i64) {
        self.clock.set(at(minutes));
    }

    pub async fn printer(&self, name: &str) -> Printer {
        self.fleet
            .create_printer(NewPrinter {
                name: name.to_string(),
                hardware_model: Some("Prusa MK4".to_string()),
                studio_id: None,
            })
            .await
            .unwrap()
    }

    pub async fn model(&self, minutes: f64) -> Model {
        self.fleet
            .create_model(NewModel {
                name: "benchy".to_string(),
                printing_time: minutes,
                studio_id: None,
            })
            .await
            .unwrap()
    }

    pub async fn printer_now(&self, id: PrinterId) -> Printer {
        self.store.get_printer(id).await.unwrap().unwrap()
    }

    pub async fn job_now(&self, id: JobId) -> PrintJob {
        self.store.get_job(id).await.unwrap().unwrap()
    }
}
