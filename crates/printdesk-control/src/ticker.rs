use std::sync::{Arc, Mutex};
use std::time::Duration;

use printdesk_core::Fleet;
use printdesk_core::sweep::SweepReport;

/// Runs [`Fleet::tick`] on a fixed interval.
#[derive(Clone)]
pub struct FleetTicker {
    fleet: Fleet,
    interval: Duration,
    last: Arc<Mutex<Option<SweepReport>>>,
}

impl FleetTicker {
    pub fn new(fleet: Fleet, interval: Duration) -> Self {
        Self {
            fleet,
            interval,
            last: Arc::new(Mutex::new(None)),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn last_report(&self) -> Option<SweepReport> {
        self.last.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tracing::info!(interval_secs = self.interval.as_secs(), "fleet sweep started");
        tokio::spawn(async move {
            loop {
                self.tick().await;
                tokio::time::sleep(self.interval).await;
            }
        })
    }

    pub async fn tick(&self) {
        match self.fleet.tick().await {
            Ok(report) => {
                *self.last.lock().unwrap_or_else(|e| e.into_inner()) = Some(report);
            }
            Err(err) => tracing::warn!(%err, "fleet sweep failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;
    use printdesk_core::machine::StartOptions;
    use printdesk_core::{FleetStore, JobStatus, ManualClock, MemoryStore, NewModel, NewPrinter};

    use super::*;

    #[tokio::test]
    async fn tick_records_last_report() {
        let start = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let clock = Arc::new(ManualClock::new(start));
        let store = Arc::new(MemoryStore::new());
        let fleet = Fleet::new(store.clone(), clock.clone());

        let printer = fleet
            .create_printer(NewPrinter {
                name: "p1".into(),
                hardware_model: None,
                studio_id: None,
            })
            .await
            .unwrap();
        let model = fleet
            .create_model(NewModel {
                name: "bracket".into(),
                printing_time: 15.0,
                studio_id: None,
            })
            .await
            .unwrap();
        let job = fleet
            .start_job(printer.id, model.id, StartOptions::default())
            .await
            .unwrap();

        let ticker = FleetTicker::new(fleet, Duration::from_secs(30));
        assert!(ticker.last_report().is_none());

        clock.advance_minutes(20);
        ticker.tick().await;
        let report = ticker.last_report().unwrap();
        assert_eq!(report.jobs_completed, 1);
        assert_eq!(
            store.get_job(job.id).await.unwrap().unwrap().status,
            JobStatus::Completed
        );
    }
}
