use axum::Json;
use axum::extract::State;
use printdesk_core::sweep::SweepReport;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthzResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub read_only: bool,
    pub sweep_interval_secs: u64,
    pub last_sweep: Option<SweepReport>,
}

pub async fn healthz(State(state): State<AppState>) -> Json<HealthzResponse> {
    Json(HealthzResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        read_only: state.config.read_only,
        sweep_interval_secs: state.ticker.interval().as_secs(),
        last_sweep: state.ticker.last_report(),
    })
}
