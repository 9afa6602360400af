use std::sync::Arc;

use printdesk_core::Fleet;

use crate::config::Config;
use crate::ticker::FleetTicker;

#[derive(Clone)]
pub struct AppState {
    pub fleet: Fleet,
    pub ticker: FleetTicker,
    pub config: Arc<Config>,
}
