use std::sync::Arc;

use crate::config::Settings;
use crate::relay::Relay;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub relay: Arc<Relay>,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        let relay = Arc::new(Relay::from_config(&settings.relay));

        Self {
            settings: Arc::new(settings),
            relay,
        }
    }
}
