use std::sync::Arc;

use dorama_core::{Authenticator, Config, DoramaController, SanitizedConfig};

use crate::api::WsBroadcaster;

/// Shared application state
pub struct AppState {
    config: Config,
    authenticator: Arc<dyn Authenticator>,
    controller: DoramaController,
    ws_broadcaster: WsBroadcaster,
}

impl AppState {
    pub fn new(
        config: Config,
        authenticator: Arc<dyn Authenticator>,
        controller: DoramaController,
        ws_broadcaster: WsBroadcaster,
    ) -> Self {
        Self {
            config,
            authenticator,
            controller,
            ws_broadcaster,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn authenticator(&self) -> &dyn Authenticator {
        self.authenticator.as_ref()
    }

    pub fn controller(&self) -> &DoramaController {
        &self.controller
    }

    pub fn ws_broadcaster(&self) -> &WsBroadcaster {
        &self.ws_broadcaster
    }

    /// Items shown to callers without access.
    pub fn preview_items(&self) -> usize {
        self.config.access.preview_items
    }
}
