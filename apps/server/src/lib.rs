//! HTTP front end of the compost controller.

pub mod config;
pub mod mailer;
pub mod web;

use std::sync::Arc;

use anyhow::Result;

use compost_control::{
    ControlService, Controller, DeviceService, MaturationDispatcher, MemoryStore, RotationManager,
    StaticRecipients, TelemetryService,
};

use crate::config::Config;
use crate::mailer::LogTransport;
use crate::web::WebState;

/// Wires the services for one unit from `config`.
pub fn build_state(config: &Config) -> Result<WebState> {
    let store = Arc::new(MemoryStore::new(config.control.settings()?));

    let dispatcher = MaturationDispatcher::new(
        config.telemetry.maturation_threshold,
        Arc::new(StaticRecipients(config.recipients.clone())),
        Arc::new(LogTransport),
        config.notify.policy(),
    );
    let telemetry = Arc::new(TelemetryService::new(
        store.clone(),
        RotationManager::new(config.telemetry.rotation_threshold),
        dispatcher,
    ));

    let controller = Controller::new(config.control.rule_base()?, config.control.tie_policy);
    let control = Arc::new(ControlService::new(store.clone(), controller));
    let device = Arc::new(DeviceService::new(store, telemetry.clone()));

    Ok(WebState {
        telemetry,
        control,
        device,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn default_config_builds() {
        let state = build_state(&Config::default()).unwrap();
        let settings = state.control.settings().await.unwrap();
        assert_eq!(settings.parameters.luke_warm[1], 35.0);
        assert!(!state.device.state().await.unwrap().is_active());
    }
}
