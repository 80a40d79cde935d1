//! Chooses how the engine's output pair drives the actuators and persists
//! the result.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::info;

use crate::error::Result;
use crate::inference::{Engine, FuzzyOutput};
use crate::params::{check_moisture, ControlParameters, ControlSettings};
use crate::rules::{Level, RuleBase, EXHAUST_TERMS, HEATER_TERMS};
use crate::store::ControlStore;

/// What to do when the pile is exactly at its target temperature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TiePolicy {
    /// Both actuators at the peak of their `veryLow` term.
    #[default]
    Rest,
    /// Keep the last persisted actuator state, or `Rest` if there is none.
    Hold,
}

/// Persisted actuator state, the `fuzzy` row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActuatorState {
    #[serde(flatten)]
    pub output: FuzzyOutput,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Controller {
    rules: RuleBase,
    tie_policy: TiePolicy,
}

impl Controller {
    pub fn new(rules: RuleBase, tie_policy: TiePolicy) -> Self {
        Self { rules, tie_policy }
    }

    pub fn tie_policy(&self) -> TiePolicy {
        self.tie_policy
    }

    /// Above target the engine's pair is read as (exhaust, heater); below
    /// target as (heater, exhaust).
    pub fn compute(
        &self,
        current: f64,
        target: f64,
        params: &ControlParameters,
        previous: Option<FuzzyOutput>,
    ) -> Result<FuzzyOutput> {
        if current == target {
            return Ok(match (self.tie_policy, previous) {
                (TiePolicy::Hold, Some(prev)) => prev,
                _ => rest_output(),
            });
        }

        let engine = Engine::new(params, self.rules.clone())?;
        let out = engine.infer(current, target);
        if current > target {
            Ok(FuzzyOutput {
                heater_pwm: out.exhaust_pwm,
                exhaust_pwm: out.heater_pwm,
            })
        } else {
            Ok(out)
        }
    }
}

impl Default for Controller {
    fn default() -> Self {
        Self::new(RuleBase::reference(), TiePolicy::default())
    }
}

fn rest_output() -> FuzzyOutput {
    FuzzyOutput {
        heater_pwm: very_low_peak(&HEATER_TERMS),
        exhaust_pwm: very_low_peak(&EXHAUST_TERMS),
    }
}

fn very_low_peak(terms: &[(Level, [f64; 3])]) -> f64 {
    terms
        .iter()
        .find(|(level, _)| *level == Level::VeryLow)
        .map(|(_, points)| points[1])
        .unwrap_or(0.0)
}

/// Control computations and settings updates against a [`ControlStore`].
/// Independent of telemetry ingest.
pub struct ControlService {
    store: Arc<dyn ControlStore>,
    controller: Controller,
    // Serialises read-compute-write of the actuator row.
    regulate_lock: Mutex<()>,
}

impl ControlService {
    pub fn new(store: Arc<dyn ControlStore>, controller: Controller) -> Self {
        Self {
            store,
            controller,
            regulate_lock: Mutex::new(()),
        }
    }

    pub async fn settings(&self) -> Result<ControlSettings> {
        self.store.settings().await
    }

    pub async fn set_parameters(&self, params: ControlParameters) -> Result<ControlSettings> {
        params.validate()?;
        let settings = self.store.update_parameters(params).await?;
        info!(?params, "temperature breakpoints updated");
        Ok(settings)
    }

    pub async fn set_phase_temperatures(
        &self,
        mesophilic: f64,
        thermophilic: f64,
    ) -> Result<ControlSettings> {
        let params = ControlParameters::from_phase_temperatures(mesophilic, thermophilic)?;
        self.set_parameters(params).await
    }

    pub async fn set_moisture(&self, min: f64, max: f64) -> Result<ControlSettings> {
        check_moisture(min, max)?;
        let settings = self.store.update_moisture(min, max).await?;
        info!(min, max, "moisture bounds updated");
        Ok(settings)
    }

    pub async fn actuator(&self) -> Result<Option<ActuatorState>> {
        self.store.actuator().await
    }

    /// Computes a new actuator state from the stored breakpoints and
    /// persists it.
    pub async fn regulate(&self, current: f64, target: f64) -> Result<ActuatorState> {
        let _guard = self.regulate_lock.lock().await;
        let settings = self.store.settings().await?;
        let previous = self.store.actuator().await?.map(|s| s.output);
        let output = self.controller.compute(current, target, &settings.parameters, previous)?;
        let state = self.store.set_actuator(output).await?;
        info!(
            current,
            target,
            heater = output.heater_pwm,
            exhaust = output.exhaust_pwm,
            "fuzzy output calculated"
        );
        Ok(state)
    }
}
