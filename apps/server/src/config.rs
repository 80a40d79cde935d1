use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use compost_control::{
    ControlParameters, ControlSettings, DispatchPolicy, Recipient, Rule, RuleBase, TiePolicy,
    MATURATION_THRESHOLD, ROTATION_THRESHOLD,
};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub http: HttpConfig,
    pub telemetry: TelemetryConfig,
    pub control: ControlConfig,
    pub notify: NotifyConfig,
    pub recipients: Vec<Recipient>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpConfig {
    pub bind: SocketAddr,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8080)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TelemetryConfig {
    pub rotation_threshold: usize,
    pub maturation_threshold: usize,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            rotation_threshold: ROTATION_THRESHOLD,
            maturation_threshold: MATURATION_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ControlConfig {
    pub tie_policy: TiePolicy,
    pub mesophilic_temp: f64,
    pub thermophilic_temp: f64,
    pub moist_min: f64,
    pub moist_max: f64,
    /// Replaces the reference rule table when non-empty.
    pub rules: Vec<Rule>,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            tie_policy: TiePolicy::default(),
            mesophilic_temp: 35.0,
            thermophilic_temp: 55.0,
            moist_min: 40.0,
            moist_max: 60.0,
            rules: Vec::new(),
        }
    }
}

impl ControlConfig {
    pub fn settings(&self) -> Result<ControlSettings> {
        let params = ControlParameters::from_phase_temperatures(
            self.mesophilic_temp,
            self.thermophilic_temp,
        )?;
        Ok(ControlSettings::new(params, self.moist_min, self.moist_max)?)
    }

    pub fn rule_base(&self) -> Result<RuleBase> {
        if self.rules.is_empty() {
            Ok(RuleBase::reference())
        } else {
            Ok(RuleBase::new(self.rules.clone())?)
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NotifyConfig {
    pub retries: u32,
    pub timeout_secs: u64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            retries: 2,
            timeout_secs: 10,
        }
    }
}

impl NotifyConfig {
    pub fn policy(&self) -> DispatchPolicy {
        DispatchPolicy {
            retries: self.retries,
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

impl Config {
    /// Reads `path`, or returns defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Config> {
        let config = if path.exists() {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            toml::from_str(&text)
                .with_context(|| format!("Failed to parse config {}", path.display()))?
        } else {
            Config::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.telemetry.rotation_threshold == 0 {
            bail!("telemetry.rotation_threshold must be at least 1");
        }
        if self.telemetry.maturation_threshold == 0 {
            bail!("telemetry.maturation_threshold must be at least 1");
        }
        if self.notify.timeout_secs == 0 {
            bail!("notify.timeout_secs must be at least 1");
        }
        self.control.settings().context("invalid [control] section")?;
        self.control.rule_base().context("invalid [control] rules")?;
        Ok(())
    }
}
