use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Composting phase reported by the controller board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Mesophilic,
    Thermophilic,
    Cooling,
    /// Older boards report this phase as `Maturasi`.
    #[serde(alias = "Maturasi")]
    Maturation,
}

/// A reading as posted by the device, before it gets an id.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NewSample {
    pub temp: f64,
    pub moist: f64,
    pub ph: f64,
    pub phase: Phase,
}

impl NewSample {
    pub fn validate(&self) -> Result<()> {
        if !(self.temp.is_finite() && self.moist.is_finite() && self.ph.is_finite()) {
            return Err(Error::InvalidParameters(format!(
                "sample fields must be finite: temp={} moist={} ph={}",
                self.temp, self.moist, self.ph
            )));
        }
        Ok(())
    }
}

/// A row of the live buffer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RealtimeSample {
    pub id: u64,
    pub temp: f64,
    pub moist: f64,
    pub ph: f64,
    pub phase: Phase,
    pub inserted_at: DateTime<Utc>,
}

/// One archived summary of a full live buffer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregateRecord {
    pub id: u64,
    pub temp: f64,
    pub moist: f64,
    pub ph: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Averages {
    pub temp: f64,
    pub moist: f64,
    pub ph: f64,
}

impl Averages {
    /// Arithmetic means; `None` for an empty buffer.
    pub fn of(samples: &[RealtimeSample]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let n = samples.len() as f64;
        let (temp, moist, ph) = samples.iter().fold((0.0, 0.0, 0.0), |(t, m, p), s| {
            (t + s.temp, m + s.moist, p + s.ph)
        });
        Some(Self {
            temp: temp / n,
            moist: moist / n,
            ph: ph / n,
        })
    }
}
