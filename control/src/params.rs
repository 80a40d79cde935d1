//! Breakpoint configuration of the temperature variables.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::membership::{Label, Triangle};
use crate::rules::TempTerm;

/// Six ordered triples, veryCold to veryHot. The same triples shape both
/// the current-temperature and the target-stage variables.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlParameters {
    pub very_cold: [f64; 3],
    pub cold: [f64; 3],
    pub luke_warm: [f64; 3],
    pub warm: [f64; 3],
    pub hot: [f64; 3],
    pub very_hot: [f64; 3],
}

impl ControlParameters {
    /// Spreads six evenly spaced triangles around the two phase set-points:
    /// lukeWarm peaks at `mesophilic`, hot peaks at `thermophilic`, and each
    /// triangle reaches to its neighbours' peaks.
    pub fn from_phase_temperatures(mesophilic: f64, thermophilic: f64) -> Result<Self> {
        if !(mesophilic.is_finite() && thermophilic.is_finite() && mesophilic < thermophilic) {
            return Err(Error::InvalidParameters(format!(
                "mesophilic temperature {mesophilic} must be below thermophilic {thermophilic}"
            )));
        }
        let step = (thermophilic - mesophilic) / 2.0;
        let triple = |i: i32| {
            let peak = mesophilic + f64::from(i - 2) * step;
            [peak - step, peak, peak + step]
        };
        let params = Self {
            very_cold: triple(0),
            cold: triple(1),
            luke_warm: triple(2),
            warm: triple(3),
            hot: triple(4),
            very_hot: triple(5),
        };
        params.validate()?;
        Ok(params)
    }

    pub fn triples(&self) -> [(TempTerm, [f64; 3]); 6] {
        [
            (TempTerm::VeryCold, self.very_cold),
            (TempTerm::Cold, self.cold),
            (TempTerm::LukeWarm, self.luke_warm),
            (TempTerm::Warm, self.warm),
            (TempTerm::Hot, self.hot),
            (TempTerm::VeryHot, self.very_hot),
        ]
    }

    /// Input domain: veryCold peak to veryHot peak.
    pub fn domain(&self) -> (f64, f64) {
        (self.very_cold[1], self.very_hot[1])
    }

    /// Each triple ordered, peaks strictly ascending, neighbouring shoulders
    /// overlapping.
    pub fn validate(&self) -> Result<()> {
        let triples = self.triples();
        for (label, [a, b, c]) in triples {
            if Triangle::new(a, b, c).is_none() {
                return Err(Error::InvalidTerm {
                    label: label.to_string(),
                    a,
                    b,
                    c,
                });
            }
        }
        for pair in triples.windows(2) {
            let (lo_label, lo) = pair[0];
            let (hi_label, hi) = pair[1];
            if hi[1] <= lo[1] {
                return Err(Error::InvalidParameters(format!(
                    "{hi_label} peak {} must be above {lo_label} peak {}",
                    hi[1], lo[1]
                )));
            }
            if hi[0] > lo[2] {
                return Err(Error::InvalidParameters(format!(
                    "gap between {lo_label} and {hi_label}: {} > {}",
                    hi[0], lo[2]
                )));
            }
        }
        debug_assert_eq!(triples.len(), TempTerm::ALL.len());
        Ok(())
    }
}

impl Default for ControlParameters {
    fn default() -> Self {
        Self {
            very_cold: [5.0, 15.0, 25.0],
            cold: [15.0, 25.0, 35.0],
            luke_warm: [25.0, 35.0, 45.0],
            warm: [35.0, 45.0, 55.0],
            hot: [45.0, 55.0, 65.0],
            very_hot: [55.0, 65.0, 75.0],
        }
    }
}

/// The `control` row: breakpoints plus moisture bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlSettings {
    #[serde(flatten)]
    pub parameters: ControlParameters,
    pub moist_min: f64,
    pub moist_max: f64,
    pub updated_at: DateTime<Utc>,
}

impl ControlSettings {
    pub fn new(parameters: ControlParameters, moist_min: f64, moist_max: f64) -> Result<Self> {
        parameters.validate()?;
        check_moisture(moist_min, moist_max)?;
        Ok(Self {
            parameters,
            moist_min,
            moist_max,
            updated_at: Utc::now(),
        })
    }
}

pub fn check_moisture(min: f64, max: f64) -> Result<()> {
    if min.is_finite() && max.is_finite() && min < max {
        Ok(())
    } else {
        Err(Error::InvalidRange {
            name: "moisture".into(),
            min,
            max,
        })
    }
}
