//! Term labels, output shapes and the conjunctive rule table.
//!
//! The table is data: editing a consequent never touches the inference code.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::membership::Label;

macro_rules! labels {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl Label for $name {
            const ALL: &'static [Self] = &[$($name::$variant),+];

            fn index(self) -> usize {
                self as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(match self {
                    $($name::$variant => $text),+
                })
            }
        }
    };
}

labels!(TempTerm {
    VeryCold => "veryCold",
    Cold => "cold",
    LukeWarm => "lukeWarm",
    Warm => "warm",
    Hot => "hot",
    VeryHot => "veryHot",
});

// Same breakpoints as TempTerm, framed as the composting stage being aimed at.
labels!(StageTerm {
    Maturation => "maturation",
    Mesophilic2 => "mesophilic2",
    Mesophilic1 => "mesophilic1",
    Thermophilic1 => "thermophilic1",
    Thermophilic2 => "thermophilic2",
    Overheat => "overheat",
});

labels!(Level {
    VeryLow => "veryLow",
    Low => "low",
    Medium => "medium",
    High => "high",
    VeryHigh => "veryHigh",
});

pub const PWM_MIN: f64 = 0.0;
pub const PWM_MAX: f64 = 255.0;

pub const HEATER_TERMS: [(Level, [f64; 3]); 5] = [
    (Level::VeryLow, [92.0, 102.0, 120.0]),   // 40%
    (Level::Low, [115.0, 204.0, 224.0]),      // 80%
    (Level::Medium, [220.0, 230.0, 240.0]),   // 90%
    (Level::High, [232.0, 242.0, 252.0]),     // 95%
    (Level::VeryHigh, [245.0, 255.0, 265.0]), // 100%
];

pub const EXHAUST_TERMS: [(Level, [f64; 3]); 5] = [
    (Level::VeryLow, [-5.0, 0.0, 5.0]),       // 0%
    (Level::Low, [15.0, 26.0, 37.0]),         // 10%
    (Level::Medium, [41.0, 51.0, 61.0]),      // 20%
    (Level::High, [82.0, 102.0, 122.0]),      // 40%
    (Level::VeryHigh, [184.0, 204.0, 224.0]), // 80%
];

/// `current AND target -> (heater, exhaust)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub current: TempTerm,
    pub target: StageTerm,
    pub heater: Level,
    pub exhaust: Level,
}

const fn rule(current: TempTerm, target: StageTerm, heater: Level, exhaust: Level) -> Rule {
    Rule {
        current,
        target,
        heater,
        exhaust,
    }
}

use Level::{High, Low, Medium, VeryHigh, VeryLow};
use StageTerm::{Maturation, Mesophilic1, Mesophilic2, Overheat, Thermophilic1, Thermophilic2};
use TempTerm::{Cold, Hot, LukeWarm, VeryCold, VeryHot, Warm};

#[rustfmt::skip]
pub const REFERENCE_RULES: [Rule; 36] = [
    rule(VeryCold, Maturation, VeryLow, VeryLow),
    rule(Cold,     Maturation, Low,      VeryLow),
    rule(LukeWarm, Maturation, Medium,   VeryLow),
    rule(Warm,     Maturation, High,     VeryLow),
    rule(Hot,      Maturation, VeryHigh, VeryLow),
    rule(VeryHot,  Maturation, VeryHigh, VeryLow),

    rule(VeryCold, Mesophilic2, Low,      VeryLow),
    rule(Cold,     Mesophilic2, VeryLow,  VeryLow),
    rule(LukeWarm, Mesophilic2, Low,      VeryLow),
    rule(Warm,     Mesophilic2, Medium,   VeryLow),
    rule(Hot,      Mesophilic2, High,     VeryLow),
    rule(VeryHot,  Mesophilic2, VeryHigh, VeryLow),

    rule(VeryCold, Mesophilic1, Medium,   VeryLow),
    rule(Cold,     Mesophilic1, Low,      VeryLow),
    rule(LukeWarm, Mesophilic1, VeryLow,  VeryLow),
    rule(Warm,     Mesophilic1, Low,      VeryLow),
    rule(Hot,      Mesophilic1, Medium,   VeryLow),
    rule(VeryHot,  Mesophilic1, High,     VeryLow),

    rule(VeryCold, Thermophilic1, High,     VeryLow),
    rule(Cold,     Thermophilic1, Medium,   VeryLow),
    rule(LukeWarm, Thermophilic1, Low,      VeryLow),
    rule(Warm,     Thermophilic1, VeryLow,  VeryLow),
    rule(Hot,      Thermophilic1, Low,      VeryLow),
    rule(VeryHot,  Thermophilic1, Medium,   VeryLow),

    rule(VeryCold, Thermophilic2, VeryHigh, VeryLow),
    rule(Cold,     Thermophilic2, High,     VeryLow),
    rule(LukeWarm, Thermophilic2, Medium,   VeryLow),
    rule(Warm,     Thermophilic2, Low,      VeryLow),
    rule(Hot,      Thermophilic2, VeryLow,  VeryLow),
    rule(VeryHot,  Thermophilic2, Low,      VeryLow),

    rule(VeryCold, Overheat, VeryHigh, VeryLow),
    rule(Cold,     Overheat, VeryHigh, VeryLow),
    rule(LukeWarm, Overheat, High,     VeryLow),
    rule(Warm,     Overheat, Medium,   VeryLow),
    rule(Hot,      Overheat, Low,      VeryLow),
    rule(VeryHot,  Overheat, VeryLow,  VeryLow),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleBase {
    rules: Vec<Rule>,
}

impl RuleBase {
    pub fn reference() -> Self {
        Self {
            rules: REFERENCE_RULES.to_vec(),
        }
    }

    /// Rejects an empty table and duplicated antecedents.
    pub fn new(rules: Vec<Rule>) -> Result<Self> {
        if rules.is_empty() {
            return Err(Error::InvalidParameters("rule base is empty".into()));
        }
        for (i, r) in rules.iter().enumerate() {
            if rules[..i]
                .iter()
                .any(|p| p.current == r.current && p.target == r.target)
            {
                return Err(Error::InvalidParameters(format!(
                    "duplicate rule for ({}, {})",
                    r.current, r.target
                )));
            }
        }
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for RuleBase {
    fn default() -> Self {
        Self::reference()
    }
}
