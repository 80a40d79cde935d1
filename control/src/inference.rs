//! Mamdani inference over the two temperature inputs: min for AND, max for
//! aggregation, centroid defuzzification.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::membership::{Label, LinguisticVariable};
use crate::params::ControlParameters;
use crate::rules::{
    Level, RuleBase, StageTerm, TempTerm, EXHAUST_TERMS, HEATER_TERMS, PWM_MAX, PWM_MIN,
};

/// Sample count used when integrating an output set.
pub const DEFUZZ_STEPS: usize = 1000;

/// Crisp duty cycles, each in `[0, 255]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FuzzyOutput {
    pub heater_pwm: f64,
    pub exhaust_pwm: f64,
}

impl FuzzyOutput {
    /// Duty cycles rounded to what a PWM register accepts.
    pub fn duty(&self) -> (u8, u8) {
        let to_u8 = |v: f64| v.round().clamp(PWM_MIN, PWM_MAX) as u8;
        (to_u8(self.heater_pwm), to_u8(self.exhaust_pwm))
    }
}

#[derive(Debug, Clone)]
pub struct Engine {
    current: LinguisticVariable<TempTerm>,
    target: LinguisticVariable<StageTerm>,
    heater: LinguisticVariable<Level>,
    exhaust: LinguisticVariable<Level>,
    rules: RuleBase,
}

impl Engine {
    pub fn new(params: &ControlParameters, rules: RuleBase) -> Result<Self> {
        params.validate()?;
        let (min, max) = params.domain();

        let triples = params.triples();
        let stages: Vec<(StageTerm, [f64; 3])> = StageTerm::ALL
            .iter()
            .zip(triples.iter())
            .map(|(&stage, &(_, points))| (stage, points))
            .collect();

        Ok(Self {
            current: LinguisticVariable::with_terms("current", min, max, &triples)?,
            target: LinguisticVariable::with_terms("target", min, max, &stages)?,
            heater: LinguisticVariable::with_terms("heater", PWM_MIN, PWM_MAX, &HEATER_TERMS)?,
            exhaust: LinguisticVariable::with_terms("exhaust", PWM_MIN, PWM_MAX, &EXHAUST_TERMS)?,
            rules,
        })
    }

    pub fn rules(&self) -> &RuleBase {
        &self.rules
    }

    /// Firing strength of every rule, in table order.
    pub fn firing_strengths(&self, current: f64, target: f64) -> Vec<f64> {
        let current_deg = self.current.fuzzify(current);
        let target_deg = self.target.fuzzify(target);
        self.rules
            .rules()
            .iter()
            .map(|r| current_deg[r.current.index()].min(target_deg[r.target.index()]))
            .collect()
    }

    pub fn infer(&self, current: f64, target: f64) -> FuzzyOutput {
        let firing = self.firing_strengths(current, target);

        let mut heater = vec![0.0; Level::ALL.len()];
        let mut exhaust = vec![0.0; Level::ALL.len()];
        for (rule, &strength) in self.rules.rules().iter().zip(&firing) {
            let h = &mut heater[rule.heater.index()];
            *h = f64::max(*h, strength);
            let e = &mut exhaust[rule.exhaust.index()];
            *e = f64::max(*e, strength);
        }

        FuzzyOutput {
            heater_pwm: defuzzify(&self.heater, &heater, current, target),
            exhaust_pwm: defuzzify(&self.exhaust, &exhaust, current, target),
        }
    }
}

/// Centroid of the union of clipped output terms, or the variable's
/// midpoint when nothing fired.
fn defuzzify(var: &LinguisticVariable<Level>, strengths: &[f64], current: f64, target: f64) -> f64 {
    match centroid(var, strengths, DEFUZZ_STEPS) {
        Some(x) => {
            let (min, max) = var.range();
            x.clamp(min, max)
        }
        None => {
            debug!(
                output = var.name(),
                current, target, "no rule fired; falling back to domain midpoint"
            );
            var.midpoint()
        }
    }
}

pub fn centroid(var: &LinguisticVariable<Level>, strengths: &[f64], steps: usize) -> Option<f64> {
    if strengths.iter().all(|&s| s <= 0.0) || steps == 0 {
        return None;
    }
    let (min, max) = var.range();
    let dx = (max - min) / steps as f64;

    let mut area = 0.0;
    let mut moment = 0.0;
    for i in 0..=steps {
        let x = min + dx * i as f64;
        let mu = var
            .terms()
            .iter()
            .map(|t| strengths[t.label.index()].min(t.shape.degree(x)))
            .fold(0.0, f64::max);
        area += mu;
        moment += mu * x;
    }

    if area > 0.0 {
        Some(moment / area)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn even_params() -> ControlParameters {
        ControlParameters {
            very_cold: [0.0, 5.0, 10.0],
            cold: [5.0, 10.0, 15.0],
            luke_warm: [10.0, 15.0, 20.0],
            warm: [15.0, 20.0, 25.0],
            hot: [20.0, 25.0, 30.0],
            very_hot: [25.0, 30.0, 35.0],
        }
    }

    fn engine() -> Engine {
        Engine::new(&even_params(), RuleBase::reference()).unwrap()
    }

    #[test]
    fn cold_pile_aiming_for_maturation() {
        let out = engine().infer(3.0, 5.0);
        assert!(
            out.heater_pwm >= 92.0 && out.heater_pwm <= 120.0,
            "heater {}",
            out.heater_pwm
        );
        assert!(
            out.exhaust_pwm >= 0.0 && out.exhaust_pwm <= 5.0,
            "exhaust {}",
            out.exhaust_pwm
        );
    }

    #[test]
    fn firing_is_min_of_antecedents() {
        let e = engine();
        let firing = e.firing_strengths(3.0, 5.0);
        let first = e.rules().rules()[0];
        assert_eq!((first.current, first.target), (TempTerm::VeryCold, StageTerm::Maturation));
        assert!((firing[0] - 0.6).abs() < 1e-12);
        assert!(firing[1..].iter().all(|&f| f == 0.0));
    }

    #[test]
    fn far_apart_bands_drive_heater_high() {
        let out = engine().infer(5.0, 25.0);
        assert!(out.heater_pwm > 245.0, "heater {}", out.heater_pwm);
    }

    #[test]
    fn nothing_fires_outside_domain() {
        let out = engine().infer(-100.0, 500.0);
        assert_eq!(out.heater_pwm, 127.5);
        assert_eq!(out.exhaust_pwm, 127.5);
    }

    #[test]
    fn rule_edit_changes_exhaust_without_code_change() {
        let mut rules = RuleBase::reference().rules().to_vec();
        rules[0].exhaust = Level::High;
        let e = Engine::new(&even_params(), RuleBase::new(rules).unwrap()).unwrap();
        let out = e.infer(5.0, 5.0);
        assert!(out.exhaust_pwm > 82.0 && out.exhaust_pwm < 122.0, "{}", out.exhaust_pwm);
    }

    #[test]
    fn invalid_parameters_are_fatal() {
        let mut p = even_params();
        p.hot = [30.0, 25.0, 20.0];
        assert!(Engine::new(&p, RuleBase::reference()).is_err());
    }

    #[test]
    fn duty_rounds_and_clamps() {
        let out = FuzzyOutput {
            heater_pwm: 104.6,
            exhaust_pwm: -0.2,
        };
        assert_eq!(out.duty(), (105, 0));
    }
}
