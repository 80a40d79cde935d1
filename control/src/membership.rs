//! Linguistic variables built from triangular terms.

use std::fmt;

use crate::error::{Error, Result};

/// A term label. Labels are small closed enums, so every variable can keep
/// its degrees in a plain vector indexed by [`Label::index`].
pub trait Label: Copy + Eq + fmt::Display + 'static {
    const ALL: &'static [Self];

    fn index(self) -> usize;
}

/// Triangular shape with left zero-crossing `a`, peak `b` and right
/// zero-crossing `c`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    a: f64,
    b: f64,
    c: f64,
}

impl Triangle {
    /// Returns `None` unless `a <= b <= c` and all three are finite.
    pub fn new(a: f64, b: f64, c: f64) -> Option<Self> {
        let finite = a.is_finite() && b.is_finite() && c.is_finite();
        if finite && a <= b && b <= c {
            Some(Self { a, b, c })
        } else {
            None
        }
    }

    pub fn points(&self) -> [f64; 3] {
        [self.a, self.b, self.c]
    }

    pub fn peak(&self) -> f64 {
        self.b
    }

    /// Degree of membership of `x`, in `[0, 1]`.
    ///
    /// A degenerate side (`a == b` or `b == c`) behaves as a step: the peak
    /// itself is 1 and everything outside `(a, c)` is 0.
    pub fn degree(&self, x: f64) -> f64 {
        if !x.is_finite() {
            return 0.0;
        }
        if x == self.b {
            1.0
        } else if x <= self.a || x >= self.c {
            0.0
        } else if x < self.b {
            (x - self.a) / (self.b - self.a)
        } else {
            (self.c - x) / (self.c - self.b)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Term<L> {
    pub label: L,
    pub shape: Triangle,
}

impl<L: Label> Term<L> {
    pub fn triangle(label: L, [a, b, c]: [f64; 3]) -> Result<Self> {
        let shape = Triangle::new(a, b, c).ok_or_else(|| Error::InvalidTerm {
            label: label.to_string(),
            a,
            b,
            c,
        })?;
        Ok(Self { label, shape })
    }
}

/// Degree of `value` in `term`.
pub fn membership<L: Label>(value: f64, term: &Term<L>) -> f64 {
    term.shape.degree(value)
}

#[derive(Debug, Clone)]
pub struct LinguisticVariable<L> {
    name: &'static str,
    min: f64,
    max: f64,
    terms: Vec<Term<L>>,
}

impl<L: Label> LinguisticVariable<L> {
    pub fn new(name: &'static str, min: f64, max: f64) -> Result<Self> {
        if !(min.is_finite() && max.is_finite() && min < max) {
            return Err(Error::InvalidRange {
                name: name.to_string(),
                min,
                max,
            });
        }
        Ok(Self {
            name,
            min,
            max,
            terms: Vec::with_capacity(L::ALL.len()),
        })
    }

    /// Builds a variable from `(label, breakpoints)` pairs in one go.
    pub fn with_terms(
        name: &'static str,
        min: f64,
        max: f64,
        terms: &[(L, [f64; 3])],
    ) -> Result<Self> {
        let mut var = Self::new(name, min, max)?;
        for &(label, points) in terms {
            var.add_term(Term::triangle(label, points)?);
        }
        Ok(var)
    }

    /// Adds a term, replacing any previous term with the same label.
    pub fn add_term(&mut self, term: Term<L>) {
        self.terms.retain(|t| t.label != term.label);
        self.terms.push(term);
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn range(&self) -> (f64, f64) {
        (self.min, self.max)
    }

    pub fn midpoint(&self) -> f64 {
        (self.min + self.max) / 2.0
    }

    pub fn term(&self, label: L) -> Option<&Term<L>> {
        self.terms.iter().find(|t| t.label == label)
    }

    pub fn terms(&self) -> &[Term<L>] {
        &self.terms
    }

    /// Degree of `value` in every term, indexed by label. Labels without a
    /// term read as 0.
    pub fn fuzzify(&self, value: f64) -> Vec<f64> {
        let mut degrees = vec![0.0; L::ALL.len()];
        for term in &self.terms {
            degrees[term.label.index()] = membership(value, term);
        }
        degrees
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::TempTerm;

    fn tri(a: f64, b: f64, c: f64) -> Triangle {
        Triangle::new(a, b, c).unwrap()
    }

    #[test]
    fn corners_and_slopes() {
        let t = tri(0.0, 5.0, 10.0);
        assert_eq!(t.degree(0.0), 0.0);
        assert_eq!(t.degree(5.0), 1.0);
        assert_eq!(t.degree(10.0), 0.0);
        assert!((t.degree(3.0) - 0.6).abs() < 1e-12);
        assert!((t.degree(7.5) - 0.5).abs() < 1e-12);
        assert_eq!(t.degree(-1.0), 0.0);
        assert_eq!(t.degree(11.0), 0.0);
    }

    #[test]
    fn degenerate_sides_are_steps() {
        let left = tri(5.0, 5.0, 10.0);
        assert_eq!(left.degree(4.999), 0.0);
        assert_eq!(left.degree(5.0), 1.0);
        assert!((left.degree(7.5) - 0.5).abs() < 1e-12);

        let right = tri(0.0, 5.0, 5.0);
        assert_eq!(right.degree(5.0), 1.0);
        assert_eq!(right.degree(5.001), 0.0);

        let spike = tri(2.0, 2.0, 2.0);
        assert_eq!(spike.degree(2.0), 1.0);
        assert_eq!(spike.degree(2.1), 0.0);
    }

    #[test]
    fn unordered_breakpoints_are_rejected() {
        assert!(Triangle::new(5.0, 1.0, 10.0).is_none());
        assert!(Triangle::new(0.0, 10.0, 5.0).is_none());
        assert!(Triangle::new(0.0, f64::NAN, 5.0).is_none());

        let err = Term::triangle(TempTerm::Cold, [5.0, 1.0, 10.0]).unwrap_err();
        assert!(matches!(err, Error::InvalidTerm { .. }));
        assert!(err.to_string().contains("cold"));
    }

    #[test]
    fn nan_has_no_membership() {
        assert_eq!(tri(0.0, 5.0, 10.0).degree(f64::NAN), 0.0);
    }

    #[test]
    fn variable_rejects_empty_range() {
        assert!(LinguisticVariable::<TempTerm>::new("current", 5.0, 5.0).is_err());
        assert!(LinguisticVariable::<TempTerm>::new("current", 9.0, 1.0).is_err());
    }

    #[test]
    fn fuzzify_is_indexed_by_label() {
        let var = LinguisticVariable::with_terms(
            "current",
            5.0,
            30.0,
            &[
                (TempTerm::VeryCold, [0.0, 5.0, 10.0]),
                (TempTerm::Cold, [5.0, 10.0, 15.0]),
            ],
        )
        .unwrap();
        let degrees = var.fuzzify(7.5);
        assert_eq!(degrees.len(), TempTerm::ALL.len());
        assert!((degrees[TempTerm::VeryCold.index()] - 0.5).abs() < 1e-12);
        assert!((degrees[TempTerm::Cold.index()] - 0.5).abs() < 1e-12);
        assert_eq!(degrees[TempTerm::VeryHot.index()], 0.0);
        assert_eq!(var.midpoint(), 17.5);
    }
}
