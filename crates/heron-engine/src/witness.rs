//! Floating-point corroboration of counterexamples.
//!
//! When a claim is refuted the solver hands back exact rational values. The
//! reporter re-runs the recurrence on those values in `f64` and compares the
//! result with `f64::sqrt`. Nothing here feeds back into verification.

use num::traits::ToPrimitive;
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use heron_smt::solver::{Model, ModelValue};

use crate::encoder::{heron_f64, Seed};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum WitnessError {
    #[error("witness has no value for `{0}`")]
    MissingValue(String),
    #[error("witness value of `{name}` is irrational ({text}) and cannot be replayed")]
    Irrational { name: String, text: String },
    #[error("witness value of `{0}` does not fit in an f64")]
    NotRepresentable(String),
}

/// A counterexample returned by the solver.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Witness {
    pub model: Model,
}

impl Witness {
    pub fn new(model: Model) -> Self {
        Self { model }
    }

    pub fn value(&self, name: &str) -> Option<&ModelValue> {
        self.model.get(name)
    }

    /// `f64` approximation of a rational assignment.
    pub fn approx(&self, name: &str) -> Result<f64, WitnessError> {
        match self.model.get(name) {
            None => Err(WitnessError::MissingValue(name.to_string())),
            Some(ModelValue::Algebraic(text)) => Err(WitnessError::Irrational {
                name: name.to_string(),
                text: text.clone(),
            }),
            Some(ModelValue::Bool(_)) => Err(WitnessError::NotRepresentable(name.to_string())),
            Some(ModelValue::Int(n)) => Ok(*n as f64),
            Some(ModelValue::Real(r)) => r
                .to_f64()
                .filter(|v| v.is_finite())
                .ok_or_else(|| WitnessError::NotRepresentable(name.to_string())),
        }
    }

    /// All assignments sorted by variable name.
    pub fn assignments(&self) -> Vec<(String, ModelValue)> {
        let mut out: Vec<_> = self
            .model
            .values
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }
}

/// Which recurrence to replay on a witness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurrenceProbe {
    pub label: String,
    pub target_var: String,
    pub seed: Seed,
    pub iterations: usize,
}

impl RecurrenceProbe {
    pub fn new(
        label: impl Into<String>,
        target_var: impl Into<String>,
        seed: Seed,
        iterations: usize,
    ) -> Self {
        Self {
            label: label.into(),
            target_var: target_var.into(),
            seed,
            iterations,
        }
    }
}

/// Result of replaying one probe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Corroboration {
    pub label: String,
    pub target: f64,
    pub seed: f64,
    pub iterations: usize,
    pub computed_approx: f64,
    pub true_value: f64,
    pub absolute_error: f64,
}

pub fn corroborate(witness: &Witness, probe: &RecurrenceProbe) -> Result<Corroboration, WitnessError> {
    let target = witness.approx(&probe.target_var)?;
    let seed = match &probe.seed {
        Seed::Const(value) => value
            .to_f64()
            .ok_or_else(|| WitnessError::NotRepresentable(value.to_string()))?,
        Seed::Var(name) => witness.approx(name)?,
    };
    let computed_approx = heron_f64(target, seed, probe.iterations);
    let true_value = target.sqrt();
    Ok(Corroboration {
        label: probe.label.clone(),
        target,
        seed,
        iterations: probe.iterations,
        computed_approx,
        true_value,
        absolute_error: (computed_approx - true_value).abs(),
    })
}

/// Replays every probe, skipping (and logging) those the witness cannot
/// support.
pub fn corroborate_all(witness: &Witness, probes: &[RecurrenceProbe]) -> Vec<Corroboration> {
    probes
        .iter()
        .filter_map(|probe| match corroborate(witness, probe) {
            Ok(c) => Some(c),
            Err(e) => {
                warn!(probe = %probe.label, "cannot corroborate witness: {e}");
                None
            }
        })
        .collect()
}
