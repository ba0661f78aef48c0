//! Depolarizing-channel injection into ideal circuits.

use rand::Rng;
use serde::Serialize;
use tracing::debug;

use crate::circuit::{Circuit, Gate};
use crate::error::SimError;

/// Noise model attached to a program.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum ErrorModel {
    #[default]
    Perfect,
    DepolarizingChannel { probability: f64 },
}

impl ErrorModel {
    pub const DEPOLARIZING_CHANNEL: &'static str = "depolarizing_channel";

    /// Builds a model from its program name and parameter list. Unknown names
    /// yield `Ok(None)` so the caller can fall back to a perfect run.
    pub fn from_name(name: &str, params: &[f64]) -> Result<Option<Self>, SimError> {
        if name != Self::DEPOLARIZING_CHANNEL {
            return Ok(None);
        }
        let probability = params.first().copied().unwrap_or(0.0);
        if !(0.0..=1.0).contains(&probability) {
            return Err(SimError::InvalidProbability(probability));
        }
        Ok(Some(ErrorModel::DepolarizingChannel { probability }))
    }

    pub fn probability(&self) -> Option<f64> {
        match self {
            ErrorModel::Perfect => None,
            ErrorModel::DepolarizingChannel { probability } => Some(*probability),
        }
    }
}

/// Returns one pass of `perfect` where every operation is, with probability
/// `p`, followed by a random Pauli on a uniformly chosen qubit. Each
/// injection bumps `total_errors`. The result always has one iteration.
pub fn noisy_dep_ch<R: Rng + ?Sized>(
    perfect: &Circuit,
    p: f64,
    total_errors: &mut usize,
    rng: &mut R,
) -> Circuit {
    let p = if p.is_nan() { 0.0 } else { p.clamp(0.0, 1.0) };
    let num_qubits = perfect.num_qubits();
    let mut noisy = Circuit::new(format!("{}_noisy", perfect.name()), num_qubits);
    let mut injected = 0usize;

    for gate in perfect.gates() {
        noisy.add_gate(*gate);
        if num_qubits == 0 || !rng.gen_bool(p) {
            continue;
        }
        let q = rng.gen_range(0..num_qubits);
        let error = match rng.gen_range(0..3) {
            0 => Gate::X(q),
            1 => Gate::Y(q),
            _ => Gate::Z(q),
        };
        noisy.add_gate(error);
        injected += 1;
    }

    *total_errors += injected;
    debug!(circuit = perfect.name(), injected, "generated noisy circuit");
    noisy
}

/// Expands `perfect` into one independently sampled noisy pass per
/// iteration.
pub fn noisy_unrolled<R: Rng + ?Sized>(
    perfect: &Circuit,
    p: f64,
    total_errors: &mut usize,
    rng: &mut R,
) -> Vec<Circuit> {
    let mut passes = Vec::with_capacity(perfect.iterations());
    for _ in 0..perfect.iterations() {
        passes.push(noisy_dep_ch(perfect, p, total_errors, rng));
    }
    passes
}
