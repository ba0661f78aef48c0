//! Per-qubit excited-state statistics, either from repeated trials or from a
//! binomial resample of the final amplitudes.

use num_complex::Complex;
use rand::Rng;
use rand_distr::{Binomial, Distribution};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, warn};

use crate::binary_counter::BinaryCounter;
use crate::circuit::Circuit;
use crate::error::SimError;
use crate::noise::{self, ErrorModel};
use crate::register::{Amplitude, QuRegister};

/// Outcome of a batch of trials.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialSummary {
    pub completed: usize,
    pub aborted: usize,
}

/// Runs every non-empty circuit once against the register, honouring
/// iteration counts. Under a depolarizing model every iteration gets its own
/// freshly sampled noisy pass. Injected errors reach `total_errors` only when
/// every circuit ran.
pub fn execute_circuits<R: Rng + ?Sized>(
    reg: &mut QuRegister,
    circuits: &[Circuit],
    model: ErrorModel,
    total_errors: &mut usize,
    rng: &mut R,
) -> Result<(), SimError> {
    let mut injected = 0;
    for circuit in circuits.iter().filter(|c| !c.is_empty()) {
        match model {
            ErrorModel::Perfect => circuit.execute(reg)?,
            ErrorModel::DepolarizingChannel { probability } => {
                for pass in noise::noisy_unrolled(circuit, probability, &mut injected, rng) {
                    pass.execute(reg)?;
                }
            }
        }
    }
    *total_errors += injected;
    Ok(())
}

/// Repeats reset, execute and measure `navg` times, adding each trial's
/// outcome to the register's per-qubit tallies. A trial that fails is dropped
/// without touching the tallies or the injected-error count.
pub fn run_trials<R: Rng + ?Sized>(
    reg: &mut QuRegister,
    circuits: &[Circuit],
    model: ErrorModel,
    navg: usize,
    total_errors: &mut usize,
    rng: &mut R,
) -> TrialSummary {
    let mut summary = TrialSummary::default();
    for trial in 0..navg {
        reg.reset();
        let mut injected = 0;
        let outcome = execute_circuits(reg, circuits, model, &mut injected, rng)
            .and_then(|()| reg.measure());
        match outcome {
            Ok(_) => {
                reg.accumulate_measurement();
                *total_errors += injected;
                summary.completed += 1;
            }
            Err(err) => {
                warn!(trial, %err, "trial aborted");
                summary.aborted += 1;
            }
        }
    }
    debug!(completed = summary.completed, aborted = summary.aborted, "trials finished");
    summary
}

/// Excited-state frequency of every qubit, in qubit order.
pub fn average_measurement(reg: &QuRegister) -> Result<Vec<f64>, SimError> {
    (0..reg.num_qubits())
        .map(|q| reg.get_average_measurement(q))
        .collect()
}

/// Replaces every amplitude with the square root of a binomially resampled
/// probability over `reps` virtual shots. Phases are lost. `reps == 0` leaves
/// the amplitudes untouched.
pub fn resample_binomial<R: Rng + ?Sized>(amplitudes: &mut [Amplitude], reps: u64, rng: &mut R) {
    if reps == 0 {
        return;
    }
    for amp in amplitudes.iter_mut() {
        let p = amp.norm_sqr().clamp(0.0, 1.0);
        let hits = match Binomial::new(reps, p) {
            Ok(dist) => dist.sample(rng),
            Err(err) => {
                warn!(p, %err, "invalid binomial parameters, keeping probability");
                *amp = Complex::new(p.sqrt(), 0.0);
                continue;
            }
        };
        *amp = Complex::new((hits as f64 / reps as f64).sqrt(), 0.0);
    }
}

/// Probability mass on the basis states where qubit `q` is one, summed in
/// independent batches of `batch_size` half-range indices. Batches run in
/// parallel and are reduced in batch order, so the result does not depend on
/// scheduling.
pub fn excited_mass(
    amplitudes: &[Amplitude],
    num_qubits: usize,
    q: usize,
    batch_size: usize,
) -> f64 {
    debug_assert!(q < num_qubits);
    let half = amplitudes.len() / 2;
    let batch_size = batch_size.max(1);
    let batches = half.div_ceil(batch_size);
    let bit = 1u64 << q;
    let width = (num_qubits - 1) as u32;

    let partials: Vec<f64> = (0..batches)
        .into_par_iter()
        .map(|b| {
            let start = b * batch_size;
            let end = (start + batch_size).min(half);
            let mut counter = BinaryCounter::with_value(width, start as u64);
            let mut sum = 0.0;
            for _ in start..end {
                let index = (counter.spread(q as u32) | bit) as usize;
                sum += amplitudes[index].norm_sqr();
                counter.increment();
            }
            sum
        })
        .collect();
    partials.iter().sum()
}

/// Per-qubit excited-state probabilities of the given amplitudes.
pub fn excited_probabilities(
    amplitudes: &[Amplitude],
    num_qubits: usize,
    batch_size: usize,
) -> Vec<f64> {
    (0..num_qubits)
        .map(|q| excited_mass(amplitudes, num_qubits, q, batch_size))
        .collect()
}

/// Estimates the trial average from a single execution: resamples the
/// register's amplitudes over `reps` virtual shots (overwriting them) and
/// returns the per-qubit excited probabilities.
pub fn resampled_average<R: Rng + ?Sized>(
    reg: &mut QuRegister,
    reps: u64,
    batch_size: usize,
    rng: &mut R,
) -> Vec<f64> {
    resample_binomial(reg.amplitudes_mut(), reps, rng);
    excited_probabilities(reg.amplitudes(), reg.num_qubits(), batch_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::{Gate, Operation};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn uniform_state(n: usize) -> Vec<Amplitude> {
        let size = 1 << n;
        vec![Complex::new((1.0 / size as f64).sqrt(), 0.0); size]
    }

    fn single(gates: &[Gate], num_qubits: usize) -> Vec<Circuit> {
        let mut circuit = Circuit::new("main", num_qubits);
        for g in gates {
            circuit.add_gate(*g);
        }
        vec![circuit]
    }

    #[test]
    fn test_deterministic_excited_qubit_averages_to_one() {
        let circuits = single(&[Gate::X(0)], 2);
        let mut rng = StdRng::seed_from_u64(1);
        for navg in [1, 7, 100] {
            let mut reg = QuRegister::seeded(2, 9).unwrap();
            let mut errors = 0;
            let model = ErrorModel::Perfect;
            let summary = run_trials(&mut reg, &circuits, model, navg, &mut errors, &mut rng);
            assert_eq!(summary.completed, navg);
            let avg = average_measurement(&reg).unwrap();
            assert_eq!(avg, vec![1.0, 0.0]);
        }
    }

    #[test]
    fn test_uniform_superposition_averages_to_half() {
        let circuits = single(&[Gate::H(0), Gate::H(1)], 2);
        let mut reg = QuRegister::seeded(2, 42).unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        let mut errors = 0;
        run_trials(&mut reg, &circuits, ErrorModel::Perfect, 10_000, &mut errors, &mut rng);
        for p in average_measurement(&reg).unwrap() {
            assert!((p - 0.5).abs() < 0.02, "average was {p}");
        }
    }

    #[test]
    fn test_failed_trials_leave_tallies_alone() {
        let circuits = single(&[Gate::X(0), Gate::X(3)], 4);
        let mut reg = QuRegister::seeded(2, 0).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let mut errors = 0;
        let model = ErrorModel::Perfect;
        let summary = run_trials(&mut reg, &circuits, model, 5, &mut errors, &mut rng);
        assert_eq!(summary, TrialSummary { completed: 0, aborted: 5 });
        assert!(matches!(average_measurement(&reg), Err(SimError::MissingStatistic)));
    }

    #[test]
    fn test_noisy_trials_count_injected_errors() {
        let mut circuit = Circuit::new("loop", 1).with_iterations(3);
        circuit.add_gate(Gate::I(0));
        circuit.add_gate(Gate::I(0));
        let mut reg = QuRegister::seeded(1, 0).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let mut errors = 0;
        let model = ErrorModel::DepolarizingChannel { probability: 1.0 };
        run_trials(&mut reg, &[circuit], model, 4, &mut errors, &mut rng);
        assert_eq!(errors, 4 * 2 * 3);
    }

    #[test]
    fn test_aborted_noisy_trials_count_no_errors() {
        let mut circuit = Circuit::new("bad", 1).with_iterations(2);
        circuit.add_gate(Gate::H(0));
        circuit.add_gate(Gate::X(3));
        let mut reg = QuRegister::seeded(1, 0).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let mut errors = 0;
        let model = ErrorModel::DepolarizingChannel { probability: 1.0 };
        let summary = run_trials(&mut reg, &[circuit.clone()], model, 5, &mut errors, &mut rng);
        assert_eq!(summary, TrialSummary { completed: 0, aborted: 5 });
        assert_eq!(errors, 0);

        reg.reset();
        assert!(execute_circuits(&mut reg, &[circuit], model, &mut errors, &mut rng).is_err());
        assert_eq!(errors, 0);
    }

    #[test]
    fn test_zero_reps_is_a_noop() {
        let mut amps = uniform_state(3);
        amps[5] = Complex::new(0.0, amps[5].re);
        let before = amps.clone();
        let mut rng = StdRng::seed_from_u64(3);
        resample_binomial(&mut amps, 0, &mut rng);
        assert_eq!(amps, before);
    }

    #[test]
    fn test_resampling_converges_to_born_rule() {
        let mut reg = QuRegister::seeded(2, 0).unwrap();
        Gate::RY(0, 1.0).apply(&mut reg).unwrap();
        Gate::H(1).apply(&mut reg).unwrap();
        let exact = excited_probabilities(reg.amplitudes(), 2, 1);

        let mut rng = StdRng::seed_from_u64(8);
        let estimate = resampled_average(&mut reg, 1_000_000, 2, &mut rng);
        for (e, x) in estimate.iter().zip(&exact) {
            assert!((e - x).abs() < 0.005, "estimate {e} vs exact {x}");
        }
        assert!(reg.amplitudes().iter().all(|a| a.im == 0.0));
    }

    #[test]
    fn test_batching_does_not_change_the_sum() {
        let mut reg = QuRegister::seeded(5, 0).unwrap();
        for (q, theta) in [(0, 0.3), (1, 1.1), (2, 2.0), (3, 0.7), (4, 2.9)] {
            Gate::RY(q, theta).apply(&mut reg).unwrap();
        }
        Gate::CNOT(0, 3).apply(&mut reg).unwrap();
        let reference = excited_probabilities(reg.amplitudes(), 5, 4096);
        for batch_size in [1, 3, 7, 16] {
            let batched = excited_probabilities(reg.amplitudes(), 5, batch_size);
            for (a, b) in batched.iter().zip(&reference) {
                assert!((a - b).abs() < 1e-12);
            }
        }
        for q in 0..5 {
            let direct = crate::measure::excited_probability(reg.amplitudes(), q);
            assert!((reference[q] - direct).abs() < 1e-12);
        }
    }

    #[test]
    fn test_single_qubit_half_range() {
        let amps = vec![Complex::new(0.6, 0.0), Complex::new(0.0, 0.8)];
        let probs = excited_probabilities(&amps, 1, 4096);
        assert!((probs[0] - 0.64).abs() < 1e-12);
    }
}
