//! Born-rule sampling of register outcomes.

use num_complex::Complex;
use tracing::{debug, warn};

use crate::error::SimError;
use crate::register::{Amplitude, QuRegister};

/// Picks the basis index selected by the uniform draw `u` in `[0, 1)`: the
/// first index whose cumulative probability exceeds `u`. Rounding that leaves
/// the total short of `u` falls back to the last index.
pub fn sample_index(amplitudes: &[Amplitude], u: f64) -> usize {
    let mut cumulative = 0.0;
    for (i, amp) in amplitudes.iter().enumerate() {
        cumulative += amp.norm_sqr();
        if cumulative > u {
            return i;
        }
    }
    warn!(cumulative, u, "probability mass fell short, using last basis state");
    amplitudes.len().saturating_sub(1)
}

/// Measures the whole register at once, collapsing it and recording every
/// qubit's outcome.
pub fn measure_all(reg: &mut QuRegister) -> Result<usize, SimError> {
    if reg.num_qubits() == 0 {
        return Err(SimError::EmptyRegister);
    }
    let u = reg.uniform();
    let index = sample_index(reg.amplitudes(), u);
    reg.collapse(index)?;
    reg.set_measurement_outcome(index);
    debug!(outcome = %reg.to_binary_string(index), "measured register");
    Ok(index)
}

/// Probability that qubit `q` reads one.
pub fn excited_probability(amplitudes: &[Amplitude], q: usize) -> f64 {
    let mask = 1usize << q;
    amplitudes
        .iter()
        .enumerate()
        .filter(|(i, _)| i & mask != 0)
        .map(|(_, a)| a.norm_sqr())
        .sum()
}

/// Measures qubit `q` alone: projects onto the sampled value, renormalizes
/// the surviving half and records the outcome for that qubit only.
pub fn measure_qubit(reg: &mut QuRegister, q: usize) -> Result<bool, SimError> {
    if q >= reg.num_qubits() {
        return Err(SimError::Qubit(q));
    }
    let p_one = excited_probability(reg.amplitudes(), q);
    let outcome = reg.uniform() < p_one;
    let kept = if outcome { p_one } else { 1.0 - p_one };
    let scale = if kept > 0.0 { 1.0 / kept.sqrt() } else { 0.0 };

    let mask = 1usize << q;
    for (i, amp) in reg.amplitudes_mut().iter_mut().enumerate() {
        if (i & mask != 0) == outcome {
            *amp *= scale;
        } else {
            *amp = Complex::new(0.0, 0.0);
        }
    }
    reg.set_measurement(q, outcome)?;
    reg.set_qubit_prediction(q, outcome.into())?;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::register::QubitState;

    fn uniform_state(n: usize) -> Vec<Amplitude> {
        let size = 1 << n;
        vec![Complex::new((1.0 / size as f64).sqrt(), 0.0); size]
    }

    #[test]
    fn test_sample_index_scans_cumulative_mass() {
        let amps = uniform_state(2);
        assert_eq!(sample_index(&amps, 0.0), 0);
        assert_eq!(sample_index(&amps, 0.24), 0);
        assert_eq!(sample_index(&amps, 0.26), 1);
        assert_eq!(sample_index(&amps, 0.74), 2);
        assert_eq!(sample_index(&amps, 0.99), 3);
    }

    #[test]
    fn test_sample_index_falls_back_to_last_state() {
        let amps = vec![Complex::new(0.5, 0.0), Complex::new(0.5, 0.0)];
        assert_eq!(sample_index(&amps, 0.75), 1);
        let empty = vec![Complex::new(0.0, 0.0); 4];
        assert_eq!(sample_index(&empty, 0.1), 3);
    }

    #[test]
    fn test_measure_all_decodes_every_bit() {
        let mut reg = QuRegister::seeded(3, 11).unwrap();
        let mut amps = vec![Complex::new(0.0, 0.0); 8];
        amps[0b110] = Complex::new(0.0, 1.0);
        reg.set_amplitudes(amps).unwrap();

        let index = measure_all(&mut reg).unwrap();
        assert_eq!(index, 0b110);
        assert_eq!(reg.measurements(), &[false, true, true]);
        assert_eq!(reg.get_measurement_prediction(0).unwrap(), QubitState::Zero);
        assert_eq!(reg.amplitudes()[0b110], Complex::new(1.0, 0.0));
    }

    #[test]
    fn test_measure_all_rejects_empty_register() {
        let mut reg = QuRegister::seeded(0, 0).unwrap();
        assert!(matches!(measure_all(&mut reg), Err(SimError::EmptyRegister)));
    }

    #[test]
    fn test_measure_qubit_projects_and_renormalizes() {
        let mut reg = QuRegister::seeded(2, 3).unwrap();
        reg.set_amplitudes(uniform_state(2)).unwrap();

        let outcome = measure_qubit(&mut reg, 1).unwrap();
        assert!(reg.check());
        assert_eq!(reg.get_measurement(1).unwrap(), outcome);
        for (i, amp) in reg.amplitudes().iter().enumerate() {
            let kept = ((i >> 1) & 1 == 1) == outcome;
            let expected = if kept { 0.5 } else { 0.0 };
            assert!((amp.norm_sqr() - expected).abs() < 1e-12);
        }
        // a second measurement of the same qubit agrees
        assert_eq!(measure_qubit(&mut reg, 1).unwrap(), outcome);
    }

    #[test]
    fn test_excited_probability() {
        let amps = uniform_state(3);
        for q in 0..3 {
            assert!((excited_probability(&amps, q) - 0.5).abs() < 1e-12);
        }
    }
}
