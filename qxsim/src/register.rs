use std::fmt::Write as _;

use num_complex::Complex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, warn};

use crate::binary_counter::BinaryCounter;
use crate::error::SimError;
use crate::measure;

pub type Amplitude = Complex<f64>;

// custom type for gate matrices
pub type GateMatrix = [[Amplitude; 2]; 2];

/// Largest tolerated deviation of the total probability from one.
pub const QUBIT_ERROR_THRESHOLD: f64 = 1e-10;

const ZERO: Amplitude = Complex::new(0.0, 0.0);
const ONE: Amplitude = Complex::new(1.0, 0.0);

/// What a qubit is expected to read when measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum QubitState {
    Zero,
    One,
    Unknown,
}

impl QubitState {
    fn symbol(self) -> char {
        match self {
            QubitState::Zero => '0',
            QubitState::One => '1',
            QubitState::Unknown => 'X',
        }
    }
}

impl From<bool> for QubitState {
    fn from(bit: bool) -> Self {
        if bit { QubitState::One } else { QubitState::Zero }
    }
}

/// Running tally of outcomes for one qubit across trials.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Integration {
    pub ground_states: u64,
    pub excited_states: u64,
}

impl Integration {
    pub fn record(&mut self, excited: bool) {
        if excited {
            self.excited_states += 1;
        } else {
            self.ground_states += 1;
        }
    }

    pub fn total(&self) -> u64 {
        self.ground_states + self.excited_states
    }

    /// Fraction of trials that read one; `None` before any trial.
    pub fn excited_fraction(&self) -> Option<f64> {
        match self.total() {
            0 => None,
            total => Some(self.excited_states as f64 / total as f64),
        }
    }

    fn clear(&mut self) {
        self.ground_states = 0;
        self.excited_states = 0;
    }
}

/// Dense state of `n` qubits plus the classical bookkeeping of their
/// measurements. Basis index `i` holds the amplitude of the state whose bit
/// `q` is the value of qubit `q`.
pub struct QuRegister {
    num_qubits: usize,
    amplitudes: Vec<Amplitude>,
    prediction: Vec<QubitState>,
    measurement: Vec<bool>,
    averaging: Vec<Integration>,
    averaging_enabled: bool,
    rng: StdRng,
}

impl QuRegister {
    /// Creates a register in |0...0⟩ with an entropy-seeded generator.
    pub fn new(num_qubits: usize) -> Result<Self, SimError> {
        Self::with_rng(num_qubits, StdRng::from_entropy())
    }

    /// Creates a register whose measurements are reproducible for `seed`.
    pub fn seeded(num_qubits: usize, seed: u64) -> Result<Self, SimError> {
        Self::with_rng(num_qubits, StdRng::seed_from_u64(seed))
    }

    fn with_rng(num_qubits: usize, rng: StdRng) -> Result<Self, SimError> {
        if num_qubits >= usize::BITS as usize {
            return Err(SimError::Allocation { qubits: num_qubits });
        }
        let size = 1usize << num_qubits; // 2^num_qubits
        let mut amplitudes = Vec::new();
        amplitudes
            .try_reserve_exact(size)
            .map_err(|_| SimError::Allocation { qubits: num_qubits })?;
        amplitudes.resize(size, ZERO);
        amplitudes[0] = ONE;

        debug!(num_qubits, states = size, "allocated quantum register");
        Ok(Self {
            num_qubits,
            amplitudes,
            prediction: vec![QubitState::Zero; num_qubits],
            measurement: vec![false; num_qubits],
            averaging: vec![Integration::default(); num_qubits],
            averaging_enabled: false,
            rng,
        })
    }

    pub fn num_qubits(&self) -> usize {
        self.num_qubits
    }

    /// Number of basis states, 2^n.
    pub fn states(&self) -> usize {
        self.amplitudes.len()
    }

    pub fn amplitudes(&self) -> &[Amplitude] {
        &self.amplitudes
    }

    pub(crate) fn amplitudes_mut(&mut self) -> &mut [Amplitude] {
        &mut self.amplitudes
    }

    /// Copy of the amplitudes, safe to keep across later collapses.
    pub fn state_vector(&self) -> Vec<Amplitude> {
        self.amplitudes.clone()
    }

    /// Replaces the amplitudes wholesale. The caller is responsible for
    /// normalization.
    pub fn set_amplitudes(&mut self, amplitudes: Vec<Amplitude>) -> Result<(), SimError> {
        if amplitudes.len() != self.amplitudes.len() {
            return Err(SimError::InvalidState("amplitude count does not match register size"));
        }
        self.amplitudes = amplitudes;
        Ok(())
    }

    pub(crate) fn uniform(&mut self) -> f64 {
        self.rng.gen_range(0.0..1.0)
    }

    /// Restores |0...0⟩ and clears measurement outcomes. Averaging counters
    /// are left alone.
    pub fn reset(&mut self) {
        self.amplitudes.fill(ZERO);
        self.amplitudes[0] = ONE;
        self.prediction.fill(QubitState::Zero);
        self.measurement.fill(false);
    }

    /// True when the total probability is one within
    /// [`QUBIT_ERROR_THRESHOLD`].
    pub fn check(&self) -> bool {
        let total: f64 = self.amplitudes.iter().map(|a| a.norm_sqr()).sum();
        let ok = (total - 1.0).abs() <= QUBIT_ERROR_THRESHOLD;
        if !ok {
            warn!(total, "quantum state is not normalized");
        }
        ok
    }

    pub fn normalize(&mut self) {
        let length = self
            .amplitudes
            .iter()
            .map(|a| a.norm_sqr())
            .sum::<f64>()
            .sqrt();
        if length == 0.0 {
            warn!("cannot normalize a zero state vector");
            return;
        }
        for amp in &mut self.amplitudes {
            *amp /= length;
        }
    }

    /// Forces the register into basis state `index`.
    pub fn collapse(&mut self, index: usize) -> Result<usize, SimError> {
        if index >= self.amplitudes.len() {
            return Err(SimError::InvalidState("basis index out of range"));
        }
        for (i, amp) in self.amplitudes.iter_mut().enumerate() {
            *amp = if i == index { ONE } else { ZERO };
        }
        Ok(index)
    }

    /// Samples one joint outcome for every qubit and collapses onto it.
    pub fn measure(&mut self) -> Result<usize, SimError> {
        measure::measure_all(self)
    }

    fn check_qubit(&self, q: usize) -> Result<(), SimError> {
        if q < self.num_qubits {
            Ok(())
        } else {
            Err(SimError::Qubit(q))
        }
    }

    /// Decodes `state` bit by bit into the measured and predicted values of
    /// every qubit.
    pub fn set_measurement_outcome(&mut self, state: usize) {
        for q in 0..self.num_qubits {
            let bit = (state >> q) & 1 == 1;
            self.measurement[q] = bit;
            self.prediction[q] = QubitState::from(bit);
        }
    }

    /// Sets every qubit's prediction from the bits of `state`.
    pub fn set_measurement_prediction(&mut self, state: usize) {
        for q in 0..self.num_qubits {
            self.prediction[q] = QubitState::from((state >> q) & 1 == 1);
        }
    }

    pub fn set_qubit_prediction(&mut self, q: usize, s: QubitState) -> Result<(), SimError> {
        self.check_qubit(q)?;
        self.prediction[q] = s;
        Ok(())
    }

    pub fn get_measurement_prediction(&self, q: usize) -> Result<QubitState, SimError> {
        self.check_qubit(q)?;
        Ok(self.prediction[q])
    }

    pub fn set_measurement(&mut self, q: usize, m: bool) -> Result<(), SimError> {
        self.check_qubit(q)?;
        self.measurement[q] = m;
        Ok(())
    }

    pub fn get_measurement(&self, q: usize) -> Result<bool, SimError> {
        self.check_qubit(q)?;
        Ok(self.measurement[q])
    }

    pub fn flip_measurement(&mut self, q: usize) -> Result<(), SimError> {
        self.check_qubit(q)?;
        self.measurement[q] = !self.measurement[q];
        Ok(())
    }

    /// True if qubit `q` is predicted to read one.
    pub fn test(&self, q: usize) -> Result<bool, SimError> {
        Ok(self.get_measurement_prediction(q)? == QubitState::One)
    }

    pub fn measurements(&self) -> &[bool] {
        &self.measurement
    }

    pub fn enable_measurement_averaging(&mut self) {
        self.averaging_enabled = true;
        self.clear_averaging();
    }

    pub fn reset_measurement_averaging(&mut self) {
        self.averaging_enabled = true;
        self.clear_averaging();
    }

    /// Clears the counters exactly like the other averaging controls; only
    /// the flag differs.
    pub fn disable_measurement_averaging(&mut self) {
        self.averaging_enabled = false;
        self.clear_averaging();
    }

    pub fn is_averaging_enabled(&self) -> bool {
        self.averaging_enabled
    }

    fn clear_averaging(&mut self) {
        self.averaging.iter_mut().for_each(Integration::clear);
    }

    /// Adds the current measured value of every qubit to its tally.
    pub fn accumulate_measurement(&mut self) {
        for (tally, &bit) in self.averaging.iter_mut().zip(&self.measurement) {
            tally.record(bit);
        }
    }

    pub fn averaging(&self) -> &[Integration] {
        &self.averaging
    }

    /// Excited-state frequency of qubit `q` over the recorded trials.
    pub fn get_average_measurement(&self, q: usize) -> Result<f64, SimError> {
        self.check_qubit(q)?;
        self.averaging[q]
            .excited_fraction()
            .ok_or(SimError::MissingStatistic)
    }

    pub fn to_binary_string(&self, state: usize) -> String {
        let counter = BinaryCounter::with_value(self.num_qubits as u32, state as u64);
        (0..self.num_qubits as u32)
            .rev()
            .map(|b| if counter.test(b) { '1' } else { '0' })
            .collect()
    }

    /// Every basis state with a non-zero amplitude, rendered as
    /// `(re,im) |bits> +`.
    pub fn quantum_state(&self) -> String {
        let mut out = String::from("START\n");
        for (i, amp) in self.amplitudes.iter().enumerate() {
            if *amp != ZERO {
                let _ = writeln!(
                    out,
                    "   ({:.6},{:.6}) |{}> +",
                    flt_format(amp.re),
                    flt_format(amp.im),
                    self.to_binary_string(i)
                );
            }
        }
        out.push_str("END\n");
        out
    }

    /// Last measured value of every qubit, most significant first.
    pub fn binary_register(&self) -> String {
        let mut out = String::from("START\n");
        for &bit in self.measurement.iter().rev() {
            let _ = write!(out, " | {}", QubitState::from(bit).symbol());
        }
        out.push_str(" | \nEND\n");
        out
    }

    /// Predicted value of every qubit, most significant first.
    pub fn prediction_register(&self) -> String {
        self.prediction.iter().rev().map(|s| s.symbol()).collect()
    }

    pub fn get_state(&self, only_binary: bool) -> String {
        if only_binary {
            self.binary_register()
        } else {
            self.quantum_state()
        }
    }

    pub fn apply_single_qubit_gate(
        &mut self,
        gate_matrix: &GateMatrix,
        target_qubit: usize,
    ) -> Result<(), SimError> {
        self.apply_controlled_gate(gate_matrix, &[], target_qubit)
    }

    /// Applies `gate_matrix` to `target_qubit` on the subspace where every
    /// control qubit is one.
    pub fn apply_controlled_gate(
        &mut self,
        gate_matrix: &GateMatrix,
        controls: &[usize],
        target_qubit: usize,
    ) -> Result<(), SimError> {
        self.check_qubit(target_qubit)?;
        let mut control_mask = 0usize;
        for &c in controls {
            self.check_qubit(c)?;
            if c == target_qubit {
                return Err(SimError::Qubit(c));
            }
            control_mask |= 1 << c;
        }
        let k = 1 << target_qubit;

        for i in 0..self.amplitudes.len() {
            if (i & k) == 0 && (i & control_mask) == control_mask {
                let j = i | k;
                let amp_i = self.amplitudes[i];
                let amp_j = self.amplitudes[j];

                self.amplitudes[i] = gate_matrix[0][0] * amp_i + gate_matrix[0][1] * amp_j;
                self.amplitudes[j] = gate_matrix[1][0] * amp_i + gate_matrix[1][1] * amp_j;
            }
        }
        Ok(())
    }

    pub fn apply_swap(&mut self, a: usize, b: usize) -> Result<(), SimError> {
        self.check_qubit(a)?;
        self.check_qubit(b)?;
        if a == b {
            return Ok(());
        }
        let (mask_a, mask_b) = (1 << a, 1 << b);
        for i in 0..self.amplitudes.len() {
            if (i & mask_a) != 0 && (i & mask_b) == 0 {
                self.amplitudes.swap(i, i ^ mask_a ^ mask_b);
            }
        }
        Ok(())
    }
}

fn flt_format(x: f64) -> f64 {
    if x.abs() < f64::MIN_POSITIVE { 0.0 } else { x }
}

/// Overlap |⟨a|b⟩|² of two registers of equal size.
pub fn fidelity(a: &QuRegister, b: &QuRegister) -> Result<f64, SimError> {
    if a.num_qubits != b.num_qubits {
        return Err(SimError::InvalidState("registers differ in size"));
    }
    let overlap: Amplitude = a
        .amplitudes
        .iter()
        .zip(&b.amplitudes)
        .map(|(x, y)| x.conj() * y)
        .sum();
    Ok(overlap.norm_sqr())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_1_SQRT_2;

    const EPSILON: f64 = 1e-9;

    fn approx_eq(a: Amplitude, b: Amplitude) -> bool {
        (a.re - b.re).abs() < EPSILON && (a.im - b.im).abs() < EPSILON
    }

    const PAULI_X: GateMatrix = [[ZERO, ONE], [ONE, ZERO]];
    const HADAMARD: GateMatrix = [
        [Complex::new(FRAC_1_SQRT_2, 0.0), Complex::new(FRAC_1_SQRT_2, 0.0)],
        [Complex::new(FRAC_1_SQRT_2, 0.0), Complex::new(-FRAC_1_SQRT_2, 0.0)],
    ];

    #[test]
    fn test_fresh_register_is_ground_state() {
        for n in 1..=20 {
            let reg = QuRegister::seeded(n, 1).unwrap();
            assert_eq!(reg.states(), 1 << n);
            assert!(approx_eq(reg.amplitudes()[0], ONE));
            assert!(reg.amplitudes()[1..].iter().all(|a| *a == ZERO));
            assert!(reg.check());
        }
    }

    #[test]
    fn test_oversized_register_fails_to_allocate() {
        assert!(matches!(
            QuRegister::new(64),
            Err(SimError::Allocation { qubits: 64 })
        ));
    }

    #[test]
    fn test_reset_restores_initial_state_but_keeps_counters() {
        let mut reg = QuRegister::seeded(2, 7).unwrap();
        reg.apply_single_qubit_gate(&PAULI_X, 1).unwrap();
        reg.measure().unwrap();
        reg.accumulate_measurement();
        assert!(reg.get_measurement(1).unwrap());

        reg.reset();
        let fresh = QuRegister::seeded(2, 7).unwrap();
        assert_eq!(reg.amplitudes(), fresh.amplitudes());
        assert_eq!(reg.measurements(), &[false, false]);
        assert_eq!(reg.get_measurement_prediction(1).unwrap(), QubitState::Zero);
        assert_eq!(reg.averaging()[1].excited_states, 1);
    }

    #[test]
    fn test_averaging_controls_clear_counters() {
        let mut reg = QuRegister::seeded(1, 0).unwrap();
        reg.set_measurement(0, true).unwrap();
        reg.accumulate_measurement();
        reg.enable_measurement_averaging();
        assert!(reg.is_averaging_enabled());
        assert_eq!(reg.averaging()[0], Integration::default());

        reg.accumulate_measurement();
        reg.accumulate_measurement();
        reg.disable_measurement_averaging();
        assert!(!reg.is_averaging_enabled());
        assert_eq!(reg.averaging()[0].total(), 0);

        reg.accumulate_measurement();
        reg.reset_measurement_averaging();
        assert_eq!(reg.averaging()[0].total(), 0);
    }

    #[test]
    fn test_average_measurement_not_available_before_trials() {
        let mut reg = QuRegister::seeded(2, 0).unwrap();
        assert!(matches!(
            reg.get_average_measurement(0),
            Err(SimError::MissingStatistic)
        ));
        reg.set_measurement(0, true).unwrap();
        reg.accumulate_measurement();
        reg.set_measurement(0, false).unwrap();
        reg.accumulate_measurement();
        assert!((reg.get_average_measurement(0).unwrap() - 0.5).abs() < EPSILON);
        assert!(matches!(reg.get_average_measurement(2), Err(SimError::Qubit(2))));
    }

    #[test]
    fn test_normalize_rescales_to_unit_mass() {
        let mut reg = QuRegister::seeded(1, 0).unwrap();
        reg.set_amplitudes(vec![Complex::new(3.0, 0.0), Complex::new(0.0, 4.0)])
            .unwrap();
        assert!(!reg.check());
        reg.normalize();
        assert!(reg.check());
        assert!(approx_eq(reg.amplitudes()[0], Complex::new(0.6, 0.0)));
        assert!(approx_eq(reg.amplitudes()[1], Complex::new(0.0, 0.8)));
    }

    #[test]
    fn test_collapse_forces_basis_state() {
        let mut reg = QuRegister::seeded(3, 0).unwrap();
        reg.apply_single_qubit_gate(&HADAMARD, 0).unwrap();
        reg.apply_single_qubit_gate(&HADAMARD, 2).unwrap();
        assert_eq!(reg.collapse(5).unwrap(), 5);
        for (i, amp) in reg.amplitudes().iter().enumerate() {
            let expected = if i == 5 { ONE } else { ZERO };
            assert!(approx_eq(*amp, expected));
        }
        assert!(reg.collapse(8).is_err());
    }

    #[test]
    fn test_controlled_gate_acts_on_control_subspace() {
        let mut reg = QuRegister::seeded(2, 0).unwrap();
        reg.apply_single_qubit_gate(&HADAMARD, 0).unwrap();
        reg.apply_controlled_gate(&PAULI_X, &[0], 1).unwrap();
        let expected_amp = Complex::new(FRAC_1_SQRT_2, 0.0);
        assert!(approx_eq(reg.amplitudes()[0], expected_amp));
        assert!(approx_eq(reg.amplitudes()[1], ZERO));
        assert!(approx_eq(reg.amplitudes()[2], ZERO));
        assert!(approx_eq(reg.amplitudes()[3], expected_amp));
        assert!(reg.apply_controlled_gate(&PAULI_X, &[1], 1).is_err());
    }

    #[test]
    fn test_swap_exchanges_qubits() {
        let mut reg = QuRegister::seeded(3, 0).unwrap();
        reg.apply_single_qubit_gate(&PAULI_X, 0).unwrap();
        reg.apply_swap(0, 2).unwrap();
        assert!(approx_eq(reg.amplitudes()[0b100], ONE));
    }

    #[test]
    fn test_state_strings() {
        let mut reg = QuRegister::seeded(2, 0).unwrap();
        reg.apply_single_qubit_gate(&PAULI_X, 0).unwrap();
        assert_eq!(reg.get_state(false), "START\n   (1.000000,0.000000) |01> +\nEND\n");

        reg.set_measurement(1, true).unwrap();
        assert_eq!(reg.get_state(true), "START\n | 1 | 0 | \nEND\n");
    }

    #[test]
    fn test_prediction_accessors() {
        let mut reg = QuRegister::seeded(3, 0).unwrap();
        reg.set_measurement_prediction(0b110);
        assert_eq!(reg.prediction_register(), "110");
        reg.set_qubit_prediction(0, QubitState::Unknown).unwrap();
        assert_eq!(reg.prediction_register(), "11X");
        assert!(reg.test(2).unwrap());
        assert!(!reg.test(0).unwrap());
        reg.flip_measurement(0).unwrap();
        assert!(reg.get_measurement(0).unwrap());
    }

    #[test]
    fn test_fidelity() {
        let a = QuRegister::seeded(1, 0).unwrap();
        let mut b = QuRegister::seeded(1, 0).unwrap();
        assert!((fidelity(&a, &b).unwrap() - 1.0).abs() < EPSILON);
        b.apply_single_qubit_gate(&HADAMARD, 0).unwrap();
        assert!((fidelity(&a, &b).unwrap() - 0.5).abs() < EPSILON);
        let c = QuRegister::seeded(2, 0).unwrap();
        assert!(fidelity(&a, &c).is_err());
    }
}
