use std::f64::consts::{FRAC_1_SQRT_2, FRAC_PI_4};
use std::fmt;

use num_complex::Complex;

use crate::error::SimError;
use crate::measure;
use crate::register::{GateMatrix, QuRegister};

/// Anything that can be applied to a register. An implementation that
/// returns an error must leave the register untouched.
pub trait Operation {
    fn apply(&self, reg: &mut QuRegister) -> Result<(), SimError>;
}

pub const HADAMARD: GateMatrix = [
    [
        Complex::new(FRAC_1_SQRT_2, 0.0),
        Complex::new(FRAC_1_SQRT_2, 0.0),
    ],
    [
        Complex::new(FRAC_1_SQRT_2, 0.0),
        Complex::new(-FRAC_1_SQRT_2, 0.0),
    ],
];

pub const PAULI_X: GateMatrix = [
    [Complex::new(0.0, 0.0), Complex::new(1.0, 0.0)],
    [Complex::new(1.0, 0.0), Complex::new(0.0, 0.0)],
];

pub const PAULI_Y: GateMatrix = [
    [Complex::new(0.0, 0.0), Complex::new(0.0, -1.0)],
    [Complex::new(0.0, 1.0), Complex::new(0.0, 0.0)],
];

pub const PAULI_Z: GateMatrix = [
    [Complex::new(1.0, 0.0), Complex::new(0.0, 0.0)],
    [Complex::new(0.0, 0.0), Complex::new(-1.0, 0.0)],
];

fn phase(theta: f64) -> GateMatrix {
    [
        [Complex::new(1.0, 0.0), Complex::new(0.0, 0.0)],
        [Complex::new(0.0, 0.0), Complex::from_polar(1.0, theta)],
    ]
}

fn rotation_x(theta: f64) -> GateMatrix {
    // Rx(θ) = cos(θ/2) I - i sin(θ/2) X
    let (st, ct) = (theta * 0.5).sin_cos();
    [
        [Complex::new(ct, 0.0), Complex::new(0.0, -st)],
        [Complex::new(0.0, -st), Complex::new(ct, 0.0)],
    ]
}

fn rotation_y(theta: f64) -> GateMatrix {
    let (st, ct) = (theta * 0.5).sin_cos();
    [
        [Complex::new(ct, 0.0), Complex::new(-st, 0.0)],
        [Complex::new(st, 0.0), Complex::new(ct, 0.0)],
    ]
}

fn rotation_z(theta: f64) -> GateMatrix {
    // Rz(θ) = diag(e^{-iθ/2}, e^{+iθ/2})
    let (st, ct) = (theta * 0.5).sin_cos();
    [
        [Complex::new(ct, -st), Complex::new(0.0, 0.0)],
        [Complex::new(0.0, 0.0), Complex::new(ct, st)],
    ]
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gate {
    I(usize),
    H(usize),
    X(usize),
    Y(usize),
    Z(usize),
    S(usize),
    Sdag(usize),
    T(usize),
    Tdag(usize),
    RX(usize, f64), // RX gate with angle
    RY(usize, f64), // RY gate with angle
    RZ(usize, f64), // RZ gate with angle
    CNOT(usize, usize),
    CZ(usize, usize),
    Swap(usize, usize),
    Toffoli(usize, usize, usize),
    PrepZ(usize),
    Measure(usize),
    MeasureAll,
}

impl Gate {
    pub fn qubits(&self) -> Vec<usize> {
        match *self {
            Gate::I(q)
            | Gate::H(q)
            | Gate::X(q)
            | Gate::Y(q)
            | Gate::Z(q)
            | Gate::S(q)
            | Gate::Sdag(q)
            | Gate::T(q)
            | Gate::Tdag(q)
            | Gate::RX(q, _)
            | Gate::RY(q, _)
            | Gate::RZ(q, _)
            | Gate::PrepZ(q)
            | Gate::Measure(q) => vec![q],
            Gate::CNOT(a, b) | Gate::CZ(a, b) | Gate::Swap(a, b) => vec![a, b],
            Gate::Toffoli(a, b, c) => vec![a, b, c],
            Gate::MeasureAll => Vec::new(),
        }
    }

    /// Checks the qubit operands against a register of `num_qubits` qubits.
    pub fn validate(&self, num_qubits: usize) -> Result<(), SimError> {
        let qubits = self.qubits();
        for (i, &q) in qubits.iter().enumerate() {
            if q >= num_qubits || qubits[..i].contains(&q) {
                return Err(SimError::Qubit(q));
            }
        }
        Ok(())
    }
}

impl Operation for Gate {
    fn apply(&self, reg: &mut QuRegister) -> Result<(), SimError> {
        self.validate(reg.num_qubits())?;
        match *self {
            Gate::I(_) => Ok(()),
            Gate::H(q) => reg.apply_single_qubit_gate(&HADAMARD, q),
            Gate::X(q) => reg.apply_single_qubit_gate(&PAULI_X, q),
            Gate::Y(q) => reg.apply_single_qubit_gate(&PAULI_Y, q),
            Gate::Z(q) => reg.apply_single_qubit_gate(&PAULI_Z, q),
            Gate::S(q) => reg.apply_single_qubit_gate(&phase(2.0 * FRAC_PI_4), q),
            Gate::Sdag(q) => reg.apply_single_qubit_gate(&phase(-2.0 * FRAC_PI_4), q),
            Gate::T(q) => reg.apply_single_qubit_gate(&phase(FRAC_PI_4), q),
            Gate::Tdag(q) => reg.apply_single_qubit_gate(&phase(-FRAC_PI_4), q),
            Gate::RX(q, theta) => reg.apply_single_qubit_gate(&rotation_x(theta), q),
            Gate::RY(q, theta) => reg.apply_single_qubit_gate(&rotation_y(theta), q),
            Gate::RZ(q, theta) => reg.apply_single_qubit_gate(&rotation_z(theta), q),
            Gate::CNOT(c, t) => reg.apply_controlled_gate(&PAULI_X, &[c], t),
            Gate::CZ(c, t) => reg.apply_controlled_gate(&PAULI_Z, &[c], t),
            Gate::Swap(a, b) => reg.apply_swap(a, b),
            Gate::Toffoli(c1, c2, t) => reg.apply_controlled_gate(&PAULI_X, &[c1, c2], t),
            Gate::PrepZ(q) => {
                if measure::measure_qubit(reg, q)? {
                    reg.apply_single_qubit_gate(&PAULI_X, q)?;
                    reg.set_measurement(q, false)?;
                    reg.set_qubit_prediction(q, false.into())?;
                }
                Ok(())
            }
            Gate::Measure(q) => measure::measure_qubit(reg, q).map(|_| ()),
            Gate::MeasureAll => measure::measure_all(reg).map(|_| ()),
        }
    }
}

impl fmt::Display for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Gate::I(q) => write!(f, "i q[{q}]"),
            Gate::H(q) => write!(f, "h q[{q}]"),
            Gate::X(q) => write!(f, "x q[{q}]"),
            Gate::Y(q) => write!(f, "y q[{q}]"),
            Gate::Z(q) => write!(f, "z q[{q}]"),
            Gate::S(q) => write!(f, "s q[{q}]"),
            Gate::Sdag(q) => write!(f, "sdag q[{q}]"),
            Gate::T(q) => write!(f, "t q[{q}]"),
            Gate::Tdag(q) => write!(f, "tdag q[{q}]"),
            Gate::RX(q, theta) => write!(f, "rx q[{q}], {theta}"),
            Gate::RY(q, theta) => write!(f, "ry q[{q}], {theta}"),
            Gate::RZ(q, theta) => write!(f, "rz q[{q}], {theta}"),
            Gate::CNOT(c, t) => write!(f, "cnot q[{c}], q[{t}]"),
            Gate::CZ(c, t) => write!(f, "cz q[{c}], q[{t}]"),
            Gate::Swap(a, b) => write!(f, "swap q[{a}], q[{b}]"),
            Gate::Toffoli(a, b, c) => write!(f, "toffoli q[{a}], q[{b}], q[{c}]"),
            Gate::PrepZ(q) => write!(f, "prep_z q[{q}]"),
            Gate::Measure(q) => write!(f, "measure q[{q}]"),
            Gate::MeasureAll => write!(f, "measure_all"),
        }
    }
}

/// An ordered run of gates, repeated `iterations` times when executed.
#[derive(Debug, Clone, PartialEq)]
pub struct Circuit {
    name: String,
    num_qubits: usize,
    gates: Vec<Gate>,
    iterations: usize,
}

impl Circuit {
    pub fn new(name: impl Into<String>, num_qubits: usize) -> Self {
        Self {
            name: name.into(),
            num_qubits,
            gates: Vec::new(),
            iterations: 1,
        }
    }

    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations.max(1);
        self
    }

    pub fn add_gate(&mut self, gate: Gate) {
        self.gates.push(gate);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn num_qubits(&self) -> usize {
        self.num_qubits
    }

    pub fn gates(&self) -> &[Gate] {
        &self.gates
    }

    /// Number of operations in one pass.
    pub fn size(&self) -> usize {
        self.gates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gates.is_empty()
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Runs every iteration of the circuit.
    pub fn execute(&self, reg: &mut QuRegister) -> Result<(), SimError> {
        for _ in 0..self.iterations {
            self.apply(reg)?;
        }
        Ok(())
    }
}

impl Operation for Circuit {
    /// Runs a single pass. Every gate is validated up front so a bad operand
    /// fails before the register changes.
    fn apply(&self, reg: &mut QuRegister) -> Result<(), SimError> {
        for gate in &self.gates {
            gate.validate(reg.num_qubits())?;
        }
        for gate in &self.gates {
            gate.apply(reg)?;
        }
        Ok(())
    }
}
