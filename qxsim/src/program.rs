use tracing::{info, warn};

use crate::circuit::{Circuit, Gate};
use crate::error::SimError;
use crate::noise::ErrorModel;
use crate::parser::{Instruction, ProgramAst, SubCircuitAst};

/// A parsed program resolved into executable circuits.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub num_qubits: usize,
    pub circuits: Vec<Circuit>,
    pub error_model: ErrorModel,
    /// Sub-circuits dropped because they held an unsupported operation.
    pub skipped: usize,
}

impl Program {
    /// Operations per run, counting every iteration.
    pub fn operation_count(&self) -> usize {
        self.circuits.iter().map(|c| c.size() * c.iterations()).sum()
    }
}

/// Resolves every sub-circuit. A sub-circuit with an unknown gate or a bad
/// operand is skipped as a whole and counted; the rest still load.
pub fn load_program(ast: &ProgramAst) -> Result<Program, SimError> {
    let mut circuits = Vec::with_capacity(ast.subcircuits.len());
    let mut skipped = 0;

    for sub in &ast.subcircuits {
        match load_circuit(ast.num_qubits, sub) {
            Ok(circuit) => circuits.push(circuit),
            Err(err) => {
                warn!(subcircuit = %sub.name, %err, "skipping sub-circuit");
                skipped += 1;
            }
        }
    }

    let error_model = match &ast.error_model {
        None => ErrorModel::Perfect,
        Some(model) => ErrorModel::from_name(&model.name, &model.params)?.unwrap_or_else(|| {
            warn!(model = %model.name, "unknown error model, running without noise");
            ErrorModel::Perfect
        }),
    };

    info!(loaded = circuits.len(), skipped, "loaded circuits");
    Ok(Program {
        num_qubits: ast.num_qubits,
        circuits,
        error_model,
        skipped,
    })
}

pub fn load_circuit(num_qubits: usize, sub: &SubCircuitAst) -> Result<Circuit, SimError> {
    let mut circuit = Circuit::new(sub.name.clone(), num_qubits).with_iterations(sub.iterations);
    for instruction in &sub.instructions {
        let gate = gate_from_instruction(instruction)?;
        gate.validate(num_qubits)?;
        circuit.add_gate(gate);
    }
    Ok(circuit)
}

pub fn gate_from_instruction(ins: &Instruction) -> Result<Gate, SimError> {
    let unsupported = || SimError::UnsupportedGate(format!("{} (line {})", ins.name, ins.line));
    let q = ins.qubits.as_slice();
    let p = ins.params.as_slice();

    let gate = match (ins.name.as_str(), q, p) {
        ("i", &[a], []) => Gate::I(a),
        ("h", &[a], []) => Gate::H(a),
        ("x", &[a], []) => Gate::X(a),
        ("y", &[a], []) => Gate::Y(a),
        ("z", &[a], []) => Gate::Z(a),
        ("s", &[a], []) => Gate::S(a),
        ("sdag", &[a], []) => Gate::Sdag(a),
        ("t", &[a], []) => Gate::T(a),
        ("tdag", &[a], []) => Gate::Tdag(a),
        ("rx", &[a], &[theta]) => Gate::RX(a, theta),
        ("ry", &[a], &[theta]) => Gate::RY(a, theta),
        ("rz", &[a], &[theta]) => Gate::RZ(a, theta),
        ("cnot" | "cx", &[c, t], []) => Gate::CNOT(c, t),
        ("cz", &[c, t], []) => Gate::CZ(c, t),
        ("swap", &[a, b], []) => Gate::Swap(a, b),
        ("toffoli", &[c1, c2, t], []) => Gate::Toffoli(c1, c2, t),
        ("prep_z" | "prep", &[a], []) => Gate::PrepZ(a),
        ("measure" | "measure_z", &[a], []) => Gate::Measure(a),
        ("measure_all", [], []) => Gate::MeasureAll,
        _ => return Err(unsupported()),
    };
    Ok(gate)
}
