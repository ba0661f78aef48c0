/// Errors raised by the simulation engine and its front end.
#[derive(thiserror::Error, Debug)]
pub enum SimError {
    #[error("not enough memory for a register of {qubits} qubits")]
    Allocation { qubits: usize },
    #[error("parse error on line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("unsupported gate: {0}")]
    UnsupportedGate(String),
    #[error("invalid qubit index: {0}")]
    Qubit(usize),
    #[error("cannot measure an empty register")]
    EmptyRegister,
    #[error("average measurement not available")]
    MissingStatistic,
    #[error("invalid error probability: {0}")]
    InvalidProbability(f64),
    #[error("invalid simulator state: {0}")]
    InvalidState(&'static str),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
