pub mod binary_counter;
pub mod circuit;
pub mod config;
pub mod error;
pub mod measure;
pub mod noise;
pub mod parser;
pub mod program;
pub mod register;
pub mod report;
pub mod simulator;
pub mod stats;

// Re-export key components for easier access from the binary or other libraries.
pub use binary_counter::BinaryCounter;
pub use circuit::{Circuit, Gate, Operation};
pub use config::{LogLevel, SimConfig};
pub use error::SimError;
pub use noise::{ErrorModel, noisy_dep_ch};
pub use parser::parse_program;
pub use program::{Program, load_program};
pub use register::{Amplitude, QuRegister, QubitState};
pub use report::{RunReport, emit_report};
pub use simulator::{ExecutionSummary, Phase, Simulator};
