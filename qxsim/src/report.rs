use std::io::Write;

use serde::Serialize;

use crate::error::SimError;
use crate::noise::ErrorModel;
use crate::register::{Amplitude, Integration};
use crate::simulator::{ExecutionSummary, Simulator};

/// Everything a finished run reports, ready for JSON output.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub num_qubits: usize,
    pub error_model: ErrorModel,
    #[serde(flatten)]
    pub summary: ExecutionSummary,
    /// Last measured value of each qubit, in qubit order.
    pub measurements: Vec<bool>,
    pub binary_outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub counts: Vec<Integration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_vector: Option<Vec<Amplitude>>,
}

impl RunReport {
    /// Collects the report of the simulator's last run.
    pub fn collect(sim: &mut Simulator, include_state: bool) -> Result<Self, SimError> {
        let summary = sim
            .last_summary()
            .ok_or(SimError::InvalidState("program not executed"))?;
        let average = match sim.get_average_measurement() {
            Ok(average) => Some(average),
            Err(SimError::MissingStatistic) => None,
            Err(err) => return Err(err),
        };
        let state_vector = if include_state {
            Some(sim.get_state_vector()?)
        } else {
            None
        };
        let error_model = sim.program().map(|p| p.error_model).unwrap_or_default();
        let reg = sim
            .register()
            .ok_or(SimError::InvalidState("no register"))?;

        Ok(Self {
            num_qubits: reg.num_qubits(),
            error_model,
            summary,
            measurements: reg.measurements().to_vec(),
            binary_outcome: reg
                .measurements()
                .iter()
                .rev()
                .map(|&b| if b { '1' } else { '0' })
                .collect(),
            average,
            counts: if summary.trials.is_some() {
                reg.averaging().to_vec()
            } else {
                Vec::new()
            },
            state_vector,
        })
    }
}

/// Serializes the report and writes it to `writer` as one JSON document.
pub fn emit_report(report: &RunReport, writer: &mut impl Write) -> Result<(), SimError> {
    let json_output = serde_json::to_string_pretty(report)
        .map_err(|e| SimError::Io(std::io::Error::other(e)))?;
    writeln!(writer, "{json_output}")?;
    Ok(())
}
