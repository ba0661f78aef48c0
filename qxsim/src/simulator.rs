use std::fs;
use std::path::Path;

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::SimConfig;
use crate::error::SimError;
use crate::noise::ErrorModel;
use crate::parser::parse_program;
use crate::program::{Program, load_program};
use crate::register::{Amplitude, QuRegister};
use crate::stats::{self, TrialSummary};

/// Where the driver is in a run. Runs only move forward; executing again
/// starts over from `Parsed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Parsed,
    Executed,
    Reported,
}

/// What one call to [`Simulator::execute`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSummary {
    pub circuits: usize,
    pub skipped_circuits: usize,
    pub injected_errors: usize,
    pub trials: Option<TrialSummary>,
}

/// Drives a loaded program against a register: a single exact run, repeated
/// trials with averaging, or a single run followed by a binomial estimate.
pub struct Simulator {
    config: SimConfig,
    program: Option<Program>,
    register: Option<QuRegister>,
    phase: Phase,
    total_errors: usize,
    average: Option<Vec<f64>>,
    last_summary: Option<ExecutionSummary>,
    rng: StdRng,
}

impl Default for Simulator {
    fn default() -> Self {
        Self::with_config(SimConfig::default())
    }
}

impl Simulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: SimConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(1)),
            None => StdRng::from_entropy(),
        };
        Self {
            config,
            program: None,
            register: None,
            phase: Phase::Idle,
            total_errors: 0,
            average: None,
            last_summary: None,
            rng,
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn program(&self) -> Option<&Program> {
        self.program.as_ref()
    }

    pub fn register(&self) -> Option<&QuRegister> {
        self.register.as_ref()
    }

    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<&Program, SimError> {
        let src = fs::read_to_string(path.as_ref())?;
        info!(path = %path.as_ref().display(), "parsing program");
        self.load_source(&src)
    }

    pub fn load_source(&mut self, src: &str) -> Result<&Program, SimError> {
        let ast = parse_program(src)?;
        self.load(load_program(&ast)?)
    }

    /// Installs an already resolved program, discarding any previous run.
    pub fn load(&mut self, program: Program) -> Result<&Program, SimError> {
        self.register = None;
        self.average = None;
        self.last_summary = None;
        self.total_errors = 0;
        self.phase = Phase::Parsed;
        Ok(self.program.insert(program))
    }

    fn allocate(&mut self, num_qubits: usize) -> Result<QuRegister, SimError> {
        info!(num_qubits, "creating quantum register");
        let reg = match self.config.seed {
            Some(seed) => QuRegister::seeded(num_qubits, seed),
            None => QuRegister::new(num_qubits),
        };
        reg.inspect_err(|err| tracing::error!(%err, "aborting run"))
    }

    /// Runs the loaded program. `navg == 0` executes once and leaves the
    /// final state in the register; otherwise `navg` trials are measured and
    /// their outcomes averaged per qubit.
    pub fn execute(&mut self, navg: usize) -> Result<ExecutionSummary, SimError> {
        let Some(program) = self.program.take() else {
            return Err(SimError::InvalidState("no program loaded"));
        };
        let result = self.run(&program, navg);
        self.program = Some(program);
        result
    }

    fn run(&mut self, program: &Program, navg: usize) -> Result<ExecutionSummary, SimError> {
        self.phase = Phase::Parsed;
        self.average = None;
        self.last_summary = None;
        self.total_errors = 0;
        // a failed allocation leaves no register behind
        self.register = None;
        let mut reg = self.allocate(program.num_qubits)?;

        let trials = if navg > 0 {
            let summary = stats::run_trials(
                &mut reg,
                &program.circuits,
                program.error_model,
                navg,
                &mut self.total_errors,
                &mut self.rng,
            );
            match stats::average_measurement(&reg) {
                Ok(average) => {
                    info!(navg, ?average, "average measurement");
                    self.average = Some(average);
                }
                Err(err) => warn!(%err, "no trial completed"),
            }
            Some(summary)
        } else {
            if let Err(err) = stats::execute_circuits(
                &mut reg,
                &program.circuits,
                program.error_model,
                &mut self.total_errors,
                &mut self.rng,
            ) {
                warn!(%err, "execution stopped early");
            }
            None
        };

        if let ErrorModel::DepolarizingChannel { probability } = program.error_model {
            info!(probability, injected = self.total_errors, "depolarizing channel applied");
        }
        let summary = ExecutionSummary {
            circuits: program.circuits.len(),
            skipped_circuits: program.skipped,
            injected_errors: self.total_errors,
            trials,
        };
        self.register = Some(reg);
        self.last_summary = Some(summary);
        self.phase = Phase::Executed;
        Ok(summary)
    }

    /// Single noiseless-style execution followed by a binomial estimate of
    /// the per-qubit excited probabilities over `reps` virtual shots. The
    /// register's amplitudes are overwritten by the resample.
    pub fn execute_and_get_average_measurement(&mut self, reps: u64) -> Result<Vec<f64>, SimError> {
        self.execute(0)?;
        let batch_size = self.config.batch_size;
        let reg = self
            .register
            .as_mut()
            .ok_or(SimError::InvalidState("no register"))?;
        let average = stats::resampled_average(reg, reps, batch_size, &mut self.rng);
        self.average = Some(average.clone());
        self.phase = Phase::Reported;
        Ok(average)
    }

    fn executed_register(&mut self) -> Result<&QuRegister, SimError> {
        match self.phase {
            Phase::Executed | Phase::Reported => {
                self.phase = Phase::Reported;
                self.register
                    .as_ref()
                    .ok_or(SimError::InvalidState("no register"))
            }
            Phase::Idle | Phase::Parsed => Err(SimError::InvalidState("program not executed")),
        }
    }

    pub fn get_measurement_outcome(&mut self, q: usize) -> Result<bool, SimError> {
        self.executed_register()?.get_measurement(q)
    }

    pub fn get_state(&mut self, only_binary: bool) -> Result<String, SimError> {
        Ok(self.executed_register()?.get_state(only_binary))
    }

    /// Copy of the final amplitudes.
    pub fn get_state_vector(&mut self) -> Result<Vec<Amplitude>, SimError> {
        Ok(self.executed_register()?.state_vector())
    }

    /// Per-qubit averages from the last averaged run.
    pub fn get_average_measurement(&mut self) -> Result<Vec<f64>, SimError> {
        self.executed_register()?;
        self.average.clone().ok_or(SimError::MissingStatistic)
    }

    pub fn last_summary(&self) -> Option<ExecutionSummary> {
        self.last_summary
    }

    pub fn total_errors(&self) -> usize {
        self.total_errors
    }

    pub fn skipped_circuits(&self) -> usize {
        self.program.as_ref().map_or(0, |p| p.skipped)
    }
}
