use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use qxsim::config::init_logging;
use qxsim::{LogLevel, RunReport, SimConfig, SimError, Simulator, emit_report};
use tracing::info;

/// A classical simulator of quantum circuits
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// The cQASM program to simulate.
    input_file: PathBuf,

    /// Number of measured trials to average over; 0 runs the program once.
    #[arg(short, long, default_value_t = 0)]
    navg: usize,

    /// Estimate averages from one run over this many virtual shots instead
    /// of repeating trials.
    #[arg(short, long, conflicts_with = "navg")]
    reps: Option<u64>,

    /// Seed for every random draw, for reproducible runs.
    #[arg(short, long)]
    seed: Option<u64>,

    /// LOG_NOTHING, LOG_CRITICAL, LOG_ERROR, LOG_WARNING, LOG_INFO or LOG_DEBUG.
    #[arg(short, long, default_value = "LOG_INFO")]
    log_level: LogLevel,

    /// Include the final amplitudes in the JSON report.
    #[arg(long)]
    state: bool,

    /// Write a JSON report to this file instead of printing the state.
    #[arg(short, long)]
    output_file: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = SimConfig::default().with_log_level(cli.log_level);
    if let Some(seed) = cli.seed {
        config = config.with_seed(seed);
    }
    let mut sim = Simulator::with_config(config);
    init_logging(sim.config().log_level);
    sim.load_file(&cli.input_file)
        .with_context(|| format!("failed to load {}", cli.input_file.display()))?;

    match cli.reps {
        Some(reps) => {
            let average = sim.execute_and_get_average_measurement(reps)?;
            info!(reps, ?average, "binomial estimate");
        }
        None => {
            let summary = sim.execute(cli.navg)?;
            info!(?summary, "execution finished");
        }
    }

    if let Some(output_path) = cli.output_file {
        let report = RunReport::collect(&mut sim, cli.state)?;
        let file = File::create(&output_path)
            .with_context(|| format!("failed to create {}", output_path.display()))?;
        let mut writer = BufWriter::new(file);
        emit_report(&report, &mut writer)?;
        writer.flush()?;
        return Ok(());
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_text_report(&mut out, &mut sim, cli.navg > 0 || cli.reps.is_some())?;
    Ok(())
}

/// Prints the averages (or "not available" when no trial completed) and the
/// binary register for averaged runs, or the full and binary state otherwise.
fn write_text_report(
    out: &mut impl Write,
    sim: &mut Simulator,
    averaged: bool,
) -> anyhow::Result<()> {
    if averaged {
        writeln!(out, "Average measurement:")?;
        match sim.get_average_measurement() {
            Ok(average) => {
                for (q, p) in average.iter().enumerate() {
                    writeln!(out, "   q[{q}] : {p:.6}")?;
                }
            }
            Err(SimError::MissingStatistic) => writeln!(out, "   not available")?,
            Err(err) => return Err(err.into()),
        }
        write!(out, "{}", sim.get_state(true)?)?;
    } else {
        write!(out, "{}", sim.get_state(false)?)?;
        write!(out, "{}", sim.get_state(true)?)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use qxsim::{Circuit, ErrorModel, Gate, Program};

    fn seeded() -> Simulator {
        Simulator::with_config(SimConfig::default().with_seed(5))
    }

    #[test]
    fn test_text_report_lists_averages() {
        let mut sim = seeded();
        sim.load_source("qubits 2\nx q[1]\n").unwrap();
        sim.execute(3).unwrap();
        let mut out = Vec::new();
        write_text_report(&mut out, &mut sim, true).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("   q[0] : 0.000000\n   q[1] : 1.000000\n"));
        assert!(text.ends_with("START\n | 1 | 0 | \nEND\n"));
    }

    #[test]
    fn test_text_report_survives_missing_average() {
        let mut bad = Circuit::new("bad", 1);
        bad.add_gate(Gate::X(2));
        let mut sim = seeded();
        sim.load(Program {
            num_qubits: 1,
            circuits: vec![bad],
            error_model: ErrorModel::Perfect,
            skipped: 0,
        })
        .unwrap();
        sim.execute(4).unwrap();

        let mut out = Vec::new();
        write_text_report(&mut out, &mut sim, true).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("Average measurement:\n   not available\n"));
    }
}
