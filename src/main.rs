//! FIFO testbench runner
//!
//! Runs the randomized FIFO tests against the built-in behavioral DUT.
//!
//! Usage:
//!   cargo run --bin fifo-tb -- --config fifo.toml
//!   cargo run --bin fifo-tb -- --test fifo_burst --seed 42 --junit results.xml

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use rstb_fifo::config::{FlagSeverity, TbConfig};
use rstb_fifo::{run_tests, summary_table};

#[derive(Parser, Debug)]
#[command(name = "fifo-tb")]
#[command(about = "Randomized concurrent verification of a hardware FIFO")]
struct Args {
    /// TOML configuration file; flags below override it
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Simulator backend
    #[arg(long, env = "SIM")]
    sim: Option<String>,

    /// Seed for the writer and reader random streams
    #[arg(long, env = "RANDOM_SEED")]
    seed: Option<u64>,

    /// Capacity of the shadow model
    #[arg(long)]
    depth: Option<usize>,

    /// Capacity of the DUT, defaults to --depth
    #[arg(long)]
    dut_depth: Option<usize>,

    #[arg(long)]
    writer_transactions: Option<u32>,

    #[arg(long)]
    writer_max_delay: Option<u32>,

    #[arg(long)]
    reader_transactions: Option<u32>,

    #[arg(long)]
    reader_max_delay: Option<u32>,

    /// Cycles between status checks
    #[arg(long)]
    monitor_interval: Option<u32>,

    /// Cycles after which the status monitor stops on its own
    #[arg(long)]
    monitor_timeout: Option<u32>,

    /// `soft` logs flag mismatches, `hard` also fails the test on them
    #[arg(long)]
    flag_severity: Option<FlagSeverity>,

    /// Test to run, repeatable; runs all tests when omitted
    #[arg(long = "test")]
    tests: Vec<String>,

    /// Write a JUnit XML report to this path
    #[arg(long)]
    junit: Option<PathBuf>,

    /// DUT fault: corrupt every n-th stored item
    #[arg(long)]
    corrupt_every: Option<u64>,

    /// DUT fault: drop every n-th accepted push
    #[arg(long)]
    drop_every: Option<u64>,

    /// DUT fault: keep `full` asserted
    #[arg(long)]
    stuck_full: bool,
}

impl Args {
    fn apply(&self, cfg: &mut TbConfig) {
        if let Some(sim) = &self.sim {
            cfg.sim = sim.clone();
        }
        if self.seed.is_some() {
            cfg.seed = self.seed;
        }
        if let Some(depth) = self.depth {
            cfg.fifo.depth = depth;
        }
        if self.dut_depth.is_some() {
            cfg.dut.depth = self.dut_depth;
        }
        if let Some(n) = self.writer_transactions {
            cfg.writer.transactions = n;
        }
        if let Some(d) = self.writer_max_delay {
            cfg.writer.max_delay = d;
        }
        if let Some(n) = self.reader_transactions {
            cfg.reader.transactions = n;
        }
        if let Some(d) = self.reader_max_delay {
            cfg.reader.max_delay = d;
        }
        if let Some(i) = self.monitor_interval {
            cfg.monitor.interval = i;
        }
        if let Some(t) = self.monitor_timeout {
            cfg.monitor.timeout = t;
        }
        if let Some(s) = self.flag_severity {
            cfg.monitor.flag_severity = s;
        }
        if self.junit.is_some() {
            cfg.junit = self.junit.clone();
        }
        if self.corrupt_every.is_some() {
            cfg.dut.faults.corrupt_every = self.corrupt_every;
        }
        if self.drop_every.is_some() {
            cfg.dut.faults.drop_every = self.drop_every;
        }
        if self.stuck_full {
            cfg.dut.faults.stuck_full = true;
        }
    }
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut cfg = match &args.config {
        Some(path) => TbConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => TbConfig::default(),
    };
    args.apply(&mut cfg);

    let records = run_tests(&mut cfg, &args.tests).context("Failed to start simulation")?;
    summary_table(&records).printstd();

    let failed = records.iter().filter(|r| !r.passed()).count();
    if failed == 0 {
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!("{} of {} tests failed (seed {})", failed, records.len(), cfg.seed.unwrap_or_default());
        Ok(ExitCode::FAILURE)
    }
}
