pub mod config;
pub mod dut;
pub mod error;
pub mod event;
pub mod executor;
pub mod fifo_tb;
mod junit;
pub mod prelude;
pub mod shadow;
pub mod signal;
pub mod sim;
pub mod sim_if;
pub mod tb_obj;
pub mod testbench;
pub mod trigger;
pub mod utils;
pub mod value;

use std::sync::Arc;
use std::time;
use tracing::{info, warn};

use config::TbConfig;
pub use error::{TbError, TbResult};
pub use test::{summary_table, TestRecord};

pub const CRATE_NAME: &str = env!("CARGO_PKG_NAME");

/// Validates `cfg`, then runs the selected tests one after another, each on its
/// own simulator. An empty selection runs every test.
pub fn run_tests(cfg: &mut TbConfig, selected: &[String]) -> TbResult<Vec<TestRecord>> {
    cfg.validate()?;
    let seed = cfg.resolve_seed();

    let all = fifo_tb::tests();
    if let Some(unknown) = selected.iter().find(|s| !all.iter().any(|t| &t.name == *s)) {
        return Err(TbError::Config(format!("unknown test `{}`", unknown)));
    }
    let tests: Vec<_> = all
        .into_iter()
        .filter(|t| selected.is_empty() || selected.contains(&t.name))
        .collect();

    if cfg.dut_depth() != cfg.fifo.depth {
        warn!(
            harness = cfg.fifo.depth,
            dut = cfg.dut_depth(),
            "DUT depth differs from the shadow model depth"
        );
    }
    info!(seed, tests = tests.len(), "start of simulation");

    let sim_start = time::Instant::now();
    let cfg = Arc::new(cfg.clone());
    let records: Vec<_> = tests.iter().map(|t| test::run_test(t, &cfg)).collect();
    end_of_simulation(&records, &cfg, sim_start.elapsed().as_secs_f64())?;
    Ok(records)
}

fn end_of_simulation(records: &[TestRecord], cfg: &TbConfig, duration: f64) -> TbResult<()> {
    for r in records {
        info!(
            "TEST {}: Result={}, Time={:.3}, SimTime={}ns, SimSpeed={:.3}ns/s",
            r.name,
            if r.passed() { "passed" } else { "failed" },
            r.time_secs,
            r.sim_time_ns,
            r.sim_speed()
        );
    }
    let final_sim_time: f64 = records.iter().map(|r| r.sim_time_ns).sum();
    info!("TOTAL SIMULATION");
    info!("Simulation time: {} ns", final_sim_time);
    info!("Real time: {:.3} s", duration);
    if duration > 0.0 {
        info!("Simulation speed: {:.3} ns/s", final_sim_time / duration);
    }

    if let Some(path) = &cfg.junit {
        junit::create_junit_xml(CRATE_NAME, records, path)?;
        info!(path = %path.display(), "junit report written");
    }
    Ok(())
}
