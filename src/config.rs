use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::dut::Faults;
use crate::error::{TbError, TbResult};

/// What the status monitor does when a DUT flag disagrees with the shadow model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagSeverity {
    /// Log the mismatch and carry on.
    #[default]
    Soft,
    /// Log it and count it as an error, which fails the test.
    Hard,
}

impl FromStr for FlagSeverity {
    type Err = TbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "soft" => Ok(FlagSeverity::Soft),
            "hard" => Ok(FlagSeverity::Hard),
            _ => Err(TbError::Config(format!(
                "flag severity must be `soft` or `hard`, got `{}`",
                s
            ))),
        }
    }
}

impl fmt::Display for FlagSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlagSeverity::Soft => write!(f, "soft"),
            FlagSeverity::Hard => write!(f, "hard"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FifoConfig {
    pub depth: usize,
    pub width: u32,
}

impl Default for FifoConfig {
    fn default() -> Self {
        FifoConfig { depth: 16, width: 8 }
    }
}

impl FifoConfig {
    /// Largest value `din` can carry.
    pub fn data_max(&self) -> u64 {
        if self.width >= 64 {
            u64::MAX
        } else {
            (1 << self.width) - 1
        }
    }
}

/// The behavioral design the kernel simulates.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DutConfig {
    pub name: String,
    /// Defaults to the harness depth. Nothing checks that they agree.
    pub depth: Option<usize>,
    pub faults: Faults,
}

impl Default for DutConfig {
    fn default() -> Self {
        DutConfig {
            name: "fifo".to_string(),
            depth: None,
            faults: Faults::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DriverConfig {
    pub transactions: u32,
    /// Upper bound of the random wait before each attempt, in clock cycles.
    pub max_delay: u32,
}

impl Default for DriverConfig {
    fn default() -> Self {
        DriverConfig {
            transactions: 200,
            max_delay: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MonitorConfig {
    pub interval: u32,
    pub timeout: u32,
    pub flag_severity: FlagSeverity,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        MonitorConfig {
            interval: 100,
            timeout: 5000,
            flag_severity: FlagSeverity::Soft,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TbConfig {
    /// Simulator backend. Only the built-in `model` kernel exists.
    pub sim: String,
    pub seed: Option<u64>,
    /// Simulator time precision as a power of ten of seconds.
    pub precision: i8,
    pub clock_period_ns: u64,
    pub reset_cycles: u32,
    /// Upper bound for a whole test, in clock cycles.
    pub watchdog_cycles: u64,
    pub junit: Option<PathBuf>,
    pub fifo: FifoConfig,
    pub dut: DutConfig,
    pub writer: DriverConfig,
    pub reader: DriverConfig,
    pub monitor: MonitorConfig,
}

impl Default for TbConfig {
    fn default() -> Self {
        TbConfig {
            sim: "model".to_string(),
            seed: None,
            precision: -12,
            clock_period_ns: 10,
            reset_cycles: 2,
            watchdog_cycles: 100_000,
            junit: None,
            fifo: FifoConfig::default(),
            dut: DutConfig::default(),
            writer: DriverConfig::default(),
            reader: DriverConfig::default(),
            monitor: MonitorConfig::default(),
        }
    }
}

impl TbConfig {
    pub fn from_toml_str(s: &str) -> TbResult<Self> {
        toml::from_str(s).map_err(|e| TbError::Config(e.to_string()))
    }

    pub fn from_file(path: &Path) -> TbResult<Self> {
        let s = std::fs::read_to_string(path)?;
        Self::from_toml_str(&s)
    }

    pub fn dut_depth(&self) -> usize {
        self.dut.depth.unwrap_or(self.fifo.depth)
    }

    /// Picks a random seed if none is configured and returns the one in use.
    pub fn resolve_seed(&mut self) -> u64 {
        *self.seed.get_or_insert_with(rand::random)
    }

    /// Checks every precondition that has to hold before stimulus starts.
    pub fn validate(&self) -> TbResult<()> {
        let fail = |msg: String| Err(TbError::Config(msg));
        if self.sim != "model" {
            return fail(format!(
                "unsupported simulator `{}`, only `model` is built in",
                self.sim
            ));
        }
        if self.fifo.depth == 0 {
            return fail("fifo.depth must be at least 1".into());
        }
        if !(1..=64).contains(&self.fifo.width) {
            return fail(format!("fifo.width must be in 1..=64, got {}", self.fifo.width));
        }
        if self.dut.depth == Some(0) {
            return fail("dut.depth must be at least 1".into());
        }
        if self.writer.max_delay == 0 || self.reader.max_delay == 0 {
            return fail("driver max_delay must be at least 1 cycle".into());
        }
        if self.monitor.interval == 0 {
            return fail("monitor.interval must be at least 1 cycle".into());
        }
        if self.clock_period_ns < 2 {
            return fail("clock_period_ns must be at least 2".into());
        }
        if self.watchdog_cycles == 0 {
            return fail("watchdog_cycles must be at least 1".into());
        }
        crate::sim_if::scale_time(self.precision)?;
        if self.precision > -9 {
            return fail(format!(
                "precision 1e{} s is too coarse for a clock given in ns",
                self.precision
            ));
        }
        let steps_per_ns = 10_u64.pow((-9 - self.precision) as u32);
        let watchdog_steps = self
            .clock_period_ns
            .checked_mul(self.watchdog_cycles)
            .and_then(|ns| ns.checked_mul(steps_per_ns));
        if watchdog_steps.is_none() {
            return fail(format!(
                "watchdog of {} cycles at {} ns does not fit the simulator time range",
                self.watchdog_cycles, self.clock_period_ns
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_run() {
        let cfg = TbConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, TbConfig::default());
        assert_eq!(cfg.fifo.depth, 16);
        assert_eq!(cfg.writer, DriverConfig { transactions: 200, max_delay: 2 });
        assert_eq!(cfg.reader, DriverConfig { transactions: 200, max_delay: 2 });
        assert_eq!(cfg.monitor.interval, 100);
        assert_eq!(cfg.monitor.timeout, 5000);
        assert_eq!(cfg.monitor.flag_severity, FlagSeverity::Soft);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn parses_partial_file() {
        let cfg = TbConfig::from_toml_str(
            r#"
            seed = 42
            [fifo]
            depth = 4
            [reader]
            max_delay = 7
            [monitor]
            flag_severity = "hard"
            [dut.faults]
            corrupt_every = 5
            "#,
        )
        .unwrap();
        assert_eq!(cfg.seed, Some(42));
        assert_eq!(cfg.fifo.depth, 4);
        assert_eq!(cfg.fifo.width, 8);
        assert_eq!(cfg.reader.max_delay, 7);
        assert_eq!(cfg.reader.transactions, 200);
        assert_eq!(cfg.monitor.flag_severity, FlagSeverity::Hard);
        assert_eq!(cfg.dut.faults.corrupt_every, Some(5));
        assert_eq!(cfg.dut_depth(), 4);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(matches!(
            TbConfig::from_toml_str("[fifo]\ndepht = 3\n"),
            Err(TbError::Config(_))
        ));
    }

    #[test]
    fn validation_fails_fast() {
        let mut cfg = TbConfig::default();
        cfg.fifo.depth = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = TbConfig::default();
        cfg.writer.max_delay = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = TbConfig::default();
        cfg.sim = "icarus".into();
        assert!(cfg.validate().is_err());

        let mut cfg = TbConfig::default();
        cfg.precision = -7;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn oversized_watchdog_is_rejected() {
        let mut cfg = TbConfig::default();
        cfg.watchdog_cycles = u64::MAX / 4;
        assert!(matches!(cfg.validate(), Err(TbError::Config(_))));

        // fits in ns but not in ps steps
        let mut cfg = TbConfig::default();
        cfg.watchdog_cycles = u64::MAX / 100;
        assert!(matches!(cfg.validate(), Err(TbError::Config(_))));

        let mut cfg = TbConfig::default();
        cfg.watchdog_cycles = 1_000_000_000;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn seed_is_kept_once_resolved() {
        let mut cfg = TbConfig::default();
        let seed = cfg.resolve_seed();
        assert_eq!(cfg.resolve_seed(), seed);
    }

    #[test]
    fn data_max_covers_width() {
        assert_eq!(FifoConfig { depth: 1, width: 8 }.data_max(), 255);
        assert_eq!(FifoConfig { depth: 1, width: 64 }.data_max(), u64::MAX);
    }
}
