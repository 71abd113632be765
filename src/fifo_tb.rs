//! Randomized concurrent FIFO testbench.
//!
//! A writer and a reader hammer the DUT with randomly paced transactions while
//! a status monitor periodically compares the DUT's `full`/empty flags with the
//! shadow model. All three share one [`FifoShadow`]; the writer records what the
//! DUT accepted, the reader checks what comes out.

use futures::future::{select, FutureExt};
use num_format::{Locale, ToFormattedString};
use rand::rngs::StdRng;
use rand::Rng;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::{DriverConfig, FlagSeverity, MonitorConfig, TbConfig};
use crate::error::{TbError, TbResult};
use crate::executor::{JoinHandle, Task, TaskResult};
use crate::shadow::FifoShadow;
use crate::signal::SimObject;
use crate::test::Test;
use crate::testbench::clock;
use crate::utils::{clock_cycles, rand_delay, seeded_rng};
use crate::value::Val;

const WRITER_STREAM: u64 = 1;
const READER_STREAM: u64 = 2;

#[derive(Clone)]
pub struct FifoTb {
    pub shadow: FifoShadow,
    clk: SimObject,
    rst_n: SimObject,
    psh: SimObject,
    din: SimObject,
    pop: SimObject,
    dout: SimObject,
    dout_val: SimObject,
    full: SimObject,
    data_max: u64,
}

impl FifoTb {
    /// Resolves every DUT port up front so a missing one fails before stimulus.
    pub fn new(dut: &SimObject, shadow: FifoShadow, data_max: u64) -> TbResult<Self> {
        Ok(Self {
            shadow,
            clk: dut.c("clk")?,
            rst_n: dut.c("rst_n")?,
            psh: dut.c("psh")?,
            din: dut.c("din")?,
            pop: dut.c("pop")?,
            dout: dut.c("dout")?,
            dout_val: dut.c("dout_val")?,
            full: dut.c("full")?,
            data_max,
        })
    }

    /// Builds the testbench, starts the clock and resets the DUT.
    pub async fn start(dut: &SimObject, cfg: &TbConfig) -> TbResult<Self> {
        let tb = FifoTb::new(dut, FifoShadow::new(cfg.fifo.depth)?, cfg.fifo.data_max())?;
        Task::spawn(clock(tb.clk.clone(), cfg.clock_period_ns, "ns"), "clock");
        tb.reset(cfg.reset_cycles).await?;
        Ok(tb)
    }

    pub fn clk(&self) -> &SimObject {
        &self.clk
    }

    fn time_ns(&self) -> f64 {
        self.clk.sim().get_sim_time("ns").unwrap_or_default()
    }

    pub async fn reset(&self, cycles: u32) -> TbResult<()> {
        self.rst_n.set(0)?;
        self.psh.set(0)?;
        self.pop.set(0)?;
        self.din.set(0)?;
        clock_cycles(&self.clk, cycles).await?;
        self.rst_n.set(1)?;
        self.clk.rising_edge().await?;
        debug!(t_ns = self.time_ns(), "reset done");
        Ok(())
    }

    /// Pushes `data` for one cycle if the DUT is not full and records it in the
    /// shadow model. Returns whether the write was accepted.
    pub async fn write_data(&self, data: u64) -> TbResult<bool> {
        if self.full.is_high()? {
            return Ok(false);
        }
        self.psh.set(1)?;
        self.din.set(data)?;
        self.clk.rising_edge().await?;
        self.psh.set(0)?;

        let accepted = self.shadow.try_enqueue(data);
        if !accepted {
            warn!(t_ns = self.time_ns(), data, "shadow model rejected write, queue full");
        }
        Ok(accepted)
    }

    /// Pops one item if the DUT shows valid data and checks it against the
    /// shadow model. Returns the value read.
    pub async fn read_data(&self) -> TbResult<Option<u64>> {
        if !self.dout_val.is_high()? {
            return Ok(None);
        }
        self.pop.set(1)?;
        self.clk.rising_edge().await?;
        let data = self.dout.u64()?;
        self.pop.set(0)?;

        self.shadow.verify_and_dequeue(data);
        Ok(Some(data))
    }

    pub async fn writer(self, cfg: DriverConfig, mut rng: StdRng) -> TaskResult {
        info!(transactions = cfg.transactions, max_delay = cfg.max_delay, "writer started");
        let mut accepted = 0;
        for i in 0..cfg.transactions {
            clock_cycles(&self.clk, rand_delay(&mut rng, cfg.max_delay)).await?;
            let data = rng.gen_range(0..=self.data_max);

            if !self.full.is_high()? {
                if self.write_data(data).await? {
                    accepted += 1;
                    debug!(data, "writer wrote data");
                } else {
                    debug!(data, "writer attempted write but FIFO was full");
                }
            } else {
                debug!("writer: FIFO full, skipping write");
            }

            if i % 20 == 0 {
                info!(
                    "writer progress: {}/{}, queue size: {}",
                    i,
                    cfg.transactions,
                    self.shadow.snapshot().count
                );
            }
        }
        self.shadow.close_writes();
        info!(accepted, attempted = cfg.transactions, "writer completed");
        Ok(Val::Int(accepted))
    }

    /// Reads until `cfg.transactions` values were checked. A mismatching value
    /// counts as a checked transaction. Stops early once the writer is done and
    /// both the DUT and the shadow model are empty.
    pub async fn reader(self, cfg: DriverConfig, mut rng: StdRng) -> TaskResult {
        info!(transactions = cfg.transactions, max_delay = cfg.max_delay, "reader started");
        let mut transactions_read = 0;
        while transactions_read < cfg.transactions {
            clock_cycles(&self.clk, rand_delay(&mut rng, cfg.max_delay)).await?;

            if self.dout_val.is_high()? {
                if let Some(data) = self.read_data().await? {
                    transactions_read += 1;
                    debug!(data, "reader read data");
                }
            } else if self.shadow.writes_closed().is_set() && self.shadow.snapshot().empty {
                warn!(
                    transactions_read,
                    requested = cfg.transactions,
                    "reader: writer finished and FIFO drained, stopping early"
                );
                break;
            } else {
                debug!("reader: FIFO empty, waiting");
                select(
                    self.shadow.data_ready().wait(),
                    self.shadow.writes_closed().wait(),
                )
                .await;
            }

            if transactions_read % 20 == 0 {
                info!(
                    "reader progress: {}/{}, queue size: {}",
                    transactions_read,
                    cfg.transactions,
                    self.shadow.snapshot().count
                );
            }
        }
        info!(transactions_read, "reader completed");
        Ok(Val::Int(transactions_read as u64))
    }

    /// Compares the DUT flags with the shadow model every `cfg.interval` cycles
    /// until `cfg.timeout` cycles have passed or the task is cancelled. Only
    /// reads shared state.
    pub async fn status_monitor(self, cfg: MonitorConfig) -> TaskResult {
        info!(interval = cfg.interval, timeout = cfg.timeout, severity = %cfg.flag_severity, "status monitor started");
        let mut cycle_count: u32 = 0;
        while cycle_count < cfg.timeout {
            clock_cycles(&self.clk, cfg.interval.saturating_sub(1)).await?;
            // sample once the edge has fully propagated to the DUT and the shadow model
            self.clk.rising_edge_ro().await?;
            cycle_count = cycle_count.saturating_add(cfg.interval);

            let status = self.shadow.snapshot();
            let actual_empty = !self.dout_val.is_high()?;
            let actual_full = self.full.is_high()?;
            let cycle = cycle_count.to_formatted_string(&Locale::en);

            let mut mismatches = 0;
            if actual_empty != status.empty {
                error!(%cycle, expected = status.empty, actual = actual_empty, "empty flag mismatch");
                mismatches += 1;
            }
            if actual_full != status.full {
                error!(%cycle, expected = status.full, actual = actual_full, "full flag mismatch");
                mismatches += 1;
            }
            if cfg.flag_severity == FlagSeverity::Hard {
                for _ in 0..mismatches {
                    self.shadow.record_error();
                }
            }

            info!(
                "cycle {}: queue size={}, writes={}, reads={}, verified={}, errors={}",
                cycle,
                status.count,
                status.write_count,
                status.read_count,
                status.verified_count,
                status.error_count
            );
        }
        info!("status monitor stopped after {} cycles", cycle_count.to_formatted_string(&Locale::en));
        Ok(Val::Int(cycle_count as u64))
    }

    /// Forks writer, reader and status monitor on the shared shadow model.
    pub fn launch(
        &self,
        writer: DriverConfig,
        reader: DriverConfig,
        monitor: MonitorConfig,
        seed: u64,
    ) -> (JoinHandle, JoinHandle, JoinHandle) {
        let w = Task::spawn(self.clone().writer(writer, seeded_rng(seed, WRITER_STREAM)), "writer");
        let r = Task::spawn(self.clone().reader(reader, seeded_rng(seed, READER_STREAM)), "reader");
        let m = Task::spawn(self.clone().status_monitor(monitor), "status_monitor");
        (w, r, m)
    }

    /// Joins writer and reader, stops the monitor and checks the end state. The
    /// monitor may already have stopped on its own timeout.
    pub async fn finish(
        &self,
        writer: JoinHandle,
        reader: JoinHandle,
        monitor: &JoinHandle,
    ) -> TaskResult {
        writer.await?;
        reader.await?;
        info!("read and write done");
        monitor.cancel();
        self.final_check()
    }

    pub fn final_check(&self) -> TaskResult {
        let status = self.shadow.snapshot();
        info!(%status, "final status");
        let failed = |check: String| Err(TbError::CheckFailed { check, status });
        if status.error_count != 0 {
            return failed(format!("test failed with {} errors", status.error_count));
        }
        if status.count != 0 {
            return failed(format!("expected empty queue, but has {} items", status.count));
        }
        if status.write_count != status.read_count {
            return failed("write/read count mismatch".to_string());
        }
        Ok(Val::String(status.to_string()))
    }
}

/// Writer, reader and status monitor running in parallel with the configured
/// parameters.
pub async fn test_fifo(dut: SimObject, cfg: Arc<TbConfig>) -> TaskResult {
    let tb = FifoTb::start(&dut, &cfg).await?;
    info!("starting parallel FIFO test");
    let (writer, reader, monitor) =
        tb.launch(cfg.writer, cfg.reader, cfg.monitor, cfg.seed.unwrap_or_default());
    let result = tb.finish(writer, reader, &monitor).await?;
    info!("parallel FIFO test completed successfully");
    Ok(result)
}

/// Back-to-back burst write followed by a burst read, then a shorter mixed
/// parallel phase on the same shadow model.
pub async fn test_fifo_burst(dut: SimObject, cfg: Arc<TbConfig>) -> TaskResult {
    let tb = FifoTb::start(&dut, &cfg).await?;

    info!("testing burst write followed by burst read");
    let burst = cfg.fifo.depth.min(10) as u64;
    let expected = |i: u64| (i + 100) & tb.data_max;
    for i in 0..burst {
        if !tb.write_data(expected(i)).await? {
            return Err(TbError::Assertion(format!("burst write {} was not accepted", i)));
        }
    }
    tb.clk().rising_edge().await?;
    for i in 0..burst {
        let data = tb.read_data().await?;
        if data != Some(expected(i)) {
            return Err(TbError::Assertion(format!(
                "burst data mismatch: expected {}, got {:?}",
                expected(i),
                data
            )));
        }
    }

    info!("testing mixed read/write bursts");
    let writer = DriverConfig { transactions: 50, max_delay: 3 };
    let reader = DriverConfig { transactions: 50, max_delay: 5 };
    let monitor = MonitorConfig { interval: 50, ..cfg.monitor };
    let (writer, reader, monitor) = tb.launch(writer, reader, monitor, cfg.seed.unwrap_or_default());
    let result = tb.finish(writer, reader, &monitor).await?;
    info!("burst operations test completed successfully");
    Ok(result)
}

pub fn tests() -> Vec<Test> {
    vec![
        Test::new("fifo_parallel", |dut, cfg| test_fifo(dut, cfg).boxed()),
        Test::new("fifo_burst", |dut, cfg| test_fifo_burst(dut, cfg).boxed()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dut::FifoModel;
    use crate::sim::Simulator;
    use crate::test::TestFn;
    use parking_lot::Mutex;
    use std::io;

    fn run_on_model(cfg: TbConfig, body: TestFn) -> TaskResult {
        let sim = Simulator::new(cfg.precision);
        let model = FifoModel::new(&cfg.dut.name, cfg.dut_depth(), cfg.fifo.width);
        sim.add_model(Box::new(model)).unwrap();
        let dut = SimObject::scope(sim.sim_if(), &cfg.dut.name);
        let main = Task::spawn(body(dut, Arc::new(cfg)), "main");
        // 1 ms
        sim.run(main, Some(1_000_000_000))
    }

    async fn overfill_shadow(dut: SimObject, cfg: Arc<TbConfig>) -> TaskResult {
        let tb = FifoTb::start(&dut, &cfg).await?;
        let mut accepted = Vec::new();
        for data in [1, 2, 3] {
            accepted.push(tb.write_data(data).await?);
        }
        assert_eq!(accepted, [true, true, false]);
        assert!(!tb.full.is_high()?);
        let status = tb.shadow.snapshot();
        assert_eq!(status.error_count, 0);
        assert_eq!(status.write_count, 2);
        assert!(status.full);
        Ok(Val::None)
    }

    #[test]
    fn shadow_rejecting_an_accepted_push_is_not_an_error() {
        let mut cfg = TbConfig::default();
        cfg.fifo.depth = 2;
        cfg.dut.depth = Some(8);
        let result = run_on_model(cfg, |d, c| overfill_shadow(d, c).boxed());
        assert!(result.is_ok(), "{:?}", result);
    }

    async fn short_monitor(dut: SimObject, cfg: Arc<TbConfig>) -> TaskResult {
        let tb = FifoTb::start(&dut, &cfg).await?;
        let monitor_cfg = MonitorConfig {
            interval: 10,
            timeout: 50,
            flag_severity: FlagSeverity::Hard,
        };
        let (writer, reader, monitor) = tb.launch(cfg.writer, cfg.reader, monitor_cfg, 3);
        let result = tb.finish(writer, reader, &monitor).await?;
        assert!(monitor.is_finished());
        assert_eq!(monitor.await?, Val::Int(50));
        Ok(result)
    }

    #[test]
    fn monitor_stops_on_its_own_timeout() {
        let result = run_on_model(TbConfig::default(), |d, c| short_monitor(d, c).boxed());
        assert!(matches!(result, Ok(Val::String(_))), "{:?}", result);
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    async fn reader_on_idle_fifo(dut: SimObject, cfg: Arc<TbConfig>) -> TaskResult {
        let tb = FifoTb::start(&dut, &cfg).await?;
        let reader_cfg = DriverConfig { transactions: 40, max_delay: 1 };
        let reader = Task::spawn(
            tb.clone().reader(reader_cfg, seeded_rng(1, READER_STREAM)),
            "reader",
        );
        clock_cycles(tb.clk(), 5).await?;
        tb.shadow.close_writes();
        reader.await
    }

    #[test]
    fn reader_reports_progress_while_waiting() {
        let logs = Captured::default();
        let sink = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || sink.clone())
            .finish();
        let result = tracing::subscriber::with_default(subscriber, || {
            run_on_model(TbConfig::default(), |d, c| reader_on_idle_fifo(d, c).boxed())
        });
        assert_eq!(result.unwrap(), Val::Int(0));

        let text = String::from_utf8(logs.0.lock().clone()).unwrap();
        assert!(text.contains("reader progress: 0/40"), "{}", text);
        assert!(text.contains("stopping early"));
    }
}
