use std::io::Write;

use rstb_fifo::config::{FlagSeverity, TbConfig};
use rstb_fifo::error::TbError;
use rstb_fifo::run_tests;
use rstb_fifo::value::Val;

fn config(seed: u64) -> TbConfig {
    TbConfig {
        seed: Some(seed),
        ..TbConfig::default()
    }
}

fn only(name: &str) -> Vec<String> {
    vec![name.to_string()]
}

#[test]
fn correct_dut_passes_parallel_run() {
    for seed in [1, 2, 3] {
        let mut cfg = config(seed);
        let records = run_tests(&mut cfg, &only("fifo_parallel")).unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].passed(), "seed {}: {:?}", seed, records[0].result);
    }
}

#[test]
fn flags_agree_with_model_under_hard_severity() {
    let mut cfg = config(11);
    cfg.fifo.depth = 4;
    cfg.monitor.interval = 1;
    cfg.monitor.flag_severity = FlagSeverity::Hard;
    // a slow reader keeps the FIFO full for a good part of the run
    cfg.reader.max_delay = 6;
    let records = run_tests(&mut cfg, &only("fifo_parallel")).unwrap();
    assert!(records[0].passed(), "{:?}", records[0].result);
}

#[test]
fn burst_test_passes() {
    let mut cfg = config(5);
    let records = run_tests(&mut cfg, &only("fifo_burst")).unwrap();
    assert!(records[0].passed(), "{:?}", records[0].result);
}

#[test]
fn burst_test_handles_shallow_fifo() {
    let mut cfg = config(6);
    cfg.fifo.depth = 1;
    let records = run_tests(&mut cfg, &only("fifo_burst")).unwrap();
    assert!(records[0].passed(), "{:?}", records[0].result);
}

#[test]
fn runs_all_tests_by_default() {
    let mut cfg = config(9);
    cfg.writer.transactions = 40;
    cfg.reader.transactions = 40;
    let records = run_tests(&mut cfg, &[]).unwrap();
    let names: Vec<_> = records.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, ["fifo_parallel", "fifo_burst"]);
    assert!(records.iter().all(|r| r.passed()));
}

#[test]
fn corrupted_data_fails_with_error_count() {
    let mut cfg = config(3);
    cfg.dut.faults.corrupt_every = Some(7);
    let records = run_tests(&mut cfg, &only("fifo_parallel")).unwrap();
    match &records[0].result {
        Err(TbError::CheckFailed { status, .. }) => {
            assert!(status.error_count > 0);
            assert_eq!(status.write_count, status.read_count);
        }
        other => panic!("expected a failed check, got {:?}", other),
    }
}

#[test]
fn dropped_data_is_caught() {
    let mut cfg = config(4);
    cfg.dut.faults.drop_every = Some(10);
    cfg.watchdog_cycles = 5_000;
    let records = run_tests(&mut cfg, &only("fifo_parallel")).unwrap();
    assert!(!records[0].passed());
}

#[test]
fn stuck_full_is_soft_by_default_and_hard_on_request() {
    let mut cfg = config(8);
    cfg.dut.faults.stuck_full = true;
    let records = run_tests(&mut cfg, &only("fifo_parallel")).unwrap();
    assert!(matches!(records[0].result, Ok(Val::String(_))));

    cfg.monitor.flag_severity = FlagSeverity::Hard;
    let records = run_tests(&mut cfg, &only("fifo_parallel")).unwrap();
    assert!(matches!(records[0].result, Err(TbError::CheckFailed { .. })));
}

#[test]
fn bad_configuration_fails_before_stimulus() {
    let mut cfg = config(1);
    cfg.fifo.depth = 0;
    assert!(matches!(run_tests(&mut cfg, &[]), Err(TbError::Config(_))));

    let mut cfg = config(1);
    assert!(matches!(
        run_tests(&mut cfg, &only("fifo_serial")),
        Err(TbError::Config(_))
    ));
}

#[test]
fn runs_from_config_file_and_writes_junit() {
    let dir = tempfile::tempdir().unwrap();
    let junit = dir.path().join("results.xml");
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        "seed = 21\njunit = {:?}\n[fifo]\ndepth = 8\n[writer]\ntransactions = 60\n[reader]\ntransactions = 60\n",
        junit.display().to_string()
    )
    .unwrap();

    let mut cfg = TbConfig::from_file(file.path()).unwrap();
    assert_eq!(cfg.fifo.depth, 8);
    let records = run_tests(&mut cfg, &only("fifo_parallel")).unwrap();
    assert!(records[0].passed(), "{:?}", records[0].result);

    let xml = std::fs::read_to_string(&junit).unwrap();
    assert!(xml.contains("fifo_parallel"));
}
