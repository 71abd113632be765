use junit_report::{Duration, ReportBuilder, TestCaseBuilder, TestSuiteBuilder};
use std::path::Path;

use crate::error::{TbError, TbResult};
use crate::test::TestRecord;

pub fn create_junit_xml(suite: &str, records: &[TestRecord], path: &Path) -> TbResult<()> {
    let mut test_cases = Vec::new();

    for r in records {
        let tc = match &r.result {
            Ok(_) => TestCaseBuilder::success(&r.name, Duration::seconds_f64(r.time_secs)),
            Err(e) => TestCaseBuilder::failure(
                &r.name,
                Duration::seconds_f64(r.time_secs),
                "failure",
                &e.to_string(),
            ),
        }
        .build();
        test_cases.push(tc);
    }

    let test_suite = TestSuiteBuilder::new(suite)
        .add_testcases(test_cases)
        .build();
    let report = ReportBuilder::new().add_testsuite(test_suite).build();
    let file = std::fs::File::create(path)?;
    report
        .write_xml(file)
        .map_err(|e| TbError::Report(e.to_string()))
}
