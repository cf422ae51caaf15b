//! Result aggregation

use crate::model::{ControlResult, ScanSummary};

/// Pass/fail totals over a list of results. Anything not `PASS` counts as failed.
pub fn summarize(results: &[ControlResult]) -> ScanSummary {
    let total = results.len();
    let passed = results.iter().filter(|r| r.passed()).count();
    ScanSummary {
        total,
        passed,
        failed: total - passed,
    }
}

/// Totals for a single result
pub fn summarize_one(result: &ControlResult) -> ScanSummary {
    summarize(std::slice::from_ref(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ControlId, ControlStatus};

    fn result(status: ControlStatus) -> ControlResult {
        let mut r = ControlResult::errored(ControlId::PublicIp, "p", "", "x");
        r.status = status;
        r
    }

    #[test]
    fn test_summarize() {
        let results = vec![
            result(ControlStatus::Pass),
            result(ControlStatus::Fail),
            result(ControlStatus::Error),
            result(ControlStatus::Pass),
        ];
        assert_eq!(
            summarize(&results),
            ScanSummary { total: 4, passed: 2, failed: 2 }
        );
    }

    #[test]
    fn test_summarize_empty_and_single() {
        assert_eq!(summarize(&[]), ScanSummary::default());
        assert_eq!(
            summarize_one(&result(ControlStatus::Pass)),
            ScanSummary { total: 1, passed: 1, failed: 0 }
        );
        assert_eq!(summarize_one(&result(ControlStatus::Error)).failed, 1);
    }
}
