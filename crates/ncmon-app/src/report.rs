//! 실행 리포트 출력.

use std::fmt::Write as _;

use ncmon_core::models::report::{RunOutcome, RunReport};

/// 지원팀용 요약 텍스트
pub fn render_summary(report: &RunReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "run {} ({:?})", report.run_id, report.state);
    let _ = writeln!(out, "  started:  {}", report.started_at.to_rfc3339());
    if let Some(finished) = report.finished_at {
        let _ = writeln!(out, "  finished: {}", finished.to_rfc3339());
    }

    match report.outcome() {
        RunOutcome::Aborted { cause } => {
            let _ = writeln!(out, "  ABORTED: {cause}");
            return out;
        }
        RunOutcome::Completed { device_failures } => {
            let _ = writeln!(out, "  completed with {device_failures} per-device failure(s)");
        }
    }

    let _ = writeln!(out, "  health:");
    for (label, count) in &report.health_counts {
        let _ = writeln!(out, "    {label:<18} {count}");
    }
    if report.outside_store_hours > 0 {
        let _ = writeln!(out, "    {:<18} {}", "OUTSIDE_HOURS", report.outside_store_hours);
    }

    if !report.reachability.is_empty() {
        let _ = writeln!(out, "  reachability:");
        for (label, count) in &report.reachability_counts {
            let _ = writeln!(out, "    {label:<18} {count}");
        }
    }

    let _ = writeln!(
        out,
        "  ledger: written {}, updated {}, failed {}",
        report.ledger.written, report.ledger.updated, report.ledger.failed
    );

    for failure in &report.device_failures {
        let _ = writeln!(
            out,
            "  ! {} [{:?}] {}",
            failure.device_id, failure.stage, failure.reason
        );
    }
    out
}

/// 기계 판독용 JSON
pub fn render_json(report: &RunReport) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(report)
}
