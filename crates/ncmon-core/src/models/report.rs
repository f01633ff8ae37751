//! 실행 리포트 모델.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ledger::UpsertReport;
use super::verdict::{HealthCategory, HealthVerdict, ReachabilityCategory, ReachabilityVerdict};

/// 실행 상태 머신
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Fetching,
    Classifying,
    Probing,
    Reconciling,
    Done,
    Aborted,
}

impl RunState {
    /// 종료 상태 여부
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Done | RunState::Aborted)
    }

    /// 허용된 전이인지 확인
    ///
    /// 비종료 상태에서는 언제든 `Aborted`로 갈 수 있다.
    pub fn can_transition_to(&self, next: RunState) -> bool {
        use RunState::*;
        match (self, next) {
            (Idle, Fetching)
            | (Fetching, Classifying)
            | (Classifying, Probing)
            | (Probing, Reconciling)
            | (Reconciling, Done) => true,
            (current, Aborted) => !current.is_terminal(),
            _ => false,
        }
    }
}

/// 디바이스 단위 실패 발생 단계
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Fetch,
    Classify,
    Probe,
    Ledger,
}

/// 디바이스 단위 실패 (실행을 중단시키지 않음)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceFailure {
    pub device_id: String,
    pub stage: FailureStage,
    pub reason: String,
}

/// 원장 반영 요약
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSummary {
    pub written: usize,
    pub updated: usize,
    pub failed: usize,
}

impl From<&UpsertReport> for LedgerSummary {
    fn from(report: &UpsertReport) -> Self {
        Self {
            written: report.written(),
            updated: report.updated(),
            failed: report.failed(),
        }
    }
}

/// 실행 결과 요약 — 조기 중단과 부분 실패 완료를 구분한다
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed { device_failures: usize },
    Aborted { cause: String },
}

/// 한 번의 실행 리포트
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub state: RunState,
    pub health: Vec<HealthVerdict>,
    pub reachability: Vec<ReachabilityVerdict>,
    /// 화면 상태 분류별 건수 (라벨 → 건수)
    pub health_counts: BTreeMap<String, usize>,
    /// 원격 접속 분류별 건수 (라벨 → 건수)
    pub reachability_counts: BTreeMap<String, usize>,
    pub device_failures: Vec<DeviceFailure>,
    /// 영업 시간 외라서 분류에서 제외된 디바이스 수
    pub outside_store_hours: usize,
    pub ledger: LedgerSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abort_cause: Option<String>,
}

impl RunReport {
    /// 빈 리포트 (Idle)
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at,
            finished_at: None,
            state: RunState::Idle,
            health: Vec::new(),
            reachability: Vec::new(),
            health_counts: BTreeMap::new(),
            reachability_counts: BTreeMap::new(),
            device_failures: Vec::new(),
            outside_store_hours: 0,
            ledger: LedgerSummary::default(),
            abort_cause: None,
        }
    }

    /// 판정 목록에서 분류별 건수 재계산. 0건 분류도 키로 남긴다.
    pub fn recount(&mut self) {
        self.health_counts = HealthCategory::ALL
            .iter()
            .map(|c| {
                let n = self.health.iter().filter(|v| v.category == *c).count();
                (c.label().to_string(), n)
            })
            .collect();
        self.reachability_counts = ReachabilityCategory::ALL
            .iter()
            .map(|c| {
                let n = self
                    .reachability
                    .iter()
                    .filter(|v| v.category == *c)
                    .count();
                (c.label().to_string(), n)
            })
            .collect();
    }

    /// 특정 분류의 화면 상태 건수
    pub fn health_count(&self, category: HealthCategory) -> usize {
        self.health_counts
            .get(category.label())
            .copied()
            .unwrap_or_default()
    }

    /// 특정 분류의 원격 접속 건수
    pub fn reachability_count(&self, category: ReachabilityCategory) -> usize {
        self.reachability_counts
            .get(category.label())
            .copied()
            .unwrap_or_default()
    }

    pub fn outcome(&self) -> RunOutcome {
        match (&self.state, &self.abort_cause) {
            (RunState::Aborted, cause) => RunOutcome::Aborted {
                cause: cause.clone().unwrap_or_else(|| "unknown".to_string()),
            },
            _ => RunOutcome::Completed {
                device_failures: self.device_failures.len() + self.ledger.failed,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::verdict::{Evidence, SkipReason};

    #[test]
    fn transitions_follow_the_pipeline() {
        assert!(RunState::Idle.can_transition_to(RunState::Fetching));
        assert!(RunState::Reconciling.can_transition_to(RunState::Done));
        assert!(RunState::Fetching.can_transition_to(RunState::Aborted));
        assert!(!RunState::Idle.can_transition_to(RunState::Probing));
        assert!(!RunState::Done.can_transition_to(RunState::Aborted));
        assert!(!RunState::Aborted.can_transition_to(RunState::Fetching));
    }

    #[test]
    fn recount_includes_empty_categories() {
        let now = Utc::now();
        let mut report = RunReport::new(now);
        report.health.push(HealthVerdict {
            device_id: "A".into(),
            category: HealthCategory::Black,
            evidence: Evidence::default(),
            checked_at: now,
        });
        report.reachability.push(ReachabilityVerdict {
            device_id: "A".into(),
            category: ReachabilityCategory::Skipped(SkipReason::Quota),
            detail: None,
            checked_at: now,
        });
        report.recount();

        assert_eq!(report.health_count(HealthCategory::Black), 1);
        assert_eq!(report.health_count(HealthCategory::Healthy), 0);
        assert_eq!(report.health_counts.len(), HealthCategory::ALL.len());
        assert_eq!(
            report.reachability_count(ReachabilityCategory::Skipped(SkipReason::Quota)),
            1
        );
    }

    #[test]
    fn outcome_distinguishes_abort_from_partial_failure() {
        let mut report = RunReport::new(Utc::now());
        report.state = RunState::Done;
        report.device_failures.push(DeviceFailure {
            device_id: "A".into(),
            stage: FailureStage::Classify,
            reason: "decode".into(),
        });
        report.ledger.failed = 2;
        assert_eq!(
            report.outcome(),
            RunOutcome::Completed { device_failures: 3 }
        );

        report.state = RunState::Aborted;
        report.abort_cause = Some("auth".into());
        assert_eq!(
            report.outcome(),
            RunOutcome::Aborted {
                cause: "auth".into()
            }
        );
    }
}
