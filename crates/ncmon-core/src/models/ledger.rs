//! 원장(스프레드시트) 행 모델.
//!
//! (날짜, 디바이스) 쌍이 자연 키다. 같은 날 재실행하면 기존 행을 갱신해야 하며
//! 새 행을 추가하면 안 된다.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// 원장 헤더 (탭 1행)
pub const LEDGER_HEADERS: [&str; 7] = [
    "Date",
    "License Key",
    "Display Name",
    "Health",
    "Health Evidence",
    "Reachability",
    "Checked At",
];

/// 원장 자연 키
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LedgerKey {
    pub date: NaiveDate,
    pub device_id: String,
}

/// 원장 행
///
/// `None` 칸은 "이번 실행에서 모름"을 뜻하고, 갱신 시 기존 값을 유지한다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRow {
    pub date: NaiveDate,
    pub device_id: String,
    pub display_name: String,
    pub health: Option<String>,
    pub health_evidence: Option<String>,
    pub reachability: Option<String>,
    pub checked_at: Option<DateTime<Utc>>,
}

impl LedgerRow {
    /// 자연 키
    pub fn key(&self) -> LedgerKey {
        LedgerKey {
            date: self.date,
            device_id: self.device_id.clone(),
        }
    }

    /// 기존 행 위에 이번 행을 덮어쓴 결과
    pub fn merged_onto(&self, existing: &LedgerRow) -> LedgerRow {
        LedgerRow {
            date: self.date,
            device_id: self.device_id.clone(),
            display_name: if self.display_name.is_empty() {
                existing.display_name.clone()
            } else {
                self.display_name.clone()
            },
            health: self.health.clone().or_else(|| existing.health.clone()),
            health_evidence: if self.health.is_some() {
                self.health_evidence.clone()
            } else {
                existing.health_evidence.clone()
            },
            reachability: self
                .reachability
                .clone()
                .or_else(|| existing.reachability.clone()),
            checked_at: self.checked_at.or(existing.checked_at),
        }
    }

    /// 셀 값 목록 (헤더 순서)
    pub fn to_cells(&self) -> Vec<String> {
        vec![
            self.date.format("%Y-%m-%d").to_string(),
            self.device_id.clone(),
            self.display_name.clone(),
            self.health.clone().unwrap_or_default(),
            self.health_evidence.clone().unwrap_or_default(),
            self.reachability.clone().unwrap_or_default(),
            self.checked_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
        ]
    }

    /// 셀 값에서 복원. 날짜는 탭 기준이며 디바이스 칸이 비면 None.
    pub fn from_cells(date: NaiveDate, cells: &[String]) -> Option<LedgerRow> {
        let cell = |i: usize| cells.get(i).map(|s| s.trim()).unwrap_or("");
        let opt = |i: usize| Some(cell(i).to_string()).filter(|s| !s.is_empty());

        let device_id = cell(1);
        if device_id.is_empty() {
            return None;
        }

        Some(LedgerRow {
            date,
            device_id: device_id.to_string(),
            display_name: cell(2).to_string(),
            health: opt(3),
            health_evidence: opt(4),
            reachability: opt(5),
            checked_at: DateTime::parse_from_rfc3339(cell(6))
                .ok()
                .map(|t| t.with_timezone(&Utc)),
        })
    }
}

/// 원장에 이미 있는 행 (1부터 시작하는 행 번호 포함)
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRow {
    pub row_number: u32,
    pub row: LedgerRow,
}

/// 배치 쓰기 단위
#[derive(Debug, Clone, PartialEq)]
pub enum RowWrite {
    /// 기존 행 제자리 갱신
    Update { row_number: u32, row: LedgerRow },
    /// 새 행 추가
    Append { row: LedgerRow },
}

impl RowWrite {
    /// 대상 행
    pub fn row(&self) -> &LedgerRow {
        match self {
            RowWrite::Update { row, .. } | RowWrite::Append { row } => row,
        }
    }
}

/// 행 단위 쓰기 결과
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum RowOutcome {
    /// 새로 추가됨
    Written,
    /// 기존 행 갱신됨
    Updated,
    /// 배치 실패
    Failed(String),
}

/// `upsert` 결과 — 행마다 결과 하나
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpsertReport {
    pub outcomes: Vec<(LedgerKey, RowOutcome)>,
}

impl UpsertReport {
    pub fn written(&self) -> usize {
        self.count(|o| matches!(o, RowOutcome::Written))
    }

    pub fn updated(&self) -> usize {
        self.count(|o| matches!(o, RowOutcome::Updated))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, RowOutcome::Failed(_)))
    }

    /// 특정 키의 결과
    pub fn outcome_of(&self, key: &LedgerKey) -> Option<&RowOutcome> {
        self.outcomes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, outcome)| outcome)
    }

    fn count(&self, pred: impl Fn(&RowOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| pred(o)).count()
    }
}
