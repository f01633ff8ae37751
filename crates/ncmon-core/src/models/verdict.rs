//! 판정 모델 — 화면 상태(Health)와 원격 접속(Reachability).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 화면 상태 분류
///
/// 선언 순서가 곧 분류 규칙의 우선순위는 아니다. 우선순위는 분류기가 정한다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthCategory {
    /// 정상
    Healthy,
    /// 검은 화면
    Black,
    /// 에러 문구 표시
    ErrorScreen,
    /// 스크린샷이 오래됨
    Stale,
    /// API에 스크린샷 없음
    Missing,
    /// 이미지 판독 불가
    Unclassifiable,
}

impl HealthCategory {
    /// 원장 셀 표기
    pub fn label(&self) -> &'static str {
        match self {
            HealthCategory::Healthy => "HEALTHY",
            HealthCategory::Black => "BLACK_SCREEN",
            HealthCategory::ErrorScreen => "ERROR_DISPLAYED",
            HealthCategory::Stale => "STALE_SCREENSHOT",
            HealthCategory::Missing => "NO_SCREENSHOTS",
            HealthCategory::Unclassifiable => "UNCLASSIFIABLE",
        }
    }

    /// 전체 목록 (리포트 집계 순서)
    pub const ALL: [HealthCategory; 6] = [
        HealthCategory::Healthy,
        HealthCategory::Black,
        HealthCategory::ErrorScreen,
        HealthCategory::Stale,
        HealthCategory::Missing,
        HealthCategory::Unclassifiable,
    ];
}

impl std::fmt::Display for HealthCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// 판정 근거
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    /// 검은 픽셀 비율 (0.0 ~ 1.0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dark_ratio: Option<f64>,
    /// 일치한 에러 문구/패턴
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_text: Option<String>,
    /// 스크린샷 나이 (초)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_secs: Option<i64>,
    /// 기타 사유 (판독 실패 원인 등)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Evidence {
    /// 사유만 담은 근거
    pub fn detail(detail: impl Into<String>) -> Self {
        Self {
            detail: Some(detail.into()),
            ..Self::default()
        }
    }

    /// 원장 셀용 한 줄 요약
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if let Some(ratio) = self.dark_ratio {
            parts.push(format!("dark={ratio:.3}"));
        }
        if let Some(text) = &self.matched_text {
            parts.push(format!("text=\"{text}\""));
        }
        if let Some(age) = self.age_secs {
            parts.push(format!("age={age}s"));
        }
        if let Some(detail) = &self.detail {
            parts.push(detail.clone());
        }
        parts.join("; ")
    }
}

/// 디바이스 1대의 화면 상태 판정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthVerdict {
    pub device_id: String,
    pub category: HealthCategory,
    pub evidence: Evidence,
    pub checked_at: DateTime<Utc>,
}

/// 원격 접속 점검 생략 사유
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// 실행당 점검 한도 소진
    Quota,
}

/// 원격 접속 분류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReachabilityCategory {
    Reachable,
    Unreachable,
    Skipped(SkipReason),
}

impl ReachabilityCategory {
    /// 원장 셀 표기
    pub fn label(&self) -> &'static str {
        match self {
            ReachabilityCategory::Reachable => "REACHABLE",
            ReachabilityCategory::Unreachable => "UNREACHABLE",
            ReachabilityCategory::Skipped(SkipReason::Quota) => "SKIPPED_QUOTA",
        }
    }

    /// 전체 목록 (리포트 집계 순서)
    pub const ALL: [ReachabilityCategory; 3] = [
        ReachabilityCategory::Reachable,
        ReachabilityCategory::Unreachable,
        ReachabilityCategory::Skipped(SkipReason::Quota),
    ];
}

impl std::fmt::Display for ReachabilityCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// 디바이스 1대의 원격 접속 판정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReachabilityVerdict {
    pub device_id: String,
    pub category: ReachabilityCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub checked_at: DateTime<Utc>,
}
