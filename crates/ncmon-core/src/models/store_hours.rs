//! 매장 영업 시간 모델.
//!
//! Fleet API의 `storeHours` JSON 문자열 형식을 그대로 받는다:
//! `[{"day":"Monday","status":true,"periods":[{"openingHourData":{"hour":9,"minute":0},"closingHourData":{"hour":21,"minute":0}}]}]`

use chrono::{DateTime, Datelike, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// 요일별 영업 시간 목록
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoreHours {
    pub days: Vec<DayHours>,
}

/// 하루 영업 시간
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayHours {
    /// 요일 이름 ("Monday" 등)
    pub day: String,
    /// 영업 여부 (false 또는 누락 시 휴무)
    #[serde(default)]
    pub status: bool,
    /// 영업 구간
    #[serde(default)]
    pub periods: Vec<Period>,
}

/// 영업 구간 — 종료가 시작보다 이르면 자정을 넘기는 구간
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Period {
    pub opening_hour_data: HourMinute,
    pub closing_hour_data: HourMinute,
}

/// 시:분
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct HourMinute {
    #[serde(default)]
    pub hour: u32,
    #[serde(default)]
    pub minute: u32,
}

impl HourMinute {
    fn to_time(self) -> Option<NaiveTime> {
        NaiveTime::from_hms_opt(self.hour, self.minute, 0)
    }
}

/// 특정 시각의 매장 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreStatus {
    /// 영업 중
    Open,
    /// 개점 직후 유예 구간 (화면이 아직 준비 중일 수 있음)
    WithinGrace,
    /// 휴무
    Closed,
}

impl StoreHours {
    /// API의 JSON 문자열 파싱. 빈 문자열은 빈 목록.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(raw)
            .map_err(|e| CoreError::Protocol(format!("storeHours 파싱 실패: {e}")))
    }

    /// `now` 시점에 매장이 열려 있는지 판정
    pub fn status_at(&self, tz: Tz, now: DateTime<Utc>, grace: chrono::Duration) -> StoreStatus {
        let local = now.with_timezone(&tz);
        let weekday = local.weekday();
        let current = local.time();

        let Some(day) = self
            .days
            .iter()
            .find(|d| d.day.parse::<Weekday>().ok() == Some(weekday))
        else {
            return StoreStatus::Closed;
        };

        if !day.status {
            return StoreStatus::Closed;
        }

        for period in &day.periods {
            let (Some(open), Some(close)) = (
                period.opening_hour_data.to_time(),
                period.closing_hour_data.to_time(),
            ) else {
                continue;
            };

            let since_open = current.signed_duration_since(open);
            if since_open >= chrono::Duration::zero() && since_open <= grace {
                return StoreStatus::WithinGrace;
            }

            let open_now = if open <= close {
                open <= current && current <= close
            } else {
                current >= open || current <= close
            };
            if open_now {
                return StoreStatus::Open;
            }
        }

        StoreStatus::Closed
    }
}
