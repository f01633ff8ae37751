//! 스크린샷 샘플 모델.
//!
//! 실행마다 API 응답에서 만들어지고 분류 직후 버려진다.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

/// 분류 대상 스크린샷 1장
#[derive(Debug, Clone)]
pub struct ScreenshotSample {
    /// 디바이스 식별자 (라이선스 키)
    pub device_id: String,
    /// 인코딩된 이미지 바이트 (jpeg/png 등)
    pub image: Vec<u8>,
    /// 캡처 시각 (알 수 없으면 None — 이 경우 Stale 판정 안 함)
    pub captured_at: Option<DateTime<Utc>>,
    /// 원본 URL
    pub source: String,
}

/// 파일 이름 앞부분의 타임스탬프로 캡처 시각 추정
///
/// `YYYYMMDDhhmmss…` 또는 `YYYYMMDD…` 형식을 매장 시간대 기준으로 해석한다.
/// 날짜만 있으면 그날 자정으로 본다.
pub fn capture_time_from_filename(name: &str, tz: Tz) -> Option<DateTime<Utc>> {
    let stem = name.rsplit('/').next().unwrap_or(name);
    let digits: String = stem.chars().take_while(|c| c.is_ascii_digit()).collect();

    let naive = if digits.len() >= 14 {
        NaiveDateTime::parse_from_str(&digits[..14], "%Y%m%d%H%M%S").ok()?
    } else if digits.len() >= 8 {
        NaiveDate::parse_from_str(&digits[..8], "%Y%m%d")
            .ok()?
            .and_hms_opt(0, 0, 0)?
    } else {
        return None;
    };

    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_timestamp_in_store_timezone() {
        let t = capture_time_from_filename(
            "https://cdn.example.com/shots/20261019143000_abc.jpg",
            chrono_tz::America::Chicago,
        )
        .unwrap();
        // 14:30 CDT = 19:30 UTC
        assert_eq!(t, Utc.with_ymd_and_hms(2026, 10, 19, 19, 30, 0).unwrap());
    }

    #[test]
    fn date_only_is_midnight() {
        let t = capture_time_from_filename("20261019.jpg", chrono_tz::UTC).unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2026, 10, 19, 0, 0, 0).unwrap());
    }

    #[test]
    fn no_timestamp_prefix() {
        assert!(capture_time_from_filename("screen.jpg", chrono_tz::UTC).is_none());
        assert!(capture_time_from_filename("2026.jpg", chrono_tz::UTC).is_none());
        assert!(capture_time_from_filename("20261399.jpg", chrono_tz::UTC).is_none());
    }
}
