//! 디바이스(플레이어) 모델.

use serde::{Deserialize, Serialize};

use super::store_hours::StoreHours;

/// 배포된 화면 플레이어 — 라이선스 키로 식별
///
/// 조회 시점의 스냅샷이며 매 실행마다 새로 받아온다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    /// API 내부 라이선스 ID (스크린샷 조회용)
    pub license_id: String,
    /// 라이선스 키 (디바이스 식별자)
    pub license_key: String,
    /// 표시 이름
    pub display_name: String,
    /// Fleet API가 보고한 온라인 여부
    pub online: bool,
    /// AnyDesk ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anydesk_id: Option<String>,
    /// 매장 시간대 (IANA 이름)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    /// 매장 영업 시간
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_hours: Option<StoreHours>,
}

impl Device {
    /// 디바이스 식별자 (라이선스 키)
    pub fn id(&self) -> &str {
        &self.license_key
    }

    /// 매장 시간대 파싱 (없거나 잘못되면 None)
    pub fn tz(&self) -> Option<chrono_tz::Tz> {
        self.timezone.as_deref().and_then(|tz| tz.parse().ok())
    }
}

/// `list_devices` 한 페이지 결과
#[derive(Debug, Clone, Default)]
pub struct DevicePage {
    /// 이 페이지의 디바이스
    pub devices: Vec<Device>,
    /// 변환 전 API 레코드 수 (키 없는 레코드 포함). 페이지 끝 판정에 쓴다.
    pub fetched: usize,
    /// 전체 디바이스 수 (API가 알려준 경우)
    pub total_count: Option<u64>,
}
