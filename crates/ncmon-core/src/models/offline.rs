//! 장기 오프라인 라이선스 보고 모델.
//!
//! 오프라인 기간이 구간 안에 드는 라이선스를 별도 탭에 스냅샷으로 남긴다.
//! 원장과 달리 날짜 키가 없고, 매 실행이 탭 전체를 대체한다.

use serde::{Deserialize, Serialize};

/// 보고 탭 헤더
pub const OFFLINE_HEADERS: [&str; 7] = [
    "License ID",
    "License Key",
    "Timezone",
    "Days Offline",
    "PiStatus",
    "Dealer",
    "Host",
];

/// 오프라인 일수 구간 (양 끝 포함)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfflineWindow {
    pub days_from: u32,
    pub days_to: u32,
}

/// 장기 오프라인 라이선스 한 건
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfflineLicense {
    pub license_id: String,
    pub license_key: String,
    pub timezone: Option<String>,
    pub days_offline: Option<String>,
    pub pi_status: Option<String>,
    pub dealer: Option<String>,
    pub host: Option<String>,
}

impl OfflineLicense {
    /// 보고 탭 셀 (`OFFLINE_HEADERS` 순서)
    pub fn to_cells(&self) -> Vec<String> {
        let opt = |v: &Option<String>| v.clone().unwrap_or_default();
        vec![
            self.license_id.clone(),
            self.license_key.clone(),
            opt(&self.timezone),
            opt(&self.days_offline),
            opt(&self.pi_status),
            opt(&self.dealer),
            opt(&self.host),
        ]
    }
}

/// `list_offline` 한 페이지 결과
#[derive(Debug, Clone, Default)]
pub struct OfflinePage {
    pub licenses: Vec<OfflineLicense>,
    /// 변환 전 API 레코드 수
    pub fetched: usize,
    pub total_count: Option<u64>,
}
