//! Fleet API 포트.
//!
//! 구현: `ncmon-network` crate (reqwest)

use async_trait::async_trait;

use crate::error::CoreError;
use crate::models::device::{Device, DevicePage};
use crate::models::offline::{OfflinePage, OfflineWindow};
use crate::models::screenshot::ScreenshotSample;

/// Fleet 관리 API 클라이언트
///
/// 에러 분류:
/// - `TransientFetch` — 재시도 후에도 실패한 네트워크/5xx/429
/// - `Auth` — 로그인 실패 또는 재로그인 후에도 401
/// - `Protocol` — 응답 구조가 예상과 다름 (API 계약 변경)
#[async_trait]
pub trait FleetApi: Send + Sync {
    /// 디바이스 목록 한 페이지 조회 (`page`는 1부터)
    ///
    /// 빈 페이지가 반환되면 목록 끝이다.
    async fn list_devices(&self, page: u32, page_size: u32) -> Result<DevicePage, CoreError>;

    /// 오프라인 일수가 `window` 안에 드는 라이선스 한 페이지 (`page`는 1부터)
    async fn list_offline(
        &self,
        window: OfflineWindow,
        page: u32,
        page_size: u32,
    ) -> Result<OfflinePage, CoreError>;

    /// 디바이스의 최신 스크린샷 조회
    ///
    /// API에 스크린샷이 없으면 `Ok(None)`.
    async fn fetch_screenshot(&self, device: &Device)
        -> Result<Option<ScreenshotSample>, CoreError>;
}
