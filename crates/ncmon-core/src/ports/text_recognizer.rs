//! 텍스트 인식(OCR) 포트.
//!
//! 구현: `ncmon-vision` crate (`TesseractCli`, feature `ocr` 시 `LeptessRecognizer`)

use async_trait::async_trait;

use crate::error::CoreError;

/// 스크린샷 이미지에서 텍스트 추출
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    /// 실행 전 1회 호출 — 엔진이 없으면 `CapabilityMissing`
    async fn ensure_available(&self) -> Result<(), CoreError>;

    /// 인코딩된 이미지에서 전체 텍스트 추출
    ///
    /// 엔진 자체가 사라진 경우에만 `CapabilityMissing`을 반환하고,
    /// 개별 이미지 실패는 `Unclassifiable`로 반환한다.
    async fn recognize(&self, image: &[u8]) -> Result<String, CoreError>;

    /// 엔진 이름 (로그용)
    fn name(&self) -> &str;
}
