//! OCR 어댑터 에러.

use ncmon_core::error::CoreError;
use thiserror::Error;

/// OCR 에러 타입
#[derive(Debug, Error)]
pub enum OcrError {
    /// 엔진 없음 (실행 파일 누락, 언어 데이터 누락)
    #[error("OCR 엔진 사용 불가: {0}")]
    Unavailable(String),

    /// 이미지 설정 실패
    #[error("OCR 이미지 설정 실패: {0}")]
    ImageSetup(String),

    /// 텍스트 추출 실패
    #[error("OCR 텍스트 추출 실패: {0}")]
    Extraction(String),

    /// 빈 이미지 입력
    #[error("빈 이미지: 너비 또는 높이가 0")]
    EmptyImage,

    /// 시간 초과
    #[error("OCR 시간 초과 ({0}ms)")]
    Timeout(u64),

    /// 비동기 작업 실패
    #[error("OCR 비동기 작업 실패: {0}")]
    Async(String),
}

impl From<OcrError> for CoreError {
    fn from(err: OcrError) -> Self {
        match err {
            OcrError::Unavailable(detail) => CoreError::capability_missing("ocr", detail),
            other => CoreError::Unclassifiable(other.to_string()),
        }
    }
}
