//! NC Monitoring 핵심 에러 타입.
//!
//! 어댑터 crate는 자체 에러를 이 타입으로 매핑해 포트 경계를 넘긴다.
//! 실행 단위 치명 에러와 디바이스 단위 에러의 구분은 [`CoreError::is_fatal`]이 결정한다.

use thiserror::Error;

/// 코어 레이어 에러.
#[derive(Debug, Error)]
pub enum CoreError {
    /// 일시적 조회 실패 (네트워크, 5xx) — 재시도 가능
    #[error("일시적 조회 실패: {0}")]
    TransientFetch(String),

    /// 인증 실패 (로그인 거부, 재로그인 후에도 401)
    #[error("인증 에러: {0}")]
    Auth(String),

    /// 응답 형식 불일치 (API 계약 변경)
    #[error("프로토콜 에러: {0}")]
    Protocol(String),

    /// 이미지 판독 불가 (손상/미지원 형식)
    #[error("분류 불가: {0}")]
    Unclassifiable(String),

    /// 외부 기능 부재 (OCR 엔진, 원격 데스크톱 클라이언트)
    #[error("{capability} 사용 불가: {detail}")]
    CapabilityMissing {
        /// 기능 이름 (예: "tesseract", "anydesk")
        capability: String,
        /// 상세 사유
        detail: String,
    },

    /// Rate Limit 초과 (429)
    #[error("요청 한도 초과, {retry_after_secs}초 후 재시도")]
    RateLimit {
        /// 서버 지정 대기 시간 (초)
        retry_after_secs: u64,
    },

    /// 원장 쓰기 실패 (배치 단위)
    #[error("원장 쓰기 실패: {0}")]
    LedgerWrite(String),

    /// 설정값 오류
    #[error("설정 에러: {0}")]
    Config(String),

    /// JSON 직렬화/역직렬화 실패
    #[error("직렬화 에러: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O 에러
    #[error("I/O 에러: {0}")]
    Io(#[from] std::io::Error),

    /// 내부 에러 (예상치 못한 상황)
    #[error("내부 에러: {0}")]
    Internal(String),
}

impl CoreError {
    /// 외부 기능 부재 에러 생성
    pub fn capability_missing(capability: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::CapabilityMissing {
            capability: capability.into(),
            detail: detail.into(),
        }
    }

    /// 실행 전체를 중단시켜야 하는 에러인지
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CoreError::Auth(_)
                | CoreError::Protocol(_)
                | CoreError::CapabilityMissing { .. }
                | CoreError::Config(_)
        )
    }

    /// 백오프 후 재시도해도 되는 에러인지
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CoreError::TransientFetch(_) | CoreError::RateLimit { .. }
        )
    }
}
