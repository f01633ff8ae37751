//! 원격 데스크톱 접속 포트.
//!
//! 구현: `ncmon-network` crate (`AnyDeskTransport`)

use async_trait::async_trait;

use crate::error::CoreError;

/// 접속 시도 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// 세션 수립 성공
    Connected,
    /// 상대가 응답하지 않거나 거부 (사유 포함)
    Refused(String),
}

/// 원격 데스크톱 접속 수단
///
/// 타임아웃은 호출자(`ReachabilityProber`)가 건다.
#[async_trait]
pub trait ReachabilityTransport: Send + Sync {
    /// 실행 전 1회 호출 — 도구가 없으면 `CapabilityMissing`
    async fn ensure_available(&self) -> Result<(), CoreError>;

    /// `remote_id`로 접속 시도
    async fn connect(&self, remote_id: &str) -> Result<ProbeOutcome, CoreError>;

    fn name(&self) -> &str;
}
