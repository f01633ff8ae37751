//! 스냅샷 보고 탭 포트.
//!
//! 구현: `ncmon-network` crate (`SheetsLedgerStore`)

use async_trait::async_trait;

use crate::error::CoreError;

/// 이름으로 지정한 탭을 통째로 다시 쓰는 보고 시트
///
/// 에러 분류는 `LedgerStore`와 같다 (`RateLimit`/`TransientFetch`만 재시도 대상).
#[async_trait]
pub trait ReportSheet: Send + Sync {
    /// 탭이 없으면 만들고, 헤더를 쓰고, 기존 데이터 행을 `rows`로 대체
    async fn replace_tab(
        &self,
        title: &str,
        headers: &[&str],
        rows: &[Vec<String>],
    ) -> Result<(), CoreError>;
}
