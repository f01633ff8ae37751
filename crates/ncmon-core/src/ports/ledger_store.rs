//! 원장 저장소 포트.
//!
//! 구현: `ncmon-network` crate (`SheetsLedgerStore`, Google Sheets v4)

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::CoreError;
use crate::models::ledger::{RowWrite, StoredRow};

/// 날짜별 파티션(탭)으로 나뉜 원장
///
/// 배치 단위 쓰기는 전부 성공하거나 전부 실패한다고 가정한다.
/// 한도 초과는 `RateLimit`, 일시 장애는 `TransientFetch`로 반환해야 재시도된다.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// 날짜 파티션이 없으면 헤더와 함께 생성
    async fn ensure_partition(&self, date: NaiveDate) -> Result<(), CoreError>;

    /// 파티션의 모든 데이터 행 (헤더 제외)
    async fn read_rows(&self, date: NaiveDate) -> Result<Vec<StoredRow>, CoreError>;

    /// 갱신/추가 묶음 쓰기
    async fn write_batch(&self, date: NaiveDate, writes: &[RowWrite]) -> Result<(), CoreError>;
}
