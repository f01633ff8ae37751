//! 원장 기록기.
//!
//! 날짜별로 기존 행을 한 번 읽어 키 조회표를 만들고, 들어온 행마다 제자리 갱신 또는
//! 추가를 정한 뒤 배치로 나눠 쓴다. 배치 실패는 해당 배치 행만 `Failed`로 남기고
//! 다음 배치는 계속 진행한다.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::NaiveDate;
use ncmon_core::config::LedgerConfig;
use ncmon_core::error::CoreError;
use ncmon_core::models::ledger::{LedgerKey, LedgerRow, RowOutcome, RowWrite, UpsertReport};
use ncmon_core::ports::ledger_store::LedgerStore;
use tracing::{debug, error, info, warn};

use crate::retry::RetryPolicy;

/// 원장 upsert 기록기
pub struct LedgerWriter {
    store: Arc<dyn LedgerStore>,
    batch_size: usize,
    retry: RetryPolicy,
}

impl LedgerWriter {
    pub fn new(store: Arc<dyn LedgerStore>, batch_size: usize, retry: RetryPolicy) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
            retry,
        }
    }

    pub fn from_config(store: Arc<dyn LedgerStore>, config: &LedgerConfig) -> Self {
        Self::new(store, config.batch_size, RetryPolicy::for_ledger(config))
    }

    /// 행 목록을 (날짜, 디바이스) 키로 upsert
    ///
    /// 같은 키가 여러 번 들어오면 뒤의 행을 앞의 행 위에 합쳐 하나로 만든다.
    pub async fn upsert(&self, rows: Vec<LedgerRow>) -> UpsertReport {
        let mut report = UpsertReport::default();

        for (date, rows) in group_by_date(dedupe(rows)) {
            let plan = match self.plan(date, rows.clone()).await {
                Ok(plan) => plan,
                Err(e) => {
                    error!("원장 {date} 준비 실패: {e}");
                    let reason = e.to_string();
                    report.outcomes.extend(
                        rows.iter()
                            .map(|row| (row.key(), RowOutcome::Failed(reason.clone()))),
                    );
                    continue;
                }
            };

            for (index, chunk) in plan.chunks(self.batch_size).enumerate() {
                let writes: Vec<RowWrite> = chunk.iter().map(|(write, _)| write.clone()).collect();
                match self.write_with_retry(date, &writes).await {
                    Ok(()) => {
                        debug!("원장 {date} 배치 {} 완료: {}행", index + 1, writes.len());
                        report.outcomes.extend(
                            chunk
                                .iter()
                                .map(|(write, outcome)| (write.row().key(), outcome.clone())),
                        );
                    }
                    Err(e) => {
                        error!("원장 {date} 배치 {} 최종 실패: {e}", index + 1);
                        let reason = e.to_string();
                        report.outcomes.extend(chunk.iter().map(|(write, _)| {
                            (write.row().key(), RowOutcome::Failed(reason.clone()))
                        }));
                    }
                }
            }
        }

        info!(
            "원장 반영: 추가 {}, 갱신 {}, 실패 {}",
            report.written(),
            report.updated(),
            report.failed()
        );
        report
    }

    /// 기존 행을 한 번 읽고 행마다 갱신/추가 결정
    async fn plan(
        &self,
        date: NaiveDate,
        rows: Vec<LedgerRow>,
    ) -> Result<Vec<(RowWrite, RowOutcome)>, CoreError> {
        self.with_retry("탭 준비", || self.store.ensure_partition(date))
            .await?;
        let existing = self
            .with_retry("기존 행 조회", || self.store.read_rows(date))
            .await?;

        let mut lookup: HashMap<LedgerKey, (u32, LedgerRow)> = HashMap::new();
        for stored in existing {
            let key = stored.row.key();
            if lookup.contains_key(&key) {
                warn!(
                    "원장 {date}: 중복 키 {} (행 {}) 무시, 첫 행만 갱신",
                    key.device_id, stored.row_number
                );
                continue;
            }
            lookup.insert(key, (stored.row_number, stored.row));
        }

        Ok(rows
            .into_iter()
            .map(|row| match lookup.get(&row.key()) {
                Some((row_number, current)) => (
                    RowWrite::Update {
                        row_number: *row_number,
                        row: row.merged_onto(current),
                    },
                    RowOutcome::Updated,
                ),
                None => (RowWrite::Append { row }, RowOutcome::Written),
            })
            .collect())
    }

    async fn write_with_retry(&self, date: NaiveDate, writes: &[RowWrite]) -> Result<(), CoreError> {
        self.with_retry("배치 쓰기", || self.store.write_batch(date, writes))
            .await
    }

    /// 재시도 후에도 실패하면 `LedgerWrite`로 감싼다
    async fn with_retry<F, Fut, T>(&self, what: &str, operation: F) -> Result<T, CoreError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, CoreError>>,
    {
        self.retry.run(what, operation).await.map_err(|e| match e {
            CoreError::LedgerWrite(_) => e,
            other => CoreError::LedgerWrite(format!("{what} 실패: {other}")),
        })
    }
}

/// 같은 키는 하나로 합친다 (처음 나온 순서 유지)
fn dedupe(rows: Vec<LedgerRow>) -> Vec<LedgerRow> {
    let mut index: HashMap<LedgerKey, usize> = HashMap::new();
    let mut unique: Vec<LedgerRow> = Vec::with_capacity(rows.len());
    for row in rows {
        match index.get(&row.key()) {
            Some(&i) => unique[i] = row.merged_onto(&unique[i]),
            None => {
                index.insert(row.key(), unique.len());
                unique.push(row);
            }
        }
    }
    unique
}

fn group_by_date(rows: Vec<LedgerRow>) -> BTreeMap<NaiveDate, Vec<LedgerRow>> {
    let mut groups: BTreeMap<NaiveDate, Vec<LedgerRow>> = BTreeMap::new();
    for row in rows {
        groups.entry(row.date).or_default().push(row);
    }
    groups
}
