//! 원장 upsert 속성 테스트.
//!
//! 같은 날 실행을 몇 번 반복하든 (날짜, 디바이스) 키당 행은 하나뿐이어야 한다.

mod support;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use ncmon_core::models::ledger::LedgerRow;
use ncmon_network::ledger_writer::LedgerWriter;
use ncmon_network::retry::RetryPolicy;
use proptest::prelude::*;
use support::{ledger_date, MemoryLedger};

const HEALTH: [&str; 4] = ["HEALTHY", "BLACK_SCREEN", "ERROR_DISPLAYED", "STALE_SCREENSHOT"];
const REACH: [&str; 3] = ["REACHABLE", "UNREACHABLE", "SKIPPED_QUOTA"];

/// (디바이스 번호, 화면 판정 인덱스, 원격 판정 인덱스)
type Entry = (u8, Option<usize>, Option<usize>);

fn row((device, health, reach): Entry) -> LedgerRow {
    LedgerRow {
        date: ledger_date(),
        device_id: format!("LK-{device}"),
        display_name: format!("Store {device}"),
        health: health.map(|i| HEALTH[i].to_string()),
        health_evidence: health.map(|_| "dark=0.10".to_string()),
        reachability: reach.map(|i| REACH[i].to_string()),
        checked_at: None,
    }
}

fn entry() -> impl Strategy<Value = Entry> {
    (
        0u8..12,
        proptest::option::of(0..HEALTH.len()),
        proptest::option::of(0..REACH.len()),
    )
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn repeated_runs_never_duplicate_keys(
        runs in prop::collection::vec(prop::collection::vec(entry(), 0..15), 1..5),
        batch_size in 1usize..6,
    ) {
        let ledger = Arc::new(MemoryLedger::default());
        let writer = LedgerWriter::new(
            ledger.clone(),
            batch_size,
            RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(1)),
        );

        let rt = runtime();
        let mut seen: HashSet<String> = HashSet::new();
        for run in &runs {
            let rows: Vec<LedgerRow> = run.iter().copied().map(row).collect();
            seen.extend(rows.iter().map(|r| r.device_id.clone()));
            let report = rt.block_on(writer.upsert(rows));
            prop_assert_eq!(report.failed(), 0);
        }

        let keys = ledger.keys(ledger_date());
        let unique: HashSet<_> = keys.iter().cloned().collect();
        prop_assert_eq!(keys.len(), unique.len());
        prop_assert_eq!(keys.len(), seen.len());
    }

    #[test]
    fn last_known_value_wins_per_column(
        runs in prop::collection::vec(prop::collection::vec(entry(), 1..10), 1..4),
    ) {
        let ledger = Arc::new(MemoryLedger::default());
        let writer = LedgerWriter::new(
            ledger.clone(),
            4,
            RetryPolicy::new(1, Duration::from_millis(1), Duration::from_millis(1)),
        );

        let rt = runtime();
        for run in &runs {
            rt.block_on(writer.upsert(run.iter().copied().map(row).collect()));
        }

        for stored in ledger.rows(ledger_date()) {
            let expected_health = runs
                .iter()
                .flatten()
                .filter(|(d, _, _)| format!("LK-{d}") == stored.device_id)
                .filter_map(|(_, h, _)| h.map(|i| HEALTH[i]))
                .last();
            let expected_reach = runs
                .iter()
                .flatten()
                .filter(|(d, _, _)| format!("LK-{d}") == stored.device_id)
                .filter_map(|(_, _, r)| r.map(|i| REACH[i]))
                .last();
            prop_assert_eq!(stored.health.as_deref(), expected_health);
            prop_assert_eq!(stored.reachability.as_deref(), expected_reach);
        }
    }
}
