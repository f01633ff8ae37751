//! 장기 오프라인 보고 통합 테스트.

mod support;

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use ncmon_app::offline_report::{OfflineReport, OfflineReportOptions};
use ncmon_core::error::CoreError;
use ncmon_core::models::offline::{OfflineWindow, OFFLINE_HEADERS};
use ncmon_network::retry::RetryPolicy;
use support::{offline_license, FakeFleet, MemorySheet};

const TAB: &str = "Offline 6-30 Days";

fn options() -> OfflineReportOptions {
    OfflineReportOptions {
        window: OfflineWindow {
            days_from: 6,
            days_to: 30,
        },
        page_size: 2,
        tab_title: TAB.to_string(),
        retry: RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(2)),
    }
}

fn report(fleet: &Arc<FakeFleet>, sheet: &Arc<MemorySheet>) -> OfflineReport {
    OfflineReport::new(fleet.clone(), sheet.clone(), options())
}

fn fleet_with(ids: &[u32]) -> Arc<FakeFleet> {
    Arc::new(FakeFleet {
        offline: ids.iter().map(|&id| offline_license(id, 6 + id)).collect(),
        ..Default::default()
    })
}

#[tokio::test]
async fn pages_to_the_end_and_writes_every_license() {
    let fleet = fleet_with(&[1, 2, 3, 4, 5]);
    let sheet = Arc::new(MemorySheet::default());

    let summary = report(&fleet, &sheet).run().await.unwrap();
    assert_eq!(summary.licenses, 5);
    assert_eq!(summary.pages, 3);
    assert_eq!(summary.tab_title, TAB);

    let (headers, rows) = sheet.tab(TAB).unwrap();
    assert_eq!(headers, OFFLINE_HEADERS);
    assert_eq!(rows.len(), 5);
    assert_eq!(rows[0], ["1", "LK-1", "US/Central", "7", "0", "Acme", ""]);

    let windows = fleet.offline_windows.lock().clone();
    assert_eq!(windows.len(), 3);
    assert!(windows.iter().all(|w| w.days_from == 6 && w.days_to == 30));
}

#[tokio::test]
async fn exact_multiple_of_page_size_stops_on_empty_page() {
    let fleet = fleet_with(&[1, 2, 3, 4]);
    let sheet = Arc::new(MemorySheet::default());

    let summary = report(&fleet, &sheet).run().await.unwrap();
    assert_eq!(summary.licenses, 4);
    assert_eq!(summary.pages, 3);
}

#[tokio::test]
async fn total_count_ends_paging_without_an_extra_request() {
    let fleet = Arc::new(FakeFleet {
        offline: (1..=4).map(|id| offline_license(id, 10)).collect(),
        report_total: true,
        ..Default::default()
    });
    let sheet = Arc::new(MemorySheet::default());

    let summary = report(&fleet, &sheet).run().await.unwrap();
    assert_eq!(summary.pages, 2);
    assert_eq!(fleet.offline_windows.lock().len(), 2);
}

#[tokio::test]
async fn rerun_replaces_the_previous_snapshot() {
    let sheet = Arc::new(MemorySheet::default());
    report(&fleet_with(&[1, 2, 3]), &sheet).run().await.unwrap();
    report(&fleet_with(&[9]), &sheet).run().await.unwrap();

    let (_, rows) = sheet.tab(TAB).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][0], "9");
}

#[tokio::test]
async fn empty_result_still_clears_the_tab() {
    let sheet = Arc::new(MemorySheet::default());
    report(&fleet_with(&[1, 2]), &sheet).run().await.unwrap();

    let summary = report(&fleet_with(&[]), &sheet).run().await.unwrap();
    assert_eq!(summary.licenses, 0);
    assert!(sheet.tab(TAB).unwrap().1.is_empty());
}

#[tokio::test]
async fn duplicate_license_across_pages_is_written_once() {
    let fleet = Arc::new(FakeFleet {
        offline: vec![
            offline_license(1, 7),
            offline_license(2, 8),
            offline_license(2, 8),
        ],
        ..Default::default()
    });
    let sheet = Arc::new(MemorySheet::default());

    let summary = report(&fleet, &sheet).run().await.unwrap();
    assert_eq!(summary.licenses, 2);
}

#[tokio::test]
async fn fetch_failure_leaves_the_tab_untouched() {
    let fleet = fleet_with(&[1]);
    *fleet.list_error.lock() = Some(CoreError::Auth("로그인 실패".into()));
    let sheet = Arc::new(MemorySheet::default());

    let err = report(&fleet, &sheet).run().await.unwrap_err();
    assert_matches!(err, CoreError::Auth(_));
    assert_eq!(sheet.calls(), 0);
}

#[tokio::test]
async fn rate_limited_write_is_retried() {
    let fleet = fleet_with(&[1, 2]);
    let sheet = Arc::new(MemorySheet::default());
    sheet
        .failures
        .lock()
        .push_back(CoreError::RateLimit { retry_after_secs: 0 });

    report(&fleet, &sheet).run().await.unwrap();
    assert_eq!(sheet.calls(), 2);
    assert_eq!(sheet.tab(TAB).unwrap().1.len(), 2);
}

#[tokio::test]
async fn rejected_write_is_not_retried() {
    let fleet = fleet_with(&[1]);
    let sheet = Arc::new(MemorySheet::default());
    sheet
        .failures
        .lock()
        .push_back(CoreError::LedgerWrite("invalid range".into()));

    let err = report(&fleet, &sheet).run().await.unwrap_err();
    assert_matches!(err, CoreError::LedgerWrite(_));
    assert_eq!(sheet.calls(), 1);
}
