//! 장기 오프라인 라이선스 보고.
//!
//! 오프라인 일수 구간에 드는 라이선스를 끝까지 페이지 조회한 뒤 보고 탭 하나를
//! 통째로 대체한다. 점검 실행과 별개로 `ncmon --offline-report`로 돌린다.

use std::collections::HashSet;
use std::sync::Arc;

use ncmon_core::config::AppConfig;
use ncmon_core::error::CoreError;
use ncmon_core::models::offline::{OfflineLicense, OfflineWindow, OFFLINE_HEADERS};
use ncmon_core::ports::fleet_api::FleetApi;
use ncmon_core::ports::report_sheet::ReportSheet;
use ncmon_network::retry::RetryPolicy;
use serde::Serialize;
use tracing::{debug, info};

use crate::coordinator::is_last_page;

#[derive(Debug, Clone)]
pub struct OfflineReportOptions {
    pub window: OfflineWindow,
    pub page_size: u32,
    pub tab_title: String,
    /// 탭 쓰기 재시도
    pub retry: RetryPolicy,
}

impl OfflineReportOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            window: config.offline_report.window(),
            page_size: config.fleet.page_size,
            tab_title: config.offline_report.tab_title.clone(),
            retry: RetryPolicy::for_ledger(&config.ledger),
        }
    }
}

/// 보고 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OfflineReportSummary {
    pub tab_title: String,
    pub licenses: usize,
    pub pages: u32,
}

pub struct OfflineReport {
    fleet: Arc<dyn FleetApi>,
    sheet: Arc<dyn ReportSheet>,
    options: OfflineReportOptions,
}

impl OfflineReport {
    pub fn new(
        fleet: Arc<dyn FleetApi>,
        sheet: Arc<dyn ReportSheet>,
        options: OfflineReportOptions,
    ) -> Self {
        Self {
            fleet,
            sheet,
            options,
        }
    }

    /// 조회 → 탭 대체. 조회가 중간에 실패하면 탭은 건드리지 않는다.
    pub async fn run(&self) -> Result<OfflineReportSummary, CoreError> {
        let OfflineWindow { days_from, days_to } = self.options.window;
        info!("장기 오프라인 보고 시작: {days_from}-{days_to}일");

        let (licenses, pages) = self.fetch_all().await?;
        let rows: Vec<Vec<String>> = licenses.iter().map(OfflineLicense::to_cells).collect();

        let title = self.options.tab_title.as_str();
        self.options
            .retry
            .run("보고 탭 교체", || {
                self.sheet.replace_tab(title, &OFFLINE_HEADERS, &rows)
            })
            .await?;

        info!("장기 오프라인 보고 완료: {}건 → {title}", rows.len());
        Ok(OfflineReportSummary {
            tab_title: title.to_string(),
            licenses: rows.len(),
            pages,
        })
    }

    async fn fetch_all(&self) -> Result<(Vec<OfflineLicense>, u32), CoreError> {
        let page_size = self.options.page_size;
        let mut licenses: Vec<OfflineLicense> = Vec::new();
        let mut seen: HashSet<(String, String)> = HashSet::new();
        let mut fetched: u64 = 0;
        let mut page = 1;

        loop {
            let result = self
                .fleet
                .list_offline(self.options.window, page, page_size)
                .await?;
            fetched += result.fetched as u64;

            for license in result.licenses {
                let key = (license.license_id.clone(), license.license_key.clone());
                if seen.insert(key) {
                    licenses.push(license);
                } else {
                    debug!("중복 라이선스 무시: {}", license.license_id);
                }
            }

            if is_last_page(result.fetched, page_size, fetched, result.total_count) {
                break;
            }
            page += 1;
        }
        Ok((licenses, page))
    }
}
