//! 점검 실행 코디네이터.
//!
//! 한 번의 실행을 `Idle → Fetching → Classifying → Probing → Reconciling → Done`
//! 순서로 진행한다. 치명 에러(인증, 계약 변경, 외부 도구 부재)만 `Aborted`로 보내고
//! 디바이스 단위 실패는 리포트에 모은다.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use futures::{stream, StreamExt, TryStreamExt};
use ncmon_core::config::AppConfig;
use ncmon_core::error::CoreError;
use ncmon_core::models::device::Device;
use ncmon_core::models::ledger::LedgerRow;
use ncmon_core::models::report::{DeviceFailure, FailureStage, RunReport, RunState};
use ncmon_core::models::store_hours::StoreStatus;
use ncmon_core::models::verdict::{
    Evidence, HealthCategory, HealthVerdict, ReachabilityCategory, ReachabilityVerdict,
};
use ncmon_core::ports::fleet_api::FleetApi;
use ncmon_network::ledger_writer::LedgerWriter;
use ncmon_network::prober::{skipped_verdict, ReachabilityProber};
use ncmon_vision::classifier::{missing_verdict, ScreenshotClassifier};
use tracing::{debug, error, info, warn};

use crate::quota::RunQuota;

/// 실행 옵션 (설정에서 추출)
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub page_size: u32,
    pub workers: usize,
    pub probe_quota: Option<u32>,
    pub only_during_store_hours: bool,
    pub store_open_grace: chrono::Duration,
    /// 원장 날짜를 정하는 시간대
    pub ledger_tz: Tz,
}

impl RunOptions {
    pub fn from_config(config: &AppConfig) -> Result<Self, CoreError> {
        Ok(Self {
            page_size: config.fleet.page_size,
            workers: config.run.workers.max(1),
            probe_quota: config.reachability.probe_quota,
            only_during_store_hours: config.classifier.only_during_store_hours,
            store_open_grace: chrono::Duration::seconds(
                config.classifier.store_open_grace_secs as i64,
            ),
            ledger_tz: config.ledger.tz()?,
        })
    }
}

/// 디바이스 1대의 분류 결과
struct HealthOutcome {
    verdict: HealthVerdict,
    failure: Option<DeviceFailure>,
}

/// 점검 대상별 결정 (실제 점검 전에 한도를 순서대로 배정)
enum ProbePlan<'a> {
    Probe(&'a Device),
    Skip(&'a Device),
}

pub struct RunCoordinator {
    fleet: Arc<dyn FleetApi>,
    classifier: Arc<ScreenshotClassifier>,
    /// `None`이면 원격 점검 비활성
    prober: Option<Arc<ReachabilityProber>>,
    writer: LedgerWriter,
    options: RunOptions,
}

impl RunCoordinator {
    pub fn new(
        fleet: Arc<dyn FleetApi>,
        classifier: Arc<ScreenshotClassifier>,
        prober: Option<Arc<ReachabilityProber>>,
        writer: LedgerWriter,
        options: RunOptions,
    ) -> Self {
        Self {
            fleet,
            classifier,
            prober,
            writer,
            options,
        }
    }

    /// 현재 시각 기준 1회 실행
    pub async fn run(&self) -> RunReport {
        self.run_at(Utc::now()).await
    }

    /// `now` 기준 1회 실행. 같은 입력이면 같은 판정을 낸다.
    pub async fn run_at(&self, now: DateTime<Utc>) -> RunReport {
        let mut report = RunReport::new(now);
        info!(run_id = %report.run_id, "점검 실행 시작");

        if let Err(e) = self.execute(&mut report, now).await {
            error!(run_id = %report.run_id, "실행 중단: {e}");
            report.health.clear();
            report.reachability.clear();
            report.abort_cause = Some(e.to_string());
            transition(&mut report, RunState::Aborted);
        }

        report.finished_at = Some(Utc::now());
        report.recount();
        info!(
            run_id = %report.run_id,
            "점검 실행 종료: {:?}, 화면 {}건, 원격 {}건, 디바이스 실패 {}건",
            report.state,
            report.health.len(),
            report.reachability.len(),
            report.device_failures.len()
        );
        report
    }

    async fn execute(&self, report: &mut RunReport, now: DateTime<Utc>) -> Result<(), CoreError> {
        // 외부 도구는 실행 시작 시 1회만 확인
        self.classifier.ensure_available().await?;
        if let Some(prober) = &self.prober {
            prober.ensure_available().await?;
        }

        transition(report, RunState::Fetching);
        let devices = self.fetch_devices().await?;

        transition(report, RunState::Classifying);
        let (candidates, outside): (Vec<&Device>, Vec<&Device>) =
            devices.iter().partition(|d| self.in_store_hours(d, now));
        report.outside_store_hours = outside.len();
        if !outside.is_empty() {
            info!("영업시간 외 {}대 분류 제외", outside.len());
        }
        for outcome in self.classify_all(&candidates, now).await? {
            report.health.push(outcome.verdict);
            report.device_failures.extend(outcome.failure);
        }

        transition(report, RunState::Probing);
        if let Some(prober) = &self.prober {
            report.reachability = self.probe_offline(prober, &devices, now).await?;
        }

        transition(report, RunState::Reconciling);
        let rows = self.ledger_rows(&devices, report, now);
        let upsert = self.writer.upsert(rows).await;
        report.ledger = (&upsert).into();

        transition(report, RunState::Done);
        Ok(())
    }

    // ============================================================
    // Fetching
    // ============================================================

    /// 빈 페이지, 페이지 크기 미만, 전체 건수 도달 중 먼저 오는 조건까지 조회
    ///
    /// 페이지 끝 판정은 변환 전 레코드 수로 한다. 키 없는 레코드가 빠진 페이지도
    /// 가득 찬 페이지로 본다.
    async fn fetch_devices(&self) -> Result<Vec<Device>, CoreError> {
        let page_size = self.options.page_size;
        let mut devices: Vec<Device> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut fetched: u64 = 0;
        let mut page = 1;

        loop {
            let result = self.fleet.list_devices(page, page_size).await?;
            let count = result.fetched;
            fetched += count as u64;
            debug!(
                "디바이스 페이지 {page}: 레코드 {count}건, 디바이스 {}대",
                result.devices.len()
            );

            for device in result.devices {
                if seen.insert(device.id().to_string()) {
                    devices.push(device);
                } else {
                    debug!("중복 디바이스 무시: {}", device.id());
                }
            }

            if is_last_page(count, page_size, fetched, result.total_count) {
                break;
            }
            page += 1;
        }

        info!("디바이스 {}대 조회 완료 ({page} 페이지)", devices.len());
        Ok(devices)
    }

    // ============================================================
    // Classifying
    // ============================================================

    fn in_store_hours(&self, device: &Device, now: DateTime<Utc>) -> bool {
        if !self.options.only_during_store_hours {
            return true;
        }
        let (Some(hours), Some(tz)) = (&device.store_hours, device.tz()) else {
            debug!(device = %device.id(), "영업시간 또는 시간대 정보 없음 → 휴무 처리");
            return false;
        };
        hours.status_at(tz, now, self.options.store_open_grace) == StoreStatus::Open
    }

    async fn classify_all(
        &self,
        devices: &[&Device],
        now: DateTime<Utc>,
    ) -> Result<Vec<HealthOutcome>, CoreError> {
        stream::iter(devices.iter().copied())
            .map(|device| self.classify_one(device, now))
            .buffered(self.options.workers)
            .try_collect()
            .await
    }

    async fn classify_one(
        &self,
        device: &Device,
        now: DateTime<Utc>,
    ) -> Result<HealthOutcome, CoreError> {
        let sample = match self.fleet.fetch_screenshot(device).await {
            Ok(Some(sample)) => sample,
            Ok(None) => {
                return Ok(HealthOutcome {
                    verdict: missing_verdict(device.id(), now),
                    failure: None,
                })
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(device = %device.id(), "스크린샷 조회 실패: {e}");
                return Ok(HealthOutcome {
                    verdict: HealthVerdict {
                        device_id: device.id().to_string(),
                        category: HealthCategory::Unclassifiable,
                        evidence: Evidence::detail(e.to_string()),
                        checked_at: now,
                    },
                    failure: Some(DeviceFailure {
                        device_id: device.id().to_string(),
                        stage: FailureStage::Fetch,
                        reason: e.to_string(),
                    }),
                });
            }
        };

        let verdict = self.classifier.classify(&sample, now).await?;
        let failure = (verdict.category == HealthCategory::Unclassifiable).then(|| DeviceFailure {
            device_id: device.id().to_string(),
            stage: FailureStage::Classify,
            reason: verdict.evidence.summary(),
        });
        Ok(HealthOutcome { verdict, failure })
    }

    // ============================================================
    // Probing
    // ============================================================

    /// 오프라인 디바이스만 점검. 한도는 조회 순서대로 배정한다.
    async fn probe_offline(
        &self,
        prober: &ReachabilityProber,
        devices: &[Device],
        now: DateTime<Utc>,
    ) -> Result<Vec<ReachabilityVerdict>, CoreError> {
        let quota = RunQuota::new(self.options.probe_quota);
        let plans: Vec<ProbePlan<'_>> = devices
            .iter()
            .filter(|d| !d.online)
            .map(|device| {
                // 원격 ID가 없으면 한도를 쓰지 않고 바로 Unreachable
                if device.anydesk_id.is_none() || quota.try_acquire() {
                    ProbePlan::Probe(device)
                } else {
                    ProbePlan::Skip(device)
                }
            })
            .collect();

        info!(
            "원격 점검 대상 {}대 (한도 사용 {}, 잔여 {:?})",
            plans.len(),
            quota.used(),
            quota.remaining()
        );

        stream::iter(plans)
            .map(|plan| async move {
                match plan {
                    ProbePlan::Probe(device) => prober.probe(device, now).await,
                    ProbePlan::Skip(device) => {
                        debug!(device = %device.id(), "점검 한도 소진 → 건너뜀");
                        Ok(skipped_verdict(device, now))
                    }
                }
            })
            .buffered(self.options.workers)
            .try_collect()
            .await
    }

    // ============================================================
    // Reconciling
    // ============================================================

    /// 디바이스마다 원장 행 1개. 판정이 없는 칸은 비워 두어 기존 값을 유지한다.
    fn ledger_rows(&self, devices: &[Device], report: &RunReport, now: DateTime<Utc>) -> Vec<LedgerRow> {
        let date = now.with_timezone(&self.options.ledger_tz).date_naive();
        let health_by_id: HashMap<&str, &HealthVerdict> = report
            .health
            .iter()
            .map(|v| (v.device_id.as_str(), v))
            .collect();
        let reach_by_id: HashMap<&str, &ReachabilityVerdict> = report
            .reachability
            .iter()
            .map(|v| (v.device_id.as_str(), v))
            .collect();

        devices
            .iter()
            .filter_map(|device| {
                let health = health_by_id.get(device.id()).copied();
                let reach = reach_by_id.get(device.id()).copied();
                if health.is_none() && reach.is_none() {
                    return None;
                }
                Some(LedgerRow {
                    date,
                    device_id: device.id().to_string(),
                    display_name: device.display_name.clone(),
                    health: health.map(|v| v.category.label().to_string()),
                    health_evidence: health.map(|v| v.evidence.summary()),
                    reachability: reach.map(reachability_cell),
                    checked_at: Some(now),
                })
            })
            .collect()
    }
}

/// 변환 전 레코드 수 기준 페이지 끝 판정 (빈 페이지, 짧은 페이지, 전체 건수 도달)
pub(crate) fn is_last_page(count: usize, page_size: u32, fetched: u64, total: Option<u64>) -> bool {
    count < page_size as usize || total.is_some_and(|total| fetched >= total)
}

fn reachability_cell(verdict: &ReachabilityVerdict) -> String {
    match (&verdict.category, &verdict.detail) {
        (ReachabilityCategory::Unreachable, Some(detail)) => {
            format!("{} ({detail})", verdict.category.label())
        }
        (category, _) => category.label().to_string(),
    }
}

fn transition(report: &mut RunReport, next: RunState) {
    if !report.state.can_transition_to(next) {
        warn!("허용되지 않은 상태 전이: {:?} → {next:?}", report.state);
    }
    debug!("상태 전이: {:?} → {next:?}", report.state);
    report.state = next;
}
