//! 통합 테스트용 포트 가짜 구현.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use ncmon_app::coordinator::{RunCoordinator, RunOptions};
use ncmon_core::config::ClassifierConfig;
use ncmon_core::error::CoreError;
use ncmon_core::models::device::{Device, DevicePage};
use ncmon_core::models::ledger::{LedgerKey, LedgerRow, RowWrite, StoredRow};
use ncmon_core::models::offline::{OfflineLicense, OfflinePage, OfflineWindow};
use ncmon_core::models::screenshot::ScreenshotSample;
use ncmon_core::ports::fleet_api::FleetApi;
use ncmon_core::ports::ledger_store::LedgerStore;
use ncmon_core::ports::reachability::{ProbeOutcome, ReachabilityTransport};
use ncmon_core::ports::report_sheet::ReportSheet;
use ncmon_core::ports::text_recognizer::TextRecognizer;
use ncmon_network::ledger_writer::LedgerWriter;
use ncmon_network::prober::ReachabilityProber;
use ncmon_network::retry::RetryPolicy;
use ncmon_vision::classifier::ScreenshotClassifier;
use parking_lot::Mutex;

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 19, 15, 0, 0).unwrap()
}

pub fn ledger_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
}

// ============================================================
// 이미지
// ============================================================

/// 100x100 PNG, 위쪽 `dark_rows`줄은 검정, 나머지는 흰색
pub fn png(dark_rows: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(100, 100, |_, y| {
        if y < dark_rows {
            Rgb([0, 0, 0])
        } else {
            Rgb([240, 240, 240])
        }
    });
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut out, ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

pub fn black_png() -> Vec<u8> {
    png(100)
}

pub fn bright_png() -> Vec<u8> {
    png(0)
}

// ============================================================
// 디바이스
// ============================================================

pub fn device(key: &str, online: bool) -> Device {
    Device {
        license_id: format!("id-{key}"),
        license_key: key.to_string(),
        display_name: format!("Store {key}"),
        online,
        anydesk_id: Some(format!("ad-{key}")),
        timezone: Some("US/Central".to_string()),
        store_hours: None,
    }
}

// ============================================================
// Fleet API
// ============================================================

#[derive(Clone)]
pub enum Shot {
    Image(Vec<u8>, Option<DateTime<Utc>>),
    None,
    Fail(fn() -> CoreError),
}

#[derive(Default)]
pub struct FakeFleet {
    pub devices: Vec<Device>,
    pub shots: HashMap<String, Shot>,
    /// 첫 목록 조회에서 돌려줄 에러
    pub list_error: Mutex<Option<CoreError>>,
    /// 응답에 전체 건수를 싣는지
    pub report_total: bool,
    pub list_calls: AtomicUsize,
    pub shot_calls: AtomicUsize,
    /// 장기 오프라인 라이선스 (페이지로 잘라 돌려줌)
    pub offline: Vec<OfflineLicense>,
    /// `list_offline`이 받은 구간 (호출 순서)
    pub offline_windows: Mutex<Vec<OfflineWindow>>,
}

impl FakeFleet {
    pub fn with_devices(devices: Vec<Device>) -> Self {
        Self {
            devices,
            ..Default::default()
        }
    }

    pub fn shot(mut self, key: &str, shot: Shot) -> Self {
        self.shots.insert(key.to_string(), shot);
        self
    }

    pub fn failing_list(self, err: CoreError) -> Self {
        *self.list_error.lock() = Some(err);
        self
    }
}

#[async_trait]
impl FleetApi for FakeFleet {
    async fn list_devices(&self, page: u32, page_size: u32) -> Result<DevicePage, CoreError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.list_error.lock().take() {
            return Err(err);
        }
        let start = ((page - 1) * page_size) as usize;
        let devices: Vec<Device> = self
            .devices
            .iter()
            .skip(start)
            .take(page_size as usize)
            .cloned()
            .collect();
        Ok(DevicePage {
            fetched: devices.len(),
            devices,
            total_count: self.report_total.then_some(self.devices.len() as u64),
        })
    }

    async fn list_offline(
        &self,
        window: OfflineWindow,
        page: u32,
        page_size: u32,
    ) -> Result<OfflinePage, CoreError> {
        self.offline_windows.lock().push(window);
        if let Some(err) = self.list_error.lock().take() {
            return Err(err);
        }
        let start = ((page - 1) * page_size) as usize;
        let licenses: Vec<OfflineLicense> = self
            .offline
            .iter()
            .skip(start)
            .take(page_size as usize)
            .cloned()
            .collect();
        Ok(OfflinePage {
            fetched: licenses.len(),
            licenses,
            total_count: self.report_total.then_some(self.offline.len() as u64),
        })
    }

    async fn fetch_screenshot(
        &self,
        device: &Device,
    ) -> Result<Option<ScreenshotSample>, CoreError> {
        self.shot_calls.fetch_add(1, Ordering::SeqCst);
        match self.shots.get(device.id()).cloned() {
            Some(Shot::Image(image, captured_at)) => Ok(Some(ScreenshotSample {
                device_id: device.id().to_string(),
                image,
                captured_at,
                source: format!("fake://{}", device.id()),
            })),
            Some(Shot::Fail(err)) => Err(err()),
            Some(Shot::None) | None => Ok(None),
        }
    }
}

// ============================================================
// OCR
// ============================================================

#[derive(Default)]
pub struct FakeOcr {
    pub text: String,
    pub missing: bool,
    pub calls: AtomicUsize,
}

impl FakeOcr {
    pub fn reading(text: &str) -> Self {
        Self {
            text: text.to_string(),
            ..Default::default()
        }
    }

    pub fn missing() -> Self {
        Self {
            missing: true,
            ..Default::default()
        }
    }
}

#[async_trait]
impl TextRecognizer for FakeOcr {
    async fn ensure_available(&self) -> Result<(), CoreError> {
        if self.missing {
            return Err(CoreError::capability_missing("ocr", "fake engine absent"));
        }
        Ok(())
    }

    async fn recognize(&self, _image: &[u8]) -> Result<String, CoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.text.clone())
    }

    fn name(&self) -> &str {
        "fake-ocr"
    }
}

// ============================================================
// 원격 접속
// ============================================================

#[derive(Default)]
pub struct FakeTransport {
    pub missing: bool,
    /// 거부할 원격 ID
    pub refuse: Vec<String>,
    /// 접속 시도한 원격 ID (호출 순서)
    pub connected: Mutex<Vec<String>>,
}

impl FakeTransport {
    pub fn attempts(&self) -> Vec<String> {
        self.connected.lock().clone()
    }
}

#[async_trait]
impl ReachabilityTransport for FakeTransport {
    async fn ensure_available(&self) -> Result<(), CoreError> {
        if self.missing {
            return Err(CoreError::capability_missing("anydesk", "fake client absent"));
        }
        Ok(())
    }

    async fn connect(&self, remote_id: &str) -> Result<ProbeOutcome, CoreError> {
        self.connected.lock().push(remote_id.to_string());
        if self.refuse.iter().any(|r| r == remote_id) {
            return Ok(ProbeOutcome::Refused("offline".to_string()));
        }
        Ok(ProbeOutcome::Connected)
    }

    fn name(&self) -> &str {
        "fake-anydesk"
    }
}

// ============================================================
// 원장
// ============================================================

#[derive(Default)]
pub struct MemoryLedger {
    pub tabs: Mutex<HashMap<NaiveDate, Vec<LedgerRow>>>,
    pub failures: Mutex<VecDeque<CoreError>>,
    pub write_calls: AtomicUsize,
}

impl MemoryLedger {
    pub fn rows(&self, date: NaiveDate) -> Vec<LedgerRow> {
        self.tabs.lock().get(&date).cloned().unwrap_or_default()
    }

    pub fn keys(&self, date: NaiveDate) -> Vec<LedgerKey> {
        self.rows(date).iter().map(LedgerRow::key).collect()
    }

    pub fn row(&self, date: NaiveDate, device_id: &str) -> Option<LedgerRow> {
        self.rows(date).into_iter().find(|r| r.device_id == device_id)
    }

    pub fn writes(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LedgerStore for MemoryLedger {
    async fn ensure_partition(&self, date: NaiveDate) -> Result<(), CoreError> {
        self.tabs.lock().entry(date).or_default();
        Ok(())
    }

    async fn read_rows(&self, date: NaiveDate) -> Result<Vec<StoredRow>, CoreError> {
        Ok(self
            .rows(date)
            .into_iter()
            .enumerate()
            .map(|(i, row)| StoredRow {
                row_number: i as u32 + 2,
                row,
            })
            .collect())
    }

    async fn write_batch(&self, date: NaiveDate, writes: &[RowWrite]) -> Result<(), CoreError> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.failures.lock().pop_front() {
            return Err(err);
        }
        let mut tabs = self.tabs.lock();
        let rows = tabs.entry(date).or_default();
        for write in writes {
            match write {
                RowWrite::Update { row_number, row } => {
                    rows[*row_number as usize - 2] = row.clone();
                }
                RowWrite::Append { row } => rows.push(row.clone()),
            }
        }
        Ok(())
    }
}

pub fn offline_license(id: u32, days: u32) -> OfflineLicense {
    OfflineLicense {
        license_id: id.to_string(),
        license_key: format!("LK-{id}"),
        timezone: Some("US/Central".to_string()),
        days_offline: Some(days.to_string()),
        pi_status: Some("0".to_string()),
        dealer: Some("Acme".to_string()),
        host: None,
    }
}

/// 이름별 탭을 통째로 보관하는 보고 시트
#[derive(Default)]
pub struct MemorySheet {
    /// 탭 이름 → (헤더, 데이터 행)
    pub tabs: Mutex<HashMap<String, (Vec<String>, Vec<Vec<String>>)>>,
    pub failures: Mutex<VecDeque<CoreError>>,
    pub calls: AtomicUsize,
}

impl MemorySheet {
    pub fn tab(&self, title: &str) -> Option<(Vec<String>, Vec<Vec<String>>)> {
        self.tabs.lock().get(title).cloned()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReportSheet for MemorySheet {
    async fn replace_tab(
        &self,
        title: &str,
        headers: &[&str],
        rows: &[Vec<String>],
    ) -> Result<(), CoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.failures.lock().pop_front() {
            return Err(err);
        }
        self.tabs.lock().insert(
            title.to_string(),
            (headers.iter().map(|h| h.to_string()).collect(), rows.to_vec()),
        );
        Ok(())
    }
}

// ============================================================
// 조립
// ============================================================

pub struct Harness {
    pub fleet: Arc<FakeFleet>,
    pub ocr: Arc<FakeOcr>,
    pub transport: Option<Arc<FakeTransport>>,
    pub ledger: Arc<MemoryLedger>,
    pub classifier_config: ClassifierConfig,
    pub options: RunOptions,
}

impl Harness {
    pub fn new(fleet: FakeFleet) -> Self {
        Self {
            fleet: Arc::new(fleet),
            ocr: Arc::new(FakeOcr::default()),
            transport: None,
            ledger: Arc::new(MemoryLedger::default()),
            classifier_config: ClassifierConfig::default(),
            options: RunOptions {
                page_size: 2,
                workers: 3,
                probe_quota: None,
                only_during_store_hours: false,
                store_open_grace: chrono::Duration::minutes(5),
                ledger_tz: chrono_tz::US::Central,
            },
        }
    }

    pub fn ocr(mut self, ocr: FakeOcr) -> Self {
        self.ocr = Arc::new(ocr);
        self
    }

    pub fn reachability(mut self, transport: FakeTransport, quota: Option<u32>) -> Self {
        self.transport = Some(Arc::new(transport));
        self.options.probe_quota = quota;
        self
    }

    pub fn ledger(mut self, ledger: Arc<MemoryLedger>) -> Self {
        self.ledger = ledger;
        self
    }

    pub fn coordinator(&self) -> RunCoordinator {
        self.coordinator_with(self.fleet.clone())
    }

    /// 가짜 대신 주어진 Fleet 클라이언트로 조립
    pub fn coordinator_with(&self, fleet: Arc<dyn FleetApi>) -> RunCoordinator {
        let classifier = ScreenshotClassifier::new(&self.classifier_config, self.ocr.clone())
            .expect("classifier");
        let prober = self.transport.as_ref().map(|t| {
            Arc::new(ReachabilityProber::new(
                t.clone(),
                Duration::from_millis(500),
            ))
        });
        let writer = LedgerWriter::new(
            self.ledger.clone(),
            10,
            RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(5)),
        );
        RunCoordinator::new(
            fleet,
            Arc::new(classifier),
            prober,
            writer,
            self.options.clone(),
        )
    }
}
