//! 실행 설정 구조체.
//!
//! Fleet API 접속 정보, 분류 임계값, 원격 접속 점검, 원장(스프레드시트) 설정 등
//! 한 번의 점검 실행에 필요한 설정을 정의한다. 바이너리가 `config` crate로
//! 파일/환경변수를 겹쳐 로드한 뒤 [`AppConfig::validate`]로 검증한다.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::CoreError;
use crate::models::offline::OfflineWindow;

/// 최상위 실행 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Fleet API 설정
    #[serde(default)]
    pub fleet: FleetConfig,
    /// 스크린샷 분류 설정
    #[serde(default)]
    pub classifier: ClassifierConfig,
    /// 원격 접속(AnyDesk) 점검 설정
    #[serde(default)]
    pub reachability: ReachabilityConfig,
    /// 원장(스프레드시트) 설정
    #[serde(default)]
    pub ledger: LedgerConfig,
    /// 실행 단위 설정
    #[serde(default)]
    pub run: RunConfig,
    /// 장기 오프라인 보고 설정
    #[serde(default)]
    pub offline_report: OfflineReportConfig,
}

// ============================================================
// Fleet API 설정
// ============================================================

/// Fleet API 설정 — 라이선스/스크린샷 조회
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetConfig {
    /// API 기본 URL
    #[serde(default = "default_fleet_base_url")]
    pub base_url: String,
    /// 로그인 사용자명
    #[serde(default)]
    pub username: String,
    /// 로그인 비밀번호
    #[serde(default)]
    pub password: String,
    /// 페이지 크기
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// 요청 타임아웃 (밀리초)
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// 일시적 실패 재시도 횟수
    #[serde(default = "default_fleet_max_retries")]
    pub max_retries: u32,
    /// 최신 스크린샷 선택 시 검토할 파일 수
    #[serde(default = "default_max_screenshot_candidates")]
    pub max_screenshot_candidates: usize,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            base_url: default_fleet_base_url(),
            username: String::new(),
            password: String::new(),
            page_size: default_page_size(),
            request_timeout_ms: default_request_timeout_ms(),
            max_retries: default_fleet_max_retries(),
            max_screenshot_candidates: default_max_screenshot_candidates(),
        }
    }
}

// ============================================================
// 분류 설정
// ============================================================

/// 스크린샷 분류 설정 — 임계값은 재배포 없이 조정 가능해야 한다
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// 검은 화면 판정 비율 (이 값 이상이면 Black)
    #[serde(default = "default_black_ratio_threshold")]
    pub black_ratio_threshold: f64,
    /// 검은 픽셀로 간주할 최대 휘도 (0-255)
    #[serde(default = "default_near_black_luma")]
    pub near_black_luma: u8,
    /// 스크린샷 최대 허용 나이 (초)
    #[serde(default = "default_max_screenshot_age_secs")]
    pub max_screenshot_age_secs: u64,
    /// 에러 화면 문구 (소문자 부분 일치)
    #[serde(default = "default_error_phrases")]
    pub error_phrases: Vec<String>,
    /// 에러 화면 정규식 (스택 트레이스 등)
    #[serde(default = "default_error_patterns")]
    pub error_patterns: Vec<String>,
    /// 매장 영업 시간에만 분류
    #[serde(default)]
    pub only_during_store_hours: bool,
    /// 개점 직후 분류 유예 시간 (초)
    #[serde(default = "default_store_open_grace_secs")]
    pub store_open_grace_secs: u64,
    /// OCR 엔진 설정
    #[serde(default)]
    pub ocr: OcrConfig,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            black_ratio_threshold: default_black_ratio_threshold(),
            near_black_luma: default_near_black_luma(),
            max_screenshot_age_secs: default_max_screenshot_age_secs(),
            error_phrases: default_error_phrases(),
            error_patterns: default_error_patterns(),
            only_during_store_hours: false,
            store_open_grace_secs: default_store_open_grace_secs(),
            ocr: OcrConfig::default(),
        }
    }
}

impl ClassifierConfig {
    /// 최대 허용 나이를 chrono Duration으로 반환
    pub fn max_screenshot_age(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.max_screenshot_age_secs.min(i64::MAX as u64) as i64)
    }
}

/// OCR 엔진 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    /// tesseract 실행 파일 경로
    #[serde(default = "default_tesseract_binary")]
    pub binary_path: PathBuf,
    /// 인식 언어
    #[serde(default = "default_ocr_language")]
    pub language: String,
    /// tessdata 경로 (None이면 시스템 기본값)
    #[serde(default)]
    pub tessdata_path: Option<PathBuf>,
    /// 이미지 1장 OCR 타임아웃 (밀리초)
    #[serde(default = "default_ocr_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            binary_path: default_tesseract_binary(),
            language: default_ocr_language(),
            tessdata_path: None,
            timeout_ms: default_ocr_timeout_ms(),
        }
    }
}

impl OcrConfig {
    /// OCR 타임아웃을 Duration으로 반환
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

// ============================================================
// 원격 접속 점검 설정
// ============================================================

/// 원격 접속(AnyDesk) 점검 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReachabilityConfig {
    /// 이 호스트에서 점검 활성화 (AnyDesk 에이전트 여부)
    #[serde(default)]
    pub enabled: bool,
    /// 실행당 최대 점검 수 (None이면 무제한)
    #[serde(default)]
    pub probe_quota: Option<u32>,
    /// 점검 1회 타임아웃 (밀리초)
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    /// anydesk 실행 파일 경로
    #[serde(default = "default_anydesk_binary")]
    pub anydesk_binary: PathBuf,
    /// 무인 접속 비밀번호 (stdin으로 전달)
    #[serde(default)]
    pub anydesk_password: Option<String>,
    /// 출력에 포함되면 Unreachable로 판정할 문구
    #[serde(default = "default_offline_markers")]
    pub offline_markers: Vec<String>,
}

impl Default for ReachabilityConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            probe_quota: None,
            probe_timeout_ms: default_probe_timeout_ms(),
            anydesk_binary: default_anydesk_binary(),
            anydesk_password: None,
            offline_markers: default_offline_markers(),
        }
    }
}

impl ReachabilityConfig {
    /// 점검 타임아웃을 Duration으로 반환
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

// ============================================================
// 원장 설정
// ============================================================

/// 원장(Google Sheets) 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// 스프레드시트 ID
    #[serde(default)]
    pub spreadsheet_id: String,
    /// 서비스 계정 JSON 경로
    #[serde(default = "default_credentials_file")]
    pub credentials_file: PathBuf,
    /// 탭 이름(날짜) 기준 시간대
    #[serde(default = "default_ledger_timezone")]
    pub timezone: String,
    /// 배치당 최대 행 수
    #[serde(default = "default_ledger_batch_size")]
    pub batch_size: usize,
    /// 배치당 최대 시도 횟수 (첫 시도 포함)
    #[serde(default = "default_ledger_max_attempts")]
    pub max_attempts: u32,
    /// 첫 백오프 대기 (밀리초)
    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,
    /// 백오프 상한 (밀리초)
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// Sheets API 기본 URL
    #[serde(default = "default_sheets_api_base_url")]
    pub api_base_url: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            spreadsheet_id: String::new(),
            credentials_file: default_credentials_file(),
            timezone: default_ledger_timezone(),
            batch_size: default_ledger_batch_size(),
            max_attempts: default_ledger_max_attempts(),
            base_backoff_ms: default_base_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            api_base_url: default_sheets_api_base_url(),
        }
    }
}

impl LedgerConfig {
    /// 설정된 시간대 파싱
    pub fn tz(&self) -> Result<chrono_tz::Tz, CoreError> {
        self.timezone
            .parse::<chrono_tz::Tz>()
            .map_err(|e| CoreError::Config(format!("알 수 없는 시간대 {}: {e}", self.timezone)))
    }
}

/// 실행 단위 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// 분류/점검 동시 작업 수
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
        }
    }
}

/// 장기 오프라인 보고 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfflineReportConfig {
    /// 오프라인 일수 하한 (포함)
    #[serde(default = "default_offline_days_from")]
    pub days_from: u32,
    /// 오프라인 일수 상한 (포함)
    #[serde(default = "default_offline_days_to")]
    pub days_to: u32,
    /// 보고 탭 이름
    #[serde(default = "default_offline_tab_title")]
    pub tab_title: String,
}

impl OfflineReportConfig {
    pub fn window(&self) -> OfflineWindow {
        OfflineWindow {
            days_from: self.days_from,
            days_to: self.days_to,
        }
    }
}

impl Default for OfflineReportConfig {
    fn default() -> Self {
        Self {
            days_from: default_offline_days_from(),
            days_to: default_offline_days_to(),
            tab_title: default_offline_tab_title(),
        }
    }
}

// ============================================================
// AppConfig impl
// ============================================================

impl AppConfig {
    /// 기본 설정값 반환
    pub fn default_config() -> Self {
        Self {
            fleet: FleetConfig::default(),
            classifier: ClassifierConfig::default(),
            reachability: ReachabilityConfig::default(),
            ledger: LedgerConfig::default(),
            run: RunConfig::default(),
            offline_report: OfflineReportConfig::default(),
        }
    }

    /// Fleet API 요청 타임아웃을 Duration으로 반환
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.fleet.request_timeout_ms)
    }

    /// 설정값 검증 — 실패 시 실행을 시작하지 않는다
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.fleet.base_url.trim().is_empty() {
            return Err(CoreError::Config("fleet.base_url 비어 있음".to_string()));
        }
        if self.fleet.page_size == 0 {
            return Err(CoreError::Config("fleet.page_size는 1 이상".to_string()));
        }
        if !(0.0..=1.0).contains(&self.classifier.black_ratio_threshold) {
            return Err(CoreError::Config(format!(
                "classifier.black_ratio_threshold 범위 초과: {}",
                self.classifier.black_ratio_threshold
            )));
        }
        for pattern in &self.classifier.error_patterns {
            regex::Regex::new(pattern).map_err(|e| {
                CoreError::Config(format!("classifier.error_patterns 정규식 오류 {pattern}: {e}"))
            })?;
        }
        if self.ledger.max_attempts == 0 {
            return Err(CoreError::Config("ledger.max_attempts는 1 이상".to_string()));
        }
        if self.ledger.batch_size == 0 {
            return Err(CoreError::Config("ledger.batch_size는 1 이상".to_string()));
        }
        if self.run.workers == 0 {
            return Err(CoreError::Config("run.workers는 1 이상".to_string()));
        }
        if self.offline_report.days_from > self.offline_report.days_to {
            return Err(CoreError::Config(format!(
                "offline_report 구간 오류: {} > {}",
                self.offline_report.days_from, self.offline_report.days_to
            )));
        }
        if self.offline_report.tab_title.trim().is_empty() {
            return Err(CoreError::Config("offline_report.tab_title 비어 있음".to_string()));
        }
        self.ledger.tz()?;
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

// ============================================================
// 기본값 함수
// ============================================================

fn default_fleet_base_url() -> String {
    "https://nctvapi.n-compass.online".to_string()
}
fn default_page_size() -> u32 {
    100
}
fn default_request_timeout_ms() -> u64 {
    30_000
}
fn default_fleet_max_retries() -> u32 {
    3
}
fn default_max_screenshot_candidates() -> usize {
    10
}
fn default_black_ratio_threshold() -> f64 {
    0.90
}
fn default_near_black_luma() -> u8 {
    16
}
fn default_max_screenshot_age_secs() -> u64 {
    3_600 // 1시간
}
fn default_error_phrases() -> Vec<String> {
    [
        "something went wrong, please contact your administrator",
        "getting player data",
        "downloading player assets",
        "setting up programmatic",
        "getting host schedule",
        "refetch started",
        "player is healthy",
        "updates are available",
        "downloading updates",
        "no signal",
        "connection lost",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
fn default_error_patterns() -> Vec<String> {
    vec![
        r"(?i)traceback \(most recent call last\)".to_string(),
        r"(?i)\b(uncaught|unhandled) (exception|error)\b".to_string(),
        r"(?m)^\s*at \S+ \(\S+:\d+:\d+\)".to_string(),
    ]
}
fn default_store_open_grace_secs() -> u64 {
    300 // 5분
}
fn default_tesseract_binary() -> PathBuf {
    PathBuf::from("tesseract")
}
fn default_ocr_language() -> String {
    "eng".to_string()
}
fn default_ocr_timeout_ms() -> u64 {
    30_000
}
fn default_probe_timeout_ms() -> u64 {
    20_000
}
fn default_anydesk_binary() -> PathBuf {
    PathBuf::from("anydesk")
}
fn default_offline_markers() -> Vec<String> {
    vec!["offline".to_string()]
}
fn default_offline_days_from() -> u32 {
    6
}
fn default_offline_days_to() -> u32 {
    30
}
fn default_offline_tab_title() -> String {
    "Offline 6-30 Days".to_string()
}
fn default_credentials_file() -> PathBuf {
    PathBuf::from("client_secret.json")
}
fn default_ledger_timezone() -> String {
    "US/Central".to_string()
}
fn default_ledger_batch_size() -> usize {
    50
}
fn default_ledger_max_attempts() -> u32 {
    3
}
fn default_base_backoff_ms() -> u64 {
    1_000
}
fn default_max_backoff_ms() -> u64 {
    30_000
}
fn default_sheets_api_base_url() -> String {
    "https://sheets.googleapis.com".to_string()
}
fn default_workers() -> usize {
    4
}
