//! Fleet 관리 API HTTP 클라이언트.
//!
//! `FleetApi` 포트 구현. bearer 토큰 자동 주입, 401 시 1회 재로그인, 429/5xx 재시도.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ncmon_core::config::FleetConfig;
use ncmon_core::error::CoreError;
use ncmon_core::models::device::{Device, DevicePage};
use ncmon_core::models::offline::{OfflineLicense, OfflinePage, OfflineWindow};
use ncmon_core::models::screenshot::{capture_time_from_filename, ScreenshotSample};
use ncmon_core::models::store_hours::StoreHours;
use ncmon_core::ports::fleet_api::FleetApi;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::auth::TokenManager;
use crate::retry::{retry_after_secs, RetryPolicy};

// ============================================================
// 응답 스키마
// ============================================================

#[derive(Debug, Deserialize)]
struct LicensePage {
    licenses: Option<Vec<Value>>,
    #[serde(default)]
    paging: Option<Paging>,
    #[serde(default, rename = "totalCount")]
    total_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Paging {
    total_entities: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Option<Vec<String>>,
}

/// 숫자/문자열 어느 쪽으로 와도 문자열로
fn value_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// 라이선스 레코드 → 디바이스. 라이선스 키가 없는 레코드는 건너뛴다.
fn device_from_license(record: &Value) -> Option<Device> {
    let field = |name: &str| value_string(record.get(name));

    let license_key = field("licenseKey")?;
    let license_id = field("licenseId").unwrap_or_else(|| license_key.clone());
    let display_name = field("alias")
        .or_else(|| field("screenName"))
        .unwrap_or_else(|| license_key.clone());
    let online = field("piStatus").as_deref() == Some("1");

    let store_hours = match record.get("storeHours") {
        Some(Value::String(raw)) => match StoreHours::parse(raw) {
            Ok(hours) => Some(hours),
            Err(e) => {
                warn!(device = %license_key, "storeHours 무시: {e}");
                None
            }
        },
        Some(Value::Array(_)) => serde_json::from_value(record["storeHours"].clone()).ok(),
        _ => None,
    };

    Some(Device {
        license_id,
        license_key,
        display_name,
        online,
        anydesk_id: field("anydeskId"),
        timezone: field("timezoneName"),
        store_hours,
    })
}

/// 라이선스 레코드 → 장기 오프라인 행. ID와 키가 모두 없으면 건너뛴다.
fn offline_from_license(record: &Value) -> Option<OfflineLicense> {
    let field = |name: &str| value_string(record.get(name));
    let either = |a: &str, b: &str| field(a).or_else(|| field(b));

    let license_id = field("licenseId");
    let license_key = field("licenseKey");
    if license_id.is_none() && license_key.is_none() {
        return None;
    }

    Some(OfflineLicense {
        license_id: license_id.unwrap_or_default(),
        license_key: license_key.unwrap_or_default(),
        timezone: either("timezone", "timezoneName"),
        days_offline: field("daysOffline"),
        pi_status: field("piStatus"),
        dealer: either("dealerName", "dealer"),
        host: either("hostName", "host"),
    })
}

/// URL 경로의 마지막 조각 (쿼리 제외)
fn file_name(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/').next().unwrap_or(path)
}

/// 후보 중 파일 이름 타임스탬프가 가장 늦은 항목. 모두 알 수 없으면 첫 항목.
fn pick_latest(files: &[String], tz: chrono_tz::Tz) -> Option<(&String, Option<DateTime<Utc>>)> {
    let mut best: Option<(&String, Option<DateTime<Utc>>)> = None;
    for file in files {
        let ts = capture_time_from_filename(file_name(file), tz);
        best = match best {
            None => Some((file, ts)),
            Some((_, best_ts)) if ts > best_ts => Some((file, ts)),
            keep => keep,
        };
    }
    best
}

// ============================================================
// HttpFleetClient
// ============================================================

/// Fleet API 클라이언트 — `FleetApi` 포트 구현
pub struct HttpFleetClient {
    client: reqwest::Client,
    base_url: String,
    token_manager: Arc<TokenManager>,
    retry: RetryPolicy,
    max_screenshot_candidates: usize,
}

impl HttpFleetClient {
    /// 설정으로 클라이언트 + 토큰 매니저 생성
    pub fn new(config: &FleetConfig) -> Result<Self, CoreError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .cookie_store(true)
            .build()
            .map_err(|e| CoreError::Config(format!("HTTP 클라이언트 빌드 실패: {e}")))?;

        let token_manager = Arc::new(TokenManager::new(
            &config.base_url,
            client.clone(),
            &config.username,
            &config.password,
        ));

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token_manager,
            retry: RetryPolicy::new(
                config.max_retries.saturating_add(1),
                Duration::from_secs(1),
                Duration::from_secs(30),
            ),
            max_screenshot_candidates: config.max_screenshot_candidates.max(1),
        })
    }

    /// 재시도 정책 교체
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// 응답 상태 코드 확인 및 에러 매핑
    async fn check_response(
        &self,
        resp: reqwest::Response,
    ) -> Result<reqwest::Response, CoreError> {
        let status = resp.status();

        if status.is_success() {
            return Ok(resp);
        }

        let retry_after = retry_after_secs(resp.headers());
        let text = resp.text().await.unwrap_or_else(|e| {
            warn!("응답 본문 읽기 실패: {e}");
            String::new()
        });
        let text: String = text.chars().take(200).collect();

        match status.as_u16() {
            401 | 403 => Err(CoreError::Auth(format!("인증 실패 ({status}): {text}"))),
            429 => Err(CoreError::RateLimit {
                retry_after_secs: retry_after,
            }),
            500..=599 => Err(CoreError::TransientFetch(format!(
                "서버 에러 ({status}): {text}"
            ))),
            _ => Err(CoreError::Protocol(format!("예상치 못한 응답 ({status}): {text}"))),
        }
    }

    /// 인증된 요청 1회 — 401이면 재로그인 후 한 번 더
    ///
    /// 상태 코드 확인은 호출자가 한다.
    async fn send_authorized(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<reqwest::Response, CoreError> {
        let url = format!("{}{}", self.base_url, path);
        let send = |token: String| {
            self.client
                .get(&url)
                .query(query)
                .bearer_auth(token)
                .send()
        };

        let token = self.token_manager.get_token().await?;
        let resp = send(token.clone())
            .await
            .map_err(|e| CoreError::TransientFetch(format!("요청 실패 {path}: {e}")))?;

        if resp.status() != reqwest::StatusCode::UNAUTHORIZED {
            return Ok(resp);
        }

        warn!("401 응답 ({path}), 재로그인 후 재시도");
        let token = self.token_manager.relogin(&token).await?;
        send(token)
            .await
            .map_err(|e| CoreError::TransientFetch(format!("요청 실패 {path}: {e}")))
    }

    /// 인증된 GET + 상태 코드 확인
    async fn get_checked(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<reqwest::Response, CoreError> {
        let resp = self.send_authorized(path, query).await?;
        self.check_response(resp).await
    }

    /// 재시도가 포함된 요청 실행
    ///
    /// exponential backoff: 1s → 2s → 4s (상한 30s). 마지막 한도 초과는 일시 실패로 본다.
    async fn execute_with_retry<F, Fut, T>(&self, what: &str, operation: F) -> Result<T, CoreError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, CoreError>>,
    {
        self.retry.run(what, operation).await.map_err(|e| match e {
            CoreError::RateLimit { .. } => {
                CoreError::TransientFetch(format!("요청 한도 초과 지속: {e}"))
            }
            other => other,
        })
    }

    /// 스크린샷 파일 목록
    async fn list_files(&self, device: &Device) -> Result<Vec<String>, CoreError> {
        self.execute_with_retry("파일 목록 조회", || async {
            let resp = self
                .send_authorized(
                    "/api/pi/getfiles",
                    &[("licenseid", device.license_id.clone())],
                )
                .await?;

            // 파일이 한 번도 없던 디바이스
            if resp.status() == reqwest::StatusCode::NOT_FOUND {
                return Ok(Vec::new());
            }
            let resp = self.check_response(resp).await?;

            let body = resp
                .bytes()
                .await
                .map_err(|e| CoreError::TransientFetch(format!("파일 목록 수신 실패: {e}")))?;
            if body.is_empty() {
                return Ok(Vec::new());
            }
            let list: FileList = serde_json::from_slice(&body)
                .map_err(|e| CoreError::Protocol(format!("파일 목록 파싱 실패: {e}")))?;
            Ok(list.files.unwrap_or_default())
        })
        .await
    }

    /// 이미지 다운로드 → (바이트, Last-Modified)
    async fn download(&self, url: &str) -> Result<(Vec<u8>, Option<DateTime<Utc>>), CoreError> {
        let absolute = url::Url::parse(url)
            .or_else(|_| url::Url::parse(&self.base_url).and_then(|base| base.join(url)))
            .map_err(|e| CoreError::Protocol(format!("스크린샷 URL 오류 '{url}': {e}")))?;

        self.execute_with_retry("스크린샷 다운로드", || async {
            let resp = self
                .client
                .get(absolute.clone())
                .send()
                .await
                .map_err(|e| CoreError::TransientFetch(format!("스크린샷 다운로드 실패: {e}")))?;
            let resp = self.check_response(resp).await?;

            let last_modified = resp
                .headers()
                .get(reqwest::header::LAST_MODIFIED)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| DateTime::parse_from_rfc2822(v).ok())
                .map(|t| t.with_timezone(&Utc));

            let bytes = resp
                .bytes()
                .await
                .map_err(|e| CoreError::TransientFetch(format!("스크린샷 수신 실패: {e}")))?;
            Ok((bytes.to_vec(), last_modified))
        })
        .await
    }
}

#[async_trait]
impl FleetApi for HttpFleetClient {
    async fn list_devices(&self, page: u32, page_size: u32) -> Result<DevicePage, CoreError> {
        debug!("디바이스 목록 조회: page={page}, size={page_size}");

        self.execute_with_retry("디바이스 목록 조회", || async {
            let resp = self
                .get_checked(
                    "/api/license/getall",
                    &[
                        ("page", page.to_string()),
                        ("pageSize", page_size.to_string()),
                        ("includeAdmin", "false".to_string()),
                        ("active", "true".to_string()),
                        ("assigned", "true".to_string()),
                    ],
                )
                .await?;

            let body: LicensePage = resp
                .json()
                .await
                .map_err(|e| CoreError::Protocol(format!("라이선스 응답 파싱 실패: {e}")))?;

            let records = body
                .licenses
                .ok_or_else(|| CoreError::Protocol("응답에 'licenses' 없음".to_string()))?;

            let devices: Vec<Device> = records
                .iter()
                .filter_map(|record| {
                    let device = device_from_license(record);
                    if device.is_none() {
                        warn!("licenseKey 없는 라이선스 레코드 건너뜀");
                    }
                    device
                })
                .collect();

            let total_count = body
                .paging
                .and_then(|p| p.total_entities)
                .or(body.total_count);

            debug!(
                "디바이스 {}대 수신 (전체 {:?})",
                devices.len(),
                total_count
            );
            Ok(DevicePage {
                devices,
                fetched: records.len(),
                total_count,
            })
        })
        .await
    }

    async fn list_offline(
        &self,
        window: OfflineWindow,
        page: u32,
        page_size: u32,
    ) -> Result<OfflinePage, CoreError> {
        debug!(
            "장기 오프라인 조회: {}-{}일, page={page}, size={page_size}",
            window.days_from, window.days_to
        );

        self.execute_with_retry("장기 오프라인 조회", || async {
            let resp = self
                .get_checked(
                    "/api/license/getall",
                    &[
                        ("page", page.to_string()),
                        ("pageSize", page_size.to_string()),
                        ("sortColumn", "TimeIn".to_string()),
                        ("sortOrder", "desc".to_string()),
                        ("includeAdmin", "false".to_string()),
                        ("piStatus", "0".to_string()),
                        ("daysOfflineFrom", window.days_from.to_string()),
                        ("daysOfflineTo", window.days_to.to_string()),
                    ],
                )
                .await?;

            let body: LicensePage = resp
                .json()
                .await
                .map_err(|e| CoreError::Protocol(format!("라이선스 응답 파싱 실패: {e}")))?;
            let records = body
                .licenses
                .ok_or_else(|| CoreError::Protocol("응답에 'licenses' 없음".to_string()))?;

            let licenses: Vec<OfflineLicense> =
                records.iter().filter_map(offline_from_license).collect();
            if licenses.len() < records.len() {
                warn!(
                    "ID/키 없는 오프라인 레코드 {}건 건너뜀",
                    records.len() - licenses.len()
                );
            }
            info!("장기 오프라인 page {page}: {}건", licenses.len());

            Ok(OfflinePage {
                licenses,
                fetched: records.len(),
                total_count: body
                    .paging
                    .and_then(|p| p.total_entities)
                    .or(body.total_count),
            })
        })
        .await
    }

    async fn fetch_screenshot(
        &self,
        device: &Device,
    ) -> Result<Option<ScreenshotSample>, CoreError> {
        let files = self.list_files(device).await?;
        let candidates = &files[..files.len().min(self.max_screenshot_candidates)];

        let tz = device.tz().unwrap_or(chrono_tz::UTC);
        let Some((url, name_ts)) = pick_latest(candidates, tz) else {
            debug!(device = %device.id(), "스크린샷 없음");
            return Ok(None);
        };

        let (image, last_modified) = self.download(url).await?;
        debug!(
            device = %device.id(),
            "스크린샷 다운로드: {} ({} bytes)",
            file_name(url),
            image.len()
        );

        Ok(Some(ScreenshotSample {
            device_id: device.id().to_string(),
            image,
            captured_at: name_ts.or(last_modified),
            source: url.clone(),
        }))
    }
}
