//! Google Sheets 원장 저장소.
//!
//! `LedgerStore` 포트 구현. 날짜 하나가 탭 하나(`YYYY-MM-DD`)이고, 1행은 헤더다.
//! 갱신은 `values:batchUpdate`, 추가는 `values:append` 한 번으로 보낸다.
//!
//! 같은 스프레드시트의 스냅샷 보고 탭(`ReportSheet`)도 여기서 쓴다.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use ncmon_core::config::LedgerConfig;
use ncmon_core::error::CoreError;
use ncmon_core::models::ledger::{LedgerRow, RowWrite, StoredRow, LEDGER_HEADERS};
use ncmon_core::ports::ledger_store::LedgerStore;
use ncmon_core::ports::report_sheet::ReportSheet;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::google_auth::{AccessTokenSource, ServiceAccountKey, ServiceAccountTokenSource};
use crate::retry::retry_after_secs;

/// 헤더 마지막 열 (A..G)
const LAST_COLUMN: char = 'G';

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

/// 날짜 → 탭 이름
pub fn tab_title(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// A1 표기 범위 (탭 이름은 작은따옴표로 감싼다)
fn tab_range(title: &str, cells: &str) -> String {
    format!("'{}'!{cells}", title.replace('\'', "''"))
}

fn a1(date: NaiveDate, cells: &str) -> String {
    tab_range(&tab_title(date), cells)
}

/// 열 개수 → 마지막 열 문자 (A..Z)
fn last_column(count: usize) -> char {
    let index = count.clamp(1, 26) - 1;
    (b'A' + index as u8) as char
}

fn cell_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Google Sheets v4 원장
pub struct SheetsLedgerStore {
    client: reqwest::Client,
    api_base_url: String,
    spreadsheet_id: String,
    tokens: Arc<dyn AccessTokenSource>,
    /// 존재가 확인된 탭
    known_tabs: Mutex<HashSet<NaiveDate>>,
}

impl SheetsLedgerStore {
    pub fn new(
        api_base_url: &str,
        spreadsheet_id: &str,
        tokens: Arc<dyn AccessTokenSource>,
        timeout: Duration,
    ) -> Result<Self, CoreError> {
        if spreadsheet_id.trim().is_empty() {
            return Err(CoreError::Config("spreadsheet_id 없음".to_string()));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CoreError::Config(format!("HTTP 클라이언트 빌드 실패: {e}")))?;

        Ok(Self {
            client,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            spreadsheet_id: spreadsheet_id.to_string(),
            tokens,
            known_tabs: Mutex::new(HashSet::new()),
        })
    }

    /// 설정 + 서비스 계정 키 파일로 생성
    pub fn from_config(config: &LedgerConfig, timeout: Duration) -> Result<Self, CoreError> {
        let key = ServiceAccountKey::from_file(&config.credentials_file)?;
        let tokens = ServiceAccountTokenSource::new(key, reqwest::Client::new())?;
        Self::new(
            &config.api_base_url,
            &config.spreadsheet_id,
            Arc::new(tokens),
            timeout,
        )
    }

    /// `/v4/spreadsheets/{id}` 뒤에 경로 조각을 붙인 URL
    fn url(&self, segments: &[&str]) -> Result<url::Url, CoreError> {
        let mut url = url::Url::parse(&self.api_base_url)
            .map_err(|e| CoreError::Config(format!("Sheets API URL 오류: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| CoreError::Config("Sheets API URL에 경로를 붙일 수 없음".to_string()))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets", self.spreadsheet_id.as_str()])
            .extend(segments);
        Ok(url)
    }

    /// 응답 상태 코드 확인 및 에러 매핑
    async fn check_response(resp: reqwest::Response) -> Result<reqwest::Response, CoreError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let retry_after = retry_after_secs(resp.headers());
        let text: String = resp
            .text()
            .await
            .unwrap_or_default()
            .chars()
            .take(200)
            .collect();

        match status.as_u16() {
            401 | 403 => Err(CoreError::Auth(format!("Sheets 인증 실패 ({status}): {text}"))),
            429 => Err(CoreError::RateLimit {
                retry_after_secs: retry_after,
            }),
            500..=599 => Err(CoreError::TransientFetch(format!(
                "Sheets 서버 에러 ({status}): {text}"
            ))),
            _ => Err(CoreError::LedgerWrite(format!("Sheets 요청 거부 ({status}): {text}"))),
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, CoreError> {
        let token = self.tokens.access_token().await?;
        let resp = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| CoreError::TransientFetch(format!("Sheets 요청 실패: {e}")))?;
        Self::check_response(resp).await
    }

    async fn tab_titles(&self) -> Result<Vec<String>, CoreError> {
        let mut url = self.url(&[])?;
        url.query_pairs_mut()
            .append_pair("fields", "sheets.properties.title");
        let meta: SpreadsheetMeta = self
            .send(self.client.get(url))
            .await?
            .json()
            .await
            .map_err(|e| CoreError::Protocol(format!("스프레드시트 메타 파싱 실패: {e}")))?;
        Ok(meta.sheets.into_iter().map(|s| s.properties.title).collect())
    }

    async fn create_tab(&self, title: &str) -> Result<(), CoreError> {
        let mut url = self.url(&[])?;
        url.path_segments_mut()
            .map_err(|_| CoreError::Internal("URL 경로 오류".to_string()))?
            .pop()
            .push(&format!("{}:batchUpdate", self.spreadsheet_id));
        let body = json!({
            "requests": [{ "addSheet": { "properties": { "title": title } } }]
        });
        self.send(self.client.post(url).json(&body)).await?;
        info!("탭 생성: {title}");
        Ok(())
    }

    /// `first_row`행부터 값 쓰기 (덮어쓰기)
    async fn put_rows<S: serde::Serialize + Sync>(
        &self,
        title: &str,
        first_row: usize,
        width: usize,
        rows: &[S],
    ) -> Result<(), CoreError> {
        let last_row = first_row + rows.len().max(1) - 1;
        let cells = format!("A{first_row}:{}{last_row}", last_column(width));
        let target = tab_range(title, &cells);
        let mut url = self.url(&["values", &target])?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");
        let body = json!({ "range": target, "values": rows });
        self.send(self.client.put(url).json(&body)).await?;
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for SheetsLedgerStore {
    async fn ensure_partition(&self, date: NaiveDate) -> Result<(), CoreError> {
        if self.known_tabs.lock().contains(&date) {
            return Ok(());
        }

        let title = tab_title(date);
        if !self.tab_titles().await?.iter().any(|t| *t == title) {
            self.create_tab(&title).await?;
            self.put_rows(&title, 1, LEDGER_HEADERS.len(), &[LEDGER_HEADERS])
                .await?;
        }
        self.known_tabs.lock().insert(date);
        Ok(())
    }

    async fn read_rows(&self, date: NaiveDate) -> Result<Vec<StoredRow>, CoreError> {
        let range = a1(date, &format!("A2:{LAST_COLUMN}"));
        let url = self.url(&["values", &range])?;
        let body: ValueRange = self
            .send(self.client.get(url))
            .await?
            .json()
            .await
            .map_err(|e| CoreError::Protocol(format!("원장 값 파싱 실패: {e}")))?;

        let rows: Vec<StoredRow> = body
            .values
            .iter()
            .enumerate()
            .filter_map(|(i, cells)| {
                let cells: Vec<String> = cells.iter().map(cell_text).collect();
                let row = LedgerRow::from_cells(date, &cells)?;
                Some(StoredRow {
                    row_number: i as u32 + 2,
                    row,
                })
            })
            .collect();

        debug!("원장 {}: 기존 행 {}개", tab_title(date), rows.len());
        Ok(rows)
    }

    async fn write_batch(&self, date: NaiveDate, writes: &[RowWrite]) -> Result<(), CoreError> {
        let mut updates = Vec::new();
        let mut appends = Vec::new();
        for write in writes {
            match write {
                RowWrite::Update { row_number, row } => updates.push(json!({
                    "range": a1(date, &format!("A{row_number}:{LAST_COLUMN}{row_number}")),
                    "values": [row.to_cells()],
                })),
                RowWrite::Append { row } => appends.push(row.to_cells()),
            }
        }

        if !updates.is_empty() {
            let url = self.url(&["values:batchUpdate"])?;
            let count = updates.len();
            let body = json!({ "valueInputOption": "RAW", "data": updates });
            self.send(self.client.post(url).json(&body)).await?;
            debug!("원장 갱신 {count}행");
        }

        if !appends.is_empty() {
            let range = a1(date, &format!("A1:{LAST_COLUMN}"));
            let mut url = self.url(&["values", &format!("{range}:append")])?;
            url.query_pairs_mut()
                .append_pair("valueInputOption", "RAW")
                .append_pair("insertDataOption", "INSERT_ROWS");
            let body = json!({ "values": appends });
            self.send(self.client.post(url).json(&body)).await?;
            debug!("원장 추가 {}행", appends.len());
        }

        Ok(())
    }
}

#[async_trait]
impl ReportSheet for SheetsLedgerStore {
    async fn replace_tab(
        &self,
        title: &str,
        headers: &[&str],
        rows: &[Vec<String>],
    ) -> Result<(), CoreError> {
        let exists = self.tab_titles().await?.iter().any(|t| t == title);
        if exists {
            let target = tab_range(title, "A2:Z");
            let url = self.url(&["values", &format!("{target}:clear")])?;
            self.send(self.client.post(url).json(&json!({}))).await?;
            debug!("보고 탭 비움: {title}");
        } else {
            self.create_tab(title).await?;
        }

        self.put_rows(title, 1, headers.len(), &[headers]).await?;
        if !rows.is_empty() {
            self.put_rows(title, 2, headers.len(), rows).await?;
        }
        info!("보고 탭 {title}: {}행 기록", rows.len());
        Ok(())
    }
}
