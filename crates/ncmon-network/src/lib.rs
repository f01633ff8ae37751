//! # ncmon-network
//!
//! 외부 시스템 어댑터.
//! Fleet API(디바이스 목록, 스크린샷), Google Sheets 원장, AnyDesk 도달성 점검을
//! 담당하며 세션 로그인, 서비스 계정 토큰, 재시도/backoff를 지원한다.
//!
//! ## 사용 예시
//!
//! ```rust,ignore
//! use ncmon_network::fleet_client::HttpFleetClient;
//! use ncmon_network::ledger_writer::LedgerWriter;
//! use ncmon_network::sheets_store::SheetsLedgerStore;
//!
//! let fleet = HttpFleetClient::new(&config.fleet)?;
//! let store = SheetsLedgerStore::from_config(&config.ledger, config.request_timeout())?;
//! let writer = LedgerWriter::from_config(Arc::new(store), &config.ledger);
//! ```

pub mod anydesk;
pub mod auth;
pub mod fleet_client;
pub mod google_auth;
pub mod ledger_writer;
pub mod prober;
pub mod retry;
pub mod sheets_store;
