//! 포트 인터페이스 (trait).
//!
//! Hexagonal Architecture의 포트 레이어.
//! 어댑터 crate(`ncmon-vision`, `ncmon-network`)가 이 trait들을 구현하며,
//! `ncmon-app`에서 `Arc<dyn T>`로 와이어링한다.
//!
//! 모든 async trait은 `async_trait` 매크로를 사용하여 object safety를 보장한다.

pub mod fleet_api;
pub mod ledger_store;
pub mod reachability;
pub mod report_sheet;
pub mod text_recognizer;
