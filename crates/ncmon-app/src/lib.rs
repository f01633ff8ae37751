//! # ncmon-app
//!
//! 점검 실행 오케스트레이션.
//! 설정 로드, 실행 코디네이터(상태 머신), 원격 점검 한도, 리포트 출력,
//! 장기 오프라인 보고를 담당한다.
//! 바이너리(`ncmon`)는 이 crate를 조립해 한 번 실행하고 종료한다.

pub mod coordinator;
pub mod offline_report;
pub mod quota;
pub mod report;
pub mod settings;
