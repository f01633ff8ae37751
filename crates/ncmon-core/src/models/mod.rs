//! NC Monitoring 도메인 모델.
//!
//! 디바이스, 스크린샷, 판정, 원장 행, 실행 리포트, 장기 오프라인 보고를 정의한다.
//! 실행 단위 엔티티(샘플, 판정)는 실행이 끝나면 버려지고 원장 행만 남는다.

pub mod device;
pub mod ledger;
pub mod offline;
pub mod report;
pub mod screenshot;
pub mod store_hours;
pub mod verdict;
