//! # ncmon-core
//!
//! NC Monitoring 도메인 모델, 포트(trait) 정의, 에러 타입.
//! 모든 크레이트가 공유하는 핵심 타입과 인터페이스를 제공한다.
//!
//! ## 구조
//!
//! - [`models`] — 도메인 데이터 구조체 (디바이스, 판정, 원장 행, 실행 리포트)
//! - [`ports`] — Hexagonal Architecture 포트 인터페이스 (async_trait)
//! - [`error`] — 핵심 에러 타입 (thiserror)
//! - [`config`] — 실행 설정 구조체

pub mod config;
pub mod error;
pub mod models;
pub mod ports;

#[cfg(test)]
mod tests {
    use crate::models::verdict::{HealthCategory, ReachabilityCategory, SkipReason};

    #[test]
    fn health_category_serde_roundtrip() {
        let json = serde_json::to_string(&HealthCategory::ErrorScreen).unwrap();
        assert_eq!(json, "\"error_screen\"");
        let back: HealthCategory = serde_json::from_str(&json).unwrap();
        assert_eq!(back, HealthCategory::ErrorScreen);
    }

    #[test]
    fn skipped_quota_serializes_with_reason() {
        let json = serde_json::to_string(&ReachabilityCategory::Skipped(SkipReason::Quota)).unwrap();
        assert!(json.contains("quota"));
    }

    #[test]
    fn config_defaults() {
        let config = crate::config::AppConfig::default_config();
        assert_eq!(config.fleet.page_size, 100);
        assert_eq!(config.ledger.max_attempts, 3);
        assert!(!config.reachability.enabled);
        assert!(config.reachability.probe_quota.is_none());
        assert!((config.classifier.black_ratio_threshold - 0.90).abs() < f64::EPSILON);
    }
}
