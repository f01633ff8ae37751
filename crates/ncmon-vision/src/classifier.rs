//! 스크린샷 상태 분류기.
//!
//! 규칙은 위에서부터 처음 일치하는 것이 이긴다:
//!
//! 1. 검은 픽셀 비율 ≥ 임계값 → `Black` (OCR 호출 안 함)
//! 2. OCR 텍스트가 에러 시그니처와 일치 → `ErrorScreen`
//! 3. 캡처 시각이 최대 허용 나이보다 오래됨 → `Stale`
//! 4. 그 외 → `Healthy`
//!
//! 디코딩 불가 이미지와 개별 OCR 실패는 `Unclassifiable` 판정으로 돌려준다.
//! OCR 엔진 자체가 없으면(`CapabilityMissing`) 에러로 올려 실행을 중단시킨다.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use ncmon_core::config::ClassifierConfig;
use ncmon_core::error::CoreError;
use ncmon_core::models::screenshot::ScreenshotSample;
use ncmon_core::models::verdict::{Evidence, HealthCategory, HealthVerdict};
use ncmon_core::ports::text_recognizer::TextRecognizer;
use tracing::{debug, warn};

use crate::pixel::{luma_stats, PixelStats};
use crate::signature::ErrorSignatures;

/// 스크린샷 1장 → 화면 상태 판정
pub struct ScreenshotClassifier {
    recognizer: Arc<dyn TextRecognizer>,
    signatures: ErrorSignatures,
    black_ratio_threshold: f64,
    near_black_luma: u8,
    max_age: chrono::Duration,
}

impl ScreenshotClassifier {
    pub fn new(
        config: &ClassifierConfig,
        recognizer: Arc<dyn TextRecognizer>,
    ) -> Result<Self, CoreError> {
        Ok(Self {
            recognizer,
            signatures: ErrorSignatures::from_config(config)?,
            black_ratio_threshold: config.black_ratio_threshold,
            near_black_luma: config.near_black_luma,
            max_age: config.max_screenshot_age(),
        })
    }

    /// OCR 엔진 사용 가능 여부 (실행 시작 시 1회)
    pub async fn ensure_available(&self) -> Result<(), CoreError> {
        self.recognizer.ensure_available().await
    }

    /// 스크린샷 분류
    ///
    /// 같은 샘플과 같은 `now`에 대해서는 항상 같은 판정을 낸다.
    pub async fn classify(
        &self,
        sample: &ScreenshotSample,
        now: DateTime<Utc>,
    ) -> Result<HealthVerdict, CoreError> {
        let verdict = |category, evidence| HealthVerdict {
            device_id: sample.device_id.clone(),
            category,
            evidence,
            checked_at: now,
        };

        let stats = match self.pixel_stats(&sample.image).await {
            Ok(stats) => stats,
            Err(reason) => {
                warn!(device = %sample.device_id, "스크린샷 디코딩 실패: {reason}");
                return Ok(verdict(
                    HealthCategory::Unclassifiable,
                    Evidence::detail(reason),
                ));
            }
        };

        let age_secs = sample
            .captured_at
            .map(|captured| (now - captured).num_seconds());
        let mut evidence = Evidence {
            dark_ratio: Some(stats.dark_ratio),
            age_secs,
            ..Evidence::default()
        };

        // 1. 검은 화면
        if stats.dark_ratio >= self.black_ratio_threshold {
            debug!(
                device = %sample.device_id,
                "검은 화면: dark_ratio={:.3} ≥ {:.3}",
                stats.dark_ratio, self.black_ratio_threshold
            );
            return Ok(verdict(HealthCategory::Black, evidence));
        }

        // 2. 에러 문구
        let text = match self.recognizer.recognize(&sample.image).await {
            Ok(text) => text,
            Err(e @ CoreError::CapabilityMissing { .. }) => return Err(e),
            Err(e) => {
                warn!(device = %sample.device_id, "OCR 실패: {e}");
                evidence.detail = Some(e.to_string());
                return Ok(verdict(HealthCategory::Unclassifiable, evidence));
            }
        };

        if let Some(matched) = self.signatures.find(&text) {
            debug!(device = %sample.device_id, "에러 화면 문구 일치: {matched}");
            evidence.matched_text = Some(matched);
            return Ok(verdict(HealthCategory::ErrorScreen, evidence));
        }

        // 3. 노후 스크린샷 (캡처 시각을 모르면 판정하지 않음)
        if let Some(age) = age_secs {
            if age > self.max_age.num_seconds() {
                debug!(device = %sample.device_id, "노후 스크린샷: {age}s");
                return Ok(verdict(HealthCategory::Stale, evidence));
            }
        }

        // 4. 정상
        Ok(verdict(HealthCategory::Healthy, evidence))
    }

    /// 디코딩 + 휘도 통계 (블로킹 작업이라 별도 스레드에서 실행)
    async fn pixel_stats(&self, bytes: &[u8]) -> Result<PixelStats, String> {
        let bytes = bytes.to_vec();
        let near_black = self.near_black_luma;

        tokio::task::spawn_blocking(move || {
            let image = image::load_from_memory(&bytes)
                .map_err(|e| format!("이미지 디코딩 실패: {e}"))?;
            luma_stats(&image, near_black).ok_or_else(|| "빈 이미지".to_string())
        })
        .await
        .map_err(|e| format!("작업 조인 실패: {e}"))?
    }
}

/// 스크린샷이 없는 디바이스의 판정
pub fn missing_verdict(device_id: &str, now: DateTime<Utc>) -> HealthVerdict {
    HealthVerdict {
        device_id: device_id.to_string(),
        category: HealthCategory::Missing,
        evidence: Evidence::detail("스크린샷 없음"),
        checked_at: now,
    }
}
