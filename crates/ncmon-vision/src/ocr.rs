//! leptess 기반 텍스트 인식기.
//!
//! `ocr` feature flag 활성화 시에만 빌드된다.
//! Tesseract 호출은 블로킹이라 `spawn_blocking`으로 런타임 스레드와 분리한다.

use std::path::PathBuf;

use async_trait::async_trait;
use ncmon_core::config::OcrConfig;
use ncmon_core::error::CoreError;
use ncmon_core::ports::text_recognizer::TextRecognizer;
use tracing::debug;

use crate::error::OcrError;

/// 링크된 libtesseract로 텍스트 추출
pub struct LeptessRecognizer {
    /// Tesseract 데이터 경로 (None이면 시스템 기본값)
    tessdata_path: Option<PathBuf>,
    language: String,
}

impl LeptessRecognizer {
    pub fn new(config: &OcrConfig) -> Self {
        Self {
            tessdata_path: config.tessdata_path.clone(),
            language: config.language.clone(),
        }
    }

    fn tessdata(&self) -> Option<String> {
        self.tessdata_path
            .as_ref()
            .map(|p| p.to_string_lossy().to_string())
    }

    /// 디코딩된 이미지에서 텍스트 추출 (동기)
    pub fn extract(
        tessdata: Option<&str>,
        language: &str,
        image: &image::DynamicImage,
    ) -> Result<String, OcrError> {
        let rgba = image.to_rgba8();
        let (w, h) = (rgba.width(), rgba.height());

        if w == 0 || h == 0 {
            return Err(OcrError::EmptyImage);
        }

        let mut lt = leptess::LepTess::new(tessdata, language)
            .map_err(|e| OcrError::Unavailable(format!("{e}")))?;

        lt.set_image_from_mem(rgba.as_raw(), w as i32, h as i32, 4, (w * 4) as i32)
            .map_err(|_| OcrError::ImageSetup("이미지 메모리 설정 실패".to_string()))?;

        let text = lt
            .get_utf8_text()
            .map_err(|e| OcrError::Extraction(format!("{e}")))?;

        Ok(text.trim().to_string())
    }
}

#[async_trait]
impl TextRecognizer for LeptessRecognizer {
    async fn ensure_available(&self) -> Result<(), CoreError> {
        let tessdata = self.tessdata();
        let language = self.language.clone();

        tokio::task::spawn_blocking(move || {
            leptess::LepTess::new(tessdata.as_deref(), &language)
                .map(|_| ())
                .map_err(|e| OcrError::Unavailable(format!("{e}")))
        })
        .await
        .map_err(|e| OcrError::Async(format!("작업 조인 실패: {e}")))??;

        debug!("leptess 초기화 확인: lang={}", self.language);
        Ok(())
    }

    async fn recognize(&self, image: &[u8]) -> Result<String, CoreError> {
        let bytes = image.to_vec();
        let tessdata = self.tessdata();
        let language = self.language.clone();

        let text = tokio::task::spawn_blocking(move || {
            let img = image::load_from_memory(&bytes)
                .map_err(|e| OcrError::ImageSetup(format!("이미지 디코딩 실패: {e}")))?;
            Self::extract(tessdata.as_deref(), &language, &img)
        })
        .await
        .map_err(|e| OcrError::Async(format!("작업 조인 실패: {e}")))??;

        Ok(text)
    }

    fn name(&self) -> &str {
        "leptess"
    }
}
