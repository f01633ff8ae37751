//! `tesseract` 실행 파일 기반 텍스트 인식기.
//!
//! 이미지 바이트를 stdin으로 넘기고 stdout에서 텍스트를 받는다.
//! 네이티브 라이브러리 링크가 필요 없어 기본 OCR 경로로 쓴다.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use ncmon_core::config::OcrConfig;
use ncmon_core::error::CoreError;
use ncmon_core::ports::text_recognizer::TextRecognizer;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::error::OcrError;

/// `tesseract stdin stdout` 호출 래퍼
pub struct TesseractCli {
    binary: PathBuf,
    language: String,
    tessdata_path: Option<PathBuf>,
    timeout: Duration,
}

impl TesseractCli {
    pub fn new(config: &OcrConfig) -> Self {
        Self {
            binary: config.binary_path.clone(),
            language: config.language.clone(),
            tessdata_path: config.tessdata_path.clone(),
            timeout: config.timeout(),
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    fn spawn_error(&self, err: std::io::Error) -> OcrError {
        match err.kind() {
            std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                OcrError::Unavailable(format!("{}: {err}", self.binary.display()))
            }
            _ => OcrError::Extraction(format!("프로세스 실행 실패: {err}")),
        }
    }

    async fn run(&self, image: &[u8]) -> Result<String, OcrError> {
        if image.is_empty() {
            return Err(OcrError::EmptyImage);
        }

        let mut cmd = self.command();
        cmd.arg("stdin").arg("stdout").arg("-l").arg(&self.language);
        if let Some(dir) = &self.tessdata_path {
            cmd.arg("--tessdata-dir").arg(dir);
        }

        let mut child = cmd.spawn().map_err(|e| self.spawn_error(e))?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(image)
                .await
                .map_err(|e| OcrError::ImageSetup(format!("stdin 쓰기 실패: {e}")))?;
        }

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| OcrError::Timeout(self.timeout.as_millis() as u64))?
            .map_err(|e| OcrError::Async(format!("프로세스 대기 실패: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("Failed loading language") {
                return Err(OcrError::Unavailable(format!(
                    "언어 데이터 '{}' 없음",
                    self.language
                )));
            }
            return Err(OcrError::Extraction(stderr.trim().to_string()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl TextRecognizer for TesseractCli {
    async fn ensure_available(&self) -> Result<(), CoreError> {
        let output = tokio::time::timeout(self.timeout, self.command().arg("--version").output())
            .await
            .map_err(|_| OcrError::Unavailable("--version 응답 없음".to_string()))?
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            return Err(OcrError::Unavailable(format!(
                "--version 종료 코드 {:?}",
                output.status.code()
            ))
            .into());
        }

        let banner = String::from_utf8_lossy(&output.stdout);
        debug!(
            "tesseract 사용 가능: {}",
            banner.lines().next().unwrap_or_default()
        );
        Ok(())
    }

    async fn recognize(&self, image: &[u8]) -> Result<String, CoreError> {
        Ok(self.run(image).await?)
    }

    fn name(&self) -> &str {
        "tesseract-cli"
    }
}
