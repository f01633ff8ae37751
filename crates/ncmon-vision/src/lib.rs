//! # ncmon-vision
//!
//! 스크린샷 상태 분류 크레이트.
//! 픽셀 통계(검은 화면), OCR 텍스트의 에러 문구 매칭, 캡처 시각 기반 노후 판정을
//! 순서대로 적용해 디바이스 1대의 [`HealthVerdict`](ncmon_core::models::verdict::HealthVerdict)를 만든다.
//!
//! OCR 엔진은 `TextRecognizer` 포트 뒤에 있다. 기본은 `tesseract` 실행 파일을 호출하는
//! [`tesseract_cli::TesseractCli`]이고, `ocr` feature를 켜면 leptess 바인딩
//! [`ocr::LeptessRecognizer`]를 쓸 수 있다.

pub mod classifier;
pub mod error;
#[cfg(feature = "ocr")]
pub mod ocr;
pub mod pixel;
pub mod signature;
pub mod tesseract_cli;
