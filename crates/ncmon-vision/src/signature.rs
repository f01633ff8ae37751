//! 에러 화면 문구 매칭.
//!
//! OCR 텍스트는 줄바꿈과 대소문자가 제각각이라 문구는 공백을 정규화한 소문자 텍스트에서,
//! 정규식은 원문에서 찾는다.

use ncmon_core::config::ClassifierConfig;
use ncmon_core::error::CoreError;
use regex::Regex;

/// 매칭 결과 문구의 최대 길이 (원장 셀용)
const MAX_MATCH_LEN: usize = 80;

/// 알려진 에러 화면 시그니처 집합
#[derive(Debug, Clone)]
pub struct ErrorSignatures {
    phrases: Vec<String>,
    patterns: Vec<Regex>,
}

impl ErrorSignatures {
    pub fn new(phrases: &[String], patterns: &[String]) -> Result<Self, CoreError> {
        let phrases = phrases
            .iter()
            .map(|p| normalize(p))
            .filter(|p| !p.is_empty())
            .collect();
        let patterns = patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| CoreError::Config(format!("에러 패턴 '{p}' 컴파일 실패: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { phrases, patterns })
    }

    pub fn from_config(config: &ClassifierConfig) -> Result<Self, CoreError> {
        Self::new(&config.error_phrases, &config.error_patterns)
    }

    /// 첫 번째로 일치한 문구/패턴 텍스트. 문구가 정규식보다 먼저 검사된다.
    pub fn find(&self, text: &str) -> Option<String> {
        let normalized = normalize(text);
        if normalized.is_empty() {
            return None;
        }

        if let Some(phrase) = self.phrases.iter().find(|p| normalized.contains(p.as_str())) {
            return Some(phrase.clone());
        }

        self.patterns
            .iter()
            .find_map(|re| re.find(text))
            .map(|m| truncate(m.as_str().trim()))
    }

    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty() && self.patterns.is_empty()
    }
}

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= MAX_MATCH_LEN {
        text.to_string()
    } else {
        text.chars().take(MAX_MATCH_LEN).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signatures() -> ErrorSignatures {
        ErrorSignatures::from_config(&ClassifierConfig::default()).unwrap()
    }

    #[test]
    fn phrase_matches_across_line_breaks_and_case() {
        let text = "NO\n  SIGNAL\ncheck cable";
        assert_eq!(signatures().find(text).as_deref(), Some("no signal"));
    }

    #[test]
    fn stack_trace_pattern_matches() {
        let text = "Traceback (most recent call last):\n  File \"player.py\", line 3";
        let found = signatures().find(text).unwrap();
        assert!(found.starts_with("Traceback"));
    }

    #[test]
    fn clean_text_has_no_match() {
        assert!(signatures().find("Welcome! Today's specials").is_none());
        assert!(signatures().find("   ").is_none());
    }

    #[test]
    fn invalid_pattern_is_config_error() {
        let err = ErrorSignatures::new(&[], &["(".to_string()]).unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }

    #[test]
    fn long_pattern_match_is_truncated() {
        let sigs = ErrorSignatures::new(&[], &["x+".to_string()]).unwrap();
        let found = sigs.find(&"x".repeat(500)).unwrap();
        assert_eq!(found.len(), MAX_MATCH_LEN);
    }
}
