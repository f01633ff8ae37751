//! Google 서비스 계정 인증.
//!
//! 서비스 계정 키(JSON)로 RS256 JWT assertion을 서명해 OAuth 액세스 토큰과 교환한다.
//! 토큰은 만료 1분 전까지 캐시한다.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use ncmon_core::error::CoreError;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

/// Sheets 읽기/쓰기 범위
pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// 액세스 토큰 공급자
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String, CoreError>;
}

/// 고정 토큰 (로컬 테스트, 외부에서 발급한 토큰)
pub struct StaticToken(pub String);

#[async_trait]
impl AccessTokenSource for StaticToken {
    async fn access_token(&self) -> Result<String, CoreError> {
        Ok(self.0.clone())
    }
}

/// 서비스 계정 키 파일 중 필요한 필드
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    /// 키 파일 읽기
    pub fn from_file(path: &Path) -> Result<Self, CoreError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            CoreError::Config(format!("서비스 계정 키 읽기 실패 {}: {e}", path.display()))
        })?;
        serde_json::from_str(&raw)
            .map_err(|e| CoreError::Config(format!("서비스 계정 키 형식 오류: {e}")))
    }
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

/// 서비스 계정 JWT → 액세스 토큰
pub struct ServiceAccountTokenSource {
    key: ServiceAccountKey,
    encoding_key: EncodingKey,
    client: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccountTokenSource {
    pub fn new(key: ServiceAccountKey, client: reqwest::Client) -> Result<Self, CoreError> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| CoreError::Config(format!("서비스 계정 개인 키 오류: {e}")))?;
        Ok(Self {
            key,
            encoding_key,
            client,
            cached: Mutex::new(None),
        })
    }

    /// 서명된 JWT assertion
    fn assertion(&self, now: DateTime<Utc>) -> Result<String, CoreError> {
        let claims = Claims {
            iss: &self.key.client_email,
            scope: SHEETS_SCOPE,
            aud: &self.key.token_uri,
            iat: now.timestamp(),
            exp: (now + Duration::hours(1)).timestamp(),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.encoding_key)
            .map_err(|e| CoreError::Auth(format!("JWT 서명 실패: {e}")))
    }

    async fn exchange(&self) -> Result<CachedToken, CoreError> {
        let now = Utc::now();
        let assertion = self.assertion(now)?;

        let resp = self
            .client
            .post(&self.key.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .map_err(|e| CoreError::TransientFetch(format!("토큰 교환 요청 실패: {e}")))?;

        let status = resp.status();
        if status.is_server_error() {
            return Err(CoreError::TransientFetch(format!("토큰 교환 실패 ({status})")));
        }
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(CoreError::Auth(format!("토큰 교환 거부 ({status}): {text}")));
        }

        let body: TokenResponse = resp
            .json()
            .await
            .map_err(|e| CoreError::Auth(format!("토큰 응답 파싱 실패: {e}")))?;

        let expires_at = now + Duration::seconds(body.expires_in.unwrap_or(3600));
        debug!("Sheets 액세스 토큰 발급: 만료 {expires_at}");
        Ok(CachedToken {
            token: body.access_token,
            expires_at,
        })
    }
}

#[async_trait]
impl AccessTokenSource for ServiceAccountTokenSource {
    async fn access_token(&self) -> Result<String, CoreError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if Utc::now() + Duration::minutes(1) < token.expires_at {
                return Ok(token.token.clone());
            }
        }

        let fresh = self.exchange().await?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_KEY: &str = include_str!("../tests/fixtures/service_account_test_key.pem");

    fn key(token_uri: String) -> ServiceAccountKey {
        ServiceAccountKey {
            client_email: "ncmon@test-project.iam.gserviceaccount.com".to_string(),
            private_key: TEST_KEY.to_string(),
            token_uri,
        }
    }

    #[test]
    fn key_file_defaults_token_uri() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client_secret.json");
        std::fs::write(
            &path,
            r#"{"type":"service_account","client_email":"a@b.c","private_key":"x"}"#,
        )
        .unwrap();

        let key = ServiceAccountKey::from_file(&path).unwrap();
        assert_eq!(key.token_uri, DEFAULT_TOKEN_URI);
        assert!(matches!(
            ServiceAccountKey::from_file(&dir.path().join("missing.json")),
            Err(CoreError::Config(_))
        ));
    }

    #[test]
    fn invalid_private_key_is_config_error() {
        let mut bad = key("http://localhost".to_string());
        bad.private_key = "not a pem".to_string();
        assert!(matches!(
            ServiceAccountTokenSource::new(bad, reqwest::Client::new()),
            Err(CoreError::Config(_))
        ));
    }

    #[tokio::test]
    async fn exchanges_once_and_caches() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/token")
            .match_body(mockito::Matcher::UrlEncoded(
                "grant_type".into(),
                "urn:ietf:params:oauth:grant-type:jwt-bearer".into(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"ya29.test","expires_in":3600}"#)
            .expect(1)
            .create_async()
            .await;

        let source = ServiceAccountTokenSource::new(
            key(format!("{}/token", server.url())),
            reqwest::Client::new(),
        )
        .unwrap();
        assert_eq!(source.access_token().await.unwrap(), "ya29.test");
        assert_eq!(source.access_token().await.unwrap(), "ya29.test");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn rejected_exchange_is_auth_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/token")
            .with_status(400)
            .with_body(r#"{"error":"invalid_grant"}"#)
            .create_async()
            .await;

        let source = ServiceAccountTokenSource::new(
            key(format!("{}/token", server.url())),
            reqwest::Client::new(),
        )
        .unwrap();
        assert!(matches!(
            source.access_token().await,
            Err(CoreError::Auth(_))
        ));
    }
}
