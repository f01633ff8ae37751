//! Fleet API 세션 토큰 관리.
//!
//! 아이디/비밀번호 로그인으로 bearer 토큰을 받고, 세션 쿠키는 공유 `reqwest::Client`의
//! 쿠키 저장소에 남긴다. 첫 요청 시 지연 로그인하며, 401을 받으면 호출자가
//! [`TokenManager::relogin`]으로 한 번 다시 로그인한다.
//!
//! 로그인은 `login_lock`으로 한 번에 하나만 진행한다. 여러 작업이 같은 토큰으로
//! 401을 받아도 재로그인은 한 번이다.

use std::sync::Arc;

use ncmon_core::error::CoreError;
use serde::Deserialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// 서버 응답 — 로그인
#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: Option<String>,
}

/// 세션 토큰 매니저 — 로그인/재로그인
#[derive(Clone)]
pub struct TokenManager {
    base_url: String,
    client: reqwest::Client,
    username: String,
    password: String,
    token: Arc<RwLock<Option<String>>>,
    login_lock: Arc<Mutex<()>>,
}

impl TokenManager {
    /// `client`는 쿠키 저장소가 켜진 클라이언트여야 세션이 유지된다.
    pub fn new(base_url: &str, client: reqwest::Client, username: &str, password: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            username: username.to_string(),
            password: password.to_string(),
            token: Arc::new(RwLock::new(None)),
            login_lock: Arc::new(Mutex::new(())),
        }
    }

    /// 로그인 → 토큰 획득
    pub async fn login(&self) -> Result<String, CoreError> {
        if self.username.is_empty() || self.password.is_empty() {
            return Err(CoreError::Auth("Fleet API 계정 정보 없음".to_string()));
        }

        let url = format!("{}/api/account/login", self.base_url);
        let body = serde_json::json!({
            "username": self.username,
            "password": self.password,
        });

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| CoreError::Auth(format!("로그인 요청 실패: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(CoreError::Auth(format!("로그인 실패 ({status}): {text}")));
        }

        let login: LoginResponse = resp
            .json()
            .await
            .map_err(|e| CoreError::Auth(format!("로그인 응답 파싱 실패: {e}")))?;

        let access_token = login
            .token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| CoreError::Auth("로그인 응답에 토큰 없음".to_string()))?;

        *self.token.write().await = Some(access_token.clone());
        info!("Fleet API 로그인 성공: user={}", self.username);
        Ok(access_token)
    }

    /// 유효한 액세스 토큰 반환 (없으면 로그인)
    pub async fn get_token(&self) -> Result<String, CoreError> {
        if let Some(token) = self.token.read().await.clone() {
            return Ok(token);
        }
        let _guard = self.login_lock.lock().await;
        // 대기 중 다른 작업이 로그인했을 수 있다
        if let Some(token) = self.token.read().await.clone() {
            return Ok(token);
        }
        self.login().await
    }

    /// `rejected` 토큰이 401을 받았을 때 다시 로그인
    ///
    /// 그 사이 다른 작업이 이미 새 토큰을 받았으면 로그인 없이 그 토큰을 돌려준다.
    pub async fn relogin(&self, rejected: &str) -> Result<String, CoreError> {
        let _guard = self.login_lock.lock().await;
        if let Some(current) = self.token.read().await.clone() {
            if current != rejected {
                debug!("다른 작업이 이미 재로그인함, 새 토큰 사용");
                return Ok(current);
            }
        }
        *self.token.write().await = None;
        self.login().await
    }
}
