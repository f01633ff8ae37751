//! AnyDesk 원격 접속 어댑터.
//!
//! `anydesk <id> --with-password`를 실행하고 비밀번호는 stdin으로 넘긴다.
//! 종료 코드 0이면 접속 성공, 출력에 오프라인 표시가 있거나 종료 코드가 0이 아니면 거부로 본다.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use ncmon_core::config::ReachabilityConfig;
use ncmon_core::error::CoreError;
use ncmon_core::ports::reachability::{ProbeOutcome, ReachabilityTransport};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// AnyDesk CLI 래퍼
pub struct AnyDeskTransport {
    binary: PathBuf,
    password: Option<String>,
    offline_markers: Vec<String>,
}

impl AnyDeskTransport {
    pub fn new(config: &ReachabilityConfig) -> Self {
        Self {
            binary: config.anydesk_binary.clone(),
            password: config.anydesk_password.clone(),
            offline_markers: config
                .offline_markers
                .iter()
                .map(|m| m.to_lowercase())
                .collect(),
        }
    }

    fn spawn_error(&self, err: std::io::Error) -> CoreError {
        match err.kind() {
            std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                CoreError::capability_missing("anydesk", format!("{}: {err}", self.binary.display()))
            }
            _ => CoreError::Internal(format!("anydesk 실행 실패: {err}")),
        }
    }

    fn offline_marker_in(&self, output: &str) -> Option<&str> {
        let lower = output.to_lowercase();
        self.offline_markers
            .iter()
            .find(|m| !m.is_empty() && lower.contains(m.as_str()))
            .map(String::as_str)
    }
}

#[async_trait]
impl ReachabilityTransport for AnyDeskTransport {
    async fn ensure_available(&self) -> Result<(), CoreError> {
        let output = Command::new(&self.binary)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            return Err(CoreError::capability_missing(
                "anydesk",
                format!("--version 종료 코드 {:?}", output.status.code()),
            ));
        }
        debug!(
            "anydesk 사용 가능: {}",
            String::from_utf8_lossy(&output.stdout).trim()
        );
        Ok(())
    }

    async fn connect(&self, remote_id: &str) -> Result<ProbeOutcome, CoreError> {
        let mut cmd = Command::new(&self.binary);
        cmd.arg(remote_id)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if self.password.is_some() {
            cmd.arg("--with-password");
        }

        let mut child = cmd.spawn().map_err(|e| self.spawn_error(e))?;
        if let Some(mut stdin) = child.stdin.take() {
            if let Some(password) = &self.password {
                stdin.write_all(password.as_bytes()).await?;
                stdin.write_all(b"\n").await?;
            }
        }

        let output = child.wait_with_output().await?;
        let combined = format!(
            "{}\n{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );

        if let Some(marker) = self.offline_marker_in(&combined) {
            return Ok(ProbeOutcome::Refused(format!("'{marker}' 출력")));
        }
        if !output.status.success() {
            return Ok(ProbeOutcome::Refused(format!(
                "종료 코드 {:?}",
                output.status.code()
            )));
        }
        Ok(ProbeOutcome::Connected)
    }

    fn name(&self) -> &str {
        "anydesk"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(binary: PathBuf) -> ReachabilityConfig {
        ReachabilityConfig {
            anydesk_binary: binary,
            anydesk_password: Some("test-password-placeholder".to_string()),
            ..ReachabilityConfig::default()
        }
    }

    #[cfg(unix)]
    fn script(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.path().join("fake-anydesk");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    async fn missing_binary_is_capability_missing() {
        let transport = AnyDeskTransport::new(&config(PathBuf::from("/nonexistent/anydesk-ncmon")));
        let err = transport.ensure_available().await.unwrap_err();
        assert!(matches!(err, CoreError::CapabilityMissing { .. }));
        let err = transport.connect("123456789").await.unwrap_err();
        assert!(err.is_fatal());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn zero_exit_is_connected() {
        let dir = tempfile::tempdir().unwrap();
        let transport = AnyDeskTransport::new(&config(script(&dir, "cat > /dev/null\nexit 0")));
        assert!(transport.ensure_available().await.is_ok());
        assert_eq!(
            transport.connect("123456789").await.unwrap(),
            ProbeOutcome::Connected
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn offline_marker_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let transport = AnyDeskTransport::new(&config(script(
            &dir,
            "cat > /dev/null\necho 'Client Offline'\nexit 0",
        )));
        assert!(matches!(
            transport.connect("123456789").await.unwrap(),
            ProbeOutcome::Refused(_)
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_exit_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let transport = AnyDeskTransport::new(&config(script(&dir, "cat > /dev/null\nexit 3")));
        assert_eq!(
            transport.connect("123456789").await.unwrap(),
            ProbeOutcome::Refused("종료 코드 Some(3)".to_string())
        );
    }
}
