//! 원격 접속 점검기.
//!
//! 점검 1건에 고정 타임아웃을 건다. 시간 초과와 접속 거부는 `Unreachable`,
//! 도구 자체가 없으면(`CapabilityMissing`) 에러로 올려 실행을 중단시킨다.
//! 점검 한도(quota) 관리는 호출자 몫이다.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use ncmon_core::error::CoreError;
use ncmon_core::models::device::Device;
use ncmon_core::models::verdict::{ReachabilityCategory, ReachabilityVerdict, SkipReason};
use ncmon_core::ports::reachability::{ProbeOutcome, ReachabilityTransport};
use tracing::{debug, warn};

/// 원격 데스크톱 ID가 없는 디바이스의 사유
pub const NO_REMOTE_ID: &str = "no remote-desktop id";

pub struct ReachabilityProber {
    transport: Arc<dyn ReachabilityTransport>,
    timeout: Duration,
}

impl ReachabilityProber {
    pub fn new(transport: Arc<dyn ReachabilityTransport>, timeout: Duration) -> Self {
        Self { transport, timeout }
    }

    /// 실행 시작 시 1회
    pub async fn ensure_available(&self) -> Result<(), CoreError> {
        self.transport.ensure_available().await
    }

    /// 디바이스 1대 점검
    pub async fn probe(
        &self,
        device: &Device,
        now: DateTime<Utc>,
    ) -> Result<ReachabilityVerdict, CoreError> {
        let verdict = |category, detail: Option<String>| ReachabilityVerdict {
            device_id: device.id().to_string(),
            category,
            detail,
            checked_at: now,
        };

        let Some(remote_id) = device.anydesk_id.as_deref() else {
            return Ok(verdict(
                ReachabilityCategory::Unreachable,
                Some(NO_REMOTE_ID.to_string()),
            ));
        };

        debug!(device = %device.id(), "{} 접속 시도: {remote_id}", self.transport.name());
        match tokio::time::timeout(self.timeout, self.transport.connect(remote_id)).await {
            Ok(Ok(ProbeOutcome::Connected)) => Ok(verdict(ReachabilityCategory::Reachable, None)),
            Ok(Ok(ProbeOutcome::Refused(reason))) => {
                Ok(verdict(ReachabilityCategory::Unreachable, Some(reason)))
            }
            Ok(Err(e)) if e.is_fatal() => Err(e),
            Ok(Err(e)) => {
                warn!(device = %device.id(), "접속 점검 실패: {e}");
                Ok(verdict(ReachabilityCategory::Unreachable, Some(e.to_string())))
            }
            Err(_) => Ok(verdict(
                ReachabilityCategory::Unreachable,
                Some(format!("timeout after {}ms", self.timeout.as_millis())),
            )),
        }
    }
}

/// 한도 소진으로 점검하지 않은 디바이스의 판정
pub fn skipped_verdict(device: &Device, now: DateTime<Utc>) -> ReachabilityVerdict {
    ReachabilityVerdict {
        device_id: device.id().to_string(),
        category: ReachabilityCategory::Skipped(SkipReason::Quota),
        detail: None,
        checked_at: now,
    }
}
