//! 실행 단위 원격 점검 한도.

use std::sync::atomic::{AtomicU32, Ordering};

/// 한 실행에서 허용하는 원격 점검 횟수
///
/// 한도 없음(`None`)이면 항상 통과한다. 여러 작업자가 공유해도 허용 횟수를 넘지 않는다.
#[derive(Debug)]
pub struct RunQuota {
    limit: Option<u32>,
    used: AtomicU32,
}

impl RunQuota {
    pub fn new(limit: Option<u32>) -> Self {
        Self {
            limit,
            used: AtomicU32::new(0),
        }
    }

    pub fn unlimited() -> Self {
        Self::new(None)
    }

    /// 한도 1 차감 시도. 소진됐으면 `false`
    pub fn try_acquire(&self) -> bool {
        match self.limit {
            None => {
                self.used.fetch_add(1, Ordering::Relaxed);
                true
            }
            Some(limit) => self
                .used
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                    (used < limit).then_some(used + 1)
                })
                .is_ok(),
        }
    }

    pub fn used(&self) -> u32 {
        self.used.load(Ordering::Acquire)
    }

    /// 남은 횟수 (한도 없음이면 `None`)
    pub fn remaining(&self) -> Option<u32> {
        self.limit.map(|limit| limit.saturating_sub(self.used()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn stops_at_limit() {
        let quota = RunQuota::new(Some(2));
        assert!(quota.try_acquire());
        assert!(quota.try_acquire());
        assert!(!quota.try_acquire());
        assert_eq!(quota.used(), 2);
        assert_eq!(quota.remaining(), Some(0));
    }

    #[test]
    fn zero_limit_never_grants() {
        let quota = RunQuota::new(Some(0));
        assert!(!quota.try_acquire());
        assert_eq!(quota.used(), 0);
    }

    #[test]
    fn unlimited_always_grants() {
        let quota = RunQuota::unlimited();
        for _ in 0..100 {
            assert!(quota.try_acquire());
        }
        assert_eq!(quota.remaining(), None);
    }

    #[test]
    fn concurrent_acquire_respects_limit() {
        let quota = Arc::new(RunQuota::new(Some(10)));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let quota = quota.clone();
                std::thread::spawn(move || (0..10).filter(|_| quota.try_acquire()).count())
            })
            .collect();
        let granted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(granted, 10);
    }
}
