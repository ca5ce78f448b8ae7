//! 投递次数限制的状态机
//!
//! 触发后在 `recheck_at` 之前不再提交；到期后用一次探测提交检查限制是否解除。

use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use super::classifier::is_limited;
use crate::clients::SubmissionClient;
use crate::models::Account;

/// 探测结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitPoll {
    /// 限制已解除
    Cleared,
    /// 仍然受限，下次检查时间
    StillLimited { recheck_at: Instant },
}

/// 单个账号的限制状态
#[derive(Debug, Clone, Default)]
pub struct LimitGuard {
    active: bool,
    recheck_at: Option<Instant>,
}

impl LimitGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// 进入受限状态
    pub fn trigger(&mut self, now: Instant, interval: Duration) -> Instant {
        let at = now + interval;
        self.active = true;
        self.recheck_at = Some(at);
        at
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn recheck_at(&self) -> Option<Instant> {
        self.recheck_at
    }

    /// 是否到了重新检查的时间
    pub fn recheck_due(&self, now: Instant) -> bool {
        self.active && self.recheck_at.map_or(true, |at| now >= at)
    }

    /// 距离下次检查还剩多久
    pub fn remaining(&self, now: Instant) -> Duration {
        self.recheck_at
            .map(|at| at.saturating_duration_since(now))
            .unwrap_or_default()
    }

    /// 发送一次探测提交
    ///
    /// 只应在 [`recheck_due`](Self::recheck_due) 为真时调用。探测本身失败
    /// （超时 / 网络错误）无法说明限制已解除，按仍受限处理。
    pub async fn poll(
        &mut self,
        submitter: &dyn SubmissionClient,
        account: &Account,
        interval: Duration,
    ) -> LimitPoll {
        let still_limited = match submitter.probe(account).await {
            Ok(raw) => is_limited(&raw),
            Err(e) => {
                debug!("探测失败，按仍受限处理: {}", e);
                true
            }
        };

        if still_limited {
            let recheck_at = self.trigger(Instant::now(), interval);
            LimitPoll::StillLimited { recheck_at }
        } else {
            self.active = false;
            self.recheck_at = None;
            LimitPoll::Cleared
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, AppResult};
    use crate::models::{ItemId, RawResult};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct ScriptedProbe {
        replies: Mutex<VecDeque<AppResult<RawResult>>>,
    }

    impl ScriptedProbe {
        fn new(replies: Vec<AppResult<RawResult>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
            }
        }
    }

    #[async_trait]
    impl SubmissionClient for ScriptedProbe {
        async fn submit(&self, _: &Account, _: &ItemId) -> AppResult<RawResult> {
            unreachable!("guard never submits")
        }

        async fn probe(&self, _: &Account) -> AppResult<RawResult> {
            self.replies.lock().unwrap().pop_front().unwrap()
        }

        async fn refresh_visibility(&self, _: &Account) -> (bool, String) {
            (true, String::new())
        }
    }

    fn account() -> Account {
        toml::from_str(r#"name = "A""#).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn trigger_sets_recheck_deadline() {
        let mut guard = LimitGuard::new();
        assert!(!guard.is_active());
        assert!(!guard.recheck_due(Instant::now()));

        let now = Instant::now();
        let at = guard.trigger(now, Duration::from_secs(1800));
        assert!(guard.is_active());
        assert_eq!(at, now + Duration::from_secs(1800));
        assert!(!guard.recheck_due(now));
        assert_eq!(guard.remaining(now), Duration::from_secs(1800));
        assert!(guard.recheck_due(now + Duration::from_secs(1800)));
    }

    #[tokio::test(start_paused = true)]
    async fn probe_still_limited_reschedules_then_clears() {
        let probe = ScriptedProbe::new(vec![
            Ok(RawResult::new(400, r#"{"error":"negotiations-limit-exceeded"}"#)),
            Ok(RawResult::new(400, r#"{"error":"vacancy-not-found"}"#)),
        ]);
        let mut guard = LimitGuard::new();
        let interval = Duration::from_secs(60);
        guard.trigger(Instant::now(), interval);

        tokio::time::advance(interval).await;
        let first = guard.poll(&probe, &account(), interval).await;
        assert_eq!(
            first,
            LimitPoll::StillLimited {
                recheck_at: Instant::now() + interval
            }
        );
        assert!(guard.is_active());

        tokio::time::advance(interval).await;
        assert_eq!(guard.poll(&probe, &account(), interval).await, LimitPoll::Cleared);
        assert!(!guard.is_active());
        assert_eq!(guard.recheck_at(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_probe_counts_as_limited() {
        let probe = ScriptedProbe::new(vec![Err(AppError::timeout("probe", Duration::from_secs(10)))]);
        let mut guard = LimitGuard::new();
        guard.trigger(Instant::now(), Duration::from_secs(60));
        let poll = guard.poll(&probe, &account(), Duration::from_secs(60)).await;
        assert!(matches!(poll, LimitPoll::StillLimited { .. }));
        assert!(guard.is_active());
    }
}
