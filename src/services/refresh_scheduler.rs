//! 简历定时刷新
//!
//! 与工作循环的状态机无关，每轮开始时检查一次是否到期。
//! 无论刷新成功与否，下次刷新都安排在 `now + interval`。

use std::time::Duration;

use chrono::NaiveDateTime;
use tokio::time::Instant;

use crate::clients::SubmissionClient;
use crate::models::Account;

/// 单个账号的刷新计时器
#[derive(Debug, Clone, Default)]
pub struct RefreshScheduler {
    next_at: Option<Instant>,
    last_success: Option<NaiveDateTime>,
    last_status: Option<String>,
}

/// 一次刷新的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshReport {
    pub success: bool,
    pub message: String,
    pub next_at: Instant,
}

impl RefreshScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从未刷新过或已到期
    pub fn is_due(&self, now: Instant) -> bool {
        self.next_at.map_or(true, |at| now >= at)
    }

    pub fn next_at(&self) -> Option<Instant> {
        self.next_at
    }

    /// 最近一次成功刷新的时间
    pub fn last_success(&self) -> Option<NaiveDateTime> {
        self.last_success
    }

    /// 最近一次刷新的说明
    pub fn last_status(&self) -> Option<&str> {
        self.last_status.as_deref()
    }

    /// 执行刷新并安排下一次
    pub async fn run(
        &mut self,
        submitter: &dyn SubmissionClient,
        account: &Account,
        interval: Duration,
    ) -> RefreshReport {
        let (success, message) = submitter.refresh_visibility(account).await;
        if success {
            self.last_success = Some(chrono::Local::now().naive_local());
        }
        self.last_status = Some(message.clone());

        let next_at = Instant::now() + interval;
        self.next_at = Some(next_at);
        RefreshReport {
            success,
            message,
            next_at,
        }
    }
}
