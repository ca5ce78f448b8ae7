//! 账号上下文
//!
//! 封装"我正在为哪个账号工作"以及事件出口

use std::fmt::Display;
use std::sync::Arc;

use super::observer::{LogLevel, Observer, WorkerEvent};
use crate::models::Account;

/// 账号上下文
#[derive(Clone)]
pub struct AccountCtx {
    pub account: Arc<Account>,
    observer: Arc<dyn Observer>,
}

impl AccountCtx {
    pub fn new(account: Arc<Account>, observer: Arc<dyn Observer>) -> Self {
        Self { account, observer }
    }

    /// 日志中显示的账号名
    pub fn label(&self) -> &str {
        self.account.label()
    }

    pub fn emit(&self, event: WorkerEvent) {
        self.observer.on_event(event);
    }

    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.emit(WorkerEvent::Log {
            account: Some(self.label().to_string()),
            level,
            message: message.into(),
        });
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.log(LogLevel::Success, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.log(LogLevel::Warning, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }
}

impl Display for AccountCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[账号 {}]", self.label())
    }
}
