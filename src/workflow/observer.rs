//! 工作循环对外发出的事件
//!
//! 核心逻辑不关心事件如何展示；[`TracingObserver`] 输出为日志，
//! [`ChannelObserver`] 把事件转发给外部界面或测试。

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::state::WorkerState;
use crate::models::{ItemId, ItemMeta, OutcomeKind, SessionCounters};

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// 工作循环事件
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    StatusChanged {
        account: String,
        state: WorkerState,
    },
    Log {
        account: Option<String>,
        level: LogLevel,
        message: String,
    },
    QueueUpdated {
        account: String,
        items: Vec<ItemId>,
        cursor: usize,
    },
    CountersChanged {
        account: String,
        counters: SessionCounters,
    },
    /// 一个条目处理完成
    ItemProcessed {
        account: String,
        item: ItemId,
        outcome: OutcomeKind,
        meta: Option<ItemMeta>,
    },
}

/// 事件接收方
pub trait Observer: Send + Sync {
    fn on_event(&self, event: WorkerEvent);
}

/// 把事件写成 tracing 日志
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

fn prefix(account: &Option<String>) -> String {
    match account {
        Some(name) => format!("[账号 {}] ", name),
        None => String::new(),
    }
}

impl Observer for TracingObserver {
    fn on_event(&self, event: WorkerEvent) {
        match event {
            WorkerEvent::StatusChanged { account, state } => {
                debug!("[账号 {}] 状态 -> {}", account, state);
            }
            WorkerEvent::Log {
                account,
                level,
                message,
            } => {
                let p = prefix(&account);
                match level {
                    LogLevel::Info => info!("{}{}", p, message),
                    LogLevel::Success => info!("{}✓ {}", p, message),
                    LogLevel::Warning => warn!("{}⚠️ {}", p, message),
                    LogLevel::Error => error!("{}❌ {}", p, message),
                }
            }
            WorkerEvent::QueueUpdated {
                account,
                items,
                cursor,
            } => {
                debug!("[账号 {}] 队列 {}/{}", account, cursor, items.len());
            }
            WorkerEvent::CountersChanged { account, counters } => {
                debug!(
                    "[账号 {}] 已投递 {} | 测试 {} | 已投过 {} | 错误 {}",
                    account, counters.sent, counters.challenged, counters.already_seen, counters.errored
                );
            }
            WorkerEvent::ItemProcessed {
                account,
                item,
                outcome,
                meta,
            } => {
                let detail = meta
                    .map(|m| format!(" {} @ {}", m.title, m.company))
                    .unwrap_or_default();
                debug!("[账号 {}] {} -> {}{}", account, item, outcome, detail);
            }
        }
    }
}

/// 把事件转发到无界通道
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<WorkerEvent>,
}

impl ChannelObserver {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<WorkerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Observer for ChannelObserver {
    fn on_event(&self, event: WorkerEvent) {
        // 接收端已关闭时丢弃
        let _ = self.tx.send(event);
    }
}
