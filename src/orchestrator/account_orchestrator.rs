//! 多账号编排器 - 编排层
//!
//! 每个账号一个独立的 tokio 任务，账号之间不共享并发额度和限制状态。
//! 全局计数按需从各账号的状态快照汇总。

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::error;

use super::control::{RunControl, RunState};
use crate::clients::ClientFactory;
use crate::config::{ConfigHandle, Tunables};
use crate::models::{Account, SessionCounters};
use crate::services::HistoryStore;
use crate::workflow::{AccountCtx, AccountSnapshot, AccountWorker, LogLevel, Observer, WorkerEvent};

struct WorkerHandle {
    account: String,
    snapshots: watch::Receiver<AccountSnapshot>,
    task: JoinHandle<SessionCounters>,
}

/// 账号编排器
pub struct Orchestrator {
    control: RunControl,
    config: ConfigHandle,
    history: Arc<dyn HistoryStore>,
    observer: Arc<dyn Observer>,
    workers: Vec<WorkerHandle>,
}

impl Orchestrator {
    pub fn new(tunables: Tunables, history: Arc<dyn HistoryStore>, observer: Arc<dyn Observer>) -> Self {
        Self {
            control: RunControl::new(),
            config: ConfigHandle::new(tunables),
            history,
            observer,
            workers: Vec::new(),
        }
    }

    /// 为每个账号启动工作循环，返回成功启动的数量
    ///
    /// 配置不完整或连接失败的账号只记录一次错误并跳过，不影响其他账号。
    pub async fn start(&mut self, accounts: Vec<Account>, factory: &dyn ClientFactory) -> usize {
        let mut started = 0;
        for mut account in accounts {
            let label = account.label().to_string();

            let checked = account
                .normalize_queries(factory.base_url())
                .and_then(|_| account.validate(factory.requires_cookies()));
            if let Err(e) = checked {
                self.report_failure(&label, format!("无法启动: {}", e));
                continue;
            }

            let clients = match factory.connect(&account).await {
                Ok(clients) => clients,
                Err(e) => {
                    self.report_failure(&label, format!("连接失败: {}", e));
                    continue;
                }
            };

            let ctx = AccountCtx::new(Arc::new(account), self.observer.clone());
            let worker = AccountWorker::new(
                ctx,
                clients,
                self.history.clone(),
                self.config.subscribe(),
                self.control.handle(),
            );
            let snapshots = worker.snapshots();
            let task = tokio::spawn(worker.run());

            self.workers.push(WorkerHandle {
                account: label,
                snapshots,
                task,
            });
            started += 1;
        }
        started
    }

    fn report_failure(&self, account: &str, message: String) {
        self.observer.on_event(WorkerEvent::Log {
            account: Some(account.to_string()),
            level: LogLevel::Error,
            message,
        });
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn run_state(&self) -> RunState {
        self.control.state()
    }

    pub fn pause(&self) -> bool {
        self.control.pause()
    }

    pub fn resume(&self) -> bool {
        self.control.resume()
    }

    /// 请求停止；各账号完成当前请求后退出
    pub fn stop(&self) {
        self.control.stop();
    }

    /// 运行参数的写入口
    pub fn config(&self) -> &ConfigHandle {
        &self.config
    }

    pub fn history(&self) -> Arc<dyn HistoryStore> {
        self.history.clone()
    }

    /// 所有账号的最新快照
    pub fn snapshots(&self) -> Vec<AccountSnapshot> {
        self.workers.iter().map(|w| w.snapshots.borrow().clone()).collect()
    }

    /// 汇总所有账号的计数
    pub fn totals(&self) -> SessionCounters {
        let mut totals = SessionCounters::default();
        for worker in &self.workers {
            totals.accumulate(&worker.snapshots.borrow().counters);
        }
        totals
    }

    /// 是否所有工作循环都已退出
    pub fn is_finished(&self) -> bool {
        self.workers.iter().all(|w| w.task.is_finished())
    }

    /// 等待所有工作循环退出，返回汇总计数
    pub async fn join(self) -> SessionCounters {
        let mut totals = SessionCounters::default();
        for WorkerHandle {
            account,
            snapshots,
            task,
        } in self.workers
        {
            match task.await {
                Ok(counters) => totals.accumulate(&counters),
                Err(e) => {
                    error!("[账号 {}] 工作循环异常退出: {}", account, e);
                    totals.accumulate(&snapshots.borrow().counters);
                }
            }
        }
        totals
    }
}
