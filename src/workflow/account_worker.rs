//! 账号工作循环 - 流程层
//!
//! 每轮顺序：
//! 1. 检查点（暂停 / 停止）
//! 2. 到期则刷新简历（与状态机无关）
//! 3. 受限时等待或探测
//! 4. 发现 → 过滤 → 打乱 → 逐个提交
//! 5. 轮次间隔
//!
//! 提交严格串行，一个账号同时最多一个在途提交。

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use rand::seq::SliceRandom;
use tokio::sync::watch;
use tokio::time::Instant;

use super::account_ctx::AccountCtx;
use super::observer::WorkerEvent;
use super::state::{Transition, WorkerState};
use crate::clients::AccountClients;
use crate::config::Tunables;
use crate::models::{ItemId, Outcome, SessionCounters};
use crate::orchestrator::control::{ControlHandle, RunState};
use crate::services::{classify, Collector, HistoryStore, LimitGuard, LimitPoll, RefreshScheduler};
use crate::utils::logging::truncate_text;

/// 工作循环对外公开的状态快照
#[derive(Debug, Clone, PartialEq)]
pub struct AccountSnapshot {
    pub account: String,
    pub state: WorkerState,
    pub counters: SessionCounters,
    pub queue_len: usize,
    pub cursor: usize,
    pub limit_recheck_at: Option<Instant>,
    pub next_refresh_at: Option<Instant>,
    pub last_refresh: Option<NaiveDateTime>,
    pub last_refresh_status: Option<String>,
}

impl AccountSnapshot {
    fn initial(account: &str) -> Self {
        Self {
            account: account.to_string(),
            state: WorkerState::Idle,
            counters: SessionCounters::default(),
            queue_len: 0,
            cursor: 0,
            limit_recheck_at: None,
            next_refresh_at: None,
            last_refresh: None,
            last_refresh_status: None,
        }
    }
}

/// 提交阶段的结束方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ApplyEnd {
    /// 队列处理完
    Drained,
    /// 触发限制，剩余条目放弃
    Limited,
    /// 暂停或停止，剩余条目放弃
    Interrupted,
}

/// 单个账号的工作循环
pub struct AccountWorker {
    ctx: AccountCtx,
    clients: AccountClients,
    collector: Collector,
    history: Arc<dyn HistoryStore>,
    tunables: watch::Receiver<Tunables>,
    control: ControlHandle,
    state: WorkerState,
    counters: SessionCounters,
    queue: Vec<ItemId>,
    cursor: usize,
    limit: LimitGuard,
    refresh: RefreshScheduler,
    snapshot_tx: watch::Sender<AccountSnapshot>,
}

impl AccountWorker {
    pub fn new(
        ctx: AccountCtx,
        clients: AccountClients,
        history: Arc<dyn HistoryStore>,
        tunables: watch::Receiver<Tunables>,
        control: ControlHandle,
    ) -> Self {
        let (snapshot_tx, _rx) = watch::channel(AccountSnapshot::initial(ctx.label()));
        Self {
            collector: Collector::new(clients.fetcher.clone()),
            ctx,
            clients,
            history,
            tunables,
            control,
            state: WorkerState::Idle,
            counters: SessionCounters::default(),
            queue: Vec::new(),
            cursor: 0,
            limit: LimitGuard::new(),
            refresh: RefreshScheduler::new(),
            snapshot_tx,
        }
    }

    /// 订阅状态快照
    pub fn snapshots(&self) -> watch::Receiver<AccountSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn counters(&self) -> SessionCounters {
        self.counters
    }

    /// 运行直到停止，返回本次会话的计数
    pub async fn run(mut self) -> SessionCounters {
        self.ctx.info("🚀 工作循环启动");

        while self.checkpoint().await {
            let tunables = self.tunables.borrow_and_update().clone();

            self.refresh_if_due(&tunables).await;

            if self.limit.is_active() {
                self.handle_limit(&tunables).await;
                continue;
            }

            if let Some(pause) = self.run_cycle(&tunables).await {
                self.control.sleep(pause).await;
            }
        }

        self.transition(Transition::Stop);
        let c = self.counters;
        self.ctx.info(format!(
            "⏹️ 已停止: 已投递 {}, 需要测试 {}, 已投过 {}, 错误 {}",
            c.sent, c.challenged, c.already_seen, c.errored
        ));
        self.counters
    }

    /// 检查点：暂停时在这里等待，返回是否继续运行
    async fn checkpoint(&mut self) -> bool {
        match self.control.current() {
            RunState::Running => true,
            RunState::Stopped => false,
            RunState::Paused => {
                self.transition(Transition::Pause);
                self.ctx.info("⏸️ 已暂停");
                let resumed = self.control.wait_while_paused().await == RunState::Running;
                if resumed {
                    self.ctx.info("▶️ 已恢复");
                }
                resumed
            }
        }
    }

    fn transition(&mut self, transition: Transition) {
        match self.state.next(transition) {
            Some(next) => {
                if next != self.state {
                    self.state = next;
                    self.ctx.emit(WorkerEvent::StatusChanged {
                        account: self.ctx.label().to_string(),
                        state: next,
                    });
                }
            }
            None => {
                tracing::debug!("{} 忽略状态转换 {:?} (当前 {})", self.ctx, transition, self.state);
            }
        }
        self.publish();
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(AccountSnapshot {
            account: self.ctx.label().to_string(),
            state: self.state,
            counters: self.counters,
            queue_len: self.queue.len(),
            cursor: self.cursor,
            limit_recheck_at: self.limit.recheck_at(),
            next_refresh_at: self.refresh.next_at(),
            last_refresh: self.refresh.last_success(),
            last_refresh_status: self.refresh.last_status().map(str::to_string),
        });
    }

    fn counters_changed(&self) {
        self.ctx.emit(WorkerEvent::CountersChanged {
            account: self.ctx.label().to_string(),
            counters: self.counters,
        });
        self.publish();
    }

    fn queue_changed(&self) {
        self.ctx.emit(WorkerEvent::QueueUpdated {
            account: self.ctx.label().to_string(),
            items: self.queue.clone(),
            cursor: self.cursor,
        });
        self.publish();
    }

    // ========== 刷新 ==========

    pub(crate) async fn refresh_if_due(&mut self, tunables: &Tunables) {
        if !tunables.refresh_enabled || !self.refresh.is_due(Instant::now()) {
            return;
        }
        self.ctx.info("📤 刷新简历...");
        let report = self
            .refresh
            .run(
                self.clients.submitter.as_ref(),
                &self.ctx.account,
                tunables.refresh_interval,
            )
            .await;
        let next = humanize(tunables.refresh_interval);
        if report.success {
            self.ctx.success(format!("简历已刷新，{}后再次刷新", next));
        } else {
            self.ctx.warn(format!("刷新失败: {}，{}后重试", report.message, next));
        }
        self.publish();
    }

    // ========== 限制 ==========

    pub(crate) async fn handle_limit(&mut self, tunables: &Tunables) {
        if self.state != WorkerState::Limited {
            self.transition(Transition::LimitHit);
        }

        let now = Instant::now();
        if !self.limit.recheck_due(now) {
            let step = self.limit.remaining(now).min(tunables.limit_poll_step);
            self.control.sleep(step).await;
            return;
        }

        self.transition(Transition::RecheckDue);
        self.ctx.info("🔍 检查限制是否解除...");
        let poll = self
            .limit
            .poll(
                self.clients.submitter.as_ref(),
                &self.ctx.account,
                tunables.limit_check_interval,
            )
            .await;

        match poll {
            LimitPoll::Cleared => {
                self.transition(Transition::LimitCleared);
                self.ctx.success("限制已解除，继续投递");
            }
            LimitPoll::StillLimited { .. } => {
                self.transition(Transition::StillLimited);
                self.ctx.warn(format!(
                    "仍然受限，{}后再次检查",
                    humanize(tunables.limit_check_interval)
                ));
            }
        }
    }

    // ========== 一轮：发现 → 过滤 → 提交 ==========

    /// 执行一轮，返回随后需要等待的时长（被打断或触发限制时为 None）
    pub(crate) async fn run_cycle(&mut self, tunables: &Tunables) -> Option<Duration> {
        self.transition(Transition::BeginCycle);
        let discovered = self.collect(tunables).await;
        if !self.control.is_running() {
            return None;
        }

        if discovered.is_empty() {
            self.transition(Transition::NothingDiscovered);
            self.ctx.warn(format!(
                "没有发现任何条目，暂停 {}",
                humanize(tunables.empty_pause)
            ));
            return Some(tunables.empty_pause);
        }

        self.transition(Transition::Discovered);
        let novel = self.filter(discovered).await;
        if novel.is_empty() {
            self.transition(Transition::NothingNew);
            self.ctx.warn(format!(
                "所有条目都已处理过，暂停 {}",
                humanize(tunables.empty_pause)
            ));
            return Some(tunables.empty_pause);
        }

        self.ctx.success(format!("找到 {} 个新条目", novel.len()));
        self.set_queue(novel);
        self.transition(Transition::QueueReady);

        match self.apply(tunables).await {
            ApplyEnd::Drained => {
                self.transition(Transition::QueueDrained);
                self.ctx.info(format!(
                    "⏳ 本轮结束，暂停 {}",
                    humanize(tunables.inter_cycle_pause)
                ));
                Some(tunables.inter_cycle_pause)
            }
            ApplyEnd::Limited | ApplyEnd::Interrupted => None,
        }
    }

    pub(crate) async fn collect(&mut self, tunables: &Tunables) -> HashSet<ItemId> {
        self.ctx.info("📥 开始收集");
        let queries: Vec<String> = self
            .ctx
            .account
            .queries
            .iter()
            .filter(|q| !q.trim().is_empty())
            .cloned()
            .collect();

        let control = self.control.clone();
        let report = self
            .collector
            .collect(&queries, tunables, || control.is_running())
            .await;

        for failure in &report.failures {
            self.ctx.warn(format!(
                "抓取失败 {}: {}",
                failure.url,
                truncate_text(&failure.error, 80)
            ));
        }
        for query in &report.per_query {
            self.ctx.info(format!(
                "📊 {}: {} 个条目 ({} 页)",
                query.label, query.unique, query.pages_fetched
            ));
        }
        self.ctx.info(format!(
            "📊 共 {} 个 ({} 个不重复)",
            report.raw_hits,
            report.items.len()
        ));

        self.counters.discovered += report.items.len() as u64;
        self.counters_changed();
        report.items
    }

    /// 按历史记录过滤，返回打乱后的新条目
    pub(crate) async fn filter(&mut self, discovered: HashSet<ItemId>) -> Vec<ItemId> {
        let account = self.ctx.account.name.clone();
        let mut novel = Vec::new();
        let mut already = 0u64;
        let mut challenged = 0u64;

        for item in discovered {
            if self.history.is_applied(&account, &item).await {
                already += 1;
            } else if self.history.is_challenged(&item).await {
                challenged += 1;
            } else {
                novel.push(item);
            }
        }

        self.counters.already_seen += already;
        self.counters.challenged += challenged;
        self.counters_changed();
        self.ctx.info(format!(
            "🔍 过滤: 已投过 {}, 需要测试 {}, 新条目 {}",
            already,
            challenged,
            novel.len()
        ));

        novel.shuffle(&mut rand::thread_rng());
        novel
    }

    pub(crate) fn set_queue(&mut self, items: Vec<ItemId>) {
        self.queue = items;
        self.cursor = 0;
        self.queue_changed();
    }

    /// 逐个提交队列中的条目
    pub(crate) async fn apply(&mut self, tunables: &Tunables) -> ApplyEnd {
        while self.cursor < self.queue.len() {
            if !self.control.is_running() {
                return self.abandon_queue(ApplyEnd::Interrupted);
            }

            let item = self.queue[self.cursor].clone();
            self.queue_changed();
            self.ctx.info(format!("📤 提交: {}", item));

            let outcome = match self
                .clients
                .submitter
                .submit(&self.ctx.account, &item)
                .await
            {
                Ok(raw) => classify(&raw, tunables.success_policy),
                Err(e) => Outcome::Error(truncate_text(&e.to_string(), 200)),
            };
            self.cursor += 1;

            if let Outcome::LimitExceeded = outcome {
                self.limit
                    .trigger(Instant::now(), tunables.limit_check_interval);
                self.transition(Transition::LimitHit);
                self.ctx.warn(format!(
                    "🚫 达到投递上限，{}后检查",
                    humanize(tunables.limit_check_interval)
                ));
                self.notify_processed(&item, &outcome);
                return self.abandon_queue(ApplyEnd::Limited);
            }

            self.act(&item, &outcome).await;

            if self.cursor < self.queue.len() && !self.control.sleep(tunables.inter_submission_delay).await {
                return self.abandon_queue(ApplyEnd::Interrupted);
            }
        }

        self.queue.clear();
        self.cursor = 0;
        self.queue_changed();
        ApplyEnd::Drained
    }

    /// 放弃队列剩余条目，计入 skipped
    fn abandon_queue(&mut self, end: ApplyEnd) -> ApplyEnd {
        let remaining = self.queue.len().saturating_sub(self.cursor) as u64;
        if remaining > 0 {
            self.counters.skipped += remaining;
            self.ctx.info(format!("⏭️ 放弃队列剩余 {} 个条目", remaining));
        }
        self.queue.clear();
        self.cursor = 0;
        self.queue_changed();
        self.counters_changed();
        end
    }

    /// 按结果写历史、计数并通知
    pub(crate) async fn act(&mut self, item: &ItemId, outcome: &Outcome) {
        let account = self.ctx.account.name.clone();
        match outcome {
            Outcome::Sent { meta, confirmed } => {
                self.counters.sent += 1;
                if let Err(e) = self.history.record_applied(&account, item, meta.as_ref()).await {
                    self.ctx.error(format!("写入历史失败: {}", e));
                }
                let mark = if *confirmed { "" } else { " (推定)" };
                match meta {
                    Some(m) => {
                        let salary = m.salary().map(|s| format!(" 💰 {}", s)).unwrap_or_default();
                        self.ctx.success(format!(
                            "✅{} {} @ {}{}",
                            mark,
                            truncate_text(&m.title, 40),
                            truncate_text(&m.company, 20),
                            salary
                        ));
                    }
                    None => self.ctx.success(format!("✅{} 已投递 {}", mark, item)),
                }
                if !confirmed {
                    self.ctx.info(format!("ℹ️ {} 的响应中没有成功标记，按成功记录", item));
                }
            }
            Outcome::ChallengeRequired(meta) => {
                self.counters.challenged += 1;
                if let Err(e) = self.history.record_challenged(item, meta.as_ref()).await {
                    self.ctx.error(format!("写入历史失败: {}", e));
                }
                let title = meta
                    .as_ref()
                    .filter(|m| !m.title.is_empty())
                    .map(|m| truncate_text(&m.title, 40))
                    .unwrap_or_else(|| item.to_string());
                self.ctx.warn(format!("📝 需要测试: {}", title));
            }
            Outcome::AlreadyDone => {
                self.counters.already_seen += 1;
                if let Err(e) = self.history.record_applied(&account, item, None).await {
                    self.ctx.error(format!("写入历史失败: {}", e));
                }
                if self.counters.already_seen % 10 == 0 {
                    self.ctx.info(format!("♻️ 已投过: {} 个", self.counters.already_seen));
                }
            }
            Outcome::Error(diagnostic) => {
                self.counters.errored += 1;
                self.ctx.error(format!("{}: {}", item, truncate_text(diagnostic, 80)));
            }
            // 在 apply 中处理
            Outcome::LimitExceeded => {}
        }
        self.notify_processed(item, outcome);
        self.counters_changed();
    }

    fn notify_processed(&self, item: &ItemId, outcome: &Outcome) {
        self.ctx.emit(WorkerEvent::ItemProcessed {
            account: self.ctx.label().to_string(),
            item: item.clone(),
            outcome: outcome.kind(),
            meta: outcome.meta().cloned(),
        });
    }
}

/// 日志里的时长
fn humanize(d: Duration) -> String {
    let secs = d.as_secs();
    if secs >= 3600 && secs % 3600 == 0 {
        format!("{} 小时", secs / 3600)
    } else if secs >= 60 && secs % 60 == 0 {
        format!("{} 分钟", secs / 60)
    } else if secs > 0 {
        format!("{} 秒", secs)
    } else {
        format!("{} 毫秒", d.as_millis())
    }
}
