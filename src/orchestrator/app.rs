//! 应用入口 - 编排层
//!
//! 1. 加载账号和历史记录
//! 2. 按传输方式创建客户端工厂，启动所有账号
//! 3. 从标准输入读取操作员命令，直到 `stop` 或 Ctrl+C
//! 4. 输出最终统计

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use super::account_orchestrator::Orchestrator;
use super::commands::{OperatorCommand, HELP};
use crate::clients::{BrowserClientFactory, ClientFactory, HttpClientFactory};
use crate::config::{Config, TransportKind};
use crate::models::load_accounts;
use crate::services::{HistoryStore, JsonHistoryStore};
use crate::utils::logging::{log_startup, print_final_stats};
use crate::workflow::TracingObserver;

/// 检查工作循环是否全部退出的间隔
const WORKER_CHECK_INTERVAL: Duration = Duration::from_secs(5);

/// 应用主结构
pub struct App {
    config: Config,
    orchestrator: Orchestrator,
}

impl App {
    /// 初始化应用并启动所有账号
    pub async fn initialize(config: Config) -> Result<Self> {
        let accounts = load_accounts(Path::new(&config.accounts_file))
            .await
            .context("加载账号失败")?;

        let history: Arc<dyn HistoryStore> = Arc::new(
            JsonHistoryStore::open(&config.data_dir, &config.base_url)
                .await
                .context("打开历史记录失败")?,
        );

        log_startup(&config, accounts.len());

        let factory = client_factory(&config);
        let mut orchestrator = Orchestrator::new(config.tunables.clone(), history, Arc::new(TracingObserver));
        let started = orchestrator.start(accounts, factory.as_ref()).await;
        info!("✓ 已启动 {} 个账号", started);

        Ok(Self {
            config,
            orchestrator,
        })
    }

    /// 运行直到收到停止命令或 Ctrl+C
    pub async fn run(self) -> Result<()> {
        if self.orchestrator.worker_count() == 0 {
            warn!("⚠️ 没有可运行的账号，程序结束");
            return Ok(());
        }

        info!("💡 {}", HELP);
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdin_open = true;
        let mut liveness = tokio::time::interval(WORKER_CHECK_INTERVAL);

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("收到 Ctrl+C，正在停止...");
                    break;
                }
                _ = liveness.tick() => {
                    if self.orchestrator.is_finished() {
                        warn!("⚠️ 所有账号的工作循环都已退出");
                        break;
                    }
                }
                line = lines.next_line(), if stdin_open => match line {
                    Ok(Some(line)) if line.trim().is_empty() => {}
                    Ok(Some(line)) => {
                        if !self.handle_line(&line).await {
                            break;
                        }
                    }
                    Ok(None) => stdin_open = false,
                    Err(e) => {
                        warn!("读取命令失败: {}", e);
                        stdin_open = false;
                    }
                },
            }
        }

        self.orchestrator.stop();
        let history = self.orchestrator.history();
        let totals = self.orchestrator.join().await;
        let stats = history.stats().await;
        print_final_stats(&totals, &stats, &self.config.output_log_file);
        Ok(())
    }

    /// 执行一行命令，返回是否继续运行
    async fn handle_line(&self, line: &str) -> bool {
        let command = match line.parse::<OperatorCommand>() {
            Ok(command) => command,
            Err(e) => {
                warn!("{}", e);
                return true;
            }
        };

        match command {
            OperatorCommand::Pause => {
                if self.orchestrator.pause() {
                    info!("⏸️ 已请求暂停，各账号将在下一个检查点暂停");
                }
            }
            OperatorCommand::Resume => {
                if self.orchestrator.resume() {
                    info!("▶️ 已恢复");
                }
            }
            OperatorCommand::Stop => {
                info!("⏹️ 正在停止，等待各账号完成当前请求...");
                return false;
            }
            OperatorCommand::Stats => self.print_stats(),
            OperatorCommand::Show => {
                for (key, value) in self.orchestrator.config().snapshot().describe() {
                    info!("  {} = {}", key, value);
                }
            }
            OperatorCommand::Set { key, value } => match self.orchestrator.config().set(&key, &value) {
                Ok(()) => info!("✓ {} = {}", key, value),
                Err(e) => warn!("{}", e),
            },
            OperatorCommand::Applied(limit) => {
                let entries = self.orchestrator.history().recent_applied(limit).await;
                info!("📚 最近 {} 条已投递记录:", entries.len());
                for entry in entries {
                    let r = &entry.record;
                    info!(
                        "  {} [{}] {} @ {} {}",
                        r.at.format("%m-%d %H:%M"),
                        entry.account,
                        r.title,
                        r.company,
                        r.url
                    );
                }
            }
            OperatorCommand::Challenged(limit) => {
                let entries = self.orchestrator.history().recent_challenged(limit).await;
                info!("📝 最近 {} 条需要测试记录:", entries.len());
                for (item, r) in entries {
                    info!("  {} {} {} @ {}", r.at.format("%m-%d %H:%M"), item, r.title, r.company);
                }
            }
            OperatorCommand::Help => info!("{}", HELP),
        }
        true
    }

    fn print_stats(&self) {
        let totals = self.orchestrator.totals();
        info!("{}", "─".repeat(60));
        info!(
            "📊 合计: 发现 {} | 已投递 {} | 测试 {} | 已投过 {} | 跳过 {} | 错误 {}",
            totals.discovered, totals.sent, totals.challenged, totals.already_seen, totals.skipped, totals.errored
        );
        for s in self.orchestrator.snapshots() {
            let refresh = s.last_refresh_status.as_deref().unwrap_or("-");
            info!(
                "  [{}] {} | 队列 {}/{} | 已投递 {} | 错误 {} | 刷新: {}",
                s.account, s.state, s.cursor, s.queue_len, s.counters.sent, s.counters.errored, refresh
            );
        }
        info!("{}", "─".repeat(60));
    }
}

/// 按配置选择传输方式
fn client_factory(config: &Config) -> Box<dyn ClientFactory> {
    match config.transport {
        TransportKind::Http => Box::new(HttpClientFactory::new(
            config.base_url.clone(),
            config.submit_timeout,
            config.probe_timeout,
        )),
        TransportKind::Browser => Box::new(BrowserClientFactory::new(
            config.base_url.clone(),
            config.browser_debug_port,
            config.submit_timeout,
            config.probe_timeout,
        )),
    }
}
