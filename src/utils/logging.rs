//! 日志工具模块
//!
//! 订阅器初始化以及启动 / 结束时的横幅输出

use std::fs::{self, OpenOptions};
use std::sync::Mutex;

use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::Config;
use crate::models::SessionCounters;
use crate::services::HistoryStats;

/// 安装全局订阅器：终端输出 + 追加写入日志文件
///
/// `RUST_LOG` 优先；否则默认 `info`，`verbose` 时为 `debug`。
pub fn init(verbose: bool, log_file_path: &str) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file_path)?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .try_init()?;
    Ok(())
}

/// 写入日志文件头（覆盖旧内容）
pub fn init_log_file(log_file_path: &str) -> Result<()> {
    let log_header = format!(
        "{}\n自动投递日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)?;
    Ok(())
}

/// 记录程序启动信息
pub fn log_startup(config: &Config, account_count: usize) {
    let t = &config.tunables;
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 多账号自动投递模式");
    info!("👥 账号数: {}", account_count);
    info!("🔌 传输方式: {:?}", config.transport);
    info!(
        "📄 每个搜索 {} 页, 并发抓取 {} 个",
        t.pages_per_query, t.max_concurrent_fetches
    );
    info!(
        "⏱️ 投递间隔 {:?}, 轮次间隔 {:?}, 限制复查 {:?}, 刷新间隔 {:?}",
        t.inter_submission_delay, t.inter_cycle_pause, t.limit_check_interval, t.refresh_interval
    );
    for rejected in &config.rejected_env {
        warn!("⚠️ {}", rejected);
    }
    info!("{}", "=".repeat(60));
}

/// 打印最终统计信息
pub fn print_final_stats(totals: &SessionCounters, history: &HistoryStats, log_file_path: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 本次运行统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("🔍 发现: {}", totals.discovered);
    info!("✅ 已投递: {}", totals.sent);
    info!("📝 需要测试: {}", totals.challenged);
    info!("♻️ 已投过: {}", totals.already_seen);
    info!("⏭️ 跳过: {}", totals.skipped);
    info!("❌ 错误: {}", totals.errored);
    info!("{}", "─".repeat(60));
    info!(
        "📚 历史记录: 已投递 {} 条, 需要测试 {} 条",
        history.total_applied, history.total_challenged
    );
    for (account, count) in &history.per_account {
        info!("   {}: {}", account, count);
    }
    info!("{}", "=".repeat(60));
    info!("\n日志已保存至: {}", log_file_path);
}

/// 截断长文本用于日志显示
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
