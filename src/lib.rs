//! # HH Auto Response
//!
//! 多账号自动投递工具：发现职位、去重、投递、对结果分类
//!
//! ## 架构设计
//!
//! ### ① 传输层（Clients / Infrastructure）
//! - `clients/` - `FetchClient` / `SubmissionClient` 两个接口，HTTP 和浏览器两种实现
//! - `infrastructure/` - `JsExecutor`，浏览器模式下唯一的 page owner
//!
//! ### ② 业务能力层（Services）
//! - `Collector` - 按查询分页抓取职位 ID，有界并发
//! - `classify` - 把原始响应映射为投递结果
//! - `JsonHistoryStore` - 已投递 / 需要测试 的持久化记录
//! - `LimitGuard` / `RefreshScheduler` - 每日上限和简历刷新计时
//!
//! ### ③ 流程层（Workflow）
//! - `AccountWorker` - 单个账号的 发现 → 过滤 → 投递 → 等待 循环
//! - `Observer` - 状态、日志、计数事件的出口
//!
//! ### ④ 编排层（Orchestration）
//! - `Orchestrator` - 每个账号一个任务，共享历史记录和运行参数
//! - `App` - 应用生命周期和操作员命令

pub mod browser;
pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::{Config, ConfigHandle, Tunables};
pub use error::{AppError, AppResult};
pub use models::{Account, ItemId, Outcome, RawResult, SessionCounters};
pub use orchestrator::{App, Orchestrator};
pub use services::{classify, HistoryStore, JsonHistoryStore};
pub use workflow::{AccountWorker, WorkerState};
