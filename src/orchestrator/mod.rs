//! 编排层（Orchestration Layer）
//!
//! ## 模块划分
//!
//! ### `app` - 应用生命周期
//! - 加载账号和历史记录，选择传输方式
//! - 读取操作员命令（暂停、恢复、停止、统计、调整参数）
//! - 输出最终统计
//!
//! ### `account_orchestrator` - 多账号编排
//! - 每个账号一个独立任务
//! - 汇总各账号的计数和状态快照
//!
//! ### `control` - 运行控制
//! - 全局 运行 / 暂停 / 停止 信号，各账号在检查点读取
//!
//! ### `commands` - 操作员命令解析
//!
//! ## 层次关系
//!
//! ```text
//! app (处理操作员命令)
//!     ↓
//! account_orchestrator (处理 Vec<Account>)
//!     ↓
//! workflow::AccountWorker (处理单个账号的循环)
//!     ↓
//! services (能力层：collector / classifier / history / limit / refresh)
//!     ↓
//! clients (传输：HTTP / 浏览器)
//! ```

pub mod account_orchestrator;
pub mod app;
pub mod commands;
pub mod control;

pub use account_orchestrator::Orchestrator;
pub use app::App;
pub use commands::OperatorCommand;
pub use control::{ControlHandle, RunControl, RunState};
