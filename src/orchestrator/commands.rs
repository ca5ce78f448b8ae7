//! 操作员命令
//!
//! 从标准输入逐行读取，例如 `pause`、`set inter_cycle_pause 5m`、`applied 20`。

use std::str::FromStr;

use crate::error::AppError;

/// 列表命令默认显示的条数
pub const DEFAULT_LIST_LIMIT: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorCommand {
    Pause,
    Resume,
    Stop,
    /// 各账号计数和状态
    Stats,
    /// 当前运行参数
    Show,
    /// 修改运行参数
    Set { key: String, value: String },
    /// 最近的已投递记录
    Applied(usize),
    /// 最近的需要测试记录
    Challenged(usize),
    Help,
}

pub const HELP: &str = "命令: pause | resume | stop | stats | show | set <参数> <值> | applied [n] | tests [n] | help";

fn parse_limit(arg: Option<&str>) -> Result<usize, AppError> {
    match arg {
        None => Ok(DEFAULT_LIST_LIMIT),
        Some(raw) => raw
            .parse()
            .map_err(|_| AppError::invalid_value("limit", raw, "需要正整数")),
    }
}

impl FromStr for OperatorCommand {
    type Err = AppError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut parts = line.split_whitespace();
        let Some(cmd) = parts.next() else {
            return Err(AppError::Other("空命令".to_string()));
        };
        let arg = parts.next();

        let command = match cmd.to_ascii_lowercase().as_str() {
            "pause" | "p" => OperatorCommand::Pause,
            "resume" | "r" => OperatorCommand::Resume,
            "stop" | "quit" | "q" => OperatorCommand::Stop,
            "stats" | "s" => OperatorCommand::Stats,
            "show" | "config" => OperatorCommand::Show,
            "set" => {
                let (Some(key), Some(value)) = (arg, parts.next()) else {
                    return Err(AppError::Other("用法: set <参数> <值>".to_string()));
                };
                OperatorCommand::Set {
                    key: key.to_string(),
                    value: value.to_string(),
                }
            }
            "applied" => OperatorCommand::Applied(parse_limit(arg)?),
            "tests" => OperatorCommand::Challenged(parse_limit(arg)?),
            "help" | "h" | "?" => OperatorCommand::Help,
            other => return Err(AppError::Other(format!("未知命令: {} ({})", other, HELP))),
        };
        Ok(command)
    }
}
