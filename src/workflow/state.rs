//! 工作循环状态机
//!
//! 状态转换全部经过 [`WorkerState::next`] 的转换表，表外的转换返回 `None`。

use std::fmt;

use serde::Serialize;

/// 账号工作循环的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum WorkerState {
    Idle,
    Collecting,
    Filtering,
    Applying,
    Limited,
    CheckingLimit,
    Waiting,
    Stopped,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkerState::Idle => "IDLE",
            WorkerState::Collecting => "COLLECTING",
            WorkerState::Filtering => "FILTERING",
            WorkerState::Applying => "APPLYING",
            WorkerState::Limited => "LIMITED",
            WorkerState::CheckingLimit => "CHECKING_LIMIT",
            WorkerState::Waiting => "WAITING",
            WorkerState::Stopped => "STOPPED",
        };
        f.write_str(s)
    }
}

/// 驱动状态变化的事件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// 全局暂停
    Pause,
    /// 停止
    Stop,
    /// 开始新一轮发现
    BeginCycle,
    /// 发现了条目
    Discovered,
    /// 什么都没发现
    NothingDiscovered,
    /// 过滤后有新条目
    QueueReady,
    /// 过滤后没有新条目
    NothingNew,
    /// 队列处理完
    QueueDrained,
    /// 触发限制（提交时，或暂停恢复后仍处于受限期）
    LimitHit,
    /// 到了重新检查限制的时间
    RecheckDue,
    /// 探测结果仍受限
    StillLimited,
    /// 探测结果限制已解除
    LimitCleared,
}

impl WorkerState {
    /// 转换表
    pub fn next(self, transition: Transition) -> Option<WorkerState> {
        use Transition as T;
        use WorkerState as S;

        match (self, transition) {
            (S::Stopped, _) => None,
            (_, T::Stop) => Some(S::Stopped),
            (_, T::Pause) => Some(S::Idle),
            (S::Idle | S::Waiting, T::BeginCycle) => Some(S::Collecting),
            (S::Collecting, T::Discovered) => Some(S::Filtering),
            (S::Collecting, T::NothingDiscovered) => Some(S::Waiting),
            (S::Filtering, T::QueueReady) => Some(S::Applying),
            (S::Filtering, T::NothingNew) => Some(S::Waiting),
            (S::Applying, T::QueueDrained) => Some(S::Waiting),
            (S::Applying | S::Idle | S::Waiting, T::LimitHit) => Some(S::Limited),
            (S::Limited, T::RecheckDue) => Some(S::CheckingLimit),
            (S::CheckingLimit, T::StillLimited) => Some(S::Limited),
            (S::CheckingLimit, T::LimitCleared) => Some(S::Idle),
            _ => None,
        }
    }
}
