use std::fmt;

use serde::{Deserialize, Serialize};

use super::item::ItemMeta;

/// 平台返回的原始提交结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawResult {
    /// HTTP 状态码
    pub status: u16,
    /// 响应正文
    pub body: String,
}

impl RawResult {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_status_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// 一次提交的分类结果
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// 提交成功；`confirmed` 为 false 表示响应里没有成功标记，只是没有否定标记
    Sent {
        meta: Option<ItemMeta>,
        confirmed: bool,
    },
    /// 需要额外测试，永久排除
    ChallengeRequired(Option<ItemMeta>),
    /// 之前已经投递过
    AlreadyDone,
    /// 触发平台限制
    LimitExceeded,
    /// 传输异常或无法识别的结果，附带截断后的诊断信息
    Error(String),
}

impl Outcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            Outcome::Sent { .. } => OutcomeKind::Sent,
            Outcome::ChallengeRequired(_) => OutcomeKind::ChallengeRequired,
            Outcome::AlreadyDone => OutcomeKind::AlreadyDone,
            Outcome::LimitExceeded => OutcomeKind::LimitExceeded,
            Outcome::Error(_) => OutcomeKind::Error,
        }
    }

    pub fn meta(&self) -> Option<&ItemMeta> {
        match self {
            Outcome::Sent { meta, .. } | Outcome::ChallengeRequired(meta) => meta.as_ref(),
            _ => None,
        }
    }
}

/// 不带数据的结果类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Sent,
    ChallengeRequired,
    AlreadyDone,
    LimitExceeded,
    Error,
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeKind::Sent => write!(f, "sent"),
            OutcomeKind::ChallengeRequired => write!(f, "challenge_required"),
            OutcomeKind::AlreadyDone => write!(f, "already_done"),
            OutcomeKind::LimitExceeded => write!(f, "limit_exceeded"),
            OutcomeKind::Error => write!(f, "error"),
        }
    }
}

/// 单个账号本次会话的计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCounters {
    /// 成功提交
    pub sent: u64,
    /// 队列中因中断（限制 / 暂停 / 停止）而放弃的条目
    pub skipped: u64,
    /// 需要测试
    pub challenged: u64,
    /// 出错
    pub errored: u64,
    /// 已经投递过
    pub already_seen: u64,
    /// 发现的不重复条目
    pub discovered: u64,
}

impl SessionCounters {
    /// 累加另一个账号的计数
    pub fn accumulate(&mut self, other: &SessionCounters) {
        self.sent += other.sent;
        self.skipped += other.skipped;
        self.challenged += other.challenged;
        self.errored += other.errored;
        self.already_seen += other.already_seen;
        self.discovered += other.discovered;
    }
}
