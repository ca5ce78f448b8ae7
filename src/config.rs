//! 程序配置
//!
//! - [`Config`]：进程级配置，启动时从环境变量读取，之后不再变化
//! - [`Tunables`]：运行时可调参数，由操作员通过 [`ConfigHandle`] 修改，
//!   每个账号工作循环在每一轮开始时重新读取

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use tokio::sync::watch;

use crate::error::{AppError, AppResult, ConfigError};

/// 提交 / 抓取使用的传输方式
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportKind {
    /// 直接发送 HTTP 请求
    Http,
    /// 通过已登录的浏览器页面发送请求
    Browser,
}

impl FromStr for TransportKind {
    type Err = AppError;

    fn from_str(s: &str) -> AppResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(TransportKind::Http),
            "browser" => Ok(TransportKind::Browser),
            other => Err(AppError::invalid_value("transport", other, "可选值: http / browser")),
        }
    }
}

/// 没有明确标记时如何判定提交结果
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SuccessPolicy {
    /// 状态码正常且没有任何否定标记即视为成功（原始行为，可能误报）
    Optimistic,
    /// 必须出现明确的成功标记，否则记为错误
    Strict,
}

impl FromStr for SuccessPolicy {
    type Err = AppError;

    fn from_str(s: &str) -> AppResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "optimistic" => Ok(SuccessPolicy::Optimistic),
            "strict" => Ok(SuccessPolicy::Strict),
            other => Err(AppError::invalid_value(
                "success_policy",
                other,
                "可选值: optimistic / strict",
            )),
        }
    }
}

impl fmt::Display for SuccessPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SuccessPolicy::Optimistic => write!(f, "optimistic"),
            SuccessPolicy::Strict => write!(f, "strict"),
        }
    }
}

/// 运行时可调参数
#[derive(Clone, Debug, PartialEq)]
pub struct Tunables {
    /// 每个搜索地址抓取的页数
    pub pages_per_query: usize,
    /// 同时进行的页面抓取数量上限
    pub max_concurrent_fetches: usize,
    /// 两次提交之间的间隔
    pub inter_submission_delay: Duration,
    /// 两轮循环之间的暂停
    pub inter_cycle_pause: Duration,
    /// 触发限制后重新检查的间隔
    pub limit_check_interval: Duration,
    /// 简历刷新间隔
    pub refresh_interval: Duration,
    /// 单页抓取超时
    pub fetch_timeout: Duration,
    /// 每次抓取开始前的节流延迟
    pub fetch_pacing: Duration,
    /// 没有发现新条目时的短暂停
    pub empty_pause: Duration,
    /// 限制期间每次休眠的最长时间
    pub limit_poll_step: Duration,
    /// 非首页抓到 0 条时跳过该搜索剩余页
    pub stop_on_empty_page: bool,
    /// 是否启用定时刷新
    pub refresh_enabled: bool,
    /// 提交结果判定策略
    pub success_policy: SuccessPolicy,
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            pages_per_query: 5,
            max_concurrent_fetches: 5,
            inter_submission_delay: Duration::from_secs(3),
            inter_cycle_pause: Duration::from_secs(120),
            limit_check_interval: Duration::from_secs(30 * 60),
            refresh_interval: Duration::from_secs(4 * 60 * 60),
            fetch_timeout: Duration::from_secs(15),
            fetch_pacing: Duration::from_millis(200),
            empty_pause: Duration::from_secs(120),
            limit_poll_step: Duration::from_secs(30),
            stop_on_empty_page: true,
            refresh_enabled: true,
            success_policy: SuccessPolicy::Optimistic,
        }
    }
}

/// 所有可修改的参数名
pub const TUNABLE_KEYS: &[&str] = &[
    "pages_per_query",
    "max_concurrent_fetches",
    "inter_submission_delay",
    "inter_cycle_pause",
    "limit_check_interval",
    "refresh_interval",
    "fetch_timeout",
    "fetch_pacing",
    "empty_pause",
    "limit_poll_step",
    "stop_on_empty_page",
    "refresh_enabled",
    "success_policy",
];

impl Tunables {
    /// 按参数名修改一个值
    ///
    /// 时长支持 `500ms` / `90s` / `30m` / `4h`，不带单位按秒处理。
    /// 除 `fetch_pacing` 外，数值和时长都必须为正数。
    pub fn set(&mut self, key: &str, value: &str) -> AppResult<()> {
        match key {
            "pages_per_query" => self.pages_per_query = parse_count(key, value)?,
            "max_concurrent_fetches" => self.max_concurrent_fetches = parse_count(key, value)?,
            "inter_submission_delay" => self.inter_submission_delay = parse_positive(key, value)?,
            "inter_cycle_pause" => self.inter_cycle_pause = parse_positive(key, value)?,
            "limit_check_interval" => self.limit_check_interval = parse_positive(key, value)?,
            "refresh_interval" => self.refresh_interval = parse_positive(key, value)?,
            "fetch_timeout" => self.fetch_timeout = parse_positive(key, value)?,
            "fetch_pacing" => self.fetch_pacing = parse_duration(key, value)?,
            "empty_pause" => self.empty_pause = parse_positive(key, value)?,
            "limit_poll_step" => self.limit_poll_step = parse_positive(key, value)?,
            "stop_on_empty_page" => self.stop_on_empty_page = parse_bool(key, value)?,
            "refresh_enabled" => self.refresh_enabled = parse_bool(key, value)?,
            "success_policy" => self.success_policy = value.parse()?,
            _ => {
                return Err(ConfigError::UnknownKey {
                    key: key.to_string(),
                }
                .into())
            }
        }
        Ok(())
    }

    /// 以 `key = value` 形式列出当前参数
    pub fn describe(&self) -> Vec<(&'static str, String)> {
        vec![
            ("pages_per_query", self.pages_per_query.to_string()),
            ("max_concurrent_fetches", self.max_concurrent_fetches.to_string()),
            ("inter_submission_delay", format!("{:?}", self.inter_submission_delay)),
            ("inter_cycle_pause", format!("{:?}", self.inter_cycle_pause)),
            ("limit_check_interval", format!("{:?}", self.limit_check_interval)),
            ("refresh_interval", format!("{:?}", self.refresh_interval)),
            ("fetch_timeout", format!("{:?}", self.fetch_timeout)),
            ("fetch_pacing", format!("{:?}", self.fetch_pacing)),
            ("empty_pause", format!("{:?}", self.empty_pause)),
            ("limit_poll_step", format!("{:?}", self.limit_poll_step)),
            ("stop_on_empty_page", self.stop_on_empty_page.to_string()),
            ("refresh_enabled", self.refresh_enabled.to_string()),
            ("success_policy", self.success_policy.to_string()),
        ]
    }

    /// 用变量覆盖默认值，非法值保留默认并返回说明
    ///
    /// 变量名为参数名的大写形式。此时日志还未初始化，说明由调用方稍后输出。
    fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> (Self, Vec<String>) {
        let mut tunables = Self::default();
        let mut rejected = Vec::new();
        for key in TUNABLE_KEYS {
            let var = key.to_ascii_uppercase();
            if let Some(value) = lookup(&var) {
                if let Err(e) = tunables.set(key, &value) {
                    rejected.push(format!("忽略环境变量 {}: {}", var, e));
                }
            }
        }
        (tunables, rejected)
    }
}

fn parse_count(key: &str, value: &str) -> AppResult<usize> {
    let n: usize = value
        .trim()
        .parse()
        .map_err(|_| AppError::invalid_value(key, value, "需要正整数"))?;
    if n == 0 {
        return Err(AppError::invalid_value(key, value, "必须为正数"));
    }
    Ok(n)
}

fn parse_bool(key: &str, value: &str) -> AppResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "on" | "yes" => Ok(true),
        "false" | "0" | "off" | "no" => Ok(false),
        _ => Err(AppError::invalid_value(key, value, "需要 true / false")),
    }
}

fn parse_positive(key: &str, value: &str) -> AppResult<Duration> {
    let d = parse_duration(key, value)?;
    if d.is_zero() {
        return Err(AppError::invalid_value(key, value, "必须为正数"));
    }
    Ok(d)
}

/// 解析 `500ms` / `90s` / `30m` / `4h` / `120`
pub fn parse_duration(key: &str, value: &str) -> AppResult<Duration> {
    let v = value.trim().to_ascii_lowercase();
    let (number, unit_ms) = if let Some(n) = v.strip_suffix("ms") {
        (n, 1)
    } else if let Some(n) = v.strip_suffix('s') {
        (n, 1_000)
    } else if let Some(n) = v.strip_suffix('m') {
        (n, 60_000)
    } else if let Some(n) = v.strip_suffix('h') {
        (n, 3_600_000)
    } else {
        (v.as_str(), 1_000)
    };
    let n: u64 = number
        .trim()
        .parse()
        .map_err(|_| AppError::invalid_value(key, value, "需要时长, 例如 90s / 30m / 4h"))?;
    Ok(Duration::from_millis(n.saturating_mul(unit_ms)))
}

/// 运行时参数的唯一写入口
///
/// 工作循环持有 [`watch::Receiver`]，每轮读取最新快照。
#[derive(Debug)]
pub struct ConfigHandle {
    tx: watch::Sender<Tunables>,
}

impl ConfigHandle {
    pub fn new(initial: Tunables) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    /// 订阅参数变化
    pub fn subscribe(&self) -> watch::Receiver<Tunables> {
        self.tx.subscribe()
    }

    /// 当前参数快照
    pub fn snapshot(&self) -> Tunables {
        self.tx.borrow().clone()
    }

    /// 修改一个参数；失败时不做任何改动
    pub fn set(&self, key: &str, value: &str) -> AppResult<()> {
        let mut next = self.snapshot();
        next.set(key, value)?;
        self.tx.send_replace(next);
        Ok(())
    }
}

/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    /// 账号配置文件
    pub accounts_file: String,
    /// 历史记录目录
    pub data_dir: String,
    /// 平台地址
    pub base_url: String,
    /// 传输方式
    pub transport: TransportKind,
    /// 浏览器调试端口（仅 browser 传输方式）
    pub browser_debug_port: u16,
    /// 提交请求超时
    pub submit_timeout: Duration,
    /// 探测 / 刷新请求超时
    pub probe_timeout: Duration,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 输出日志文件
    pub output_log_file: String,
    /// 运行时参数初始值
    pub tunables: Tunables,
    /// 被忽略的环境变量，日志初始化后输出
    pub rejected_env: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            accounts_file: "accounts.toml".to_string(),
            data_dir: "data".to_string(),
            base_url: "https://hh.ru".to_string(),
            transport: TransportKind::Http,
            browser_debug_port: 9222,
            submit_timeout: Duration::from_secs(15),
            probe_timeout: Duration::from_secs(10),
            verbose_logging: false,
            output_log_file: "output.txt".to_string(),
            tunables: Tunables::default(),
            rejected_env: Vec::new(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        let (tunables, rejected_env) = Tunables::from_vars(|var| std::env::var(var).ok());
        Self {
            accounts_file: std::env::var("ACCOUNTS_FILE").unwrap_or(default.accounts_file),
            data_dir: std::env::var("DATA_DIR").unwrap_or(default.data_dir),
            base_url: std::env::var("BASE_URL").unwrap_or(default.base_url),
            transport: std::env::var("TRANSPORT").ok().and_then(|v| v.parse().ok()).unwrap_or(default.transport),
            browser_debug_port: std::env::var("BROWSER_DEBUG_PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(default.browser_debug_port),
            submit_timeout: std::env::var("SUBMIT_TIMEOUT").ok().and_then(|v| parse_duration("SUBMIT_TIMEOUT", &v).ok()).unwrap_or(default.submit_timeout),
            probe_timeout: std::env::var("PROBE_TIMEOUT").ok().and_then(|v| parse_duration("PROBE_TIMEOUT", &v).ok()).unwrap_or(default.probe_timeout),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(default.output_log_file),
            tunables,
            rejected_env,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_tunables() {
        let t = Tunables::default();
        assert_eq!(t.pages_per_query, 5);
        assert_eq!(t.max_concurrent_fetches, 5);
        assert_eq!(t.inter_submission_delay, Duration::from_secs(3));
        assert_eq!(t.inter_cycle_pause, Duration::from_secs(120));
        assert_eq!(t.limit_check_interval, Duration::from_secs(1800));
        assert_eq!(t.refresh_interval, Duration::from_secs(14400));
        assert_eq!(t.success_policy, SuccessPolicy::Optimistic);
    }

    #[test]
    fn parse_duration_units() {
        assert_eq!(parse_duration("k", "500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("k", "90s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("k", "30m").unwrap(), Duration::from_secs(1800));
        assert_eq!(parse_duration("k", "4h").unwrap(), Duration::from_secs(14400));
        assert_eq!(parse_duration("k", "120").unwrap(), Duration::from_secs(120));
        assert!(parse_duration("k", "soon").is_err());
    }

    #[test]
    fn set_rejects_non_positive_values() {
        let mut t = Tunables::default();
        assert!(t.set("pages_per_query", "0").is_err());
        assert!(t.set("inter_cycle_pause", "0s").is_err());
        assert!(t.set("max_concurrent_fetches", "-1").is_err());
        assert_eq!(t, Tunables::default());

        // 节流延迟允许为 0
        t.set("fetch_pacing", "0").unwrap();
        assert!(t.fetch_pacing.is_zero());
    }

    #[test]
    fn set_unknown_key_fails() {
        let mut t = Tunables::default();
        let err = t.set("turbo", "1").unwrap_err();
        assert!(matches!(err, AppError::Config(ConfigError::UnknownKey { .. })));
    }

    #[test]
    fn every_listed_key_is_settable() {
        let described: Vec<_> = Tunables::default().describe().into_iter().map(|(k, _)| k).collect();
        assert_eq!(described, TUNABLE_KEYS);
    }

    #[test]
    fn invalid_variables_are_reported_not_applied() {
        let (t, rejected) = Tunables::from_vars(|var| match var {
            "PAGES_PER_QUERY" => Some("0".to_string()),
            "INTER_CYCLE_PAUSE" => Some("10m".to_string()),
            "SUCCESS_POLICY" => Some("maybe".to_string()),
            _ => None,
        });
        assert_eq!(t.pages_per_query, Tunables::default().pages_per_query);
        assert_eq!(t.inter_cycle_pause, Duration::from_secs(600));
        assert_eq!(rejected.len(), 2);
        assert!(rejected[0].contains("PAGES_PER_QUERY"));
        assert!(rejected[1].contains("SUCCESS_POLICY"));
    }

    #[tokio::test]
    async fn handle_publishes_to_subscribers() {
        let handle = ConfigHandle::new(Tunables::default());
        let mut rx = handle.subscribe();

        handle.set("pages_per_query", "3").unwrap();
        handle.set("success_policy", "strict").unwrap();

        assert!(rx.has_changed().unwrap());
        let seen = rx.borrow_and_update().clone();
        assert_eq!(seen.pages_per_query, 3);
        assert_eq!(seen.success_policy, SuccessPolicy::Strict);

        // 失败的修改不会发布
        assert!(handle.set("pages_per_query", "zero").is_err());
        assert!(!rx.has_changed().unwrap());
    }
}
