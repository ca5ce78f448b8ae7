use std::time::Duration;

use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 网络传输错误（抓取页面 / 提交 / 刷新）
    #[error("传输错误: {0}")]
    Transport(#[from] TransportError),
    /// 历史记录存储错误
    #[error("存储错误: {0}")]
    Storage(#[from] StorageError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 浏览器相关错误
    #[error("浏览器错误: {0}")]
    Browser(#[from] BrowserError),
    /// 其他错误
    #[error("错误: {0}")]
    Other(String),
}

/// 网络传输错误
///
/// 全部属于"瞬时 I/O 失败"：记录、计数，循环继续，永远不是致命错误。
#[derive(Debug, Error)]
pub enum TransportError {
    /// 请求发送失败
    #[error("请求失败 ({endpoint}): {source}")]
    RequestFailed {
        endpoint: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 请求超时
    #[error("请求超时 ({endpoint}), 超过 {after:?}")]
    Timeout { endpoint: String, after: Duration },
    /// 平台返回了非成功状态码
    #[error("HTTP {status} ({endpoint})")]
    BadStatus { endpoint: String, status: u16 },
    /// 页面脚本返回了无法识别的结果
    #[error("无法解析响应 ({endpoint}): {detail}")]
    Malformed { endpoint: String, detail: String },
}

/// 历史记录存储错误
#[derive(Debug, Error)]
pub enum StorageError {
    /// 读取文件失败
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 写入文件失败
    #[error("写入文件失败 ({path}): {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// JSON 解析失败
    #[error("JSON解析失败 ({path}): {source}")]
    ParseFailed {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    /// JSON 序列化失败
    #[error("JSON序列化失败: {0}")]
    SerializeFailed(#[source] serde_json::Error),
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 参数值非法
    #[error("参数 {key} 的值 '{value}' 非法: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
    /// 未知参数
    #[error("未知参数: {key}")]
    UnknownKey { key: String },
    /// 账号缺少凭据
    #[error("账号 {account} 缺少凭据: {key}")]
    MissingCredential { account: String, key: String },
    /// 账号没有配置任何搜索地址
    #[error("账号 {account} 没有配置搜索地址")]
    NoQueries { account: String },
    /// 搜索地址无法规范化
    #[error("搜索地址 '{query}' 非法: {reason}")]
    InvalidQuery { query: String, reason: String },
    /// 账号文件不存在
    #[error("账号文件不存在: {path}")]
    AccountsFileNotFound { path: String },
    /// 账号文件解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// 浏览器相关错误
#[derive(Debug, Error)]
pub enum BrowserError {
    /// 连接浏览器失败
    #[error("无法连接到浏览器 (端口: {port}): {source}")]
    ConnectionFailed {
        port: u16,
        #[source]
        source: chromiumoxide::error::CdpError,
    },
    /// 执行脚本失败
    #[error("执行脚本失败: {0}")]
    ScriptFailed(#[source] chromiumoxide::error::CdpError),
}

// ========== 从常见错误类型转换 ==========

impl From<chromiumoxide::error::CdpError> for AppError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        AppError::Browser(BrowserError::ScriptFailed(err))
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建请求失败错误
    pub fn request_failed(
        endpoint: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Transport(TransportError::RequestFailed {
            endpoint: endpoint.into(),
            source: Box::new(source),
        })
    }

    /// 创建请求超时错误
    pub fn timeout(endpoint: impl Into<String>, after: Duration) -> Self {
        AppError::Transport(TransportError::Timeout {
            endpoint: endpoint.into(),
            after,
        })
    }

    /// 创建非成功状态码错误
    pub fn bad_status(endpoint: impl Into<String>, status: u16) -> Self {
        AppError::Transport(TransportError::BadStatus {
            endpoint: endpoint.into(),
            status,
        })
    }

    /// 创建响应无法解析错误
    pub fn malformed(endpoint: impl Into<String>, detail: impl Into<String>) -> Self {
        AppError::Transport(TransportError::Malformed {
            endpoint: endpoint.into(),
            detail: detail.into(),
        })
    }

    /// 创建文件读取错误
    pub fn read_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::Storage(StorageError::ReadFailed {
            path: path.into(),
            source,
        })
    }

    /// 创建文件写入错误
    pub fn write_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::Storage(StorageError::WriteFailed {
            path: path.into(),
            source,
        })
    }

    /// 创建参数非法错误
    pub fn invalid_value(
        key: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        AppError::Config(ConfigError::InvalidValue {
            key: key.into(),
            value: value.into(),
            reason: reason.into(),
        })
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_pick_the_right_layer() {
        let err = AppError::timeout("/applicant/vacancy_response/popup", Duration::from_secs(15));
        assert!(matches!(err, AppError::Transport(TransportError::Timeout { .. })));
        assert!(err.to_string().contains("请求超时"));

        let err = AppError::invalid_value("pages_per_query", "0", "必须为正数");
        assert!(matches!(err, AppError::Config(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn config_error_display() {
        let err: AppError = ConfigError::MissingCredential {
            account: "Demo".into(),
            key: "hhtoken".into(),
        }
        .into();
        assert_eq!(err.to_string(), "配置错误: 账号 Demo 缺少凭据: hhtoken");
    }
}
