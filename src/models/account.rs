use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppResult, ConfigError};

/// 账号必备的 cookie
pub const REQUIRED_COOKIES: &[&str] = &["hhtoken", "_xsrf"];

/// 关键词搜索的路径
const SEARCH_PATH: &str = "/search/vacancy";

/// 账号凭据（原样传给平台的 cookie）
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credentials(pub BTreeMap<String, String>);

impl Credentials {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str).filter(|v| !v.trim().is_empty())
    }

    /// XSRF token，请求头 `X-XsrfToken` 需要
    pub fn xsrf(&self) -> Option<&str> {
        self.get("_xsrf")
    }

    /// 拼成 `Cookie` 请求头
    pub fn cookie_header(&self) -> String {
        self.0
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

// 凭据不进日志
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.keys()).finish()
    }
}

/// 一个平台账号
///
/// 运行期间不可变，由编排层持有，借给对应的工作循环。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// 账号名（历史记录按它分组）
    pub name: String,
    /// 日志中显示的短名
    #[serde(default)]
    pub short: String,
    /// 用于投递的简历
    #[serde(default)]
    pub resume_hash: String,
    /// 求职信模板
    #[serde(default)]
    pub letter: String,
    /// 搜索地址，按顺序抓取
    #[serde(default, alias = "urls")]
    pub queries: Vec<String>,
    #[serde(default)]
    pub cookies: Credentials,
    /// 浏览器模式下该账号使用的调试端口，缺省时使用全局端口
    #[serde(default)]
    pub browser_port: Option<u16>,
}

impl Account {
    /// 日志中显示的名字
    pub fn label(&self) -> &str {
        if self.short.is_empty() {
            &self.name
        } else {
            &self.short
        }
    }

    /// 把搜索地址规范化为完整地址，丢弃空白项
    pub fn normalize_queries(&mut self, base_url: &str) -> AppResult<()> {
        self.queries = self
            .queries
            .iter()
            .filter(|q| !q.trim().is_empty())
            .map(|q| normalize_query(base_url, q))
            .collect::<AppResult<_>>()?;
        Ok(())
    }

    /// 检查账号能否启动
    ///
    /// `require_cookies` 为 false 时（浏览器模式，会话由浏览器持有）只检查简历和搜索地址。
    pub fn validate(&self, require_cookies: bool) -> AppResult<()> {
        if self.queries.iter().all(|q| q.trim().is_empty()) {
            return Err(ConfigError::NoQueries {
                account: self.name.clone(),
            }
            .into());
        }
        if self.resume_hash.trim().is_empty() {
            return Err(ConfigError::MissingCredential {
                account: self.name.clone(),
                key: "resume_hash".to_string(),
            }
            .into());
        }
        if require_cookies {
            if let Some(missing) = REQUIRED_COOKIES.iter().find(|k| self.cookies.get(k).is_none()) {
                return Err(ConfigError::MissingCredential {
                    account: self.name.clone(),
                    key: missing.to_string(),
                }
                .into());
            }
        }
        Ok(())
    }
}

/// 账号文件
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountsFile {
    #[serde(default)]
    pub accounts: Vec<Account>,
}

/// 搜索地址规范化
///
/// - 完整的 http(s) 地址原样保留
/// - 以 `/` 开头的相对路径拼到 `base_url` 上
/// - 其他内容视为搜索关键词，转成 `/search/vacancy?text=...`
pub fn normalize_query(base_url: &str, raw: &str) -> AppResult<String> {
    let raw = raw.trim();
    if let Ok(url) = Url::parse(raw) {
        if matches!(url.scheme(), "http" | "https") {
            return Ok(url.into());
        }
    }

    let invalid = |reason: String| ConfigError::InvalidQuery {
        query: raw.to_string(),
        reason,
    };
    let base = Url::parse(base_url).map_err(|e| invalid(format!("base_url 非法: {}", e)))?;

    if raw.starts_with('/') {
        let url = base.join(raw).map_err(|e| invalid(e.to_string()))?;
        return Ok(url.into());
    }

    let mut url = base
        .join(SEARCH_PATH)
        .map_err(|e| invalid(e.to_string()))?;
    url.query_pairs_mut().append_pair("text", raw);
    Ok(url.into())
}

/// 从搜索地址中提取可读的查询描述
pub fn query_label(url: &str) -> String {
    let Ok(url) = Url::parse(url) else {
        return "搜索".to_string();
    };
    let mut recommended = false;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "text" if !value.is_empty() => return value.into_owned(),
            "resume" => recommended = true,
            _ => {}
        }
    }
    if recommended {
        "按简历推荐".to_string()
    } else {
        "搜索".to_string()
    }
}
