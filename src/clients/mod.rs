//! 外部协作方接口
//!
//! 工作循环只依赖这里的 trait，不关心底层是直接发 HTTP 请求还是驱动浏览器页面。

pub mod browser_client;
pub mod http_client;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::AppResult;
use crate::models::{Account, ItemId, RawResult};

pub use browser_client::{BrowserClient, BrowserClientFactory};
pub use http_client::{HttpClientFactory, HttpPlatformClient};

/// 页面抓取
#[async_trait]
pub trait FetchClient: Send + Sync {
    /// 抓取一个页面并返回正文
    async fn fetch(&self, url: &str, timeout: Duration) -> AppResult<String>;
}

/// 提交 / 探测 / 刷新
#[async_trait]
pub trait SubmissionClient: Send + Sync {
    /// 对条目执行一次提交，返回原始结果
    async fn submit(&self, account: &Account, item: &ItemId) -> AppResult<RawResult>;

    /// 低成本的提交，仅用于检查限制是否仍然有效
    async fn probe(&self, account: &Account) -> AppResult<RawResult>;

    /// 刷新账号在平台上的可见度，返回 (是否成功, 说明)
    async fn refresh_visibility(&self, account: &Account) -> (bool, String);
}

/// 一个账号使用的客户端
#[derive(Clone)]
pub struct AccountClients {
    pub fetcher: Arc<dyn FetchClient>,
    pub submitter: Arc<dyn SubmissionClient>,
}

/// 为账号创建客户端
///
/// 创建失败只影响这一个账号。
#[async_trait]
pub trait ClientFactory: Send + Sync {
    /// 该传输方式是否需要账号提供 cookie
    fn requires_cookies(&self) -> bool;

    /// 平台地址，相对的搜索地址以它为基准
    fn base_url(&self) -> &str;

    async fn connect(&self, account: &Account) -> AppResult<AccountClients>;
}
