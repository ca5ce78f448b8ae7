//! 浏览器传输
//!
//! 在已登录的浏览器页面里执行 `fetch`，请求自动携带页面会话的 cookie，
//! 账号配置里不需要提供凭据。

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::Browser;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::http_client::{describe_refresh, PROBE_ITEM_ID, RESPONSE_ENDPOINT, TOUCH_ENDPOINT};
use super::{AccountClients, ClientFactory, FetchClient, SubmissionClient};
use crate::browser::connect_to_browser_and_page;
use crate::error::{AppError, AppResult};
use crate::infrastructure::JsExecutor;
use crate::models::{Account, ItemId, RawResult};
use crate::utils::logging::truncate_text;

/// 页面脚本的返回值
#[derive(Debug, Deserialize)]
struct ScriptResponse {
    #[serde(default)]
    status: Option<u16>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// 通过浏览器页面访问平台的客户端
pub struct BrowserClient {
    executor: JsExecutor,
    base_url: String,
    submit_timeout: Duration,
    probe_timeout: Duration,
    _browser: Browser,
}

impl BrowserClient {
    pub fn new(
        browser: Browser,
        executor: JsExecutor,
        base_url: &str,
        submit_timeout: Duration,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            executor,
            base_url: base_url.trim_end_matches('/').to_string(),
            submit_timeout,
            probe_timeout,
            _browser: browser,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// 在页面里执行脚本，超时后返回 Timeout 错误（页面内的请求不会被取消）
    async fn run_script(&self, endpoint: &str, js: String, timeout: Duration) -> AppResult<RawResult> {
        let response: ScriptResponse = with_timeout(endpoint, timeout, self.executor.eval_as(js)).await?;

        if let Some(err) = response.error {
            return Err(AppError::request_failed(endpoint, ScriptError(err)));
        }
        let status = response
            .status
            .ok_or_else(|| AppError::malformed(endpoint, "脚本没有返回状态码"))?;
        let body = response.body.unwrap_or_default();

        debug!(
            "page fetch {} -> HTTP {}, {} 字节: {}",
            endpoint,
            status,
            body.len(),
            truncate_text(&body, 300)
        );
        Ok(RawResult::new(status, body))
    }

    async fn post_form(
        &self,
        path: &str,
        fields: serde_json::Value,
        timeout: Duration,
    ) -> AppResult<RawResult> {
        let js = form_post_script(&self.endpoint(path), &fields);
        self.run_script(path, js, timeout).await
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct ScriptError(String);

async fn with_timeout<T>(
    endpoint: &str,
    timeout: Duration,
    fut: impl Future<Output = AppResult<T>>,
) -> AppResult<T> {
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(AppError::timeout(endpoint, timeout)),
    }
}

/// 页面内 GET 请求
fn get_script(url: &str) -> String {
    format!(
        r#"(async () => {{
    try {{
        const res = await fetch({url}, {{ credentials: "include" }});
        return {{ status: res.status, body: await res.text() }};
    }} catch (err) {{
        return {{ error: String(err) }};
    }}
}})()"#,
        url = json!(url)
    )
}

/// 页面内 multipart 表单 POST，XSRF token 从页面 cookie 读取
fn form_post_script(url: &str, fields: &serde_json::Value) -> String {
    format!(
        r#"(async () => {{
    try {{
        const fd = new FormData();
        for (const [k, v] of Object.entries({fields})) fd.append(k, v);
        const m = document.cookie.match(/(?:^|; )_xsrf=([^;]*)/);
        const xsrf = m ? decodeURIComponent(m[1]) : "";
        const res = await fetch({url}, {{
            method: "POST",
            body: fd,
            credentials: "include",
            headers: {{ "X-XsrfToken": xsrf }},
        }});
        return {{ status: res.status, body: await res.text() }};
    }} catch (err) {{
        return {{ error: String(err) }};
    }}
}})()"#,
        url = json!(url),
        fields = fields
    )
}

#[async_trait]
impl FetchClient for BrowserClient {
    async fn fetch(&self, url: &str, timeout: Duration) -> AppResult<String> {
        let raw = self.run_script(url, get_script(url), timeout).await?;
        if !raw.is_status_ok() {
            return Err(AppError::bad_status(url, raw.status));
        }
        Ok(raw.body)
    }
}

#[async_trait]
impl SubmissionClient for BrowserClient {
    async fn submit(&self, account: &Account, item: &ItemId) -> AppResult<RawResult> {
        let fields = json!({
            "resume_hash": account.resume_hash,
            "vacancy_id": item.as_str(),
            "letterRequired": "true",
            "letter": account.letter,
            "lux": "true",
            "ignore_postponed": "true",
        });
        self.post_form(RESPONSE_ENDPOINT, fields, self.submit_timeout).await
    }

    async fn probe(&self, account: &Account) -> AppResult<RawResult> {
        let fields = json!({
            "resume_hash": account.resume_hash,
            "vacancy_id": PROBE_ITEM_ID,
        });
        self.post_form(RESPONSE_ENDPOINT, fields, self.probe_timeout).await
    }

    async fn refresh_visibility(&self, account: &Account) -> (bool, String) {
        let fields = json!({
            "resume": account.resume_hash,
            "undirectable": "true",
        });
        match self.post_form(TOUCH_ENDPOINT, fields, self.probe_timeout).await {
            Ok(raw) => describe_refresh(raw.status),
            Err(e) => (false, format!("错误: {}", truncate_text(&e.to_string(), 30))),
        }
    }
}

/// 浏览器传输的客户端工厂
///
/// 每个账号单独连接一次浏览器；账号配置了 `browser_port` 时使用该端口，
/// 这样不同账号可以使用不同的浏览器实例（不同的登录会话）。
pub struct BrowserClientFactory {
    base_url: String,
    default_port: u16,
    submit_timeout: Duration,
    probe_timeout: Duration,
}

impl BrowserClientFactory {
    pub fn new(
        base_url: impl Into<String>,
        default_port: u16,
        submit_timeout: Duration,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            default_port,
            submit_timeout,
            probe_timeout,
        }
    }

    pub fn port_for(&self, account: &Account) -> u16 {
        account.browser_port.unwrap_or(self.default_port)
    }
}

#[async_trait]
impl ClientFactory for BrowserClientFactory {
    fn requires_cookies(&self) -> bool {
        false
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn connect(&self, account: &Account) -> AppResult<AccountClients> {
        let (browser, page) =
            connect_to_browser_and_page(self.port_for(account), Some(&self.base_url)).await?;
        let client = std::sync::Arc::new(BrowserClient::new(
            browser,
            JsExecutor::new(page),
            &self.base_url,
            self.submit_timeout,
            self.probe_timeout,
        ));
        Ok(AccountClients {
            fetcher: client.clone(),
            submitter: client,
        })
    }
}
