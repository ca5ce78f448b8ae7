//! HTTP 传输
//!
//! 直接携带账号 cookie 和 XSRF token 调用平台接口。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, COOKIE, ORIGIN, USER_AGENT};
use reqwest::multipart::Form;
use reqwest::Client;
use tracing::debug;

use super::{AccountClients, ClientFactory, FetchClient, SubmissionClient};
use crate::error::{AppError, AppResult};
use crate::models::{Account, ItemId, RawResult};
use crate::utils::logging::truncate_text;

const BROWSER_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// 提交接口
pub const RESPONSE_ENDPOINT: &str = "applicant/vacancy_response/popup";
/// 简历刷新接口
pub const TOUCH_ENDPOINT: &str = "applicant/resumes/touch";
/// 探测时使用的条目 ID
pub const PROBE_ITEM_ID: &str = "1";

/// 基于 reqwest 的平台客户端，每个账号一个实例
pub struct HttpPlatformClient {
    client: Client,
    base_url: String,
    submit_timeout: Duration,
    probe_timeout: Duration,
}

impl HttpPlatformClient {
    /// 使用账号凭据创建客户端
    pub fn new(
        account: &Account,
        base_url: &str,
        submit_timeout: Duration,
        probe_timeout: Duration,
    ) -> AppResult<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_UA));
        headers.insert(ORIGIN, header_value("base_url", &base_url)?);
        if let Some(xsrf) = account.cookies.xsrf() {
            headers.insert("x-xsrftoken", header_value("_xsrf", xsrf)?);
        }
        let cookie = account.cookies.cookie_header();
        if !cookie.is_empty() {
            headers.insert(COOKIE, header_value("cookies", &cookie)?);
        }

        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::request_failed("client", e))?;

        Ok(Self {
            client,
            base_url,
            submit_timeout,
            probe_timeout,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// 发送表单并原样返回状态码和正文
    async fn post_form(&self, path: &str, form: Form, timeout: Duration) -> AppResult<RawResult> {
        let url = self.endpoint(path);
        let response = self
            .client
            .post(&url)
            .multipart(form)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| map_reqwest_error(path, timeout, e))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| map_reqwest_error(path, timeout, e))?;

        debug!(
            "POST {} -> HTTP {}, {} 字节: {}",
            path,
            status,
            body.len(),
            truncate_text(&body, 300)
        );

        Ok(RawResult::new(status, body))
    }
}

fn header_value(key: &str, value: &str) -> AppResult<HeaderValue> {
    HeaderValue::from_str(value).map_err(|_| AppError::invalid_value(key, "<hidden>", "包含非法请求头字符"))
}

fn map_reqwest_error(endpoint: &str, timeout: Duration, err: reqwest::Error) -> AppError {
    if err.is_timeout() {
        AppError::timeout(endpoint, timeout)
    } else {
        AppError::request_failed(endpoint, err)
    }
}

#[async_trait]
impl FetchClient for HttpPlatformClient {
    async fn fetch(&self, url: &str, timeout: Duration) -> AppResult<String> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| map_reqwest_error(url, timeout, e))?;

        let status = response.status();
        let html = response
            .text()
            .await
            .map_err(|e| map_reqwest_error(url, timeout, e))?;

        debug!("GET {} -> HTTP {}, {} 字节", url, status.as_u16(), html.len());

        if !status.is_success() {
            return Err(AppError::bad_status(url, status.as_u16()));
        }
        Ok(html)
    }
}

#[async_trait]
impl SubmissionClient for HttpPlatformClient {
    async fn submit(&self, account: &Account, item: &ItemId) -> AppResult<RawResult> {
        let form = Form::new()
            .text("resume_hash", account.resume_hash.clone())
            .text("vacancy_id", item.to_string())
            .text("letterRequired", "true")
            .text("letter", account.letter.clone())
            .text("lux", "true")
            .text("ignore_postponed", "true");

        self.post_form(RESPONSE_ENDPOINT, form, self.submit_timeout).await
    }

    async fn probe(&self, account: &Account) -> AppResult<RawResult> {
        let form = Form::new()
            .text("resume_hash", account.resume_hash.clone())
            .text("vacancy_id", PROBE_ITEM_ID);

        self.post_form(RESPONSE_ENDPOINT, form, self.probe_timeout).await
    }

    async fn refresh_visibility(&self, account: &Account) -> (bool, String) {
        let form = Form::new()
            .text("resume", account.resume_hash.clone())
            .text("undirectable", "true");

        match self.post_form(TOUCH_ENDPOINT, form, self.probe_timeout).await {
            Ok(raw) => describe_refresh(raw.status),
            Err(e) => (false, format!("错误: {}", truncate_text(&e.to_string(), 30))),
        }
    }
}

/// 把刷新接口的状态码翻译成 (是否成功, 说明)
pub fn describe_refresh(status: u16) -> (bool, String) {
    match status {
        200 => (true, "简历已刷新".to_string()),
        429 => (false, "请求过于频繁 (429)".to_string()),
        other => (false, format!("HTTP {}", other)),
    }
}

/// HTTP 传输的客户端工厂
pub struct HttpClientFactory {
    base_url: String,
    submit_timeout: Duration,
    probe_timeout: Duration,
}

impl HttpClientFactory {
    pub fn new(base_url: impl Into<String>, submit_timeout: Duration, probe_timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            submit_timeout,
            probe_timeout,
        }
    }
}

#[async_trait]
impl ClientFactory for HttpClientFactory {
    fn requires_cookies(&self) -> bool {
        true
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn connect(&self, account: &Account) -> AppResult<AccountClients> {
        let client = Arc::new(HttpPlatformClient::new(
            account,
            &self.base_url,
            self.submit_timeout,
            self.probe_timeout,
        )?);
        Ok(AccountClients {
            fetcher: client.clone(),
            submitter: client,
        })
    }
}
