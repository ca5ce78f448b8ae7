use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// 平台上的条目（职位）ID
///
/// 相同字符串即同一条目，与被哪个搜索发现无关。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 条目页面地址
    pub fn url(&self, base_url: &str) -> String {
        format!("{}/vacancy/{}", base_url.trim_end_matches('/'), self.0)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// 提交结果里能提取到的条目信息
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemMeta {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub salary_from: Option<i64>,
    #[serde(default)]
    pub salary_to: Option<i64>,
}

impl ItemMeta {
    /// 薪资区间描述，两端都缺失时为 None
    pub fn salary(&self) -> Option<String> {
        if self.salary_from.is_none() && self.salary_to.is_none() {
            return None;
        }
        let fmt_end = |v: Option<i64>| v.map(|n| n.to_string()).unwrap_or_else(|| "?".to_string());
        Some(format!("{} - {}", fmt_end(self.salary_from), fmt_end(self.salary_to)))
    }
}

/// 已投递记录，创建后不再修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub salary_from: Option<i64>,
    #[serde(default)]
    pub salary_to: Option<i64>,
    pub at: NaiveDateTime,
}

impl ApplicationRecord {
    pub fn new(url: String, meta: Option<&ItemMeta>, at: NaiveDateTime) -> Self {
        let meta = meta.cloned().unwrap_or_default();
        Self {
            url,
            title: meta.title,
            company: meta.company,
            salary_from: meta.salary_from,
            salary_to: meta.salary_to,
            at,
        }
    }
}

/// 需要额外测试的条目记录（全局，与账号无关）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestRequiredRecord {
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub company: String,
    pub at: NaiveDateTime,
}

impl TestRequiredRecord {
    pub fn new(url: String, meta: Option<&ItemMeta>, at: NaiveDateTime) -> Self {
        let meta = meta.cloned().unwrap_or_default();
        Self {
            url,
            title: meta.title,
            company: meta.company,
            at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_url() {
        let id = ItemId::from("12345");
        assert_eq!(id.url("https://hh.ru/"), "https://hh.ru/vacancy/12345");
        assert_eq!(id.to_string(), "12345");
    }

    #[test]
    fn salary_range() {
        let mut meta = ItemMeta::default();
        assert_eq!(meta.salary(), None);
        meta.salary_from = Some(100000);
        assert_eq!(meta.salary().as_deref(), Some("100000 - ?"));
        meta.salary_to = Some(150000);
        assert_eq!(meta.salary().as_deref(), Some("100000 - 150000"));
    }

    #[test]
    fn legacy_record_timestamp_parses() {
        // 旧版工具写入的时间没有时区
        let json = r#"{
            "url": "https://hh.ru/vacancy/1",
            "title": "QA",
            "company": "ACME",
            "salary_from": null,
            "salary_to": 90000,
            "at": "2024-05-01T10:15:30.123456"
        }"#;
        let record: ApplicationRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.salary_to, Some(90000));
        assert_eq!(record.at.to_string(), "2024-05-01 10:15:30.123456");
    }
}
