//! 投递历史
//!
//! - `applied_vacancies.json`：账号名 → 条目 ID → [`ApplicationRecord`]
//! - `test_required_vacancies.json`：条目 ID → [`TestRequiredRecord`]（全局）
//!
//! 多个账号的工作循环共用同一个存储，所有写入在一把锁内完成，
//! 每次写入都用"写临时文件再改名"的方式整体落盘。

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{AppError, AppResult, StorageError};
use crate::models::{ApplicationRecord, ItemId, ItemMeta, TestRequiredRecord};

pub const APPLIED_FILE: &str = "applied_vacancies.json";
pub const CHALLENGED_FILE: &str = "test_required_vacancies.json";

/// 历史记录统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryStats {
    pub total_applied: usize,
    pub total_challenged: usize,
    pub per_account: BTreeMap<String, usize>,
}

/// 一条已投递记录及其归属
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedEntry {
    pub account: String,
    pub item: ItemId,
    pub record: ApplicationRecord,
}

/// 投递历史存储，可被多个账号并发调用
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn is_applied(&self, account: &str, item: &ItemId) -> bool;

    /// 写入已投递记录；已存在时保持原记录不变
    async fn record_applied(
        &self,
        account: &str,
        item: &ItemId,
        meta: Option<&ItemMeta>,
    ) -> AppResult<()>;

    async fn is_challenged(&self, item: &ItemId) -> bool;

    /// 写入需要测试的记录；只增不减
    async fn record_challenged(&self, item: &ItemId, meta: Option<&ItemMeta>) -> AppResult<()>;

    async fn stats(&self) -> HistoryStats;

    /// 最近的已投递记录，新的在前
    async fn recent_applied(&self, limit: usize) -> Vec<AppliedEntry>;

    /// 最近的需要测试记录，新的在前
    async fn recent_challenged(&self, limit: usize) -> Vec<(ItemId, TestRequiredRecord)>;
}

type AppliedMap = BTreeMap<String, BTreeMap<ItemId, ApplicationRecord>>;
type ChallengedMap = BTreeMap<ItemId, TestRequiredRecord>;

#[derive(Default)]
struct HistoryData {
    applied: AppliedMap,
    challenged: ChallengedMap,
}

/// JSON 文件存储
///
/// 启动时把两个文件读进内存，查询只读内存；写入时在锁内更新内存并落盘。
pub struct JsonHistoryStore {
    dir: Option<PathBuf>,
    base_url: String,
    data: Mutex<HistoryData>,
}

impl JsonHistoryStore {
    /// 打开（必要时创建）历史目录
    pub async fn open(dir: impl AsRef<Path>, base_url: &str) -> AppResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| AppError::write_failed(dir.display().to_string(), e))?;

        let applied: AppliedMap = read_json(&dir.join(APPLIED_FILE)).await?;
        let challenged: ChallengedMap = read_json(&dir.join(CHALLENGED_FILE)).await?;

        debug!(
            "已加载历史: {} 个账号, {} 条需要测试",
            applied.len(),
            challenged.len()
        );

        Ok(Self {
            dir: Some(dir),
            base_url: base_url.to_string(),
            data: Mutex::new(HistoryData { applied, challenged }),
        })
    }

    /// 不落盘的存储
    pub fn in_memory(base_url: &str) -> Self {
        Self {
            dir: None,
            base_url: base_url.to_string(),
            data: Mutex::new(HistoryData::default()),
        }
    }

    async fn persist<T: Serialize>(&self, file: &str, value: &T) -> AppResult<()> {
        match &self.dir {
            Some(dir) => write_json_atomic(&dir.join(file), value).await,
            None => Ok(()),
        }
    }
}

fn now() -> chrono::NaiveDateTime {
    chrono::Local::now().naive_local()
}

async fn read_json<T: DeserializeOwned + Default>(path: &Path) -> AppResult<T> {
    let display = path.display().to_string();
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(T::default()),
        Err(e) => return Err(AppError::read_failed(display, e)),
    };
    if content.trim().is_empty() {
        return Ok(T::default());
    }
    serde_json::from_str(&content)
        .map_err(|source| StorageError::ParseFailed { path: display, source }.into())
}

async fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> AppResult<()> {
    let json = serde_json::to_string_pretty(value).map_err(StorageError::SerializeFailed)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, json)
        .await
        .map_err(|e| AppError::write_failed(tmp.display().to_string(), e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| AppError::write_failed(path.display().to_string(), e))?;
    Ok(())
}

#[async_trait]
impl HistoryStore for JsonHistoryStore {
    async fn is_applied(&self, account: &str, item: &ItemId) -> bool {
        let data = self.data.lock().await;
        data.applied
            .get(account)
            .is_some_and(|items| items.contains_key(item))
    }

    async fn record_applied(
        &self,
        account: &str,
        item: &ItemId,
        meta: Option<&ItemMeta>,
    ) -> AppResult<()> {
        let mut data = self.data.lock().await;
        let items = data.applied.entry(account.to_string()).or_default();
        if items.contains_key(item) {
            return Ok(());
        }
        items.insert(
            item.clone(),
            ApplicationRecord::new(item.url(&self.base_url), meta, now()),
        );
        self.persist(APPLIED_FILE, &data.applied).await
    }

    async fn is_challenged(&self, item: &ItemId) -> bool {
        self.data.lock().await.challenged.contains_key(item)
    }

    async fn record_challenged(&self, item: &ItemId, meta: Option<&ItemMeta>) -> AppResult<()> {
        let mut data = self.data.lock().await;
        if data.challenged.contains_key(item) {
            return Ok(());
        }
        data.challenged.insert(
            item.clone(),
            TestRequiredRecord::new(item.url(&self.base_url), meta, now()),
        );
        self.persist(CHALLENGED_FILE, &data.challenged).await
    }

    async fn stats(&self) -> HistoryStats {
        let data = self.data.lock().await;
        let per_account: BTreeMap<String, usize> = data
            .applied
            .iter()
            .map(|(account, items)| (account.clone(), items.len()))
            .collect();
        HistoryStats {
            total_applied: per_account.values().sum(),
            total_challenged: data.challenged.len(),
            per_account,
        }
    }

    async fn recent_applied(&self, limit: usize) -> Vec<AppliedEntry> {
        let data = self.data.lock().await;
        let mut entries: Vec<AppliedEntry> = data
            .applied
            .iter()
            .flat_map(|(account, items)| {
                items.iter().map(move |(item, record)| AppliedEntry {
                    account: account.clone(),
                    item: item.clone(),
                    record: record.clone(),
                })
            })
            .collect();
        entries.sort_by(|a, b| b.record.at.cmp(&a.record.at));
        entries.truncate(limit);
        entries
    }

    async fn recent_challenged(&self, limit: usize) -> Vec<(ItemId, TestRequiredRecord)> {
        let data = self.data.lock().await;
        let mut entries: Vec<_> = data
            .challenged
            .iter()
            .map(|(item, record)| (item.clone(), record.clone()))
            .collect();
        entries.sort_by(|a, b| b.1.at.cmp(&a.1.at));
        entries.truncate(limit);
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const BASE: &str = "https://hh.ru";

    fn meta(title: &str) -> ItemMeta {
        ItemMeta {
            title: title.into(),
            company: "ACME".into(),
            salary_from: Some(100),
            salary_to: None,
        }
    }

    #[tokio::test]
    async fn applied_is_per_account_and_first_write_wins() {
        let store = JsonHistoryStore::in_memory(BASE);
        let item = ItemId::from("42");

        store.record_applied("A", &item, Some(&meta("first"))).await.unwrap();
        store.record_applied("A", &item, Some(&meta("second"))).await.unwrap();

        assert!(store.is_applied("A", &item).await);
        assert!(!store.is_applied("B", &item).await);

        let recent = store.recent_applied(10).await;
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].record.title, "first");
        assert_eq!(recent[0].record.url, "https://hh.ru/vacancy/42");
    }

    #[tokio::test]
    async fn challenged_is_global() {
        let store = JsonHistoryStore::in_memory(BASE);
        let item = ItemId::from("7");
        assert!(!store.is_challenged(&item).await);
        store.record_challenged(&item, None).await.unwrap();
        store.record_challenged(&item, Some(&meta("later"))).await.unwrap();
        assert!(store.is_challenged(&item).await);

        let recent = store.recent_challenged(5).await;
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].1.title, "");
    }

    #[tokio::test]
    async fn stats_count_per_account() {
        let store = JsonHistoryStore::in_memory(BASE);
        store.record_applied("A", &ItemId::from("1"), None).await.unwrap();
        store.record_applied("A", &ItemId::from("2"), None).await.unwrap();
        store.record_applied("B", &ItemId::from("1"), None).await.unwrap();
        store.record_challenged(&ItemId::from("9"), None).await.unwrap();

        let stats = store.stats().await;
        assert_eq!(stats.total_applied, 3);
        assert_eq!(stats.total_challenged, 1);
        assert_eq!(stats.per_account.get("A"), Some(&2));
        assert_eq!(stats.per_account.get("B"), Some(&1));
    }

    #[tokio::test]
    async fn records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = JsonHistoryStore::open(dir.path(), BASE).await.unwrap();
            store.record_applied("A", &ItemId::from("1"), Some(&meta("QA"))).await.unwrap();
            store.record_challenged(&ItemId::from("2"), None).await.unwrap();
        }

        let store = JsonHistoryStore::open(dir.path(), BASE).await.unwrap();
        assert!(store.is_applied("A", &ItemId::from("1")).await);
        assert!(store.is_challenged(&ItemId::from("2")).await);
        assert!(!dir.path().join("applied_vacancies.json.tmp").exists());
    }

    #[tokio::test]
    async fn concurrent_writers_do_not_lose_records() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonHistoryStore::open(dir.path(), BASE).await.unwrap());

        let mut handles = Vec::new();
        for n in 0..20 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let account = if n % 2 == 0 { "A" } else { "B" };
                let item = ItemId::new(n.to_string());
                store.record_applied(account, &item, None).await.unwrap();
                store.record_challenged(&item, None).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let reopened = JsonHistoryStore::open(dir.path(), BASE).await.unwrap();
        let stats = reopened.stats().await;
        assert_eq!(stats.total_applied, 20);
        assert_eq!(stats.total_challenged, 20);
    }

    #[tokio::test]
    async fn legacy_layout_is_readable() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(APPLIED_FILE),
            r#"{"Demo": {"123": {"url": "https://hh.ru/vacancy/123", "title": "QA", "company": "X",
                "salary_from": null, "salary_to": null, "at": "2024-05-01T10:00:00.5"}}}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join(CHALLENGED_FILE), "").unwrap();

        let store = JsonHistoryStore::open(dir.path(), BASE).await.unwrap();
        assert!(store.is_applied("Demo", &ItemId::from("123")).await);
        assert_eq!(store.stats().await.total_challenged, 0);
    }

    #[tokio::test]
    async fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(APPLIED_FILE), "{not json").unwrap();
        let err = JsonHistoryStore::open(dir.path(), BASE).await.err().unwrap();
        assert!(matches!(err, AppError::Storage(StorageError::ParseFailed { .. })));
    }
}
