//! 条目发现
//!
//! 对一个账号的所有搜索地址分页抓取，同时在途的抓取数不超过
//! `max_concurrent_fetches`，每次抓取开始前先等待 `fetch_pacing`。
//! 单页失败只记一条警告，不影响其他页面。

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock};

use futures::future::join_all;
use regex::Regex;
use tokio::sync::Semaphore;
use tracing::{debug, warn};
use url::Url;

use crate::clients::FetchClient;
use crate::config::Tunables;
use crate::error::{AppError, AppResult};
use crate::models::{query_label, ItemId};

static ITEM_LINK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/vacancy/(\d+)").unwrap());

/// 从页面内容中提取条目 ID（可能重复）
pub fn extract_item_ids(html: &str) -> Vec<ItemId> {
    ITEM_LINK
        .captures_iter(html)
        .filter_map(|c| c.get(1))
        .map(|m| ItemId::from(m.as_str()))
        .collect()
}

/// 搜索地址的第 `page` 页（从 0 开始），已有的 `page` 参数会被替换
pub fn page_url(query: &str, page: usize) -> AppResult<String> {
    let mut url = Url::parse(query).map_err(|e| AppError::malformed(query, e.to_string()))?;
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != "page")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(pairs)
        .append_pair("page", &page.to_string());
    Ok(url.into())
}

/// 单个搜索的发现情况
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryReport {
    pub label: String,
    /// 该搜索发现的不重复条目数
    pub unique: usize,
    /// 实际抓取的页数（含失败）
    pub pages_fetched: usize,
}

/// 抓取失败的页面
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageFailure {
    pub url: String,
    pub error: String,
}

/// 一次发现的结果
#[derive(Debug, Clone, Default)]
pub struct CollectReport {
    /// 所有搜索、所有页面的并集
    pub items: HashSet<ItemId>,
    pub per_query: Vec<QueryReport>,
    /// 去重前的命中数
    pub raw_hits: usize,
    pub failures: Vec<PageFailure>,
}

enum PageResult {
    Fetched { query: usize, ids: Vec<ItemId> },
    Failed { query: usize, failure: PageFailure },
    Skipped,
}

/// 分页抓取器
pub struct Collector {
    fetcher: Arc<dyn FetchClient>,
}

impl Collector {
    pub fn new(fetcher: Arc<dyn FetchClient>) -> Self {
        Self { fetcher }
    }

    /// 抓取所有搜索的前 `pages_per_query` 页
    ///
    /// `keep_going` 在每次抓取开始前检查，返回 false 时不再发起新的抓取，
    /// 已在途的抓取照常完成。
    pub async fn collect<F>(&self, queries: &[String], tunables: &Tunables, keep_going: F) -> CollectReport
    where
        F: Fn() -> bool + Sync,
    {
        let semaphore = Semaphore::new(tunables.max_concurrent_fetches.max(1));
        let exhausted: Vec<AtomicBool> = queries.iter().map(|_| AtomicBool::new(false)).collect();

        let jobs = queries.iter().enumerate().flat_map(|(q, query)| {
            (0..tunables.pages_per_query).map(move |page| (q, query.as_str(), page))
        });

        let results = join_all(jobs.map(|(q, query, page)| {
            let semaphore = &semaphore;
            let exhausted = &exhausted;
            let keep_going = &keep_going;
            async move {
                let Ok(_permit) = semaphore.acquire().await else {
                    return PageResult::Skipped;
                };
                if !keep_going() || exhausted[q].load(Ordering::SeqCst) {
                    return PageResult::Skipped;
                }
                if !tunables.fetch_pacing.is_zero() {
                    tokio::time::sleep(tunables.fetch_pacing).await;
                }

                let url = match page_url(query, page) {
                    Ok(url) => url,
                    Err(e) => {
                        warn!("搜索地址无效 {}: {}", query, e);
                        return PageResult::Failed {
                            query: q,
                            failure: PageFailure {
                                url: query.to_string(),
                                error: e.to_string(),
                            },
                        };
                    }
                };
                match self.fetcher.fetch(&url, tunables.fetch_timeout).await {
                    Ok(html) => {
                        let ids = extract_item_ids(&html);
                        debug!("{} -> {} 个条目", url, ids.len());
                        // 首页为空不算数，避免一次偶发故障放弃整个搜索
                        if ids.is_empty() && page > 0 && tunables.stop_on_empty_page {
                            exhausted[q].store(true, Ordering::SeqCst);
                        }
                        PageResult::Fetched { query: q, ids }
                    }
                    Err(e) => {
                        warn!("抓取失败 {}: {}", url, e);
                        PageResult::Failed {
                            query: q,
                            failure: PageFailure {
                                url,
                                error: e.to_string(),
                            },
                        }
                    }
                }
            }
        }))
        .await;

        let mut per_query_items: Vec<HashSet<ItemId>> = vec![HashSet::new(); queries.len()];
        let mut pages_fetched = vec![0usize; queries.len()];
        let mut report = CollectReport::default();

        for result in results {
            match result {
                PageResult::Fetched { query, ids } => {
                    pages_fetched[query] += 1;
                    report.raw_hits += ids.len();
                    per_query_items[query].extend(ids);
                }
                PageResult::Failed { query, failure } => {
                    pages_fetched[query] += 1;
                    report.failures.push(failure);
                }
                PageResult::Skipped => {}
            }
        }

        for (q, items) in per_query_items.into_iter().enumerate() {
            report.per_query.push(QueryReport {
                label: query_label(&queries[q]),
                unique: items.len(),
                pages_fetched: pages_fetched[q],
            });
            report.items.extend(items);
        }
        report
    }
}
