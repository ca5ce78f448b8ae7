use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use hh_auto_response::clients::{AccountClients, ClientFactory, FetchClient, SubmissionClient};
use hh_auto_response::config::Tunables;
use hh_auto_response::error::{AppError, AppResult};
use hh_auto_response::models::{parse_accounts, Account, ItemId, RawResult};
use hh_auto_response::orchestrator::{Orchestrator, RunState};
use hh_auto_response::services::{HistoryStore, JsonHistoryStore};
use hh_auto_response::workflow::{ChannelObserver, LogLevel, WorkerEvent};

const BASE: &str = "https://hh.ru";

/// 每个查询只有第一页有内容
struct StaticPages {
    pages: HashMap<String, String>,
}

#[async_trait]
impl FetchClient for StaticPages {
    async fn fetch(&self, url: &str, _timeout: Duration) -> AppResult<String> {
        Ok(self.pages.get(url).cloned().unwrap_or_default())
    }
}

/// 记录每个账号提交过的条目，"77" 需要测试，其余全部成功
#[derive(Default)]
struct RecordingSubmitter {
    submitted: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl SubmissionClient for RecordingSubmitter {
    async fn submit(&self, account: &Account, item: &ItemId) -> AppResult<RawResult> {
        self.submitted
            .lock()
            .unwrap()
            .push((account.name.clone(), item.to_string()));
        if item.as_str() == "77" {
            return Ok(RawResult::new(200, r#"{"error":"test-required"}"#));
        }
        Ok(RawResult::new(200, r#"{"success":true}"#))
    }

    async fn probe(&self, _: &Account) -> AppResult<RawResult> {
        Ok(RawResult::new(400, "negotiations-limit-exceeded"))
    }

    async fn refresh_visibility(&self, _: &Account) -> (bool, String) {
        (true, "简历已刷新".to_string())
    }
}

struct FakeFactory {
    pages: HashMap<String, String>,
    submitter: Arc<RecordingSubmitter>,
    unreachable: Vec<String>,
}

#[async_trait]
impl ClientFactory for FakeFactory {
    fn requires_cookies(&self) -> bool {
        false
    }

    fn base_url(&self) -> &str {
        BASE
    }

    async fn connect(&self, account: &Account) -> AppResult<AccountClients> {
        if self.unreachable.contains(&account.name) {
            return Err(AppError::Other("端口无响应".to_string()));
        }
        Ok(AccountClients {
            fetcher: Arc::new(StaticPages {
                pages: self.pages.clone(),
            }),
            submitter: self.submitter.clone(),
        })
    }
}

fn listing(ids: &[&str]) -> String {
    ids.iter()
        .map(|id| format!(r#"<a class="serp-item" href="https://hh.ru/vacancy/{}?from=search">v</a>"#, id))
        .collect()
}

fn factory(unreachable: &[&str]) -> FakeFactory {
    let mut pages = HashMap::new();
    pages.insert(
        "https://hh.ru/search/vacancy?text=QA&page=0".to_string(),
        listing(&["1", "2", "77"]),
    );
    pages.insert(
        "https://hh.ru/search/vacancy?text=Rust&page=0".to_string(),
        listing(&["2", "3"]),
    );
    FakeFactory {
        pages,
        submitter: Arc::new(RecordingSubmitter::default()),
        unreachable: unreachable.iter().map(|s| s.to_string()).collect(),
    }
}

const ACCOUNTS: &str = r#"
[[accounts]]
name = "Анна"
short = "A"
resume_hash = "r1"
queries = ["https://hh.ru/search/vacancy?text=QA"]

[[accounts]]
name = "Борис"
short = "B"
resume_hash = "r2"
queries = ["https://hh.ru/search/vacancy?text=Rust"]
"#;

fn accounts(content: &str) -> Vec<Account> {
    parse_accounts(content, Path::new("accounts.toml")).unwrap()
}

fn tunables() -> Tunables {
    Tunables {
        pages_per_query: 1,
        ..Tunables::default()
    }
}

async fn wait_until(orchestrator: &Orchestrator, done: impl Fn(&Orchestrator) -> bool) {
    for _ in 0..600 {
        if done(orchestrator) {
            return;
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
    panic!("条件在超时前未满足");
}

#[tokio::test(start_paused = true)]
async fn accounts_apply_independently_and_share_history() {
    let history = Arc::new(JsonHistoryStore::in_memory(BASE));
    let (observer, _events) = ChannelObserver::new();
    let factory = factory(&[]);
    let submitter = factory.submitter.clone();

    let mut orchestrator = Orchestrator::new(tunables(), history.clone(), Arc::new(observer));
    assert_eq!(orchestrator.start(accounts(ACCOUNTS), &factory).await, 2);

    // A: 1, 2 成功，77 需要测试；B: 2, 3 成功
    wait_until(&orchestrator, |o| {
        let t = o.totals();
        t.sent + t.challenged >= 5
    })
    .await;

    orchestrator.stop();
    assert_eq!(orchestrator.run_state(), RunState::Stopped);
    wait_until(&orchestrator, Orchestrator::is_finished).await;
    let totals = orchestrator.join().await;

    assert_eq!(totals.sent, 4);
    assert_eq!(totals.challenged, 1);
    assert_eq!(totals.errored, 0);

    // 同一条目在不同账号下各投递一次
    assert!(history.is_applied("Анна", &ItemId::from("2")).await);
    assert!(history.is_applied("Борис", &ItemId::from("2")).await);
    assert!(history.is_challenged(&ItemId::from("77")).await);

    let stats = history.stats().await;
    assert_eq!(stats.total_applied, 4);
    assert_eq!(stats.total_challenged, 1);

    let submitted = submitter.submitted.lock().unwrap().clone();
    assert_eq!(submitted.len(), 5);
}

#[tokio::test(start_paused = true)]
async fn keyword_and_relative_queries_are_searched() {
    let history = Arc::new(JsonHistoryStore::in_memory(BASE));
    let (observer, _events) = ChannelObserver::new();
    let factory = factory(&[]);
    let submitter = factory.submitter.clone();

    let list = accounts(
        r#"
        [[accounts]]
        name = "Вера"
        resume_hash = "r3"
        queries = ["Rust", "/search/vacancy?text=QA", ""]
        "#,
    );
    let mut orchestrator = Orchestrator::new(tunables(), history.clone(), Arc::new(observer));
    assert_eq!(orchestrator.start(list, &factory).await, 1);

    wait_until(&orchestrator, |o| {
        let t = o.totals();
        t.sent + t.challenged >= 4
    })
    .await;

    orchestrator.stop();
    let totals = orchestrator.join().await;
    assert_eq!(totals.discovered, 4);
    assert_eq!(totals.sent, 3);
    assert_eq!(totals.challenged, 1);

    let mut submitted: Vec<String> = submitter
        .submitted
        .lock()
        .unwrap()
        .iter()
        .map(|(_, item)| item.clone())
        .collect();
    submitted.sort();
    assert_eq!(submitted, vec!["1", "2", "3", "77"]);
}

#[tokio::test(start_paused = true)]
async fn second_cycle_does_not_resubmit() {
    let history = Arc::new(JsonHistoryStore::in_memory(BASE));
    let (observer, _events) = ChannelObserver::new();
    let factory = factory(&[]);
    let submitter = factory.submitter.clone();

    let mut orchestrator = Orchestrator::new(tunables(), history.clone(), Arc::new(observer));
    orchestrator
        .start(accounts(ACCOUNTS), &factory)
        .await;

    // 跨过两次周期间隔
    let pause = tunables().inter_cycle_pause;
    tokio::time::sleep(pause * 2 + Duration::from_secs(60)).await;

    let snapshots = orchestrator.snapshots();
    assert_eq!(snapshots.len(), 2);
    assert!(snapshots.iter().all(|s| s.counters.already_seen > 0));

    orchestrator.stop();
    orchestrator.join().await;
    assert_eq!(submitter.submitted.lock().unwrap().len(), 5);
}

#[tokio::test(start_paused = true)]
async fn broken_accounts_are_skipped_with_one_error() {
    let history = Arc::new(JsonHistoryStore::in_memory(BASE));
    let (observer, mut events) = ChannelObserver::new();
    let factory = factory(&["Борис"]);

    let list = accounts(
        r#"
        [[accounts]]
        name = "Без резюме"
        queries = ["https://hh.ru/search/vacancy?text=QA"]
        "#,
    )
    .into_iter()
    .chain(accounts(ACCOUNTS))
    .collect::<Vec<_>>();

    let mut orchestrator = Orchestrator::new(tunables(), history, Arc::new(observer));
    assert_eq!(orchestrator.start(list, &factory).await, 1);
    assert_eq!(orchestrator.worker_count(), 1);

    let mut failures = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let WorkerEvent::Log {
            account: Some(account),
            level: LogLevel::Error,
            ..
        } = event
        {
            failures.push(account);
        }
    }
    assert_eq!(failures, vec!["Без резюме".to_string(), "B".to_string()]);

    orchestrator.stop();
    orchestrator.join().await;
}

#[tokio::test(start_paused = true)]
async fn paused_accounts_submit_nothing_until_resumed() {
    let history = Arc::new(JsonHistoryStore::in_memory(BASE));
    let (observer, _events) = ChannelObserver::new();
    let factory = factory(&[]);
    let submitter = factory.submitter.clone();

    let mut orchestrator = Orchestrator::new(tunables(), history, Arc::new(observer));
    assert!(orchestrator.pause());
    orchestrator
        .start(accounts(ACCOUNTS), &factory)
        .await;

    tokio::time::sleep(Duration::from_secs(600)).await;
    assert!(submitter.submitted.lock().unwrap().is_empty());

    assert!(orchestrator.resume());
    wait_until(&orchestrator, |o| o.totals().sent >= 4).await;

    orchestrator.stop();
    let totals = orchestrator.join().await;
    assert_eq!(totals.sent, 4);
}

#[tokio::test(start_paused = true)]
async fn tunable_changes_reach_running_workers() {
    let history = Arc::new(JsonHistoryStore::in_memory(BASE));
    let (observer, _events) = ChannelObserver::new();
    let factory = factory(&[]);

    let mut orchestrator = Orchestrator::new(tunables(), history, Arc::new(observer));
    orchestrator
        .start(accounts(ACCOUNTS), &factory)
        .await;

    orchestrator.config().set("inter_cycle_pause", "10m").unwrap();
    assert_eq!(
        orchestrator.config().snapshot().inter_cycle_pause,
        Duration::from_secs(600)
    );
    assert!(orchestrator.config().set("pages_per_query", "0").is_err());

    orchestrator.stop();
    orchestrator.join().await;
}

#[tokio::test]
#[ignore] // 需要本地以远程调试模式运行的浏览器：cargo test -- --ignored
async fn test_browser_connection() {
    let config = hh_auto_response::Config::from_env();
    let result = hh_auto_response::browser::connect_to_browser_and_page(
        config.browser_debug_port,
        Some(&config.base_url),
    )
    .await;
    assert!(result.is_ok(), "应该能够成功连接浏览器");
}
