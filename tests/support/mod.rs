#![allow(dead_code)]

use std::collections::VecDeque;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use portpicker::pick_unused_port;
use reqwest::Client;
use tempfile::TempDir;
use tokio::time::sleep;

use contest_rank_sync::models::RankUser;
use contest_rank_sync::{
    ClientError, ContestStatus, MemoryPreferences, NotificationKind, Notifier, PageUpdate,
    RankDataClient, RankEntry, RankingPage, RankingQuery, RankingStateStore,
    RankingSyncController, RankingView, RuleType, SyncOptions,
};

pub struct TestServer {
    child: Child,
    base_url: String,
    _dir: TempDir,
}

impl TestServer {
    pub async fn spawn() -> Self {
        let port = pick_unused_port().expect("free port");
        let dir = tempfile::tempdir().expect("tempdir");
        let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("contest-rank-sync"));
        cmd.env("PORT", port.to_string())
            .env("CONTEST_ID", "1")
            .env("OJ_BASE_URL", "http://127.0.0.1:1")
            .env("RANK_PREFERENCES_PATH", dir.path().join("prefs.json"))
            .env("DISABLE_BACKGROUND_TASKS", "1")
            .env("RUST_LOG", "warn")
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let child = cmd.spawn().expect("spawn contest-rank-sync");
        let base_url = format!("http://127.0.0.1:{}", port);
        wait_for_ready(&base_url).await;

        Self {
            child,
            base_url,
            _dir: dir,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

async fn wait_for_ready(base_url: &str) {
    let client = Client::new();
    let health_url = format!("{}/health", base_url);
    for _ in 0..50 {
        if let Ok(response) = client.get(&health_url).send().await {
            if response.status().is_success() {
                return;
            }
        }
        sleep(Duration::from_millis(100)).await;
    }
    panic!("server did not become ready at {}", health_url);
}

pub fn entry(id: u64) -> RankEntry {
    RankEntry {
        id: Some(id),
        user: RankUser {
            id,
            username: format!("user{}", id),
            real_name: None,
        },
        submission_number: id,
        accepted_number: Some(id % 5),
        total_time: Some(id * 60),
        total_score: Some(id as i64 * 10),
        submission_info: Default::default(),
    }
}

pub fn page_of(rows: usize, total: u64) -> RankingPage {
    RankingPage {
        total,
        results: (1..=rows as u64).map(entry).collect(),
    }
}

enum Scripted {
    Page { delay: Duration, page: RankingPage },
    Fail(String),
}

/// Rank source that replays scripted responses in call order and falls back
/// to an empty page.
#[derive(Default)]
pub struct ScriptedClient {
    calls: AtomicUsize,
    queries: Mutex<Vec<RankingQuery>>,
    script: Mutex<VecDeque<Scripted>>,
}

impl ScriptedClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_page(&self, page: RankingPage) {
        self.push_delayed(Duration::ZERO, page);
    }

    pub fn push_delayed(&self, delay: Duration, page: RankingPage) {
        self.script
            .lock()
            .unwrap()
            .push_back(Scripted::Page { delay, page });
    }

    pub fn push_failure(&self, message: &str) {
        self.script
            .lock()
            .unwrap()
            .push_back(Scripted::Fail(message.to_string()));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> Vec<RankingQuery> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl RankDataClient for ScriptedClient {
    async fn get_contest_rank(&self, query: &RankingQuery) -> Result<RankingPage, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().unwrap().push(query.clone());
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Scripted::Page { delay, page }) => {
                if !delay.is_zero() {
                    sleep(delay).await;
                }
                Ok(page)
            }
            Some(Scripted::Fail(message)) => Err(ClientError::Api(message)),
            None => Ok(RankingPage::default()),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ViewEvent {
    ShowLoading,
    HideLoading,
    ResizeChart,
    RelayoutTable,
    Page(PageUpdate),
}

#[derive(Default)]
pub struct RecordingView {
    events: Mutex<Vec<ViewEvent>>,
}

impl RecordingView {
    pub fn events(&self) -> Vec<ViewEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn pages(&self) -> Vec<PageUpdate> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ViewEvent::Page(update) => Some(update),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, wanted: &ViewEvent) -> usize {
        self.events()
            .iter()
            .filter(|event| *event == wanted)
            .count()
    }

    fn record(&self, event: ViewEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl RankingView for RecordingView {
    fn show_chart_loading(&self) {
        self.record(ViewEvent::ShowLoading);
    }

    fn hide_chart_loading(&self) {
        self.record(ViewEvent::HideLoading);
    }

    fn resize_chart(&self) {
        self.record(ViewEvent::ResizeChart);
    }

    fn relayout_table(&self) {
        self.record(ViewEvent::RelayoutTable);
    }

    fn apply_page(&self, update: PageUpdate) {
        self.record(ViewEvent::Page(update));
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<(NotificationKind, String)>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<(NotificationKind, String)> {
        self.notices.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, kind: NotificationKind, message: &str) {
        self.notices
            .lock()
            .unwrap()
            .push((kind, message.to_string()));
    }
}

pub struct Harness {
    pub client: Arc<ScriptedClient>,
    pub view: Arc<RecordingView>,
    pub notifier: Arc<RecordingNotifier>,
    pub preferences: Arc<MemoryPreferences>,
    pub store: Arc<RankingStateStore>,
    pub controller: RankingSyncController,
}

impl Harness {
    pub fn new(options: SyncOptions) -> Self {
        Self::with_rule(RuleType::Acm, options)
    }

    pub fn with_rule(rule: RuleType, options: SyncOptions) -> Self {
        let client = ScriptedClient::new();
        let view = Arc::new(RecordingView::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let preferences = Arc::new(MemoryPreferences::default());
        let store = Arc::new(RankingStateStore::new(
            rule,
            ContestStatus::Underway,
            preferences.clone(),
            view.clone(),
        ));
        let controller = RankingSyncController::new(
            "42",
            rule,
            Arc::clone(&store),
            client.clone(),
            view.clone(),
            notifier.clone(),
            options,
        );
        Self {
            client,
            view,
            notifier,
            preferences,
            store,
            controller,
        }
    }
}
