use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, watch};

use contest_rank_sync::constants::BROADCAST_BUFFER;
use contest_rank_sync::util::now_ms;
use contest_rank_sync::{
    ContestRankView, ContestStatus, HttpRankClient, NotificationKind, Notifier, PageUpdate,
    PreferenceStore, RankingStateStore, RankingSyncController, RankingView, RuleType,
    SyncOptions, TracingNotifier,
};

use crate::config::Config;

#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RankingSnapshot {
    #[serde(flatten)]
    pub(crate) update: PageUpdate,
    pub(crate) ts: u64,
}

#[derive(Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) enum LayoutTarget {
    Chart,
    Table,
}

#[derive(Clone)]
pub(crate) enum StreamEvent {
    Ranking(Arc<RankingSnapshot>),
    Notice {
        kind: NotificationKind,
        message: String,
    },
    ChartLoading(bool),
    Layout(LayoutTarget),
    Shutdown,
}

pub(crate) struct RankPublisher {
    pub(crate) sender: broadcast::Sender<StreamEvent>,
    latest: watch::Sender<Option<Arc<RankingSnapshot>>>,
    loading: AtomicUsize,
}

impl RankPublisher {
    pub(crate) fn new() -> Arc<Self> {
        let (sender, _) = broadcast::channel(BROADCAST_BUFFER);
        let (latest, _) = watch::channel(None);
        Arc::new(Self {
            sender,
            latest,
            loading: AtomicUsize::new(0),
        })
    }

    pub(crate) fn latest(&self) -> Option<Arc<RankingSnapshot>> {
        self.latest.borrow().clone()
    }

    pub(crate) fn chart_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst) > 0
    }

    pub(crate) fn broadcast_shutdown(&self) {
        let _ = self.sender.send(StreamEvent::Shutdown);
    }

    fn broadcast(&self, event: StreamEvent) {
        let _ = self.sender.send(event);
    }
}

impl RankingView for RankPublisher {
    fn show_chart_loading(&self) {
        if self.loading.fetch_add(1, Ordering::SeqCst) == 0 {
            self.broadcast(StreamEvent::ChartLoading(true));
        }
    }

    fn hide_chart_loading(&self) {
        let prev = self
            .loading
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |count| {
                Some(count.saturating_sub(1))
            })
            .unwrap_or(0);
        if prev == 1 {
            self.broadcast(StreamEvent::ChartLoading(false));
        }
    }

    fn resize_chart(&self) {
        self.broadcast(StreamEvent::Layout(LayoutTarget::Chart));
    }

    fn relayout_table(&self) {
        self.broadcast(StreamEvent::Layout(LayoutTarget::Table));
    }

    fn apply_page(&self, update: PageUpdate) {
        let snapshot = Arc::new(RankingSnapshot {
            update,
            ts: now_ms(),
        });
        self.latest.send_replace(Some(Arc::clone(&snapshot)));
        self.broadcast(StreamEvent::Ranking(snapshot));
    }
}

impl Notifier for RankPublisher {
    fn notify(&self, kind: NotificationKind, message: &str) {
        TracingNotifier.notify(kind, message);
        self.broadcast(StreamEvent::Notice {
            kind,
            message: message.to_string(),
        });
    }
}

pub(crate) struct AppState {
    pub(crate) publisher: Arc<RankPublisher>,
    pub(crate) ranking: ContestRankView,
    pub(crate) client: HttpRankClient,
    pub(crate) config: Config,
}

impl AppState {
    pub(crate) fn new(
        config: Config,
        client: HttpRankClient,
        rule: RuleType,
        status: ContestStatus,
        preferences: Arc<dyn PreferenceStore>,
    ) -> Arc<Self> {
        let publisher = RankPublisher::new();
        let store = Arc::new(RankingStateStore::new(
            rule,
            status,
            preferences,
            publisher.clone(),
        ));
        let controller = RankingSyncController::new(
            config.contest_id.clone(),
            rule,
            Arc::clone(&store),
            Arc::new(client.clone()),
            publisher.clone(),
            publisher.clone(),
            SyncOptions {
                refresh_interval: config.refresh_interval,
                discard_stale_responses: config.discard_stale_responses,
            },
        );
        Arc::new(Self {
            publisher,
            ranking: ContestRankView::new(store, controller),
            client,
            config,
        })
    }

    pub(crate) fn shutdown(&self) {
        self.ranking.teardown();
        self.publisher.broadcast_shutdown();
    }
}
