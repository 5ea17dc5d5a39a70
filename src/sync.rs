use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::client::{ClientError, RankDataClient};
use crate::constants::{AUTO_REFRESH_INTERVAL_MS, CHART_TOP_N, MIN_REFRESH_INTERVAL_MS};
use crate::models::{RankingPage, RankingQuery, RuleType};
use crate::notify::{NotificationKind, Notifier};
use crate::projector::{project_chart, project_table};
use crate::store::RankingStateStore;
use crate::view::{PageUpdate, RankingView};

#[derive(Clone, Copy, Debug)]
pub struct SyncOptions {
    pub refresh_interval: Duration,
    /// Drop responses whose query was issued before the last applied one.
    /// Off by default: the last response to arrive wins.
    pub discard_stale_responses: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_millis(AUTO_REFRESH_INTERVAL_MS),
            discard_stale_responses: false,
        }
    }
}

struct Shared {
    contest_id: String,
    rule: RuleType,
    store: Arc<RankingStateStore>,
    client: Arc<dyn RankDataClient>,
    view: Arc<dyn RankingView>,
    notifier: Arc<dyn Notifier>,
    options: SyncOptions,
    current_page: AtomicU32,
    total: AtomicU64,
    next_sequence: AtomicU64,
    last_applied: Mutex<u64>,
    timer: Mutex<Option<AutoRefreshTimer>>,
}

#[derive(Clone)]
pub struct RankingSyncController {
    shared: Arc<Shared>,
}

impl RankingSyncController {
    pub fn new(
        contest_id: impl Into<String>,
        rule: RuleType,
        store: Arc<RankingStateStore>,
        client: Arc<dyn RankDataClient>,
        view: Arc<dyn RankingView>,
        notifier: Arc<dyn Notifier>,
        options: SyncOptions,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                contest_id: contest_id.into(),
                rule,
                store,
                client,
                view,
                notifier,
                options,
                current_page: AtomicU32::new(1),
                total: AtomicU64::new(0),
                next_sequence: AtomicU64::new(0),
                last_applied: Mutex::new(0),
                timer: Mutex::new(None),
            }),
        }
    }

    pub fn contest_id(&self) -> &str {
        &self.shared.contest_id
    }

    pub fn total(&self) -> u64 {
        self.shared.total.load(Ordering::SeqCst)
    }

    pub fn current_page(&self) -> u32 {
        self.shared.current_page.load(Ordering::SeqCst)
    }

    pub fn set_current_page(&self, page: u32) {
        self.shared.current_page.store(page.max(1), Ordering::SeqCst);
    }

    pub fn refresh(&self, page: u32, is_auto_refresh: bool) -> JoinHandle<()> {
        let controller = self.clone();
        tokio::spawn(async move {
            let _ = controller.refresh_now(page, is_auto_refresh).await;
        })
    }

    pub async fn refresh_now(&self, page: u32, is_auto_refresh: bool) -> Result<(), ClientError> {
        let shared = &self.shared;
        let settings = shared.store.view_state();
        let sequence = shared.next_sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let query = RankingQuery::for_page(
            &shared.contest_id,
            page,
            settings.rank_limit,
            settings.force_update,
        )
        .with_sequence(sequence);

        let loading = (settings.chart_visible && !is_auto_refresh)
            .then(|| ChartLoading::show(Arc::clone(&shared.view)));

        let result = shared.client.get_contest_rank(&query).await;
        drop(loading);

        match result {
            Ok(page) => {
                self.apply(&query, page);
                Ok(())
            }
            Err(err) => {
                warn!(
                    ?err,
                    contest_id = %shared.contest_id,
                    page = query.page,
                    "contest rank refresh failed"
                );
                shared
                    .notifier
                    .notify(NotificationKind::Error, &err.to_string());
                Err(err)
            }
        }
    }

    fn apply(&self, query: &RankingQuery, page: RankingPage) {
        let shared = &self.shared;
        let mut last_applied = lock(&shared.last_applied);
        if shared.options.discard_stale_responses && query.sequence < *last_applied {
            debug!(
                sequence = query.sequence,
                last_applied = *last_applied,
                "discarding stale rank response"
            );
            return;
        }
        *last_applied = (*last_applied).max(query.sequence);

        shared.total.store(page.total, Ordering::SeqCst);
        let chart = (query.page == 1).then(|| {
            let top = page.results.len().min(CHART_TOP_N);
            project_chart(&page.results[..top], shared.rule)
        });
        let table = project_table(&page.results, shared.rule, query.offset);
        debug!(
            page = query.page,
            total = page.total,
            rows = table.rows.len(),
            "applying contest rank"
        );
        shared.view.apply_page(PageUpdate {
            page: query.page,
            total: page.total,
            chart,
            table,
        });
    }

    pub fn start_auto_refresh(&self) {
        let mut timer = lock(&self.shared.timer);
        if timer.as_ref().is_some_and(AutoRefreshTimer::is_running) {
            return;
        }
        let period = self
            .shared
            .options
            .refresh_interval
            .max(Duration::from_millis(MIN_REFRESH_INTERVAL_MS));
        *timer = Some(AutoRefreshTimer::spawn(Arc::downgrade(&self.shared), period));
        info!(
            contest_id = %self.shared.contest_id,
            period_ms = period.as_millis() as u64,
            "auto refresh started"
        );
    }

    /// Cancels the recurring refresh. In-flight fetches still complete.
    pub fn stop_auto_refresh(&self) {
        if lock(&self.shared.timer).take().is_some() {
            info!(contest_id = %self.shared.contest_id, "auto refresh stopped");
        }
    }

    pub fn is_auto_refreshing(&self) -> bool {
        lock(&self.shared.timer)
            .as_ref()
            .is_some_and(AutoRefreshTimer::is_running)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct ChartLoading {
    view: Arc<dyn RankingView>,
}

impl ChartLoading {
    fn show(view: Arc<dyn RankingView>) -> Self {
        view.show_chart_loading();
        Self { view }
    }
}

impl Drop for ChartLoading {
    fn drop(&mut self) {
        self.view.hide_chart_loading();
    }
}

struct AutoRefreshTimer {
    handle: JoinHandle<()>,
}

impl AutoRefreshTimer {
    fn spawn(shared: Weak<Shared>, period: Duration) -> Self {
        Self {
            handle: tokio::spawn(run_auto_refresh(shared, period)),
        }
    }

    fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for AutoRefreshTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn run_auto_refresh(weak: Weak<Shared>, period: Duration) {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        let Some(shared) = weak.upgrade() else {
            break;
        };
        let controller = RankingSyncController { shared };
        controller.set_current_page(1);
        controller.refresh(1, true);
    }
}
