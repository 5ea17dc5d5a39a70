use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};

use contest_rank_sync::constants::METRICS_INTERVAL_MS;
use contest_rank_sync::util::now_ms;
use contest_rank_sync::ContestStatus;

use crate::state::AppState;

pub(crate) async fn run_contest_status_watcher(state: Arc<AppState>) {
    let base_interval = state.config.status_poll_interval;
    let mut backoff = base_interval;
    let max_backoff = Duration::from_secs(300);

    loop {
        match refresh_contest_status(&state).await {
            Ok(ContestStatus::Ended) => {
                info!(contest_id = %state.config.contest_id, "contest ended; status watcher exiting");
                return;
            }
            Ok(_) => {
                backoff = base_interval;
                tokio::time::sleep(base_interval).await;
            }
            Err(err) => {
                warn!(?err, "contest status refresh failed; retrying");
                tokio::time::sleep(backoff).await;
                backoff = std::cmp::min(backoff * 2, max_backoff);
            }
        }
    }
}

async fn refresh_contest_status(state: &AppState) -> Result<ContestStatus> {
    let contest = state.client.get_contest(&state.config.contest_id).await?;
    let store = state.ranking.store();
    let was_disabled = store.is_refresh_disabled();
    store.set_contest_status(contest.status);

    if contest.status == ContestStatus::Ended && !was_disabled {
        let controller = state.ranking.controller();
        if controller.is_auto_refreshing() {
            controller.stop_auto_refresh();
        }
        // Pick up the final standings once.
        controller.refresh(controller.current_page(), true);
    }
    Ok(contest.status)
}

pub(crate) async fn run_subscriber_metrics(state: Arc<AppState>) {
    let mut interval = tokio::time::interval(Duration::from_millis(METRICS_INTERVAL_MS));
    loop {
        interval.tick().await;
        let subscriber_count = state.publisher.sender.receiver_count();
        if subscriber_count == 0 {
            continue;
        }

        let controller = state.ranking.controller();
        let store = state.ranking.store();
        let snapshot_age_ms = state
            .publisher
            .latest()
            .map(|snapshot| now_ms().saturating_sub(snapshot.ts).to_string())
            .unwrap_or_else(|| "-".to_string());

        info!(
            subscribers = subscriber_count,
            page = controller.current_page(),
            total = controller.total(),
            auto_refresh = controller.is_auto_refreshing(),
            refresh_disabled = store.is_refresh_disabled(),
            rank_limit = store.rank_limit(),
            snapshot_age_ms = %snapshot_age_ms,
            "subscriber metrics"
        );
    }
}
