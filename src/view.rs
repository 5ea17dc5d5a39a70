use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::projector::{ChartSeries, TableRows};
use crate::store::RankingStateStore;
use crate::sync::RankingSyncController;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageUpdate {
    pub page: u32,
    pub total: u64,
    pub chart: Option<ChartSeries>,
    pub table: TableRows,
}

pub trait RankingView: Send + Sync {
    fn show_chart_loading(&self);
    fn hide_chart_loading(&self);
    fn resize_chart(&self);
    fn relayout_table(&self);
    fn apply_page(&self, update: PageUpdate);
}

pub struct ContestRankView {
    store: Arc<RankingStateStore>,
    controller: RankingSyncController,
}

impl ContestRankView {
    pub fn new(store: Arc<RankingStateStore>, controller: RankingSyncController) -> Self {
        Self { store, controller }
    }

    pub fn store(&self) -> &Arc<RankingStateStore> {
        &self.store
    }

    pub fn controller(&self) -> &RankingSyncController {
        &self.controller
    }

    pub fn change_page(&self, page: u32) {
        let page = page.max(1);
        self.controller.set_current_page(page);
        self.controller.refresh(page, false);
    }

    pub fn set_auto_refresh(&self, enabled: bool) {
        if enabled {
            self.controller.start_auto_refresh();
        } else {
            self.controller.stop_auto_refresh();
        }
    }

    pub fn teardown(&self) {
        self.controller.stop_auto_refresh();
    }
}

impl Drop for ContestRankView {
    fn drop(&mut self) {
        info!(contest_id = %self.controller.contest_id(), "tearing down ranking view");
        self.teardown();
    }
}
