use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::debug;

use crate::constants::REAL_NAME_COLUMN_INDEX;
use crate::models::{ContestStatus, RuleType};
use crate::preferences::{PreferenceStore, StoredPreferences};
use crate::view::RankingView;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewState {
    pub chart_visible: bool,
    pub menu_visible: bool,
    pub real_name_visible: bool,
    pub force_update: bool,
    pub rank_limit: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ColumnKey {
    Rank,
    Username,
    RealName,
    Accepted,
    TotalTime,
    TotalScore,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Column {
    pub key: ColumnKey,
    pub title: &'static str,
    pub width: Option<u32>,
}

const REAL_NAME_COLUMN: Column = Column {
    key: ColumnKey::RealName,
    title: "RealName",
    width: Some(150),
};

pub fn base_columns(rule: RuleType) -> Vec<Column> {
    let mut columns = vec![
        Column {
            key: ColumnKey::Rank,
            title: "#",
            width: Some(60),
        },
        Column {
            key: ColumnKey::Username,
            title: "User",
            width: Some(150),
        },
    ];
    match rule {
        RuleType::Acm => {
            columns.push(Column {
                key: ColumnKey::Accepted,
                title: "AC / Total",
                width: Some(100),
            });
            columns.push(Column {
                key: ColumnKey::TotalTime,
                title: "TotalTime",
                width: Some(100),
            });
        }
        RuleType::Oi => columns.push(Column {
            key: ColumnKey::TotalScore,
            title: "TotalScore",
            width: Some(100),
        }),
    }
    columns
}

struct Inner {
    state: ViewState,
    columns: Vec<Column>,
    status: ContestStatus,
}

pub struct RankingStateStore {
    inner: Mutex<Inner>,
    preferences: Arc<dyn PreferenceStore>,
    widgets: Arc<dyn RankingView>,
}

impl RankingStateStore {
    pub fn new(
        rule: RuleType,
        status: ContestStatus,
        preferences: Arc<dyn PreferenceStore>,
        widgets: Arc<dyn RankingView>,
    ) -> Self {
        let stored = preferences.load();
        let state = ViewState {
            chart_visible: stored.chart_visible,
            menu_visible: stored.menu_visible,
            real_name_visible: stored.real_name_visible,
            force_update: false,
            rank_limit: stored.rank_limit,
        };
        let mut columns = base_columns(rule);
        if state.real_name_visible {
            insert_real_name_column(&mut columns);
        }
        Self {
            inner: Mutex::new(Inner {
                state,
                columns,
                status,
            }),
            preferences,
            widgets,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn view_state(&self) -> ViewState {
        self.lock().state
    }

    pub fn chart_visible(&self) -> bool {
        self.lock().state.chart_visible
    }

    pub fn menu_visible(&self) -> bool {
        self.lock().state.menu_visible
    }

    pub fn real_name_visible(&self) -> bool {
        self.lock().state.real_name_visible
    }

    pub fn force_update(&self) -> bool {
        self.lock().state.force_update
    }

    pub fn rank_limit(&self) -> u32 {
        self.lock().state.rank_limit
    }

    pub fn columns(&self) -> Vec<Column> {
        self.lock().columns.clone()
    }

    pub fn contest_status(&self) -> ContestStatus {
        self.lock().status
    }

    pub fn is_refresh_disabled(&self) -> bool {
        self.lock().status == ContestStatus::Ended
    }

    pub fn set_contest_status(&self, status: ContestStatus) {
        let mut inner = self.lock();
        if inner.status != status {
            debug!(?status, "contest status changed");
            inner.status = status;
        }
    }

    pub fn set_chart_visible(&self, visible: bool) {
        let mut inner = self.lock();
        inner.state.chart_visible = visible;
        self.persist(&inner.state);
    }

    pub fn set_menu_visible(&self, visible: bool) {
        let chart_visible = {
            let mut inner = self.lock();
            inner.state.menu_visible = visible;
            self.persist(&inner.state);
            inner.state.chart_visible
        };
        if chart_visible {
            self.widgets.resize_chart();
        }
        self.widgets.relayout_table();
    }

    pub fn set_real_name_visible(&self, visible: bool) {
        let mut inner = self.lock();
        inner.state.real_name_visible = visible;
        if visible {
            insert_real_name_column(&mut inner.columns);
        } else {
            inner
                .columns
                .retain(|column| column.key != ColumnKey::RealName);
        }
        self.persist(&inner.state);
    }

    pub fn set_force_update(&self, force: bool) {
        self.lock().state.force_update = force;
    }

    /// Callers validate `limit > 0`.
    pub fn set_rank_limit(&self, limit: u32) {
        let mut inner = self.lock();
        inner.state.rank_limit = limit;
        self.persist(&inner.state);
    }

    fn persist(&self, state: &ViewState) {
        self.preferences.save(&StoredPreferences {
            chart_visible: state.chart_visible,
            menu_visible: state.menu_visible,
            real_name_visible: state.real_name_visible,
            rank_limit: state.rank_limit,
        });
    }
}

fn insert_real_name_column(columns: &mut Vec<Column>) {
    if columns.iter().any(|column| column.key == ColumnKey::RealName) {
        return;
    }
    let index = REAL_NAME_COLUMN_INDEX.min(columns.len());
    columns.insert(index, REAL_NAME_COLUMN);
}
