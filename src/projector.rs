use std::collections::BTreeMap;

use serde::Serialize;

use crate::constants::NO_DATA_TEXT;
use crate::models::{ProblemResult, RankEntry, RuleType};
use crate::util::format_duration;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ChartSeries {
    AcceptedTimeline { lines: Vec<TimelineLine> },
    ScoreBars { bars: Vec<ScoreBar> },
}

impl ChartSeries {
    pub fn len(&self) -> usize {
        match self {
            Self::AcceptedTimeline { lines } => lines.len(),
            Self::ScoreBars { bars } => bars.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn usernames(&self) -> Vec<&str> {
        match self {
            Self::AcceptedTimeline { lines } => {
                lines.iter().map(|line| line.username.as_str()).collect()
            }
            Self::ScoreBars { bars } => bars.iter().map(|bar| bar.username.as_str()).collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TimelineLine {
    pub username: String,
    pub points: Vec<TimelinePoint>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct TimelinePoint {
    pub time: u64,
    pub accepted: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScoreBar {
    pub username: String,
    pub score: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableRows {
    pub rows: Vec<TableRow>,
    pub placeholder: Option<&'static str>,
}

impl TableRows {
    pub fn no_data(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableRow {
    pub rank: u64,
    pub user_id: u64,
    pub username: String,
    pub real_name: Option<String>,
    pub summary: RowSummary,
    pub cells: BTreeMap<String, ProblemResult>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "rule", rename_all = "camelCase")]
pub enum RowSummary {
    #[serde(rename_all = "camelCase")]
    Acm {
        accepted: u64,
        submissions: u64,
        total_time: u64,
        total_time_display: String,
    },
    #[serde(rename_all = "camelCase")]
    Oi { total_score: i64 },
}

pub fn project_chart(entries: &[RankEntry], rule: RuleType) -> ChartSeries {
    match rule {
        RuleType::Acm => ChartSeries::AcceptedTimeline {
            lines: entries.iter().map(accepted_timeline).collect(),
        },
        RuleType::Oi => ChartSeries::ScoreBars {
            bars: entries
                .iter()
                .map(|entry| ScoreBar {
                    username: entry.user.username.clone(),
                    score: entry.total_score.unwrap_or(0),
                })
                .collect(),
        },
    }
}

fn accepted_timeline(entry: &RankEntry) -> TimelineLine {
    let mut ac_times: Vec<u64> = entry
        .submission_info
        .values()
        .filter_map(|result| match result {
            ProblemResult::Acm(info) if info.is_ac => Some(info.ac_time),
            _ => None,
        })
        .collect();
    ac_times.sort_unstable();

    let mut points = Vec::with_capacity(ac_times.len() + 1);
    points.push(TimelinePoint {
        time: 0,
        accepted: 0,
    });
    points.extend(ac_times.into_iter().enumerate().map(|(index, time)| TimelinePoint {
        time,
        accepted: index as u32 + 1,
    }));

    TimelineLine {
        username: entry.user.username.clone(),
        points,
    }
}

pub fn project_table(entries: &[RankEntry], rule: RuleType, offset: u64) -> TableRows {
    let rows: Vec<TableRow> = entries
        .iter()
        .enumerate()
        .map(|(index, entry)| TableRow {
            rank: offset + index as u64 + 1,
            user_id: entry.user.id,
            username: entry.user.username.clone(),
            real_name: entry.user.real_name.clone(),
            summary: summarize(entry, rule),
            cells: entry.submission_info.clone(),
        })
        .collect();

    let placeholder = rows.is_empty().then_some(NO_DATA_TEXT);
    TableRows { rows, placeholder }
}

fn summarize(entry: &RankEntry, rule: RuleType) -> RowSummary {
    match rule {
        RuleType::Acm => {
            let total_time = entry.total_time.unwrap_or(0);
            RowSummary::Acm {
                accepted: entry.accepted_number.unwrap_or(0),
                submissions: entry.submission_number,
                total_time,
                total_time_display: format_duration(total_time),
            }
        }
        RuleType::Oi => RowSummary::Oi {
            total_score: entry.total_score.unwrap_or(0),
        },
    }
}
