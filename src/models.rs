use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleType {
    #[serde(rename = "ACM")]
    Acm,
    #[serde(rename = "OI")]
    Oi,
}

impl std::str::FromStr for RuleType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "ACM" => Ok(Self::Acm),
            "OI" => Ok(Self::Oi),
            other => Err(format!("unknown rule type {}", other)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContestStatus {
    #[serde(rename = "1")]
    NotStarted,
    #[serde(rename = "0")]
    Underway,
    #[serde(rename = "-1")]
    Ended,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Contest {
    pub id: u64,
    pub title: String,
    pub rule_type: RuleType,
    pub status: ContestStatus,
    #[serde(default)]
    pub real_time_rank: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RankUser {
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub real_name: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AcmProblemResult {
    #[serde(default)]
    pub is_ac: bool,
    #[serde(default, deserialize_with = "deserialize_seconds")]
    pub ac_time: u64,
    #[serde(default)]
    pub error_number: u32,
    #[serde(default)]
    pub is_first_ac: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProblemResult {
    Acm(AcmProblemResult),
    Oi(i64),
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct RankEntry {
    #[serde(default)]
    pub id: Option<u64>,
    pub user: RankUser,
    #[serde(default)]
    pub submission_number: u64,
    #[serde(default)]
    pub accepted_number: Option<u64>,
    #[serde(default)]
    pub total_time: Option<u64>,
    #[serde(default)]
    pub total_score: Option<i64>,
    #[serde(default)]
    pub submission_info: BTreeMap<String, ProblemResult>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct RankingPage {
    pub total: u64,
    #[serde(default)]
    pub results: Vec<RankEntry>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RankingQuery {
    pub offset: u64,
    pub limit: u32,
    pub contest_id: String,
    #[serde(serialize_with = "serialize_flag")]
    pub force_refresh: bool,
    #[serde(skip)]
    pub page: u32,
    #[serde(skip)]
    pub sequence: u64,
}

impl RankingQuery {
    pub fn for_page(contest_id: &str, page: u32, limit: u32, force_refresh: bool) -> Self {
        let page = page.max(1);
        Self {
            offset: u64::from(page - 1).saturating_mul(u64::from(limit)),
            limit,
            contest_id: contest_id.to_string(),
            force_refresh,
            page,
            sequence: 0,
        }
    }

    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }
}

// The judge stores elapsed seconds as a float; sub-second precision is dropped.
fn deserialize_seconds<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let value = serde_json::Number::deserialize(deserializer)?;
    Ok(value
        .as_u64()
        .unwrap_or_else(|| value.as_f64().map_or(0, |seconds| seconds.max(0.0) as u64)))
}

fn serialize_flag<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(if *value { "1" } else { "0" })
}

#[derive(Deserialize)]
pub(crate) struct ApiEnvelope {
    pub(crate) error: Option<String>,
    #[serde(default)]
    pub(crate) data: serde_json::Value,
}
