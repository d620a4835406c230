//! Domain records exchanged with the OKR service.
//!
//! # Design
//! The records mirror the service's JSON but are defined independently from
//! the mock-server crate; integration tests catch schema drift between the
//! two. Every scalar, list and nested record tolerates an explicit `null`
//! and decodes it to the zero value, because the service uses `null` for
//! "unset" and "zero" interchangeably. Timestamps are the exception and stay
//! `Option<DateTime<Utc>>`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::serde_util::{null_default, timestamp};

/// Everything an export endpoint returns. Related categories are only
/// populated when requested through `expand`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(rename = "okrs", default, deserialize_with = "null_default")]
    pub objectives: Vec<Objective>,
    #[serde(rename = "krs", default, deserialize_with = "null_default")]
    pub key_results: Vec<KeyResult>,
    #[serde(default, deserialize_with = "null_default")]
    pub teams: Vec<Team>,
    #[serde(default, deserialize_with = "null_default")]
    pub periods: Vec<Period>,
    #[serde(default, deserialize_with = "null_default")]
    pub labels: Vec<Label>,
}

impl Response {
    pub fn is_empty(&self) -> bool {
        self.objectives.is_empty()
            && self.key_results.is_empty()
            && self.teams.is_empty()
            && self.periods.is_empty()
            && self.labels.is_empty()
    }

    pub fn objective(&self, id: &str) -> Option<&Objective> {
        self.objectives.iter().find(|o| o.id == id)
    }

    pub fn key_result(&self, id: &str) -> Option<&KeyResult> {
        self.key_results.iter().find(|kr| kr.id == id)
    }

    pub fn team(&self, id: &str) -> Option<&Team> {
        self.teams.iter().find(|t| t.id == id)
    }

    pub fn period(&self, id: &str) -> Option<&Period> {
        self.periods.iter().find(|p| p.id == id)
    }

    pub fn label(&self, id: &str) -> Option<&Label> {
        self.labels.iter().find(|l| l.id == id)
    }

    /// Key results of `objective` present in this envelope, in the order the
    /// objective lists them. Ids the envelope does not carry are skipped.
    pub fn key_results_of<'a>(
        &'a self,
        objective: &'a Objective,
    ) -> impl Iterator<Item = &'a KeyResult> + 'a {
        objective
            .key_result_ids
            .iter()
            .filter_map(move |id| self.key_result(id))
    }
}

/// A qualitative goal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Objective {
    #[serde(default, deserialize_with = "null_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub key: String,
    #[serde(default, deserialize_with = "null_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_default")]
    pub parent_objective_id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub owner_account_id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub collaborator_account_ids: Vec<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub percent_done: f64,
    #[serde(default, with = "timestamp")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, with = "timestamp")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default, with = "timestamp")]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "null_default")]
    pub label_ids: Vec<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub team_ids: Vec<String>,
    #[serde(rename = "krIds", default, deserialize_with = "null_default")]
    pub key_result_ids: Vec<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub child_objective_ids: Vec<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub latest_update: Update,
    #[serde(default, deserialize_with = "null_default")]
    pub period_alias_id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub weight: f64,
}

/// A measurable outcome attached to an objective.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyResult {
    #[serde(default, deserialize_with = "null_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub key: String,
    #[serde(default, deserialize_with = "null_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_default")]
    pub parent_objective_id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub issue_ids: Vec<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub owner_account_id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub collaborator_account_ids: Vec<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub percent_done: f64,
    #[serde(default, with = "timestamp")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, with = "timestamp")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default, with = "timestamp")]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "null_default")]
    pub label_ids: Vec<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub team_ids: Vec<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub period_alias_id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub latest_update: Update,
    #[serde(default, deserialize_with = "null_default")]
    pub unit: Unit,
    #[serde(default, deserialize_with = "null_default")]
    pub current_progress_definition: ProgressDefinition,
    #[serde(default, deserialize_with = "null_default")]
    pub weight: f64,
}

/// A status update on an objective or key result. `value` is 0.0 when the
/// service reports no value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Update {
    #[serde(default, deserialize_with = "null_default")]
    pub entity_id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub status: String,
    /// `None` when the service sends `null` or omits the field; never the epoch.
    #[serde(default, with = "timestamp")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "null_default")]
    pub value: f64,
    #[serde(default, deserialize_with = "null_default")]
    pub description: String,
}

/// How a key result's progress is computed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressDefinition {
    #[serde(rename = "type", default, deserialize_with = "null_default")]
    pub progress_type: String,
    #[serde(default, deserialize_with = "null_default")]
    pub start_value: f64,
    #[serde(default, deserialize_with = "null_default")]
    pub desired_value: f64,
    #[serde(default, deserialize_with = "null_default")]
    pub jql: String,
}

impl ProgressDefinition {
    pub fn kind(&self) -> ProgressKind {
        match self.progress_type.as_str() {
            "AUTO" => ProgressKind::Auto,
            "STANDARD" => ProgressKind::Standard,
            other => ProgressKind::Other(other.to_string()),
        }
    }
}

/// Classification of `ProgressDefinition::progress_type`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressKind {
    /// Computed by the service from the issues matching `jql`.
    Auto,
    /// Tracked manually between `start_value` and `desired_value`.
    Standard,
    Other(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    #[serde(default, deserialize_with = "null_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub name: String,
}

/// A named date range such as a quarter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Period {
    #[serde(default, deserialize_with = "null_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub name: String,
    #[serde(default, with = "timestamp")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default, with = "timestamp")]
    pub deadline: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    #[serde(default, deserialize_with = "null_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    #[serde(default, deserialize_with = "null_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_default")]
    pub symbol: String,
}

/// Related categories an export call can include in its `Response`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Expand {
    Objectives,
    KeyResults,
    Teams,
    Periods,
    Labels,
}

impl Expand {
    pub const ALL: [Expand; 5] = [
        Expand::Objectives,
        Expand::KeyResults,
        Expand::Teams,
        Expand::Periods,
        Expand::Labels,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Expand::Objectives => "OBJECTIVES",
            Expand::KeyResults => "KEY_RESULTS",
            Expand::Teams => "TEAMS",
            Expand::Periods => "PERIODS",
            Expand::Labels => "LABELS",
        }
    }
}

impl AsRef<str> for Expand {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for Expand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Expand {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Expand::ALL
            .into_iter()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| ApiError::InvalidExpand(s.to_string()))
    }
}

/// Request payload for `POST /api/v2/api-update/objectives`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectiveUpdateRequest {
    pub objective_id: String,
    pub status: String,
    pub description: String,
}

/// Request payload for `POST /api/v2/api-update/keyResults`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyResultUpdateRequest {
    pub key_result_id: String,
    pub status: String,
    pub new_value: f64,
    pub description: String,
}
