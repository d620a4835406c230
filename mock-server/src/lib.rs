//! In-memory stand-in for the OKR for Jira API.
//!
//! Serves the four export routes and the two update routes over a bundled
//! fixture data set. Requests must carry the configured `API-Token`.

use std::{collections::BTreeSet, sync::Arc};

use axum::{
    extract::{Query, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};

pub const TOKEN_HEADER: &str = "API-Token";
pub const DEFAULT_TOKEN: &str = "mock-token";
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";
pub const EXPAND_OBJECTS: [&str; 5] = ["OBJECTIVES", "KEY_RESULTS", "TEAMS", "PERIODS", "LABELS"];

const FIXTURE: &str = include_str!("../fixtures/dataset.json");

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Envelope {
    pub okrs: Vec<Objective>,
    pub krs: Vec<KeyResult>,
    pub teams: Vec<Team>,
    pub periods: Vec<Period>,
    pub labels: Vec<Label>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Objective {
    pub id: String,
    pub key: String,
    pub name: String,
    pub description: Option<String>,
    pub parent_objective_id: Option<String>,
    pub owner_account_id: String,
    pub collaborator_account_ids: Vec<String>,
    pub percent_done: f64,
    pub created: String,
    pub start_date: String,
    pub deadline: String,
    pub label_ids: Vec<String>,
    pub team_ids: Vec<String>,
    pub kr_ids: Vec<String>,
    pub child_objective_ids: Vec<String>,
    pub latest_update: Option<Update>,
    pub period_alias_id: Option<String>,
    pub weight: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyResult {
    pub id: String,
    pub key: String,
    pub name: String,
    pub description: Option<String>,
    pub parent_objective_id: String,
    pub issue_ids: Vec<String>,
    pub owner_account_id: String,
    pub collaborator_account_ids: Vec<String>,
    pub percent_done: f64,
    pub created: String,
    pub start_date: String,
    pub deadline: String,
    pub label_ids: Vec<String>,
    pub team_ids: Vec<String>,
    pub period_alias_id: Option<String>,
    pub latest_update: Option<Update>,
    pub unit: Option<Unit>,
    pub current_progress_definition: ProgressDefinition,
    pub weight: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Update {
    pub entity_id: String,
    pub status: String,
    pub created: String,
    pub value: Option<f64>,
    pub description: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressDefinition {
    #[serde(rename = "type")]
    pub kind: String,
    pub start_value: Option<f64>,
    pub desired_value: Option<f64>,
    pub jql: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    pub name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Period {
    pub id: String,
    pub name: String,
    pub start_date: String,
    pub deadline: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Label {
    pub id: String,
    pub name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Unit {
    pub name: String,
    pub symbol: String,
}

impl Envelope {
    /// The bundled data set.
    pub fn fixture() -> Self {
        serde_json::from_str(FIXTURE).expect("bundled fixture is valid")
    }

    pub fn objective(&self, id: &str) -> Option<&Objective> {
        self.okrs.iter().find(|o| o.id == id)
    }

    pub fn key_result(&self, id: &str) -> Option<&KeyResult> {
        self.krs.iter().find(|kr| kr.id == id)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateQuery {
    pub start_date_epoch_milli: i64,
    pub deadline_epoch_milli: i64,
    #[serde(default)]
    pub expand: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectiveIdsQuery {
    pub objective_ids: String,
    #[serde(default)]
    pub expand: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyResultIdsQuery {
    pub key_result_ids: String,
    #[serde(default)]
    pub expand: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectiveUpdate {
    pub objective_id: String,
    pub status: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyResultUpdate {
    pub key_result_id: String,
    pub status: String,
    pub new_value: f64,
    #[serde(default)]
    pub description: String,
}

pub type Db = Arc<RwLock<Envelope>>;

type Rejection = (StatusCode, String);

#[derive(Clone)]
struct AppState {
    token: Arc<str>,
    db: Db,
}

pub fn app(token: &str) -> Router {
    app_with_data(token, Envelope::fixture())
}

pub fn app_with_data(token: &str, data: Envelope) -> Router {
    let state = AppState {
        token: Arc::from(token),
        db: Arc::new(RwLock::new(data)),
    };
    Router::new()
        .route("/api/v2/api-export/objectives/byDate", get(objectives_by_date))
        .route("/api/v2/api-export/objectives/byIds", get(objectives_by_ids))
        .route("/api/v2/api-export/keyResults/byDate", get(key_results_by_date))
        .route("/api/v2/api-export/keyResults/byIds", get(key_results_by_ids))
        .route("/api/v2/api-update/objectives", post(update_objective))
        .route("/api/v2/api-update/keyResults", post(update_key_result))
        .layer(middleware::from_fn_with_state(state.clone(), require_token))
        .with_state(state)
}

pub async fn run(listener: TcpListener, token: &str) -> Result<(), std::io::Error> {
    axum::serve(listener, app(token)).await
}

async fn require_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, Rejection> {
    let provided = request
        .headers()
        .get(TOKEN_HEADER)
        .and_then(|value| value.to_str().ok());
    if provided != Some(&*state.token) {
        tracing::warn!(path = %request.uri().path(), "rejected request with a bad API token");
        return Err((StatusCode::UNAUTHORIZED, "invalid API token".to_string()));
    }
    Ok(next.run(request).await)
}

async fn objectives_by_date(
    State(state): State<AppState>,
    Query(query): Query<DateQuery>,
) -> Result<Json<Envelope>, Rejection> {
    let expand = Expanded::parse(&query.expand)?;
    let data = state.db.read().await;
    let okrs = data
        .okrs
        .iter()
        .filter(|o| overlaps(&o.start_date, &o.deadline, &query))
        .cloned()
        .collect();
    Ok(Json(envelope(&data, okrs, Vec::new(), &expand)))
}

async fn objectives_by_ids(
    State(state): State<AppState>,
    Query(query): Query<ObjectiveIdsQuery>,
) -> Result<Json<Envelope>, Rejection> {
    let expand = Expanded::parse(&query.expand)?;
    let data = state.db.read().await;
    let okrs = split_ids(&query.objective_ids)
        .filter_map(|id| data.objective(id).cloned())
        .collect();
    Ok(Json(envelope(&data, okrs, Vec::new(), &expand)))
}

async fn key_results_by_date(
    State(state): State<AppState>,
    Query(query): Query<DateQuery>,
) -> Result<Json<Envelope>, Rejection> {
    let expand = Expanded::parse(&query.expand)?;
    let data = state.db.read().await;
    let krs = data
        .krs
        .iter()
        .filter(|kr| overlaps(&kr.start_date, &kr.deadline, &query))
        .cloned()
        .collect();
    Ok(Json(envelope(&data, Vec::new(), krs, &expand)))
}

async fn key_results_by_ids(
    State(state): State<AppState>,
    Query(query): Query<KeyResultIdsQuery>,
) -> Result<Json<Envelope>, Rejection> {
    let expand = Expanded::parse(&query.expand)?;
    let data = state.db.read().await;
    let krs = split_ids(&query.key_result_ids)
        .filter_map(|id| data.key_result(id).cloned())
        .collect();
    Ok(Json(envelope(&data, Vec::new(), krs, &expand)))
}

async fn update_objective(
    State(state): State<AppState>,
    Json(input): Json<ObjectiveUpdate>,
) -> Result<Json<Update>, Rejection> {
    let mut data = state.db.write().await;
    let objective = data
        .okrs
        .iter_mut()
        .find(|o| o.id == input.objective_id)
        .ok_or_else(|| not_found("objective", &input.objective_id))?;
    let update = Update {
        entity_id: input.objective_id,
        status: input.status,
        created: now(),
        value: None,
        description: Some(input.description),
    };
    objective.latest_update = Some(update.clone());
    tracing::info!(objective = %update.entity_id, status = %update.status, "objective updated");
    Ok(Json(update))
}

async fn update_key_result(
    State(state): State<AppState>,
    Json(input): Json<KeyResultUpdate>,
) -> Result<Json<Update>, Rejection> {
    let mut data = state.db.write().await;
    let key_result = data
        .krs
        .iter_mut()
        .find(|kr| kr.id == input.key_result_id)
        .ok_or_else(|| not_found("key result", &input.key_result_id))?;
    let update = Update {
        entity_id: input.key_result_id,
        status: input.status,
        created: now(),
        value: Some(input.new_value),
        description: Some(input.description),
    };
    if let Some(percent) = standard_progress(&key_result.current_progress_definition, input.new_value) {
        key_result.percent_done = percent;
    }
    key_result.latest_update = Some(update.clone());
    tracing::info!(key_result = %update.entity_id, status = %update.status, "key result updated");
    Ok(Json(update))
}

/// Expand tokens of one request.
#[derive(Debug, Default, PartialEq, Eq)]
struct Expanded {
    objectives: bool,
    key_results: bool,
    teams: bool,
    periods: bool,
    labels: bool,
}

impl Expanded {
    fn parse(raw: &str) -> Result<Self, Rejection> {
        let mut expanded = Expanded::default();
        for token in raw.split(',').filter(|t| !t.is_empty()) {
            match token {
                "OBJECTIVES" => expanded.objectives = true,
                "KEY_RESULTS" => expanded.key_results = true,
                "TEAMS" => expanded.teams = true,
                "PERIODS" => expanded.periods = true,
                "LABELS" => expanded.labels = true,
                other => {
                    return Err((
                        StatusCode::BAD_REQUEST,
                        format!("invalid expand object {other}"),
                    ))
                }
            }
        }
        Ok(expanded)
    }
}

/// Build the response for the primary records, pulling in related
/// categories that were asked for.
fn envelope(
    data: &Envelope,
    mut okrs: Vec<Objective>,
    mut krs: Vec<KeyResult>,
    expand: &Expanded,
) -> Envelope {
    if expand.objectives {
        let related: Vec<String> = krs
            .iter()
            .map(|kr| kr.parent_objective_id.clone())
            .chain(okrs.iter().flat_map(|o| {
                o.child_objective_ids
                    .iter()
                    .cloned()
                    .chain(o.parent_objective_id.clone())
            }))
            .collect();
        for id in related {
            if !okrs.iter().any(|o| o.id == id) {
                if let Some(objective) = data.objective(&id) {
                    okrs.push(objective.clone());
                }
            }
        }
    }
    if expand.key_results {
        let related: Vec<String> = okrs.iter().flat_map(|o| o.kr_ids.iter().cloned()).collect();
        for id in related {
            if !krs.iter().any(|kr| kr.id == id) {
                if let Some(key_result) = data.key_result(&id) {
                    krs.push(key_result.clone());
                }
            }
        }
    }

    let team_ids: BTreeSet<&str> = okrs
        .iter()
        .flat_map(|o| o.team_ids.iter())
        .chain(krs.iter().flat_map(|kr| kr.team_ids.iter()))
        .map(String::as_str)
        .collect();
    let label_ids: BTreeSet<&str> = okrs
        .iter()
        .flat_map(|o| o.label_ids.iter())
        .chain(krs.iter().flat_map(|kr| kr.label_ids.iter()))
        .map(String::as_str)
        .collect();
    let period_ids: BTreeSet<&str> = okrs
        .iter()
        .filter_map(|o| o.period_alias_id.as_deref())
        .chain(krs.iter().filter_map(|kr| kr.period_alias_id.as_deref()))
        .collect();

    let teams = if expand.teams {
        data.teams.iter().filter(|t| team_ids.contains(t.id.as_str())).cloned().collect()
    } else {
        Vec::new()
    };
    let periods = if expand.periods {
        data.periods.iter().filter(|p| period_ids.contains(p.id.as_str())).cloned().collect()
    } else {
        Vec::new()
    };
    let labels = if expand.labels {
        data.labels.iter().filter(|l| label_ids.contains(l.id.as_str())).cloned().collect()
    } else {
        Vec::new()
    };

    Envelope {
        okrs,
        krs,
        teams,
        periods,
        labels,
    }
}

/// `true` when the start date or the deadline falls inside the queried range.
fn overlaps(start_date: &str, deadline: &str, query: &DateQuery) -> bool {
    let inside = |raw: &str| {
        epoch_millis(raw)
            .map(|ms| ms >= query.start_date_epoch_milli && ms <= query.deadline_epoch_milli)
            .unwrap_or(false)
    };
    inside(start_date) || inside(deadline)
}

fn epoch_millis(raw: &str) -> Option<i64> {
    DateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .ok()
        .map(|dt| dt.timestamp_millis())
}

fn split_ids(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').filter(|id| !id.is_empty())
}

/// Percent done for a manually tracked key result, clamped to 0..=100.
fn standard_progress(definition: &ProgressDefinition, value: f64) -> Option<f64> {
    if definition.kind != "STANDARD" {
        return None;
    }
    let start = definition.start_value.unwrap_or(0.0);
    let desired = definition.desired_value.unwrap_or(0.0);
    if desired == start {
        return None;
    }
    Some(((value - start) / (desired - start) * 100.0).clamp(0.0, 100.0))
}

fn not_found(kind: &str, id: &str) -> Rejection {
    (StatusCode::NOT_FOUND, format!("{kind} {id} not found"))
}

fn now() -> String {
    Utc::now().format(TIMESTAMP_FORMAT).to_string()
}
