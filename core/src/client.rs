//! HTTP request builder, response parser and one-shot client for the OKR API.
//!
//! # Design
//! `OkrClient` holds the base URL, the API token and a `Transport`, and
//! carries no mutable state between calls. Each operation is split into a
//! `build_*` method that validates input and produces an `HttpRequest`, and
//! a `parse_*` method that consumes an `HttpResponse`. The one-shot methods
//! (`objectives_by_date`, `update_key_result`, ...) run build, transport and
//! parse in sequence and tag any failure with the `Operation` it came from.

use std::fmt;

use chrono::{DateTime, TimeZone};

use crate::error::{ApiError, Error, Operation, Result};
use crate::http::{HttpMethod, HttpRequest, HttpResponse, Transport, TransportConfig, UreqTransport};
use crate::types::{KeyResultUpdateRequest, ObjectiveUpdateRequest, Response, Update};

/// Production host of the service.
pub const DEFAULT_BASE_URL: &str = "https://okr-for-jira-prod.herokuapp.com";

/// Tokens accepted in the `expand` query parameter.
pub const EXPAND_OBJECTS: [&str; 5] = ["OBJECTIVES", "KEY_RESULTS", "TEAMS", "PERIODS", "LABELS"];

/// Header carrying the API token.
pub const TOKEN_HEADER: &str = "API-Token";

const OBJECTIVES_BY_DATE_PATH: &str = "/api/v2/api-export/objectives/byDate";
const OBJECTIVES_BY_IDS_PATH: &str = "/api/v2/api-export/objectives/byIds";
const KEY_RESULTS_BY_DATE_PATH: &str = "/api/v2/api-export/keyResults/byDate";
const KEY_RESULTS_BY_IDS_PATH: &str = "/api/v2/api-export/keyResults/byIds";
const OBJECTIVE_UPDATE_PATH: &str = "/api/v2/api-update/objectives";
const KEY_RESULT_UPDATE_PATH: &str = "/api/v2/api-update/keyResults";

/// Blocking client for the OKR export and update API.
///
/// Safe to share between threads when the transport is; every call is an
/// independent round trip.
#[derive(Clone)]
pub struct OkrClient<T = UreqTransport> {
    base_url: String,
    token: String,
    transport: T,
}

impl OkrClient<UreqTransport> {
    /// Client for the production host using the default pooled transport.
    pub fn new(token: &str) -> Self {
        Self::with_config(token, &TransportConfig::default())
    }

    pub fn with_config(token: &str, config: &TransportConfig) -> Self {
        Self::with_transport(UreqTransport::new(config), token)
    }
}

impl<T: Transport> OkrClient<T> {
    pub fn with_transport(transport: T, token: &str) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: token.to_string(),
            transport,
        }
    }

    /// Point the client at another host, e.g. a local mock server.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    // ── One-shot calls ───────────────────────────────────────────────────

    /// Objectives whose start date or deadline falls inside
    /// `[start, deadline]`.
    pub fn objectives_by_date<Tz: TimeZone, S: AsRef<str>>(
        &self,
        start: &DateTime<Tz>,
        deadline: &DateTime<Tz>,
        expand: &[S],
    ) -> Result<Response> {
        self.build_objectives_by_date(start, deadline, expand)
            .and_then(|req| self.send(req))
            .and_then(|resp| self.parse_export(resp))
            .map_err(|e| Error::new(Operation::ObjectivesByDate, e))
    }

    pub fn objectives_by_ids<I: AsRef<str>, S: AsRef<str>>(
        &self,
        objective_ids: &[I],
        expand: &[S],
    ) -> Result<Response> {
        self.build_objectives_by_ids(objective_ids, expand)
            .and_then(|req| self.send(req))
            .and_then(|resp| self.parse_export(resp))
            .map_err(|e| Error::new(Operation::ObjectivesByIds, e))
    }

    /// Key results whose start date or deadline falls inside
    /// `[start, deadline]`.
    pub fn key_results_by_date<Tz: TimeZone, S: AsRef<str>>(
        &self,
        start: &DateTime<Tz>,
        deadline: &DateTime<Tz>,
        expand: &[S],
    ) -> Result<Response> {
        self.build_key_results_by_date(start, deadline, expand)
            .and_then(|req| self.send(req))
            .and_then(|resp| self.parse_export(resp))
            .map_err(|e| Error::new(Operation::KeyResultsByDate, e))
    }

    pub fn key_results_by_ids<I: AsRef<str>, S: AsRef<str>>(
        &self,
        key_result_ids: &[I],
        expand: &[S],
    ) -> Result<Response> {
        self.build_key_results_by_ids(key_result_ids, expand)
            .and_then(|req| self.send(req))
            .and_then(|resp| self.parse_export(resp))
            .map_err(|e| Error::new(Operation::KeyResultsByIds, e))
    }

    /// Post a status update on an objective. Every call creates a new update
    /// on the service.
    pub fn update_objective(
        &self,
        objective_id: &str,
        status: &str,
        description: &str,
    ) -> Result<Update> {
        self.build_update_objective(objective_id, status, description)
            .and_then(|req| self.send(req))
            .and_then(|resp| self.parse_update(resp))
            .map_err(|e| Error::new(Operation::UpdateObjective, e))
    }

    /// Post a status and a new value on a key result. Every call creates a
    /// new update on the service.
    pub fn update_key_result(
        &self,
        key_result_id: &str,
        status: &str,
        new_value: f64,
        description: &str,
    ) -> Result<Update> {
        self.build_update_key_result(key_result_id, status, new_value, description)
            .and_then(|req| self.send(req))
            .and_then(|resp| self.parse_update(resp))
            .map_err(|e| Error::new(Operation::UpdateKeyResult, e))
    }

    fn send(&self, request: HttpRequest) -> std::result::Result<HttpResponse, ApiError> {
        tracing::debug!(method = request.method.as_str(), url = %request.url, "sending request");
        let response = self.transport.execute(request).map_err(|e| {
            tracing::warn!(error = %e, "request failed before a response");
            ApiError::Transport(e)
        })?;
        tracing::debug!(status = response.status, "received response");
        Ok(response)
    }
}

impl<T> OkrClient<T> {
    // ── Request builders ─────────────────────────────────────────────────

    pub fn build_objectives_by_date<Tz: TimeZone, S: AsRef<str>>(
        &self,
        start: &DateTime<Tz>,
        deadline: &DateTime<Tz>,
        expand: &[S],
    ) -> std::result::Result<HttpRequest, ApiError> {
        self.build_by_date(OBJECTIVES_BY_DATE_PATH, start, deadline, expand)
    }

    pub fn build_objectives_by_ids<I: AsRef<str>, S: AsRef<str>>(
        &self,
        objective_ids: &[I],
        expand: &[S],
    ) -> std::result::Result<HttpRequest, ApiError> {
        self.build_by_ids(OBJECTIVES_BY_IDS_PATH, "objectiveIds", objective_ids, expand)
    }

    pub fn build_key_results_by_date<Tz: TimeZone, S: AsRef<str>>(
        &self,
        start: &DateTime<Tz>,
        deadline: &DateTime<Tz>,
        expand: &[S],
    ) -> std::result::Result<HttpRequest, ApiError> {
        self.build_by_date(KEY_RESULTS_BY_DATE_PATH, start, deadline, expand)
    }

    pub fn build_key_results_by_ids<I: AsRef<str>, S: AsRef<str>>(
        &self,
        key_result_ids: &[I],
        expand: &[S],
    ) -> std::result::Result<HttpRequest, ApiError> {
        self.build_by_ids(KEY_RESULTS_BY_IDS_PATH, "keyResultIds", key_result_ids, expand)
    }

    pub fn build_update_objective(
        &self,
        objective_id: &str,
        status: &str,
        description: &str,
    ) -> std::result::Result<HttpRequest, ApiError> {
        let payload = ObjectiveUpdateRequest {
            objective_id: objective_id.to_string(),
            status: status.to_string(),
            description: description.to_string(),
        };
        let body = serde_json::to_string(&payload).map_err(|e| ApiError::SerializationError(e.to_string()))?;
        Ok(self.request(HttpMethod::Post, format!("{}{OBJECTIVE_UPDATE_PATH}", self.base_url), Some(body)))
    }

    pub fn build_update_key_result(
        &self,
        key_result_id: &str,
        status: &str,
        new_value: f64,
        description: &str,
    ) -> std::result::Result<HttpRequest, ApiError> {
        let payload = KeyResultUpdateRequest {
            key_result_id: key_result_id.to_string(),
            status: status.to_string(),
            new_value,
            description: description.to_string(),
        };
        let body = serde_json::to_string(&payload).map_err(|e| ApiError::SerializationError(e.to_string()))?;
        Ok(self.request(HttpMethod::Post, format!("{}{KEY_RESULT_UPDATE_PATH}", self.base_url), Some(body)))
    }

    // ── Response parsers ─────────────────────────────────────────────────

    /// Decode the envelope returned by any of the four export endpoints.
    pub fn parse_export(&self, response: HttpResponse) -> std::result::Result<Response, ApiError> {
        check_status(&response, |status| status == 200)?;
        serde_json::from_str(&response.body).map_err(|e| ApiError::DeserializationError(e.to_string()))
    }

    /// Decode the update echoed by either update endpoint.
    pub fn parse_update(&self, response: HttpResponse) -> std::result::Result<Update, ApiError> {
        check_status(&response, |_| response.is_success())?;
        serde_json::from_str(&response.body).map_err(|e| ApiError::DeserializationError(e.to_string()))
    }

    fn build_by_date<Tz: TimeZone, S: AsRef<str>>(
        &self,
        path: &str,
        start: &DateTime<Tz>,
        deadline: &DateTime<Tz>,
        expand: &[S],
    ) -> std::result::Result<HttpRequest, ApiError> {
        let expand = join_expand(expand)?;
        let url = format!(
            "{}{path}?startDateEpochMilli={}&deadlineEpochMilli={}&expand={expand}",
            self.base_url,
            start.timestamp_millis(),
            deadline.timestamp_millis(),
        );
        Ok(self.request(HttpMethod::Get, url, None))
    }

    fn build_by_ids<I: AsRef<str>, S: AsRef<str>>(
        &self,
        path: &str,
        ids_param: &str,
        ids: &[I],
        expand: &[S],
    ) -> std::result::Result<HttpRequest, ApiError> {
        let expand = join_expand(expand)?;
        let url = format!("{}{path}?{ids_param}={}&expand={expand}", self.base_url, join(ids));
        Ok(self.request(HttpMethod::Get, url, None))
    }

    fn request(&self, method: HttpMethod, url: String, body: Option<String>) -> HttpRequest {
        HttpRequest {
            method,
            url,
            headers: vec![
                (TOKEN_HEADER.to_string(), self.token.clone()),
                ("Content-Type".to_string(), "application/json".to_string()),
                ("Accept".to_string(), "application/json".to_string()),
            ],
            body,
        }
    }
}

impl<T> fmt::Debug for OkrClient<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OkrClient")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .finish_non_exhaustive()
    }
}

/// Check every token against `EXPAND_OBJECTS`. An empty list is valid.
pub fn validate_expand<S: AsRef<str>>(expand: &[S]) -> std::result::Result<(), ApiError> {
    match expand
        .iter()
        .map(AsRef::as_ref)
        .find(|token| !EXPAND_OBJECTS.contains(token))
    {
        Some(token) => Err(ApiError::InvalidExpand(token.to_string())),
        None => Ok(()),
    }
}

fn join_expand<S: AsRef<str>>(expand: &[S]) -> std::result::Result<String, ApiError> {
    validate_expand(expand)?;
    Ok(join(expand))
}

/// Comma-join without escaping; the service expects literal commas.
fn join<S: AsRef<str>>(values: &[S]) -> String {
    values.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(",")
}

/// Map statuses outside `accept` to `ApiError::HttpError`, keeping the body.
fn check_status(response: &HttpResponse, accept: impl Fn(u16) -> bool) -> std::result::Result<(), ApiError> {
    if accept(response.status) {
        return Ok(());
    }
    tracing::warn!(status = response.status, "unexpected response status");
    Err(ApiError::HttpError {
        status: response.status,
        body: response.body.clone(),
    })
}
