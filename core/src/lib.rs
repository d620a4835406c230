//! Blocking client for the OKR for Jira export and update API.
//!
//! # Overview
//! `OkrClient` fetches objectives, key results, teams, periods and labels by
//! date range or id set, and posts status/value updates back. Each call is a
//! single request through an injected `Transport`; the default one is a
//! pooled `ureq` agent.
//!
//! # Design
//! - `OkrClient` holds only a base URL, the API token and the transport.
//! - Each operation is split into `build_*` (validates, produces an
//!   `HttpRequest`) and `parse_*` (consumes an `HttpResponse`), so the I/O
//!   boundary stays explicit and the one-shot methods just chain the two.
//! - Wire timestamps (`2006-01-02T15:04:05-0700`) are decoded by one shared
//!   codec in `serde_util` and normalized to UTC.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod client;
pub mod error;
pub mod http;
pub mod serde_util;
pub mod types;

pub use client::{validate_expand, OkrClient, DEFAULT_BASE_URL, EXPAND_OBJECTS, TOKEN_HEADER};
pub use error::{ApiError, Error, Operation, Result};
pub use http::{
    HttpMethod, HttpRequest, HttpResponse, Transport, TransportConfig, TransportError, UreqTransport,
};
pub use types::{
    Expand, KeyResult, KeyResultUpdateRequest, Label, Objective, ObjectiveUpdateRequest, Period,
    ProgressDefinition, ProgressKind, Response, Team, Unit, Update,
};
