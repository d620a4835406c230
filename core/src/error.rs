//! Error types for the OKR API client.
//!
//! # Design
//! `ApiError` is the low-level cause: a rejected expand token, a transport
//! failure, a non-success status (with the raw status code and body), or a
//! body that could not be encoded or decoded. The public `Error` pairs that
//! cause with the `Operation` that failed, so the message always starts with
//! which call went wrong.

use std::fmt;

use thiserror::Error;

use crate::http::TransportError;

/// Low-level cause of a failed call.
#[derive(Debug, Error)]
pub enum ApiError {
    /// An expand token outside the accepted set. Detected before any request.
    #[error("invalid object {0}")]
    InvalidExpand(String),

    /// The request never produced a response.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The server answered with a status the endpoint does not accept.
    #[error("error status {status}: {body}")]
    HttpError { status: u16, body: String },

    /// The response body is not valid JSON for the expected type, or one of
    /// its timestamps does not match the wire format.
    #[error("deserialization failed: {0}")]
    DeserializationError(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    SerializationError(String),
}

/// The client call an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ObjectivesByDate,
    ObjectivesByIds,
    KeyResultsByDate,
    KeyResultsByIds,
    UpdateObjective,
    UpdateKeyResult,
}

impl Operation {
    pub fn description(&self) -> &'static str {
        match self {
            Operation::ObjectivesByDate => "get the objectives by date",
            Operation::ObjectivesByIds => "get the objectives by ids",
            Operation::KeyResultsByDate => "get the key results by date",
            Operation::KeyResultsByIds => "get the key results by ids",
            Operation::UpdateObjective => "update the objective",
            Operation::UpdateKeyResult => "update the key result",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Error returned by every high-level `OkrClient` call.
#[derive(Debug, Error)]
#[error("failed to {operation}: {source}")]
pub struct Error {
    operation: Operation,
    #[source]
    source: ApiError,
}

impl Error {
    pub fn new(operation: Operation, source: ApiError) -> Self {
        Self { operation, source }
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn kind(&self) -> &ApiError {
        &self.source
    }

    pub fn into_kind(self) -> ApiError {
        self.source
    }

    /// `true` when the call was rejected locally and nothing was sent.
    pub fn is_validation(&self) -> bool {
        matches!(self.source, ApiError::InvalidExpand(_))
    }

    /// The HTTP status for `HttpError` causes.
    pub fn status(&self) -> Option<u16> {
        match &self.source {
            ApiError::HttpError { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
