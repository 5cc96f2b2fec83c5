//! Error taxonomy for the ingestion pipeline.
//!
//! Each error exposes a stable `code()` used by the HTTP boundary and in
//! structured logs.

use thiserror::Error;

/// Input problems detected while normalizing a [`PositionReport`](crate::report::PositionReport).
/// None of these are retried.
#[derive(Error, Clone, Debug, PartialEq)]
pub enum ValidationError {
    #[error("bus_id is missing or blank")]
    MissingVehicleId,

    #[error("Unknown bus_id {0}")]
    UnknownVehicle(String),

    #[error("field '{field}' is not a valid coordinate: {value}")]
    MalformedCoordinate { field: &'static str, value: String },

    #[error("field 'timestamp' is not a valid timestamp: {0}")]
    MalformedTimestamp(String),

    #[error("field '{field}' is not a valid number: {value}")]
    MalformedNumber { field: &'static str, value: String },
}

impl ValidationError {
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::MissingVehicleId => "missing_vehicle_id",
            Self::UnknownVehicle(_) => "unknown_vehicle",
            Self::MalformedCoordinate { .. } => "malformed_coordinate",
            Self::MalformedTimestamp(_) => "malformed_timestamp",
            Self::MalformedNumber { .. } => "malformed_number",
        }
    }
}

/// Catalog data that violates the route invariants.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum ResolveError {
    #[error("route for bus {0} has no stops")]
    EmptyRoute(String),
}

/// Persistence failures reported by a [`HistoryStore`](crate::store::HistoryStore).
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum StoreError {
    #[error("history store unavailable: {0}")]
    Unavailable(String),
}

/// Notification failures. Always recovered by the pipeline.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum DispatchError {
    #[error("alert dispatch failed: {0}")]
    Failed(String),
}

/// Failure of a single ingest call.
#[derive(Error, Clone, Debug, PartialEq)]
pub enum IngestionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IngestionError {
    /// Returns the code of the underlying cause.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation(e) => e.code(),
            Self::Resolve(ResolveError::EmptyRoute(_)) => "empty_route",
            Self::Store(StoreError::Unavailable(_)) => "store_unavailable",
        }
    }

    /// `true` when the caller sent bad input, as opposed to a server-side fault.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}
