//! Error types for the metric store.

use thiserror::Error;

/// A metric type tag that is neither `counter` nor `gauge`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown metric type: {0:?}")]
pub struct ParseKindError(pub String);

/// Why a single batch entry was not applied.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    #[error("unknown metric type: {0:?}")]
    UnknownType(String),

    #[error("counter update without delta")]
    MissingDelta,

    #[error("gauge update without value")]
    MissingValue,
}
