//! Crate-wide error type.

/// Errors produced by the clustering core.
///
/// Per the error-handling design, most of these are scoped to a single trial,
/// a single criterion, or a single persistence call; the orchestration entry
/// point (`segment`) catches and logs the trial/criterion-scoped ones instead
/// of letting them escape.
#[derive(Debug, thiserror::Error)]
pub enum ClusteringError {
    #[error("cluster {cluster} became empty during trial {trial}")]
    EmptyCluster { trial: usize, cluster: usize },

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: String, actual: String },

    #[error("invalid K: {0}")]
    InvalidK(String),

    #[error("labeling store is not allocated")]
    NotAllocated,

    #[error("fewer than three criteria survived degeneracy dropping")]
    InsufficientCriteria,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ClusteringError>;
