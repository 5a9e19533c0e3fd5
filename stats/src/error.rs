use thiserror::Error;

/// Errors surfaced by the stats pipeline.
///
/// Every variant is fatal to the operation that produced it. Nothing here is
/// retried; the binary deciding the run order chooses whether to abort or to
/// skip a single statistic.
#[derive(Debug, Error)]
pub enum StatsError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to load streaming history: {0}")]
    DataLoad(String),

    #[error("token generation rejected: {0}")]
    Auth(String),

    #[error("token refresh failed: {0}")]
    Refresh(String),

    #[error("failed to persist credentials: {0}")]
    Persistence(String),

    #[error("upstream request failed: {0}")]
    Upstream(String),
}

pub type Result<T, E = StatsError> = std::result::Result<T, E>;
