use hitbloq_api::HitbloqApiError;
use thiserror::Error;

/// A fetch could not be started. Returned synchronously from dispatch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    #[error("No Hitbloq user configured")]
    MissingUser,

    #[error("Panel has been torn down")]
    Disposed,
}

/// A started fetch finished with an error.
///
/// Reasons are passed through from the data source; the sync layer does not act on them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    /// Transport or decoding failure below the HTTP status level
    #[error("Network error: {0}")]
    Network(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Hitbloq returned {status}: {detail}")]
    Remote { status: u16, detail: String },

    #[error("Request was cancelled")]
    Cancelled,
}

impl From<HitbloqApiError> for FetchFailure {
    fn from(err: HitbloqApiError) -> Self {
        match err {
            HitbloqApiError::Hitbloq(status, detail) if status.as_u16() == 404 => {
                FetchFailure::NotFound(detail.error)
            }
            HitbloqApiError::Hitbloq(status, detail) => FetchFailure::Remote {
                status: status.as_u16(),
                detail: detail.error,
            },
            HitbloqApiError::Internal(e) => FetchFailure::Network(e.to_string()),
        }
    }
}
