use serde::{Deserialize, Serialize};
use tower_api_client::{Error as ApiError, StatusCode};

#[derive(Debug)]
pub enum HitbloqApiError {
    Hitbloq(StatusCode, ErrorDetail),
    Internal(ApiError),
}

impl HitbloqApiError {
    /// HTTP status reported by the service, if the request got that far
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            HitbloqApiError::Hitbloq(status, _) => Some(*status),
            HitbloqApiError::Internal(_) => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
    }
}

impl From<ApiError> for HitbloqApiError {
    fn from(value: ApiError) -> Self {
        match value {
            ApiError::ClientError(status, detail) | ApiError::ServerError(status, detail) => {
                HitbloqApiError::Hitbloq(status, ErrorDetail::parse(&detail))
            }
            e => HitbloqApiError::Internal(e),
        }
    }
}

impl std::fmt::Display for HitbloqApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HitbloqApiError::Internal(e) => write!(f, "Internal error: {}", e),
            HitbloqApiError::Hitbloq(status, detail) => write!(f, "({}) {}", status, detail.error),
        }
    }
}

impl std::error::Error for HitbloqApiError {}

/// Error body returned by the service.
///
/// Hitbloq answers most failures with `{"error": "..."}` but proxies in front of it
/// may return plain text or HTML, which is kept verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub error: String,
}

impl ErrorDetail {
    fn parse(body: &str) -> Self {
        serde_json::from_str(body).unwrap_or_else(|_| Self {
            error: body.trim().to_string(),
        })
    }
}
