use thiserror::Error;

/// Failure of a single manifest or resource GET.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error {0}: {1}")]
    ServerError(u16, String),

    /// Any other non-success status, 401 and 403 included.
    #[error("Request rejected with status {0}: {1}")]
    Status(u16, String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let code = status.as_u16();
        let truncated = Self::truncate_body(body);
        match code {
            404 => ApiError::NotFound(truncated),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(code, truncated),
            _ => ApiError::Status(code, truncated),
        }
    }

    /// HTTP status behind the error, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::NotFound(_) => Some(404),
            ApiError::RateLimited => Some(429),
            ApiError::ServerError(code, _) | ApiError::Status(code, _) => Some(*code),
            ApiError::NetworkError(e) => e.status().map(|s| s.as_u16()),
        }
    }
}
