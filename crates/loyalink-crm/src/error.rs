/// Errors that can occur when talking to the CRM.
///
/// # Examples
///
/// ```rust
/// use loyalink_crm::error::CrmError;
///
/// let err = CrmError::ApiResponseError {
///     provider: "poster".to_string(),
///     code: "30".to_string(),
///     message: "Client not found".to_string(),
/// };
/// assert!(err.to_string().contains("Client not found"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum CrmError {
    /// HTTP-level error: non-2xx status code from the CRM API.
    #[error("{provider} API HTTP error: status={status}, body={body}")]
    HttpError {
        provider: String,
        status: u16,
        body: String,
    },

    /// API returned a 2xx status but the payload reports a logical error.
    #[error("{provider} API error: code={code}, message={message}")]
    ApiResponseError {
        provider: String,
        code: String,
        message: String,
    },

    /// The payload parsed but did not contain what the call needs.
    #[error("{provider} API unexpected response: {detail}")]
    UnexpectedResponse { provider: String, detail: String },

    /// An underlying HTTP transport error from `reqwest`, including timeouts.
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// JSON serialization or deserialization failure.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Client configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Convenience type alias so callers can write `error::Result<T>`.
pub type Result<T> = std::result::Result<T, CrmError>;
