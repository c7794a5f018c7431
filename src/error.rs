use thiserror::Error;

/// Everything that can go wrong between parsing flags and printing the
/// response. All variants surface the same way: one message, exit code 1.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("API credentials are required (set EXOSCALE_API_KEY and EXOSCALE_API_SECRET)")]
    MissingCredentials,
    #[error("{0}")]
    Args(String),
    #[error("--{flag} conflicts with another flag writing to the same body field")]
    FieldConflict { flag: String },
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },
    #[error("failed to parse response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("failed to sign request: {0}")]
    Signature(String),
}

impl CliError {
    /// Short machine-readable code for agent output.
    pub fn code(&self) -> &'static str {
        match self {
            CliError::MissingCredentials => "MISSING_CREDENTIALS",
            CliError::Args(_) => "INVALID_ARGS",
            CliError::FieldConflict { .. } => "FIELD_CONFLICT",
            CliError::Url(_) => "INVALID_URL",
            CliError::Http(_) => "HTTP_ERROR",
            CliError::Api { .. } => "API_ERROR",
            CliError::Decode(_) => "DECODE_ERROR",
            CliError::Signature(_) => "SIGNATURE_ERROR",
        }
    }
}
