use thiserror::Error;

/// Errors raised while fetching, parsing or querying the server registry
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Request to upstream failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upstream returned {status} for {url}")]
    UpstreamStatus { status: u16, url: String },

    #[error("Upstream document is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("Upstream document is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("Upstream response carried no document content")]
    MissingContent,

    #[error("Unable to fetch server data: no servers could be extracted from the upstream document")]
    EmptyResult,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl RegistryError {
    /// Whether the failure came from talking to the upstream document API
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            RegistryError::Http(_)
                | RegistryError::UpstreamStatus { .. }
                | RegistryError::Decode(_)
                | RegistryError::Utf8(_)
                | RegistryError::MissingContent
        )
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;
