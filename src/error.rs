use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid megabyte count {0:?}: expected a non-negative integer")]
    InvalidThreshold(String),
    #[error("worker count must be at least 1")]
    NoWorkers,
    #[error("invalid target url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("user agent {0:?} is not a valid header value")]
    InvalidUserAgent(String),
    #[error("unsupported url scheme {0:?}: only http and https are allowed")]
    UnsupportedScheme(String),
}

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("failed to build http client")]
    Client(#[source] reqwest::Error),
    #[error("failed to build request")]
    Request(#[source] reqwest::Error),
    #[error("request failed")]
    Send(#[source] reqwest::Error),
    #[error("failed reading response body")]
    Body(#[source] reqwest::Error),
}
