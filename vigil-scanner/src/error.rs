use thiserror::Error;

#[derive(Error, Debug)]
pub enum CrawlError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("HTTP error status {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Body is not valid UTF-8: {0}")]
    DecodeError(String),

    #[error("Pattern error: {0}")]
    PatternError(#[from] regex::Error),

    #[error("Task join error: {0}")]
    JoinError(#[from] tokio::task::JoinError),

    #[error("Crawl deadline expired while fetching {0}")]
    DeadlineExpired(String),

    #[error("Other error: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, CrawlError>;
