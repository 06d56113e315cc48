use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Injection failed: {0}")]
    InjectionFailed(String),

    #[error("Page access failed: {0}")]
    PageError(String),

    #[error("Event channel closed")]
    ChannelClosed,

    #[error("Other error: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, ScanError>;

/// Per-resource failure. Never fatal to a session.
#[derive(Error, Debug)]
pub enum FetchFailure {
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("transport error for {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{0} was already processed")]
    AlreadyProcessed(String),

    #[error("fetch of {0} skipped after cancellation")]
    Cancelled(String),
}
