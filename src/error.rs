use thiserror::Error;

/// A relevance signal could not produce an opinion.
#[derive(Debug, Error)]
pub enum ClassificationUnavailable {
    #[error("question is empty")]
    EmptyInput,
    #[error("none of the question's features are known to the model")]
    NoKnownFeatures,
    #[error("model unavailable: {0}")]
    Model(String),
}

/// Failure fetching one page or search listing from a legal source.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("{0} returned an empty body")]
    EmptyBody(String),
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error("command `{0}` is not in the allow-list")]
    NotAllowed(String),
}
