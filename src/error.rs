use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("remote store is not configured (run `divfolio login`)")]
    NotConfigured,

    #[error("request to {collection} failed: {source}")]
    Transport {
        collection: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{collection} returned HTTP {status}: {body}")]
    Status {
        collection: &'static str,
        status: u16,
        body: String,
    },

    #[error("invalid {collection} response: {message}")]
    Decode {
        collection: &'static str,
        message: String,
    },
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("malformed JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("payload is missing `{0}`")]
    MissingKey(&'static str),
}
