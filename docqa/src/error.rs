use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("OPENAI_API_KEY is not set; export it or add it to .env before starting")]
    MissingApiKey,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{method} {url} failed: {status} {body}")]
    Api {
        method: &'static str,
        url: String,
        status: u16,
        body: String,
    },

    #[error("{url} decode failed: {message}")]
    Decode { url: String, message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not extract text from {path}: {message}")]
    Extract { path: String, message: String },

    #[error("embedding error: {0}")]
    Embedding(String),

    #[error("index unavailable: {0}")]
    Index(String),
}
