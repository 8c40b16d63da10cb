use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server answered with status {0}")]
    Status(u16),

    #[error("malformed response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no TMDB API key configured (set TMDB_API_KEY or api_key in config.json)")]
    MissingApiKey,
}

pub type Result<T> = std::result::Result<T, CatalogError>;
