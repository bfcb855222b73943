use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    /// Source page answered with a non-success status.
    #[error("fetch of {url} failed with status {status}")]
    FetchUnavailable { url: String, status: u16 },

    /// Expected table or structure is absent from the page.
    #[error("not found: {0}")]
    NotFound(String),

    /// A single cell could not be parsed as a number. Recovered as null by the cleaner.
    #[error("cannot parse {raw:?} as a number")]
    ParseFailure { raw: String },

    #[error("exchange rate for {code} not found in the rate table")]
    MissingRate { code: String },

    #[error("invalid rate for {code}: {reason}")]
    InvalidRate { code: String, reason: String },

    #[error("record does not match schema: {0}")]
    SchemaMismatch(String),

    #[error("unknown column: {0}")]
    UnknownColumn(String),

    #[error("invalid SQL identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl From<config::ConfigError> for EtlError {
    fn from(e: config::ConfigError) -> Self {
        EtlError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
