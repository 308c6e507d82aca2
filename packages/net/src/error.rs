#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("requests to '{host}' are not allowed")]
    Blocked { host: String },

    #[error("Invalid URL: {message}")]
    InvalidUrl { message: String },

    #[error("HTTP error: {0}")]
    Transport(String),
}

impl From<url::ParseError> for Error {
    fn from(error: url::ParseError) -> Self {
        Error::InvalidUrl {
            message: error.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
