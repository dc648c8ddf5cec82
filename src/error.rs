use reqwest::{Method, StatusCode};
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{method} {url}: transport failure: {source}")]
    Transport {
        method: Method,
        url: Url,
        #[source]
        source: reqwest::Error,
    },
    #[error("{method} {url}: HTTP redirect too deep (budget {budget})")]
    TooManyRedirects {
        method: Method,
        url: Url,
        budget: usize,
    },
    #[error("{method} {url}: code={} message={message} body={body}", .code.as_u16())]
    HttpStatus {
        method: Method,
        url: Url,
        code: StatusCode,
        message: String,
        body: String,
    },
    #[error("{method} {url}: redirect ({code}) without a usable location: {reason}")]
    InvalidRedirect {
        method: Method,
        url: Url,
        code: StatusCode,
        reason: String,
    },
    #[error("invalid header '{name}': {reason}")]
    InvalidHeader { name: String, reason: String },
    #[error("failed to decode response from {url}: {reason}")]
    Decode { url: Url, reason: String },
    #[error("unsupported value at '{path}': {reason}")]
    UnsupportedShape { path: String, reason: String },
    #[error("failed to format XML: {0}")]
    Xml(String),
    #[error("{count} remote records named '{name}' at {url}")]
    AmbiguousMatch { url: Url, name: String, count: usize },
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn unsupported_shape<P: Into<String>, R: Into<String>>(path: P, reason: R) -> Self {
        Self::UnsupportedShape {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// The HTTP status code, if the remote server answered with an error.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::HttpStatus { code, .. } => Some(*code),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
