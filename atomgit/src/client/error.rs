//! Error type for the platform Client

use serde::Deserialize;
use std::{borrow::Cow, fmt};
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Message(Cow<'static, str>),

    #[error("request failed with {0}: {1}")]
    Api(reqwest::StatusCode, ApiError),

    #[error("RateLimit")]
    RateLimit,
}

impl Error {
    pub fn status(&self) -> Option<reqwest::StatusCode> {
        match self {
            Error::Api(status, _) => Some(*status),
            Error::Reqwest(e) => e.status(),
            _ => None,
        }
    }
}

impl From<&'static str> for Error {
    fn from(error: &'static str) -> Self {
        Error::Message(error.into())
    }
}

impl From<String> for Error {
    fn from(error: String) -> Self {
        Error::Message(error.into())
    }
}

// Error payloads
#[derive(Debug, Deserialize)]
pub struct ApiError {
    pub message: Option<String>,
    pub errors: Option<Vec<ApiErrorType>>,
    pub documentation_url: Option<String>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message.as_deref().unwrap_or("no message"))?;
        if let Some(errors) = &self.errors {
            for error in errors {
                match error {
                    ApiErrorType::Message(m) => write!(f, "; {}", m)?,
                    ApiErrorType::Code {
                        resource,
                        field,
                        code,
                    } => write!(f, "; {}.{}: {}", resource, field, code)?,
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ApiErrorType {
    Message(String),
    Code {
        resource: String,
        field: String,
        code: String,
    },
}
