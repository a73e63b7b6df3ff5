use atomgit::EventType;
use std::{borrow::Cow, io, str};
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("http error: {0}")]
    Http(#[from] hyper::http::Error),
    #[error("hyper error: {0}")]
    Hyper(#[from] hyper::Error),
    #[error("toml parsing error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid configuration: {0:#}")]
    InvalidConfig(anyhow::Error),
    #[error("a handler for {0} events is already registered")]
    DuplicateHandler(EventType),
    #[error("no handler registered for {0} events")]
    MissingHandler(EventType),
    #[error("{0}")]
    Message(Cow<'static, str>),
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
