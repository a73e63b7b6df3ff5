//! Webhook server and event dispatch for bots on the AtomGit platform.

mod classify;
mod config;
mod dispatcher;
mod error;
mod event_log;
mod registry;
mod secret;
mod serve;
mod server;
mod service;
mod tracker;

pub use self::{
    classify::{classify, Classification, ACCESS_ACCEPTED},
    config::{ConfigAccessor, ConfigAgent, ConfigWatcher, Configuration},
    dispatcher::Dispatcher,
    error::{Error, Result},
    event_log::EventLog,
    registry::{Handler, Handlers},
    secret::{load_secret, FileSecret, SecretProvider},
    serve::{run, shutdown_signal, ServeOptions},
    server::{Server, ServerBuilder, DEFAULT_HANDLER_PATH},
    service::Robot,
    tracker::TaskTracker,
};
