//! Types for the code hosting platform's REST api and webhooks

pub mod client;
mod events;
mod issues;
mod pull_request;
mod user;
pub mod webhook;

pub use client::Client;
pub use events::*;
pub use issues::*;
pub use pull_request::*;
pub use user::*;
