mod clients;
pub mod config;
mod error;
mod newcomer;
mod robot;
mod sig;

pub use clients::{ContributorIndex, Platform, SigRegistry};
pub use config::{BotConfig, Configuration};
pub use error::{Error, MultiError, Result};
pub use newcomer::{NewcomerClient, DEFAULT_NEWCOMER_ENDPOINT};
pub use robot::{label_color, match_owners, sig_label, WelcomeBot, NEWCOMER_LABEL};
pub use sig::SigClient;
