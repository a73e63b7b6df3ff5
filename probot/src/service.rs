use crate::{Configuration, Handlers};
use std::sync::Arc;

/// A bot built on the webhook server.
pub trait Robot: Send + Sync + 'static {
    /// The configuration file format of this bot
    type Config: Configuration;

    /// Returns the name of the bot.
    fn name(&self) -> &'static str;

    /// Fills in the handler table. Called once, before the first event is
    /// dispatched.
    fn register_event_handlers(self: Arc<Self>, handlers: &mut Handlers<Self::Config>);
}
