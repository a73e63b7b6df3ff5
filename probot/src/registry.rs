use crate::EventLog;
use atomgit::{Event, EventType};
use futures::future::{BoxFuture, FutureExt};
use log::error;
use std::{fmt, future::Future, sync::Arc};

/// A type-erased event handler. It receives the event, the configuration
/// snapshot taken when the event was dispatched and the event's log fields.
pub type Handler<C> =
    Arc<dyn Fn(Event, Arc<C>, EventLog) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Handler table with one slot per known event type.
///
/// A slot can only be filled once. Later registrations for the same type are
/// dropped and remembered so that initialization can report them.
pub struct Handlers<C> {
    slots: [Option<Handler<C>>; EventType::KNOWN.len()],
    duplicates: Vec<EventType>,
}

impl<C> Default for Handlers<C> {
    fn default() -> Self {
        Self {
            slots: Default::default(),
            duplicates: Vec::new(),
        }
    }
}

impl<C> fmt::Debug for Handlers<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handlers")
            .field("registered", &self.registered().collect::<Vec<_>>())
            .field("duplicates", &self.duplicates)
            .finish()
    }
}

macro_rules! register_fn {
    ($(#[$doc:meta])* $name:ident, $event_type:expr) => {
        $(#[$doc])*
        pub fn $name<F, Fut>(&mut self, handler: F)
        where
            F: Fn(Event, Arc<C>, EventLog) -> Fut + Send + Sync + 'static,
            Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
        {
            self.insert($event_type, handler);
        }
    };
}

impl<C> Handlers<C> {
    register_fn!(
        /// Handler for deliveries sent directly by the platform
        register_access_handler,
        EventType::Access
    );
    register_fn!(register_issue_handler, EventType::Issue);
    register_fn!(register_pull_request_handler, EventType::PullRequest);
    register_fn!(register_push_event_handler, EventType::Push);
    register_fn!(register_issue_comment_handler, EventType::IssueComment);
    register_fn!(register_review_event_handler, EventType::PullRequestReview);
    register_fn!(
        register_review_comment_event_handler,
        EventType::PullRequestComment
    );

    fn insert<F, Fut>(&mut self, event_type: EventType, handler: F)
    where
        F: Fn(Event, Arc<C>, EventLog) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let slot = match event_type.slot() {
            Some(slot) => slot,
            None => return,
        };

        if self.slots[slot].is_some() {
            error!("a handler for {} events is already registered", event_type);
            self.duplicates.push(event_type);
            return;
        }

        let handler: Handler<C> =
            Arc::new(move |event, config, log| handler(event, config, log).boxed());
        self.slots[slot] = Some(handler);
    }

    pub fn get(&self, event_type: EventType) -> Option<&Handler<C>> {
        event_type
            .slot()
            .and_then(|slot| self.slots[slot].as_ref())
    }

    /// Event types which have a handler
    pub fn registered(&self) -> impl Iterator<Item = EventType> + '_ {
        EventType::KNOWN
            .iter()
            .copied()
            .filter(move |ty| self.get(*ty).is_some())
    }

    pub fn duplicates(&self) -> &[EventType] {
        &self.duplicates
    }
}

#[cfg(test)]
mod test {
    use super::Handlers;
    use atomgit::EventType;

    #[test]
    fn register_and_lookup() {
        let mut handlers = Handlers::<()>::default();
        handlers.register_issue_handler(|_, _, _| async { Ok::<_, anyhow::Error>(()) });
        handlers.register_review_comment_event_handler(|_, _, _| async { Ok::<_, anyhow::Error>(()) });

        assert!(handlers.get(EventType::Issue).is_some());
        assert!(handlers.get(EventType::PullRequestComment).is_some());
        assert!(handlers.get(EventType::PullRequest).is_none());
        assert!(handlers.get(EventType::Unknown).is_none());
        assert_eq!(
            handlers.registered().collect::<Vec<_>>(),
            vec![EventType::Issue, EventType::PullRequestComment]
        );
        assert!(handlers.duplicates().is_empty());
    }

    #[test]
    fn first_registration_wins() {
        let mut handlers = Handlers::<()>::default();
        handlers.register_pull_request_handler(|_, _, _| async { Ok::<_, anyhow::Error>(()) });
        handlers.register_pull_request_handler(|_, _, _| async { Err::<(), _>(anyhow::anyhow!("second")) });

        assert_eq!(handlers.duplicates(), &[EventType::PullRequest]);
        assert_eq!(handlers.registered().count(), 1);
    }

    #[test]
    fn every_known_type_has_a_slot() {
        let mut handlers = Handlers::<()>::default();
        handlers.register_access_handler(|_, _, _| async { Ok::<_, anyhow::Error>(()) });
        handlers.register_issue_handler(|_, _, _| async { Ok::<_, anyhow::Error>(()) });
        handlers.register_pull_request_handler(|_, _, _| async { Ok::<_, anyhow::Error>(()) });
        handlers.register_push_event_handler(|_, _, _| async { Ok::<_, anyhow::Error>(()) });
        handlers.register_issue_comment_handler(|_, _, _| async { Ok::<_, anyhow::Error>(()) });
        handlers.register_review_event_handler(|_, _, _| async { Ok::<_, anyhow::Error>(()) });
        handlers.register_review_comment_event_handler(|_, _, _| async { Ok::<_, anyhow::Error>(()) });

        assert_eq!(
            handlers.registered().collect::<Vec<_>>(),
            EventType::KNOWN.to_vec()
        );
        assert!(handlers.duplicates().is_empty());
    }
}
