use crate::{ConfigAccessor, Error, EventLog, Handlers, Result, TaskTracker};
use atomgit::Event;
use futures::FutureExt;
use log::{debug, error, info};
use std::{
    fmt,
    panic::AssertUnwindSafe,
    sync::{Arc, OnceLock},
};

type Registrar<C> = Box<dyn Fn(&mut Handlers<C>) + Send + Sync>;

/// Routes classified events to their handlers.
///
/// Each dispatched event runs in its own task. The handler table is built
/// on first use by calling the registrar exactly once, even with concurrent
/// callers.
pub struct Dispatcher<C> {
    inner: Arc<Inner<C>>,
}

struct Inner<C> {
    handlers: OnceLock<Handlers<C>>,
    registrar: Registrar<C>,
    config: Arc<dyn ConfigAccessor<C>>,
    tracker: TaskTracker,
}

impl<C> Clone for Dispatcher<C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<C> fmt::Debug for Dispatcher<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("handlers", &self.inner.handlers.get())
            .field("in_flight", &self.inner.tracker.in_flight())
            .finish()
    }
}

impl<C: Send + Sync + 'static> Dispatcher<C> {
    pub fn new<R>(registrar: R, config: Arc<dyn ConfigAccessor<C>>) -> Self
    where
        R: Fn(&mut Handlers<C>) + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(Inner {
                handlers: OnceLock::new(),
                registrar: Box::new(registrar),
                config,
                tracker: TaskTracker::new(),
            }),
        }
    }

    pub fn handlers(&self) -> &Handlers<C> {
        self.inner.handlers.get_or_init(|| {
            let mut handlers = Handlers::default();
            (self.inner.registrar)(&mut handlers);
            info!(
                "registered handlers for {:?}",
                handlers.registered().collect::<Vec<_>>()
            );
            handlers
        })
    }

    /// Builds the handler table, failing if a type was registered twice.
    pub fn init(&self) -> Result<()> {
        match self.handlers().duplicates().first() {
            Some(event_type) => Err(Error::DuplicateHandler(*event_type)),
            None => Ok(()),
        }
    }

    /// Schedules the handler for `event` and returns without waiting for it.
    /// Events of an unknown type are dropped.
    pub fn dispatch(&self, event: Event) -> Result<()> {
        let log = EventLog::new(&event);

        if !event.event_type.is_known() {
            debug!("{} ignoring event of unknown type", log);
            return Ok(());
        }

        let config = self.inner.config.current();
        let this = self.clone();
        self.inner
            .tracker
            .spawn(async move { this.handle_event(event, config, log).await });

        Ok(())
    }

    async fn handle_event(&self, event: Event, config: Arc<C>, log: EventLog) {
        let event_type = event.event_type;
        let handler = match self.handlers().get(event_type) {
            Some(handler) => handler.clone(),
            None => {
                error!("{} {}", log, Error::MissingHandler(event_type));
                return;
            }
        };

        match AssertUnwindSafe(handler(event, config, log.clone()))
            .catch_unwind()
            .await
        {
            Ok(Ok(())) => info!("{} handled {} event", log, event_type),
            Ok(Err(e)) => error!("{} {} handler failed: {:#}", log, event_type, e),
            Err(_) => error!("{} {} handler panicked", log, event_type),
        }
    }

    /// Number of handlers which haven't finished yet
    pub fn in_flight(&self) -> usize {
        self.inner.tracker.in_flight()
    }

    /// Resolves once every dispatched handler has finished.
    pub async fn wait(&self) {
        self.inner.tracker.wait().await
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::Dispatcher;
    use crate::{ConfigAccessor, Error};
    use atomgit::{Event, EventType};
    use bytes::Bytes;
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc, Mutex,
        },
        time::Duration,
    };
    use tokio::time::timeout;

    /// Configuration whose snapshot can be swapped by a test
    pub(crate) struct TestConfig(Mutex<Arc<String>>);

    impl TestConfig {
        pub(crate) fn new(value: &str) -> Arc<Self> {
            Arc::new(Self(Mutex::new(Arc::new(value.to_owned()))))
        }

        fn set(&self, value: &str) {
            *self.0.lock().unwrap() = Arc::new(value.to_owned());
        }
    }

    impl ConfigAccessor<String> for TestConfig {
        fn current(&self) -> Arc<String> {
            self.0.lock().unwrap().clone()
        }
    }

    fn event(event_type: EventType) -> Event {
        Event::new(event_type, event_type.as_str(), Bytes::new())
    }

    #[tokio::test]
    async fn unknown_events_are_ignored() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let dispatcher = Dispatcher::<String>::new(
            move |handlers| {
                let counter = counter.clone();
                handlers.register_issue_handler(move |_, _, _| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    async { Ok::<_, anyhow::Error>(()) }
                });
            },
            TestConfig::new("c"),
        );
        dispatcher.init().unwrap();

        dispatcher.dispatch(event(EventType::Unknown)).unwrap();
        assert_eq!(dispatcher.in_flight(), 0);
        dispatcher.wait().await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn handler_runs_once_with_current_snapshot() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let record = seen.clone();
        let config = TestConfig::new("first");
        let dispatcher = Dispatcher::<String>::new(
            move |handlers| {
                let record = record.clone();
                handlers.register_pull_request_handler(move |event, config, _| {
                    let record = record.clone();
                    async move {
                        record
                            .lock()
                            .unwrap()
                            .push((event.event_type, config.as_str().to_owned()));
                        Ok::<_, anyhow::Error>(())
                    }
                });
            },
            config.clone(),
        );

        dispatcher.dispatch(event(EventType::PullRequest)).unwrap();
        config.set("second");
        timeout(Duration::from_secs(1), dispatcher.wait())
            .await
            .unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![(EventType::PullRequest, "first".to_owned())]
        );
    }

    async fn explode() -> anyhow::Result<()> {
        tokio::time::sleep(Duration::from_millis(20)).await;
        panic!("boom")
    }

    #[tokio::test]
    async fn wait_covers_failed_and_panicking_handlers() {
        let dispatcher = Dispatcher::<String>::new(
            |handlers| {
                handlers.register_issue_handler(|_, _, _| async {
                    Err::<(), _>(anyhow::anyhow!("failed"))
                });
                handlers.register_push_event_handler(|_, _, _| explode());
            },
            TestConfig::new("c"),
        );

        dispatcher.dispatch(event(EventType::Issue)).unwrap();
        dispatcher.dispatch(event(EventType::Push)).unwrap();
        timeout(Duration::from_secs(1), dispatcher.wait())
            .await
            .unwrap();
        assert_eq!(dispatcher.in_flight(), 0);
    }

    #[tokio::test]
    async fn missing_handler_does_not_hang() {
        let dispatcher = Dispatcher::<String>::new(|_| {}, TestConfig::new("c"));
        dispatcher.dispatch(event(EventType::IssueComment)).unwrap();
        timeout(Duration::from_secs(1), dispatcher.wait())
            .await
            .unwrap();
    }

    #[test]
    fn duplicate_registration_fails_init() {
        let dispatcher = Dispatcher::<String>::new(
            |handlers| {
                handlers.register_issue_handler(|_, _, _| async { Ok::<_, anyhow::Error>(()) });
                handlers.register_issue_handler(|_, _, _| async { Ok::<_, anyhow::Error>(()) });
            },
            TestConfig::new("c"),
        );

        assert!(matches!(
            dispatcher.init(),
            Err(Error::DuplicateHandler(EventType::Issue))
        ));
    }

    #[test]
    fn registrar_runs_once() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let dispatcher = Dispatcher::<String>::new(
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            },
            TestConfig::new("c"),
        );

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| dispatcher.handlers().registered().count());
            }
        });
        dispatcher.init().unwrap();

        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }
}
