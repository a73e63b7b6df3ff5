use crate::{Error, Result};
use log::{debug, error, info, warn};
use serde::de::DeserializeOwned;
use std::{
    fmt, fs,
    path::{Path, PathBuf},
    sync::{Arc, PoisonError, RwLock},
    time::{Duration, SystemTime},
};
use tokio::{
    sync::oneshot,
    task::{self, JoinHandle},
    time,
};

/// A bot configuration loaded from a toml file.
pub trait Configuration: DeserializeOwned + Send + Sync + 'static {
    /// Checked after every load. A configuration which fails validation is
    /// never served.
    fn validate(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Hands out the configuration snapshot that is current at the time of the
/// call. Snapshots are immutable, reloads replace them wholesale.
pub trait ConfigAccessor<C>: Send + Sync {
    fn current(&self) -> Arc<C>;
}

/// Keeps the configuration read from a file and reloads it when the file
/// changes.
pub struct ConfigAgent<C> {
    path: PathBuf,
    state: RwLock<State<C>>,
}

struct State<C> {
    version: u64,
    modified: Option<SystemTime>,
    config: Arc<C>,
}

impl<C> fmt::Debug for ConfigAgent<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigAgent")
            .field("path", &self.path)
            .field("version", &self.version())
            .finish()
    }
}

fn read_config<C: Configuration>(path: &Path) -> Result<C> {
    let contents = fs::read_to_string(path)?;
    let config: C = toml::from_str(&contents)?;
    config.validate().map_err(Error::InvalidConfig)?;
    Ok(config)
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

impl<C: Configuration> ConfigAgent<C> {
    /// Loads the initial configuration. Failing to read, parse or validate
    /// the file is an error.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_owned();
        let modified = modified(&path);
        let config = read_config(&path)?;
        info!("loaded configuration from {}", path.display());

        Ok(Self {
            path,
            state: RwLock::new(State {
                version: 1,
                modified,
                config: Arc::new(config),
            }),
        })
    }

    /// Re-reads the file if its modification time changed since the last
    /// load. Returns whether a new snapshot was installed. On error the
    /// previous snapshot stays current.
    pub fn reload(&self) -> Result<bool> {
        let modified = modified(&self.path);
        if modified.is_some() && modified == self.read_state(|s| s.modified) {
            return Ok(false);
        }

        let config = read_config::<C>(&self.path)?;
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.version += 1;
        state.modified = modified;
        state.config = Arc::new(config);
        info!(
            "reloaded configuration from {} (version {})",
            self.path.display(),
            state.version
        );

        Ok(true)
    }

    /// Spawns a task which checks the file every `interval`.
    pub fn start(self: Arc<Self>, interval: Duration) -> ConfigWatcher {
        let (stop, mut stopped) = oneshot::channel();
        let agent = self;

        let handle = tokio::spawn(async move {
            let mut ticks = time::interval(interval);
            // The first tick completes immediately
            ticks.tick().await;

            loop {
                tokio::select! {
                    _ = &mut stopped => break,
                    _ = ticks.tick() => {}
                }

                let agent = agent.clone();
                match task::spawn_blocking(move || agent.reload()).await {
                    Ok(Ok(true)) => {}
                    Ok(Ok(false)) => debug!("configuration unchanged"),
                    Ok(Err(e)) => error!("keeping previous configuration: {}", e),
                    Err(e) => error!("configuration reload task failed: {}", e),
                }
            }

            debug!("configuration watcher stopped");
        });

        ConfigWatcher { stop, handle }
    }
}

impl<C> ConfigAgent<C> {
    fn read_state<T>(&self, f: impl FnOnce(&State<C>) -> T) -> T {
        f(&self.state.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Number of snapshots installed so far, starting at 1
    pub fn version(&self) -> u64 {
        self.read_state(|s| s.version)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<C: Send + Sync> ConfigAccessor<C> for ConfigAgent<C> {
    fn current(&self) -> Arc<C> {
        self.read_state(|s| s.config.clone())
    }
}

/// Handle to a running reload task
#[derive(Debug)]
pub struct ConfigWatcher {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl ConfigWatcher {
    /// Stops the reload task and waits for it to exit.
    pub async fn stop(self) {
        let _ = self.stop.send(());
        if let Err(e) = self.handle.await {
            warn!("configuration watcher failed: {}", e);
        }
    }
}

#[cfg(test)]
mod test {
    use super::{ConfigAccessor, ConfigAgent, Configuration};
    use serde::Deserialize;
    use std::{
        fs,
        path::{Path, PathBuf},
        sync::Arc,
        time::Duration,
    };

    #[derive(Debug, Deserialize)]
    struct TestConfig {
        name: String,
    }

    impl Configuration for TestConfig {
        fn validate(&self) -> anyhow::Result<()> {
            anyhow::ensure!(!self.name.is_empty(), "name must not be empty");
            Ok(())
        }
    }

    fn config_file(test: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "probot-config-{}-{}.toml",
            std::process::id(),
            test
        ));
        fs::write(&path, contents).unwrap();
        path
    }

    // Makes sure the next write lands on a different modification time
    fn touch(path: &Path, contents: &str) {
        let before = fs::metadata(path).unwrap().modified().unwrap();
        loop {
            fs::write(path, contents).unwrap();
            if fs::metadata(path).unwrap().modified().unwrap() != before {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn load_and_reload() {
        let path = config_file("reload", "name = \"first\"\n");
        let agent = ConfigAgent::<TestConfig>::load(&path).unwrap();
        assert_eq!(agent.current().name, "first");
        assert_eq!(agent.version(), 1);

        // unchanged file
        assert!(!agent.reload().unwrap());

        let snapshot = agent.current();
        touch(&path, "name = \"second\"\n");
        assert!(agent.reload().unwrap());
        assert_eq!(agent.current().name, "second");
        assert_eq!(agent.version(), 2);
        // snapshots handed out earlier are unaffected
        assert_eq!(snapshot.name, "first");

        fs::remove_file(path).unwrap();
    }

    #[test]
    fn invalid_reload_keeps_previous() {
        let path = config_file("invalid", "name = \"first\"\n");
        let agent = ConfigAgent::<TestConfig>::load(&path).unwrap();

        touch(&path, "name = \"\"\n");
        assert!(agent.reload().is_err());
        assert_eq!(agent.current().name, "first");
        assert_eq!(agent.version(), 1);

        fs::remove_file(path).unwrap();
    }

    #[test]
    fn load_errors() {
        let path = config_file("missing-field", "other = 1\n");
        assert!(ConfigAgent::<TestConfig>::load(&path).is_err());
        fs::remove_file(path).unwrap();

        assert!(ConfigAgent::<TestConfig>::load("/nonexistent/probot.toml").is_err());
    }

    #[tokio::test]
    async fn watcher_picks_up_changes() {
        let path = config_file("watcher", "name = \"first\"\n");
        let agent = Arc::new(ConfigAgent::<TestConfig>::load(&path).unwrap());
        let watcher = agent.clone().start(Duration::from_millis(20));

        touch(&path, "name = \"second\"\n");
        for _ in 0..100 {
            if agent.current().name == "second" {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(agent.current().name, "second");

        watcher.stop().await;
        fs::remove_file(path).unwrap();
    }

    #[tokio::test]
    async fn watcher_survives_invalid_file() {
        let path = config_file("watcher-invalid", "name = \"first\"\n");
        let agent = Arc::new(ConfigAgent::<TestConfig>::load(&path).unwrap());
        assert_eq!(agent.path(), path.as_path());
        let watcher = agent.clone().start(Duration::from_millis(20));

        touch(&path, "name = \"\"\n");
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(agent.current().name, "first");
        assert_eq!(agent.version(), 1);

        touch(&path, "name = \"third\"\n");
        for _ in 0..100 {
            if agent.current().name == "third" {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(agent.current().name, "third");

        watcher.stop().await;
        fs::remove_file(path).unwrap();
    }
}
