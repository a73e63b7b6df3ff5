use crate::{ConfigAgent, Dispatcher, FileSecret, Result, Robot, ServerBuilder};
use log::{error, info, warn};
use std::{path::PathBuf, sync::Arc, time::Duration};
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
pub struct ServeOptions {
    #[structopt(long, default_value = "8888")]
    pub port: u16,

    /// Path to the bot's toml configuration
    #[structopt(long, parse(from_os_str), default_value = "config.toml")]
    pub config_file: PathBuf,

    /// Seconds to wait for running handlers after a shutdown signal
    #[structopt(long, default_value = "300")]
    pub grace_period: u64,

    #[structopt(long, default_value = "/webhook")]
    pub handler_path: String,

    /// File holding the secret access deliveries are signed with
    #[structopt(long, parse(from_os_str))]
    pub webhook_secret_path: PathBuf,

    /// Seconds between checks of the configuration file
    #[structopt(long, default_value = "60")]
    pub config_reload_interval: u64,
}

impl ServeOptions {
    pub fn validate(&self) -> Result<()> {
        if !self.handler_path.starts_with('/') || self.handler_path == "/" {
            return Err(format!("invalid handler path {:?}", self.handler_path).into());
        }
        if self.grace_period == 0 {
            return Err("grace period must be positive".into());
        }
        if self.config_reload_interval == 0 {
            return Err("config reload interval must be positive".into());
        }
        Ok(())
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period)
    }
}

/// Runs `robot` until the process receives SIGINT or SIGTERM.
///
/// On shutdown the listener stops accepting connections, the configuration
/// watcher is stopped and running handlers get up to the grace period to
/// finish.
pub async fn run<R: Robot>(robot: Arc<R>, options: ServeOptions) -> Result<()> {
    options.validate()?;

    let agent = Arc::new(ConfigAgent::<R::Config>::load(&options.config_file)?);
    let secret = Arc::new(FileSecret::load(&options.webhook_secret_path)?);
    info!(
        "configuration loaded from {}, webhook secret from {}",
        agent.path().display(),
        secret.path().display()
    );

    let name = robot.name();
    let dispatcher = Dispatcher::new(
        move |handlers| robot.clone().register_event_handlers(handlers),
        agent.clone(),
    );
    dispatcher.init()?;

    let watcher = agent.clone().start(Duration::from_secs(options.config_reload_interval));

    let server = ServerBuilder::default()
        .handler_path(options.handler_path.as_str())
        .build(dispatcher.clone(), secret);
    let addr = ([0, 0, 0, 0], options.port).into();

    info!("starting {}", name);
    let served = server.serve(addr, shutdown_signal()).await;
    if let Err(e) = &served {
        error!("server stopped: {}", e);
    }

    watcher.stop().await;

    match tokio::time::timeout(options.grace_period(), dispatcher.wait()).await {
        Ok(()) => info!("all handlers finished"),
        Err(_) => warn!(
            "grace period elapsed with {} handlers still running",
            dispatcher.in_flight()
        ),
    }

    served
}

/// Waits for SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received CTRL+C, starting graceful shutdown"),
        () = terminate => info!("Received SIGTERM, starting graceful shutdown"),
    }
}
