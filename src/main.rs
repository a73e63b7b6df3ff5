use anyhow::Context;
use log::info;
use probot::ServeOptions;
use std::{path::PathBuf, sync::Arc};
use structopt::StructOpt;
use url::Url;
use welcome::{NewcomerClient, SigClient, WelcomeBot};

#[derive(Debug, StructOpt)]
#[structopt(name = "welcome")]
/// Welcomes the authors of new issues and pull requests
struct Options {
    #[structopt(flatten)]
    serve: ServeOptions,

    #[structopt(long, parse(from_os_str))]
    /// file holding the platform api token
    token_path: PathBuf,

    #[structopt(long, default_value = "https://api.atomgit.com/")]
    /// base url of the platform's REST api
    api_base_url: String,

    #[structopt(long)]
    /// endpoint of the SIG information cache
    cache_endpoint: String,

    #[structopt(long, default_value = "3")]
    /// number of retries of failed SIG cache requests
    max_retries: usize,

    #[structopt(long, default_value = "https://ipb.osinfra.cn/pulls")]
    /// endpoint counting the pull requests of an author
    newcomer_endpoint: String,
}

impl Options {
    fn validate(&self) -> anyhow::Result<()> {
        Url::parse(&self.api_base_url).context("invalid --api-base-url")?;
        Url::parse(&self.cache_endpoint).context("invalid --cache-endpoint")?;
        Url::parse(&self.newcomer_endpoint).context("invalid --newcomer-endpoint")?;
        self.serve.validate()?;
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let options = Options::from_args();

    // set up logging, allowing info level logging by default
    env_logger::from_env(env_logger::Env::default().default_filter_or("info")).init();

    options.validate().context("invalid options")?;

    let token = probot::load_secret(&options.token_path).context("reading api token")?;
    let platform = atomgit::Client::builder()
        .base_url(options.api_base_url.as_str())
        .api_token(token)
        .build()?;
    let sigs = SigClient::new(&options.cache_endpoint, options.max_retries)?;
    let contributors = NewcomerClient::new(&options.newcomer_endpoint)?;

    let bot = Arc::new(WelcomeBot::new(
        Arc::new(platform),
        Arc::new(sigs),
        Arc::new(contributors),
    ));

    info!("welcome starting");
    probot::run(bot, options.serve).await?;
    info!("welcome stopped");

    Ok(())
}
