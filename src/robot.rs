use crate::{
    clients::{ContributorIndex, Platform, SigRegistry},
    config::{BotConfig, Configuration},
    MultiError, Result,
};
use anyhow::anyhow;
use atomgit::{Event, ACTION_CREATED};
use log::{debug, error, info, warn};
use probot::{EventLog, Handlers, Robot};
use std::{collections::HashMap, sync::Arc};

const BOT_NAME: &str = "welcome";

/// Label applied to pull requests of first-time contributors
pub const NEWCOMER_LABEL: &str = "newcomer";

const SIG_LABEL_MAX_LEN: usize = 20;

const SIG_LINK: &str = "https://gitee.com/openeuler/community/tree/master/sig";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Target {
    Issue,
    PullRequest,
}

// Everything the welcome steps need to know about one event
struct EventArgs<'a> {
    target: Target,
    org: &'a str,
    repo: &'a str,
    number: u64,
    author: &'a str,
    config: &'a BotConfig,
    log: &'a EventLog,
}

/// Greets the authors of new issues and pull requests, points them at the
/// SIG responsible for the repository and labels the item with that SIG.
pub struct WelcomeBot {
    platform: Arc<dyn Platform>,
    sigs: Arc<dyn SigRegistry>,
    contributors: Arc<dyn ContributorIndex>,
}

impl Robot for WelcomeBot {
    type Config = Configuration;

    fn name(&self) -> &'static str {
        BOT_NAME
    }

    fn register_event_handlers(self: Arc<Self>, handlers: &mut Handlers<Configuration>) {
        let bot = self.clone();
        handlers.register_issue_handler(move |event, config, log| {
            let bot = bot.clone();
            async move { bot.handle_issue(&event, &config, &log).await }
        });

        handlers.register_pull_request_handler(move |event, config, log| {
            let bot = self.clone();
            async move { bot.handle_pull_request(&event, &config, &log).await }
        });
    }
}

fn bot_config<'a>(config: &'a Configuration, event: &Event) -> anyhow::Result<&'a BotConfig> {
    config
        .config_for(&event.org, &event.repo)
        .ok_or_else(|| anyhow!("no config for this repo:{}/{}", event.org, event.repo))
}

impl WelcomeBot {
    pub fn new(
        platform: Arc<dyn Platform>,
        sigs: Arc<dyn SigRegistry>,
        contributors: Arc<dyn ContributorIndex>,
    ) -> Self {
        Self {
            platform,
            sigs,
            contributors,
        }
    }

    pub async fn handle_issue(
        &self,
        event: &Event,
        config: &Configuration,
        log: &EventLog,
    ) -> anyhow::Result<()> {
        if event.action != ACTION_CREATED {
            return Ok(());
        }

        let args = EventArgs {
            target: Target::Issue,
            org: &event.org,
            repo: &event.repo,
            number: event.require_issue_number()?,
            author: &event.issue_author,
            config: bot_config(config, event)?,
            log,
        };

        self.welcome(&args).await
    }

    pub async fn handle_pull_request(
        &self,
        event: &Event,
        config: &Configuration,
        log: &EventLog,
    ) -> anyhow::Result<()> {
        if event.action != ACTION_CREATED {
            return Ok(());
        }

        let args = EventArgs {
            target: Target::PullRequest,
            org: &event.org,
            repo: &event.repo,
            number: event.require_pr_number()?,
            author: &event.pr_author,
            config: bot_config(config, event)?,
            log,
        };

        self.label_newcomer(&args).await;
        self.welcome(&args).await
    }

    // Failures here never fail the event
    async fn label_newcomer(&self, args: &EventArgs<'_>) {
        match self.contributors.pull_request_count(args.author).await {
            Ok(0) => {
                let labels = [NEWCOMER_LABEL.to_owned()];
                match self
                    .platform
                    .add_labels(args.org, args.repo, args.number, &labels)
                    .await
                {
                    Ok(()) => info!("{} labelled {} as newcomer", args.log, args.author),
                    Err(e) => error!("{} adding {} label: {}", args.log, NEWCOMER_LABEL, e),
                }
            }
            Ok(count) => debug!(
                "{} {} already has {} pull requests",
                args.log, args.author, count
            ),
            Err(e) => error!(
                "{} looking up pull requests of {}: {}",
                args.log, args.author, e
            ),
        }
    }

    async fn welcome(&self, args: &EventArgs<'_>) -> anyhow::Result<()> {
        let sig_name = self.sigs.sig_name(args.org, args.repo).await?;
        let mut errors = MultiError::new();

        if let Some(comment) = errors.check(self.generate_comment(args, &sig_name).await) {
            errors.check(
                self.platform
                    .create_comment(args.org, args.repo, args.number, &comment)
                    .await,
            );
        }

        let label = sig_label(&sig_name);
        if let Err(e) = self.create_label_if_needed(args.org, args.repo, &label).await {
            error!("{} create repo label:{}, err:{}", args.log, label, e);
        }

        errors.check(
            self.platform
                .add_labels(args.org, args.repo, args.number, &[label])
                .await,
        );

        errors.into_result()
    }

    async fn generate_comment(&self, args: &EventArgs<'_>, sig_name: &str) -> Result<String> {
        let config = args.config;
        if config.no_need_to_notice {
            return Ok(short_welcome(args.author, config, sig_name));
        }

        let mut maintainers = self
            .platform
            .list_collaborators(args.org, args.repo)
            .await?;

        if config.welcome_simpler {
            match self.path_owners(args).await {
                Ok(owners) => maintainers.extend(owners),
                Err(e) => warn!("{} looking up path owners: {}", args.log, e),
            }
        } else {
            maintainers.extend(self.sigs.maintainers(args.org, args.repo).await?);
        }
        dedup(&mut maintainers);

        if config.need_assign && args.target == Target::PullRequest && !maintainers.is_empty() {
            self.platform
                .request_reviewers(args.org, args.repo, args.number, &maintainers)
                .await?;
        }

        let committers = match self.sigs.committers(args.org, args.repo).await {
            Ok(committers) => committers,
            Err(e) => {
                warn!("{} looking up committers: {}", args.log, e);
                Vec::new()
            }
        };

        Ok(welcome_message(
            args.author,
            config,
            sig_name,
            &maintainers,
            &committers,
        ))
    }

    // Owners of the paths a pull request touches. Issues get the owners of
    // the repository root.
    async fn path_owners(&self, args: &EventArgs<'_>) -> Result<Vec<String>> {
        let owners = self.sigs.owners(args.org, args.repo).await?;
        let files = match args.target {
            Target::PullRequest => {
                self.platform
                    .list_pr_files(args.org, args.repo, args.number)
                    .await?
            }
            Target::Issue => vec![String::new()],
        };

        Ok(match_owners(&owners, &files))
    }

    async fn create_label_if_needed(&self, org: &str, repo: &str, label: &str) -> Result<()> {
        let labels = self.platform.list_labels(org, repo).await?;
        if labels.iter().any(|l| l == label) {
            return Ok(());
        }

        self.platform
            .create_label(org, repo, label, &label_color(label))
            .await
    }
}

/// `sig/<name>`, cut to the platform's label length limit
pub fn sig_label(sig_name: &str) -> String {
    format!("sig/{}", sig_name)
        .chars()
        .take(SIG_LABEL_MAX_LEN)
        .collect()
}

/// A stable colour for a label, taken from the hash of its name
pub fn label_color(label: &str) -> String {
    let hash = hmac_sha256::Hash::hash(label.as_bytes());
    hex::encode(&hash[..3])
}

fn covers(prefix: &str, file: &str) -> bool {
    let prefix = prefix.trim_matches('/');
    prefix.is_empty()
        || file == prefix
        || file
            .strip_prefix(prefix)
            .map_or(false, |rest| rest.starts_with('/'))
}

/// For each file, the owners listed under the longest path prefix covering
/// it. Prefixes which only differ by slashes, such as `docs` and `docs/`,
/// are merged in key order.
pub fn match_owners(owners: &HashMap<String, Vec<String>>, files: &[String]) -> Vec<String> {
    let mut matched = Vec::new();

    for file in files {
        let mut covering: Vec<_> = owners
            .iter()
            .filter(|(prefix, _)| covers(prefix, file))
            .map(|(prefix, names)| (prefix.trim_matches('/').len(), prefix, names))
            .collect();
        covering.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1)));

        if let Some(&(longest, _, _)) = covering.first() {
            for (_, _, names) in covering.iter().take_while(|(len, _, _)| *len == longest) {
                matched.extend(names.iter().cloned());
            }
        }
    }

    dedup(&mut matched);
    matched
}

// Drops repeated names, keeping the first occurrence
fn dedup(names: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    names.retain(|name| seen.insert(name.clone()));
}

fn welcome_message(
    author: &str,
    config: &BotConfig,
    sig_name: &str,
    maintainers: &[String],
    committers: &[String],
) -> String {
    let mut message = format!(
        "\nHi ***{author}***, welcome to the {community} Community.\n\
         I'm the Bot here serving you. You can find the instructions on how to interact with me at **[Here]({link})**.\n\
         If you have any questions, please contact the SIG: [{sig}]({sig_link}/{sig}), and any of the maintainers: @{maintainers}",
        author = author,
        community = config.community_name,
        link = config.command_link,
        sig = sig_name,
        sig_link = SIG_LINK,
        maintainers = maintainers.join(" , @"),
    );

    if !committers.is_empty() {
        message.push_str(", any of the committers: @");
        message.push_str(&committers.join(" , @"));
    }

    message
}

fn short_welcome(author: &str, config: &BotConfig, sig_name: &str) -> String {
    format!(
        "\nHi ***{author}***, welcome to the {community} Community.\n\
         I'm the Bot here serving you. You can find the instructions on how to interact with me at **[Here]({link})**.\n\
         If you have any questions, please contact the SIG: [{sig}]({sig_link}/{sig}), and any of the maintainers.\n",
        author = author,
        community = config.community_name,
        link = config.command_link,
        sig = sig_name,
        sig_link = SIG_LINK,
    )
}
