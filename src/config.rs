use anyhow::{bail, ensure};
use serde::Deserialize;

/// The bot's configuration file.
///
/// ```toml
/// [[config_items]]
/// repos = ["openeuler", "src-openeuler/kernel"]
/// excluded_repos = ["openeuler/private"]
/// community_name = "openEuler"
/// command_link = "https://atomgit.com/openeuler/community/command.md"
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct Configuration {
    #[serde(default)]
    pub config_items: Vec<BotConfig>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Organisations (`org`) or single repositories (`org/repo`) this entry
    /// applies to
    pub repos: Vec<String>,
    /// Repositories (`org/repo`) of a listed organisation to leave out
    pub excluded_repos: Vec<String>,
    pub community_name: String,
    /// Where the bot's command reference lives
    pub command_link: String,
    /// Request the maintainers as reviewers of new pull requests
    pub need_assign: bool,
    /// Post the short welcome without naming anybody
    pub no_need_to_notice: bool,
    /// Pick maintainers from the owners of the changed paths instead of the
    /// SIG
    pub welcome_simpler: bool,
}

impl BotConfig {
    fn validate(&self) -> anyhow::Result<()> {
        ensure!(!self.repos.is_empty(), "repos must not be empty");
        ensure!(!self.community_name.is_empty(), "missing community_name");
        ensure!(!self.command_link.is_empty(), "missing command_link");

        for repo in self.repos.iter().chain(&self.excluded_repos) {
            let well_formed = match repo.split_once('/') {
                Some((org, name)) => !org.is_empty() && !name.is_empty() && !name.contains('/'),
                None => !repo.is_empty(),
            };
            if !well_formed {
                bail!("invalid repository {:?}", repo);
            }
        }

        for repo in &self.excluded_repos {
            ensure!(
                repo.contains('/'),
                "excluded repository {:?} must be in org/repo form",
                repo
            );
        }

        Ok(())
    }

    fn names_repo(&self, full_name: &str) -> bool {
        self.repos.iter().any(|r| r == full_name)
    }

    fn names_org(&self, org: &str, full_name: &str) -> bool {
        self.repos.iter().any(|r| r == org) && !self.excluded_repos.iter().any(|r| r == full_name)
    }
}

impl Configuration {
    /// The entry for `org/repo`. An entry naming the repository wins over one
    /// naming its organisation.
    pub fn config_for(&self, org: &str, repo: &str) -> Option<&BotConfig> {
        let full_name = format!("{}/{}", org, repo);

        self.config_items
            .iter()
            .find(|c| c.names_repo(&full_name))
            .or_else(|| {
                self.config_items
                    .iter()
                    .find(|c| c.names_org(org, &full_name))
            })
    }
}

impl probot::Configuration for Configuration {
    fn validate(&self) -> anyhow::Result<()> {
        for (i, item) in self.config_items.iter().enumerate() {
            item.validate()
                .map_err(|e| e.context(format!("config_items[{}]", i)))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::Configuration;
    use probot::Configuration as _;

    const CONFIG: &str = r#"
[[config_items]]
repos = ["org1", "org2/special"]
excluded_repos = ["org1/private"]
community_name = "openEuler"
command_link = "https://example.com/commands"

[[config_items]]
repos = ["org2/special"]
community_name = "Special"
command_link = "https://example.com/special"
need_assign = true
"#;

    #[test]
    fn lookup() {
        let config: Configuration = toml::from_str(CONFIG).unwrap();
        config.validate().unwrap();

        assert_eq!(
            config.config_for("org1", "repo1").unwrap().community_name,
            "openEuler"
        );
        assert!(config.config_for("org1", "private").is_none());
        assert!(config.config_for("org3", "repo1").is_none());

        // the first entry naming the repository is used
        let special = config.config_for("org2", "special").unwrap();
        assert_eq!(special.community_name, "openEuler");
        assert!(!special.need_assign);
    }

    #[test]
    fn validation() {
        let config: Configuration = toml::from_str(
            r#"
[[config_items]]
repos = ["org1/"]
community_name = "c"
command_link = "l"
"#,
        )
        .unwrap();
        let error = config.validate().unwrap_err();
        assert!(format!("{:#}", error).contains("config_items[0]"));

        let config: Configuration = toml::from_str(
            r#"
[[config_items]]
repos = ["org1"]
command_link = "l"
"#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }
}
