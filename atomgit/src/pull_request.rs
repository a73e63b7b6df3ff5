use serde::Deserialize;

/// A file touched by a pull request
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct PullRequestFile {
    pub sha: String,
    pub filename: String,
    pub status: String,
    pub additions: u64,
    pub deletions: u64,
    pub changes: u64,
}
