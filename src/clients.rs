use crate::Result;
use async_trait::async_trait;
use std::collections::HashMap;

/// The code hosting platform operations the bot needs.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Comment on an issue or pull request
    async fn create_comment(&self, org: &str, repo: &str, number: u64, body: &str) -> Result<()>;

    /// Names of every label defined in the repository
    async fn list_labels(&self, org: &str, repo: &str) -> Result<Vec<String>>;

    async fn create_label(&self, org: &str, repo: &str, name: &str, color: &str) -> Result<()>;

    /// Apply labels to an issue or pull request
    async fn add_labels(&self, org: &str, repo: &str, number: u64, labels: &[String])
        -> Result<()>;

    async fn list_collaborators(&self, org: &str, repo: &str) -> Result<Vec<String>>;

    /// Paths of the files changed by a pull request
    async fn list_pr_files(&self, org: &str, repo: &str, number: u64) -> Result<Vec<String>>;

    async fn request_reviewers(
        &self,
        org: &str,
        repo: &str,
        number: u64,
        reviewers: &[String],
    ) -> Result<()>;
}

/// Who runs a repository according to the SIG registry.
#[async_trait]
pub trait SigRegistry: Send + Sync {
    async fn sig_name(&self, org: &str, repo: &str) -> Result<String>;

    async fn maintainers(&self, org: &str, repo: &str) -> Result<Vec<String>>;

    async fn committers(&self, org: &str, repo: &str) -> Result<Vec<String>>;

    /// Owners by path prefix, an empty prefix covers the whole repository
    async fn owners(&self, org: &str, repo: &str) -> Result<HashMap<String, Vec<String>>>;
}

/// Counts the pull requests an author already contributed.
#[async_trait]
pub trait ContributorIndex: Send + Sync {
    async fn pull_request_count(&self, author: &str) -> Result<u64>;
}

#[async_trait]
impl Platform for atomgit::Client {
    async fn create_comment(&self, org: &str, repo: &str, number: u64, body: &str) -> Result<()> {
        self.issues().create_comment(org, repo, number, body).await?;
        Ok(())
    }

    async fn list_labels(&self, org: &str, repo: &str) -> Result<Vec<String>> {
        let labels = self.issues().list_labels_for_repo(org, repo).await?;
        Ok(labels.into_iter().map(|label| label.name).collect())
    }

    async fn create_label(&self, org: &str, repo: &str, name: &str, color: &str) -> Result<()> {
        self.issues()
            .create_label(org, repo, name, color, None)
            .await?;
        Ok(())
    }

    async fn add_labels(
        &self,
        org: &str,
        repo: &str,
        number: u64,
        labels: &[String],
    ) -> Result<()> {
        self.issues()
            .add_labels(org, repo, number, labels.to_vec())
            .await?;
        Ok(())
    }

    async fn list_collaborators(&self, org: &str, repo: &str) -> Result<Vec<String>> {
        let users = self.repos().list_collaborators(org, repo).await?;
        Ok(users.into_iter().map(|user| user.login).collect())
    }

    async fn list_pr_files(&self, org: &str, repo: &str, number: u64) -> Result<Vec<String>> {
        let files = self.pulls().list_files(org, repo, number).await?;
        Ok(files.into_iter().map(|file| file.filename).collect())
    }

    async fn request_reviewers(
        &self,
        org: &str,
        repo: &str,
        number: u64,
        reviewers: &[String],
    ) -> Result<()> {
        self.pulls()
            .create_review_request(org, repo, number, reviewers.to_vec())
            .await?;
        Ok(())
    }
}
