use crate::{
    client::{Client, Response, Result},
    PullRequestFile,
};
use serde::{Deserialize, Serialize};

/// `PullsClient` handles communication with the pull request related methods
/// of the platform api.
pub struct PullsClient<'a> {
    inner: &'a Client,
}

impl<'a> PullsClient<'a> {
    pub(super) fn new(client: &'a Client) -> Self {
        Self { inner: client }
    }

    /// List the files changed by a pull request, following pagination
    pub async fn list_files(
        &self,
        owner: &str,
        repo: &str,
        pull_number: u64,
    ) -> Result<Vec<PullRequestFile>> {
        let url = format!("repos/{}/{}/pulls/{}/files", owner, repo, pull_number);
        self.inner.paginate(&url).await
    }

    /// Request reviews from users
    pub async fn create_review_request(
        &self,
        owner: &str,
        repo: &str,
        pull_number: u64,
        reviewers: Vec<String>,
    ) -> Result<Response<RequestedReviewers>> {
        #[derive(Debug, Serialize)]
        struct CreateReviewRequest {
            reviewers: Vec<String>,
        }

        let request = CreateReviewRequest { reviewers };
        let url = format!(
            "repos/{}/{}/pulls/{}/requested_reviewers",
            owner, repo, pull_number
        );
        let response = self.inner.post(&url).json(&request).send().await?;

        self.inner.json(response).await
    }
}

/// The part of the pull request returned after requesting reviewers
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RequestedReviewers {
    pub number: u64,
    pub requested_reviewers: Vec<crate::User>,
}
