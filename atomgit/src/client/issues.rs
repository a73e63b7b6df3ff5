use crate::{
    client::{Client, Response, Result},
    Comment, Label,
};
use serde::Serialize;

/// `IssuesClient` handles communication with the issue related methods of the
/// platform api. Pull requests are issues too, so comments and labels on a
/// pull request go through here as well.
pub struct IssuesClient<'a> {
    inner: &'a Client,
}

impl<'a> IssuesClient<'a> {
    pub(super) fn new(client: &'a Client) -> Self {
        Self { inner: client }
    }

    /// Create a Comment
    pub async fn create_comment(
        &self,
        owner: &str,
        repo: &str,
        issue_number: u64,
        body: &str,
    ) -> Result<Response<Comment>> {
        #[derive(Debug, Serialize)]
        struct CreateCommentRequest<'a> {
            body: &'a str,
        }

        let request = CreateCommentRequest { body };
        let url = format!("repos/{}/{}/issues/{}/comments", owner, repo, issue_number);
        let response = self.inner.post(&url).json(&request).send().await?;

        self.inner.json(response).await
    }

    // Labels Endpoint

    /// List every label of a repository, following pagination
    pub async fn list_labels_for_repo(&self, owner: &str, repo: &str) -> Result<Vec<Label>> {
        let url = format!("repos/{}/{}/labels", owner, repo);
        self.inner.paginate(&url).await
    }

    /// Create a label
    pub async fn create_label(
        &self,
        owner: &str,
        repo: &str,
        name: &str,
        color: &str,
        description: Option<&str>,
    ) -> Result<Response<Label>> {
        #[derive(Debug, Serialize)]
        struct CreateLabelRequest<'a> {
            name: &'a str,
            color: &'a str,
            #[serde(skip_serializing_if = "Option::is_none")]
            description: Option<&'a str>,
        }

        let request = CreateLabelRequest {
            name,
            color,
            description,
        };
        let url = format!("repos/{}/{}/labels", owner, repo);
        let response = self.inner.post(&url).json(&request).send().await?;

        self.inner.json(response).await
    }

    /// Add labels to an issue or pull request
    pub async fn add_labels(
        &self,
        owner: &str,
        repo: &str,
        issue_number: u64,
        labels: Vec<String>,
    ) -> Result<Response<Vec<Label>>> {
        #[derive(Debug, Serialize)]
        struct AddLabelRequest {
            labels: Vec<String>,
        }

        let request = AddLabelRequest { labels };
        let url = format!("repos/{}/{}/issues/{}/labels", owner, repo, issue_number);
        let response = self.inner.post(&url).json(&request).send().await?;

        self.inner.json(response).await
    }
}
