use crate::{
    client::{Client, Result},
    User,
};

/// `RepositoryClient` handles communication with the repository related
/// methods of the platform api.
pub struct RepositoryClient<'a> {
    inner: &'a Client,
}

impl<'a> RepositoryClient<'a> {
    pub(super) fn new(client: &'a Client) -> Self {
        Self { inner: client }
    }

    /// List every collaborator of a repository, following pagination
    pub async fn list_collaborators(&self, owner: &str, repo: &str) -> Result<Vec<User>> {
        let url = format!("repos/{}/{}/collaborators", owner, repo);
        self.inner.paginate(&url).await
    }
}
