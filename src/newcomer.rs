use crate::{clients::ContributorIndex, Error, Result};
use async_trait::async_trait;
use log::debug;
use reqwest::Client as ReqwestClient;
use serde::Deserialize;
use url::Url;

pub const DEFAULT_NEWCOMER_ENDPOINT: &str = "https://ipb.osinfra.cn/pulls";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PullRequestTotal {
    total: u64,
}

/// Looks up how many pull requests an author has opened in the community.
#[derive(Debug, Clone)]
pub struct NewcomerClient {
    endpoint: Url,
    client: ReqwestClient,
}

impl NewcomerClient {
    pub fn new(endpoint: &str) -> Result<Self> {
        Ok(Self {
            endpoint: Url::parse(endpoint)?,
            client: ReqwestClient::new(),
        })
    }
}

#[async_trait]
impl ContributorIndex for NewcomerClient {
    async fn pull_request_count(&self, author: &str) -> Result<u64> {
        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&[("author", author)])
            .send()
            .await?;

        let status = response.status();
        debug!("newcomer index response: {} {}", status, response.url());
        if !status.is_success() {
            return Err(Error::Message(
                format!("newcomer index returned {}", status).into(),
            ));
        }

        let total: PullRequestTotal = response.json().await?;
        Ok(total.total)
    }
}

#[cfg(test)]
mod test {
    use super::NewcomerClient;
    use crate::clients::ContributorIndex;
    use hyper::{
        service::{make_service_fn, service_fn},
        Body, Request, Response, Server,
    };
    use std::convert::Infallible;

    #[tokio::test]
    async fn pull_request_count() {
        let make_service = make_service_fn(|_| async {
            Ok::<_, Infallible>(service_fn(|request: Request<Body>| async move {
                let body = match request.uri().query() {
                    Some("author=alice") => r#"{"total":0}"#,
                    Some("author=bob") => r#"{"total":12}"#,
                    _ => "{}",
                };
                Ok::<_, Infallible>(Response::new(Body::from(body)))
            }))
        });
        let server = Server::bind(&([127, 0, 0, 1], 0).into()).serve(make_service);
        let addr = server.local_addr();
        tokio::spawn(server);

        let client = NewcomerClient::new(&format!("http://{}/pulls", addr)).unwrap();
        assert_eq!(client.pull_request_count("alice").await.unwrap(), 0);
        assert_eq!(client.pull_request_count("bob").await.unwrap(), 12);
        assert_eq!(client.pull_request_count("carol").await.unwrap(), 0);
    }
}
