use crate::{clients::SigRegistry, Error, Result};
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{header, Client as ReqwestClient, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use std::{collections::HashMap, time::Duration};
use url::Url;

const USER_AGENT: &str = "sig-info-cache-sdk";
const DEFAULT_BACKOFF: Duration = Duration::from_millis(500);

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SigInfo {
    sig_name: String,
    maintainers: Vec<String>,
    committers: Vec<String>,
}

/// Client for the SIG information cache.
///
/// Requests failing at the transport level or with a 5xx status are retried
/// up to `max_retries` times, waiting a little longer before each attempt.
#[derive(Debug, Clone)]
pub struct SigClient {
    endpoint: Url,
    client: ReqwestClient,
    max_retries: usize,
    backoff: Duration,
}

impl SigClient {
    pub fn new(endpoint: &str, max_retries: usize) -> Result<Self> {
        let mut endpoint = endpoint.to_owned();
        if !endpoint.ends_with('/') {
            endpoint.push('/');
        }
        let endpoint = Url::parse(&endpoint)?;

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );
        let client = ReqwestClient::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            endpoint,
            client,
            max_retries,
            backoff: DEFAULT_BACKOFF,
        })
    }

    /// Sets the delay before the first retry. Later retries wait a multiple
    /// of it.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, org: &str, repo: &str) -> Result<T> {
        let url = self.endpoint.join(path)?;
        let mut attempt = 0;

        loop {
            let result = self
                .client
                .get(url.clone())
                .query(&[("org", org), ("repo", repo)])
                .send()
                .await;

            let retry = match &result {
                Ok(response) => response.status().is_server_error(),
                Err(e) => !e.is_builder(),
            };
            if retry && attempt < self.max_retries {
                attempt += 1;
                match &result {
                    Ok(response) => warn!("{} returned {}, retry {}", url, response.status(), attempt),
                    Err(e) => warn!("requesting {}: {}, retry {}", url, e, attempt),
                }
                tokio::time::sleep(self.backoff * attempt as u32).await;
                continue;
            }

            let response = result?;
            let status = response.status();
            debug!("sig cache response: {} {}", status, response.url());
            if status != StatusCode::OK {
                let text = response.text().await.unwrap_or_default();
                return Err(Error::Message(
                    format!("{} returned {}: {}", url, status, text).into(),
                ));
            }

            let envelope: Envelope<T> = response.json().await?;
            return Ok(envelope.data);
        }
    }

    async fn sig_info(&self, org: &str, repo: &str) -> Result<SigInfo> {
        self.get("sig", org, repo).await
    }
}

#[async_trait]
impl SigRegistry for SigClient {
    async fn sig_name(&self, org: &str, repo: &str) -> Result<String> {
        let info = self.sig_info(org, repo).await?;
        if info.sig_name.is_empty() {
            return Err(format!("cant get sig name of repo: {}/{}", org, repo).into());
        }
        Ok(info.sig_name)
    }

    async fn maintainers(&self, org: &str, repo: &str) -> Result<Vec<String>> {
        Ok(self.sig_info(org, repo).await?.maintainers)
    }

    async fn committers(&self, org: &str, repo: &str) -> Result<Vec<String>> {
        Ok(self.sig_info(org, repo).await?.committers)
    }

    async fn owners(&self, org: &str, repo: &str) -> Result<HashMap<String, Vec<String>>> {
        self.get("owners", org, repo).await
    }
}

#[cfg(test)]
mod test {
    use super::SigClient;
    use crate::clients::SigRegistry;
    use hyper::{
        service::{make_service_fn, service_fn},
        Body, Request, Response, Server, StatusCode,
    };
    use std::{
        convert::Infallible,
        net::SocketAddr,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        time::Duration,
    };

    // Serves `body` for every request after answering the first `failures`
    // requests with a 503.
    fn serve(failures: usize, body: &'static str) -> (SocketAddr, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        let make_service = make_service_fn(move |_| {
            let counter = counter.clone();
            async move {
                Ok::<_, Infallible>(service_fn(move |request: Request<Body>| {
                    let hit = counter.fetch_add(1, Ordering::SeqCst);
                    let query = request.uri().query().unwrap_or_default().to_owned();
                    async move {
                        if hit < failures {
                            Response::builder()
                                .status(StatusCode::SERVICE_UNAVAILABLE)
                                .body(Body::empty())
                        } else if !query.contains("org=org1") || !query.contains("repo=repo1") {
                            Response::builder()
                                .status(StatusCode::BAD_REQUEST)
                                .body(Body::empty())
                        } else {
                            Response::builder().body(Body::from(body))
                        }
                    }
                }))
            }
        });

        let server = Server::bind(&([127, 0, 0, 1], 0).into()).serve(make_service);
        let addr = server.local_addr();
        tokio::spawn(server);
        (addr, hits)
    }

    fn client(addr: SocketAddr, max_retries: usize) -> SigClient {
        SigClient::new(&format!("http://{}/v1", addr), max_retries)
            .unwrap()
            .with_backoff(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn sig_info() {
        let (addr, _) = serve(
            0,
            r#"{"data":{"sig_name":"Kernel","maintainers":["bob"],"committers":["carol"]}}"#,
        );
        let client = client(addr, 0);

        assert_eq!(client.sig_name("org1", "repo1").await.unwrap(), "Kernel");
        assert_eq!(client.maintainers("org1", "repo1").await.unwrap(), vec!["bob"]);
        assert_eq!(client.committers("org1", "repo1").await.unwrap(), vec!["carol"]);
    }

    #[tokio::test]
    async fn missing_sig_name_is_an_error() {
        let (addr, _) = serve(0, r#"{"data":{"maintainers":["bob"]}}"#);
        assert!(client(addr, 0).sig_name("org1", "repo1").await.is_err());
    }

    #[tokio::test]
    async fn owners() {
        let (addr, _) = serve(0, r#"{"data":{"":["root"],"docs":["dan"]}}"#);
        let owners = client(addr, 0).owners("org1", "repo1").await.unwrap();
        assert_eq!(owners[""], vec!["root"]);
        assert_eq!(owners["docs"], vec!["dan"]);
    }

    #[tokio::test]
    async fn retries_server_errors() {
        let (addr, hits) = serve(2, r#"{"data":{"sig_name":"Kernel"}}"#);
        assert_eq!(client(addr, 3).sig_name("org1", "repo1").await.unwrap(), "Kernel");
        assert_eq!(hits.load(Ordering::SeqCst), 3);

        let (addr, hits) = serve(5, r#"{"data":{"sig_name":"Kernel"}}"#);
        assert!(client(addr, 2).sig_name("org1", "repo1").await.is_err());
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn endpoint_gets_trailing_slash() {
        let client = SigClient::new("http://localhost:8888/v1/file", 3).unwrap();
        assert_eq!(client.endpoint().as_str(), "http://localhost:8888/v1/file/");
        assert!(SigClient::new("not a url", 3).is_err());
    }
}
