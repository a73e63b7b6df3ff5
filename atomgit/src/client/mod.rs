use log::{debug, warn};
use reqwest::{header, Client as ReqwestClient, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;

mod error;
mod issues;
mod pagination;
mod pulls;
mod rate_limit;
mod repos;

pub use error::{ApiError, Error, Result};
pub use issues::IssuesClient;
pub use pagination::{Pagination, PaginationOptions};
pub use pulls::PullsClient;
pub use rate_limit::Rate;
pub use repos::RepositoryClient;

// Constants
const DEFAULT_BASE_URL: &str = "https://api.atomgit.com/";
const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

const HEADER_LINK: &str = "Link";
const HEADER_RATE_LIMIT: &str = "X-RateLimit-Limit";
const HEADER_RATE_REMAINING: &str = "X-RateLimit-Remaining";
const HEADER_RATE_RESET: &str = "X-RateLimit-Reset";

const MEDIA_TYPE_JSON: &str = "application/json";

/// Number of items requested per page when walking paginated endpoints
const PER_PAGE: usize = 100;

/// A successful api response along with the paging and rate limit state
/// reported in its headers.
#[derive(Debug)]
pub struct Response<T> {
    pagination: Pagination,
    rate: Rate,
    inner: T,
}

impl<T> Response<T> {
    pub fn new(pagination: Pagination, rate: Rate, inner: T) -> Self {
        Self {
            pagination,
            rate,
            inner,
        }
    }

    pub fn pagination(&self) -> &Pagination {
        &self.pagination
    }

    pub fn rate(&self) -> &Rate {
        &self.rate
    }

    pub fn into_inner(self) -> T {
        self.inner
    }

    pub fn into_parts(self) -> (Pagination, Rate, T) {
        (self.pagination, self.rate, self.inner)
    }
}

// The page to request after `current`, if any. A `next` link which doesn't
// move forward ends the walk.
fn next_page(pagination: &Pagination, current: usize, empty: bool) -> Option<usize> {
    pagination
        .next_page
        .filter(|&next| !empty && next > current)
}

#[derive(Debug)]
pub struct ClientBuilder {
    base_url: Option<String>,
    user_agent: Option<String>,
    api_token: Option<String>,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self {
            base_url: None,
            user_agent: None,
            api_token: None,
        }
    }

    pub fn base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn user_agent<S: Into<String>>(mut self, user_agent: S) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn api_token<S: Into<String>>(mut self, api_token: S) -> Self {
        self.api_token = Some(api_token.into());
        self
    }

    pub fn build(self) -> Result<Client> {
        let mut base_url = self.base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_owned());
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        let user_agent = self.user_agent.unwrap_or_else(|| USER_AGENT.to_owned());

        let mut headers = header::HeaderMap::new();
        headers.insert(header::ACCEPT, header::HeaderValue::from_static(MEDIA_TYPE_JSON));
        if let Some(token) = &self.api_token {
            headers.insert(
                header::AUTHORIZATION,
                header::HeaderValue::from_str(&format!("token {}", token))
                    .map_err(|e| e.to_string())?,
            );
        }

        let client = ReqwestClient::builder()
            .user_agent(&user_agent)
            .default_headers(headers)
            .build()?;

        Ok(Client { base_url, client })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// REST client for the code hosting platform.
#[derive(Debug, Clone)]
pub struct Client {
    /// Base URL to use for API requests. Always terminated with a trailing
    /// slash.
    base_url: String,

    /// Client used to make http requests
    client: ReqwestClient,
}

impl Client {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get(&self, url: &str) -> RequestBuilder {
        self.request(Method::GET, url)
    }

    fn post(&self, url: &str) -> RequestBuilder {
        self.request(Method::POST, url)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, url);
        self.client.request(method, &url)
    }

    // Turns a failed response into an `Error::Api` carrying whatever message
    // the platform sent back.
    async fn check_response(&self, response: reqwest::Response) -> Result<reqwest::Response> {
        debug!("api response: {} {}", response.status(), response.url());

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS {
            let rate = Rate::from_headers(response.headers());
            if rate.is_exhausted() {
                warn!("api rate limit exhausted, resets at {}", rate.reset);
                return Err(Error::RateLimit);
            }
        }

        let text = response.text().await.unwrap_or_default();
        let error = serde_json::from_str::<ApiError>(&text).unwrap_or_else(|_| ApiError {
            message: Some(text),
            errors: None,
            documentation_url: None,
        });
        Err(Error::Api(status, error))
    }

    // Process a response received from the platform. This checks for
    // failures and then deserializes the json response.
    async fn json<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<Response<T>> {
        let response = self.check_response(response).await?;
        let pagination = Pagination::from_headers(response.headers());
        let rate = Rate::from_headers(response.headers());
        let inner = response.json().await?;

        Ok(Response::new(pagination, rate, inner))
    }

    // Walks every page of a paginated list endpoint
    async fn paginate<T: DeserializeOwned>(&self, url: &str) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut options = PaginationOptions {
            page: None,
            per_page: Some(PER_PAGE),
        };

        loop {
            let request = self.get(url).query(&options);
            let (pagination, _rate, mut page) =
                self.json::<Vec<T>>(request.send().await?).await?.into_parts();
            let empty = page.is_empty();
            items.append(&mut page);

            let current = options.page.unwrap_or(1);
            match next_page(&pagination, current, empty) {
                Some(next) => options.page = Some(next),
                None => break,
            }
        }

        Ok(items)
    }

    pub fn issues(&self) -> IssuesClient {
        IssuesClient::new(self)
    }

    pub fn pulls(&self) -> PullsClient {
        PullsClient::new(self)
    }

    pub fn repos(&self) -> RepositoryClient {
        RepositoryClient::new(self)
    }
}

#[cfg(test)]
mod test {
    use super::{next_page, Client, Pagination};

    #[test]
    fn base_url_has_trailing_slash() {
        let client = Client::builder()
            .base_url("http://localhost:8080/api/v5")
            .api_token("abc")
            .build()
            .unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080/api/v5/");

        let client = Client::builder().build().unwrap();
        assert_eq!(client.base_url(), "https://api.atomgit.com/");
    }

    #[test]
    fn paging_stops_when_next_does_not_advance() {
        let pagination = |next| Pagination {
            next_page: next,
            ..Default::default()
        };

        assert_eq!(next_page(&pagination(Some(2)), 1, false), Some(2));
        assert_eq!(next_page(&pagination(Some(2)), 1, true), None);
        assert_eq!(next_page(&pagination(None), 1, false), None);
        assert_eq!(next_page(&pagination(Some(3)), 3, false), None);
        assert_eq!(next_page(&pagination(Some(1)), 4, false), None);
    }

    #[test]
    fn invalid_token_is_an_error() {
        assert!(Client::builder().api_token("bad\ntoken").build().is_err());
    }
}
