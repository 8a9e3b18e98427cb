use std::time::Duration;

use filestore_core::StorageError;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client as HttpClient, Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::GitHubConfig;

const MAX_RETRIES: u32 = 5;
const BASE_DELAY_MS: u64 = 200;
const API_VERSION: &str = "2022-11-28";

/// GitHub REST API client scoped to one repository.
///
/// Every request carries the token, the v3 media type and the pinned API
/// version. Rate limiting (429) is retried for every method; gateway errors
/// (502/503/504) only for GET, since a write may have been applied.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: HttpClient,
    api_url: Url,
    owner: String,
    repo: String,
    timeout: Duration,
}

impl GitHubClient {
    pub fn new(config: &GitHubConfig) -> Result<Self, StorageError> {
        config.validate()?;

        let api_url = Url::parse(&config.api_url).map_err(|e| {
            StorageError::Validation(format!("Invalid API URL \"{}\": {}", config.api_url, e))
        })?;
        if api_url.cannot_be_a_base() {
            return Err(StorageError::Validation(format!(
                "Invalid API URL \"{}\"",
                config.api_url
            )));
        }

        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.token.trim()))
            .map_err(|_| StorageError::Validation("GitHub token contains invalid characters".into()))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert("X-GitHub-Api-Version", HeaderValue::from_static(API_VERSION));

        let http = HttpClient::builder()
            .default_headers(headers)
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout)
            .build()
            .map_err(|e| StorageError::Transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_url,
            owner: config.owner.clone(),
            repo: config.repo.clone(),
            timeout: config.timeout,
        })
    }

    /// `owner/repo`
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    /// `{api_url}/repos/{owner}/{repo}/{segments...}`, each segment percent-encoded.
    pub fn repo_url<'a>(
        &self,
        segments: impl IntoIterator<Item = &'a str>,
    ) -> Result<Url, StorageError> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|_| StorageError::Validation(format!("Invalid API URL \"{}\"", self.api_url)))?
            .pop_if_empty()
            .push("repos")
            .push(&self.owner)
            .push(&self.repo)
            .extend(segments);
        Ok(url)
    }

    /// Send a request, retrying with exponential backoff on retryable statuses.
    ///
    /// The final response is returned whatever its status; classification is
    /// left to [`check_status`].
    pub async fn send(
        &self,
        method: Method,
        url: Url,
        build_request: impl Fn(RequestBuilder) -> RequestBuilder,
    ) -> Result<Response, StorageError> {
        let mut delay = Duration::from_millis(BASE_DELAY_MS);
        let mut attempt = 0;

        loop {
            let response = build_request(self.http.request(method.clone(), url.clone()))
                .send()
                .await
                .map_err(|e| self.transport_error(e))?;

            let status = response.status();
            if !is_retryable(&method, status) || attempt == MAX_RETRIES {
                debug!("{} {} -> {}", method, url.path(), status);
                return Ok(response);
            }

            attempt += 1;
            warn!(
                attempt,
                status = status.as_u16(),
                delay_ms = delay.as_millis() as u64,
                "GitHub request to {} throttled, retrying",
                url.path()
            );
            tokio::time::sleep(delay).await;
            delay *= 2;
        }
    }

    fn transport_error(&self, e: reqwest::Error) -> StorageError {
        if e.is_timeout() {
            StorageError::Timeout(self.timeout.as_millis() as u64)
        } else {
            StorageError::Transport(format!("GitHub request failed: {}", e))
        }
    }
}

fn is_retryable(method: &Method, status: StatusCode) -> bool {
    match status {
        StatusCode::TOO_MANY_REQUESTS => true,
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
            *method == Method::GET
        }
        _ => false,
    }
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Map a non-success response onto the storage taxonomy.
///
/// 404 is `NotFound` for `path`; 409 and 422 are handed to `on_conflict`
/// since their meaning depends on the operation.
pub async fn check_status(
    response: Response,
    path: &str,
    on_conflict: impl FnOnce() -> StorageError,
) -> Result<Response, StorageError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    match status {
        StatusCode::NOT_FOUND => Err(StorageError::NotFound {
            path: path.to_string(),
        }),
        StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
            debug!("GitHub rejected write to {} ({}): {}", path, status, body);
            Err(on_conflict())
        }
        _ => {
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|b| b.message)
                .unwrap_or_else(|_| status.canonical_reason().unwrap_or("Request failed").to_string());
            Err(StorageError::Api {
                status: status.as_u16(),
                message,
                body,
            })
        }
    }
}

pub async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, StorageError> {
    response
        .json::<T>()
        .await
        .map_err(|e| StorageError::Serialization(format!("Invalid GitHub response: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_policy() {
        assert!(is_retryable(&Method::GET, StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable(&Method::PUT, StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable(&Method::GET, StatusCode::SERVICE_UNAVAILABLE));
        assert!(!is_retryable(&Method::PUT, StatusCode::SERVICE_UNAVAILABLE));
        assert!(!is_retryable(&Method::POST, StatusCode::BAD_GATEWAY));
        assert!(!is_retryable(&Method::GET, StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[test]
    fn urls_are_segment_encoded() {
        let config = GitHubConfig::new("octo", "notes", "tkn");
        let client = GitHubClient::new(&config).unwrap();

        let url = client
            .repo_url(["contents", "docs", "my file#1.md"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.github.com/repos/octo/notes/contents/docs/my%20file%231.md"
        );
    }

    #[test]
    fn enterprise_prefix_is_kept() {
        let config =
            GitHubConfig::new("octo", "notes", "tkn").with_api_url("https://ghe.example.com/api/v3");
        let client = GitHubClient::new(&config).unwrap();

        let url = client.repo_url(["git", "blobs"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://ghe.example.com/api/v3/repos/octo/notes/git/blobs"
        );
    }
}
