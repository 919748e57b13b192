use crate::config::{ApiSettings, User};
use crate::error::FetchError;
use crate::types::RateLimits;
use async_trait::async_trait;
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::Client;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Anything that can report the current rate-limit status of one account.
#[async_trait]
pub trait RateLimitSource: Send + Sync {
    async fn fetch_rate_limits(&self) -> Result<RateLimits, FetchError>;
}

pub fn build_client(api: &ApiSettings, user: &User) -> Result<Client, FetchError> {
    let mut default_headers = HeaderMap::new();
    let ua = HeaderValue::from_str(&api.user_agent)
        .unwrap_or_else(|_| HeaderValue::from_static("github-rate-limit-exporter"));
    default_headers.insert(USER_AGENT, ua);
    default_headers.insert(AUTHORIZATION, auth_header(user)?);
    default_headers.insert(
        ACCEPT,
        HeaderValue::from_static("application/vnd.github+json"),
    );
    if let Ok(v) = HeaderValue::from_str(&api.api_version) {
        default_headers.insert("X-GitHub-Api-Version", v);
    }
    Client::builder()
        .default_headers(default_headers)
        .timeout(Duration::from_secs(api.timeout_secs))
        .use_rustls_tls()
        .build()
        .map_err(FetchError::Build)
}

fn auth_header(user: &User) -> Result<HeaderValue, FetchError> {
    let mut v = HeaderValue::from_str(&format!("Bearer {}", user.token)).map_err(|_| {
        FetchError::InvalidToken {
            account: user.name.clone(),
        }
    })?;
    v.set_sensitive(true);
    Ok(v)
}

/// Authenticated client for one account. Construction does no I/O.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    account: String,
    url: String,
    http: Client,
}

impl GitHubClient {
    pub fn new(api: &ApiSettings, user: &User) -> Result<Self, FetchError> {
        Ok(Self {
            account: user.name.clone(),
            url: format!("{}/rate_limit", api.api_url),
            http: build_client(api, user)?,
        })
    }
}

#[async_trait]
impl RateLimitSource for GitHubClient {
    async fn fetch_rate_limits(&self) -> Result<RateLimits, FetchError> {
        debug!("GET {} for {}", self.url, self.account);
        let res = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(FetchError::Transport)?;
        let status = res.status();
        if !status.is_success() {
            let message = res.text().await.unwrap_or_default();
            return Err(FetchError::Status { status, message });
        }
        res.json::<RateLimits>().await.map_err(FetchError::Decode)
    }
}

/// One rate-limit source per account, keyed by account name.
#[derive(Clone, Default)]
pub struct ClientPool {
    sources: BTreeMap<String, Arc<dyn RateLimitSource>>,
}

impl ClientPool {
    /// Build a GitHub client for every configured user.
    pub fn new(users: &[User], api: &ApiSettings) -> Result<Self, FetchError> {
        let mut pool = Self::default();
        for user in users {
            pool.insert(user.name.clone(), Arc::new(GitHubClient::new(api, user)?));
        }
        Ok(pool)
    }

    /// Register a source. A later insert under the same name replaces the
    /// earlier one.
    pub fn insert(&mut self, account: impl Into<String>, source: Arc<dyn RateLimitSource>) {
        self.sources.insert(account.into(), source);
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn accounts(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn RateLimitSource>)> {
        self.sources.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(name: &str, token: &str) -> User {
        User {
            name: name.into(),
            token: token.into(),
        }
    }

    #[test]
    fn pool_has_one_client_per_user() {
        let api = ApiSettings::default();
        let pool = ClientPool::new(&[user("alice", "t1"), user("bob", "t2")], &api).unwrap();
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.accounts().collect::<Vec<_>>(), vec!["alice", "bob"]);
    }

    #[test]
    fn client_targets_rate_limit_endpoint() {
        let api = ApiSettings {
            api_url: "https://ghe.example.com/api/v3".into(),
            ..ApiSettings::default()
        };
        let c = GitHubClient::new(&api, &user("alice", "t1")).unwrap();
        assert_eq!(c.url, "https://ghe.example.com/api/v3/rate_limit");
        assert_eq!(c.account, "alice");
    }

    #[test]
    fn token_with_newline_is_rejected() {
        let err = GitHubClient::new(&ApiSettings::default(), &user("alice", "bad\ntoken"))
            .unwrap_err();
        assert!(matches!(err, FetchError::InvalidToken { account } if account == "alice"));
    }
}
