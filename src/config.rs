use crate::error::ConfigError;
use serde::de::{self, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

pub const DEFAULT_LISTEN_ADDR: &str = ":9101";
pub const DEFAULT_METRICS_PATH: &str = "/metrics";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_API_URL: &str = "https://api.github.com";
pub const DEFAULT_API_VERSION: &str = "2022-11-28";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// A GitHub account whose rate limits are tracked.
#[derive(Clone, PartialEq, Eq)]
pub struct User {
    pub name: String,
    pub token: String,
}

// Keep tokens out of logs and panic messages.
impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("name", &self.name)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Settings shared by every per-account GitHub client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiSettings {
    pub api_url: String,
    pub api_version: String,
    pub user_agent: String,
    pub timeout_secs: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            user_agent: default_user_agent(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

fn default_user_agent() -> String {
    format!("github-rate-limit-exporter/{}", env!("CARGO_PKG_VERSION"))
}

/// Validated exporter configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub users: Vec<User>,
    pub listen_addr: String,
    pub metrics_path: String,
    pub poll_interval: u64,
    pub api: ApiSettings,
}

// On-disk shape shared by all formats. HCL spells the user list as repeated
// `user { .. }` blocks, which arrive either as one object or as a list.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawConfig {
    #[serde(alias = "user", deserialize_with = "one_or_many_users")]
    users: Vec<RawUser>,
    listen_addr: Option<String>,
    metrics_path: Option<String>,
    poll_interval: Option<u64>,
    api_url: Option<String>,
    api_version: Option<String>,
    user_agent: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawUser {
    #[serde(deserialize_with = "scalar_string")]
    name: String,
    #[serde(deserialize_with = "scalar_string")]
    token: String,
}

/// Accepts a list of users, a single user table, or null (no users).
fn one_or_many_users<'de, D>(deserializer: D) -> Result<Vec<RawUser>, D::Error>
where
    D: Deserializer<'de>,
{
    struct UsersVisitor;

    impl<'de> Visitor<'de> for UsersVisitor {
        type Value = Vec<RawUser>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a list of users or a single user block")
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Self::Value, D::Error> {
            d.deserialize_any(self)
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            let mut users = Vec::with_capacity(seq.size_hint().unwrap_or(0));
            while let Some(user) = seq.next_element()? {
                users.push(user);
            }
            Ok(users)
        }

        fn visit_map<A: MapAccess<'de>>(self, map: A) -> Result<Self::Value, A::Error> {
            RawUser::deserialize(de::value::MapAccessDeserializer::new(map)).map(|u| vec![u])
        }
    }

    deserializer.deserialize_any(UsersVisitor)
}

/// Strings, with bare numbers and booleans taken as their text (`token: 123`).
fn scalar_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    struct ScalarVisitor;

    impl<'de> Visitor<'de> for ScalarVisitor {
        type Value = String;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a string")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_string<E: de::Error>(self, v: String) -> Result<String, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_bool<E: de::Error>(self, v: bool) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_unit<E: de::Error>(self) -> Result<String, E> {
            Ok(String::new())
        }
    }

    deserializer.deserialize_any(ScalarVisitor)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Yaml,
    Toml,
    Hcl,
}

impl Format {
    fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "yaml" | "yml" => Ok(Format::Yaml),
            "toml" => Ok(Format::Toml),
            "hcl" => Ok(Format::Hcl),
            _ => Err(ConfigError::UnsupportedFormat(ext)),
        }
    }

    fn parse(self, content: &str) -> Result<RawConfig, ConfigError> {
        let parsed: Result<RawConfig, String> = match self {
            Format::Yaml => serde_yaml::from_str(content).map_err(|e| e.to_string()),
            Format::Toml => toml::from_str(content).map_err(|e| e.to_string()),
            Format::Hcl => hcl::from_str(content).map_err(|e| e.to_string()),
        };
        parsed.map_err(ConfigError::Parse)
    }
}

impl Config {
    /// Load and validate a config file. The format is picked from the file
    /// extension: `.yaml`/`.yml`, `.toml` or `.hcl`.
    ///
    /// Defaults apply when a field is absent (or zero for `poll_interval`):
    /// - listen_addr: `:9101`
    /// - metrics_path: `/metrics`
    /// - poll_interval: 60 seconds
    /// - api_url: `GITHUB_API_URL` env var, else https://api.github.com
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let format = Format::from_path(path)?;
        let raw = format.parse(&content)?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawConfig) -> Result<Self, ConfigError> {
        let users = validate_users(raw.users)?;

        let listen_addr = non_empty(raw.listen_addr).unwrap_or_else(|| DEFAULT_LISTEN_ADDR.into());
        validate_listen_addr(&listen_addr)?;

        let mut metrics_path =
            non_empty(raw.metrics_path).unwrap_or_else(|| DEFAULT_METRICS_PATH.into());
        if !metrics_path.starts_with('/') {
            metrics_path.insert(0, '/');
        }
        if metrics_path == "/" || metrics_path == "/health" {
            return Err(ConfigError::InvalidMetricsPath(metrics_path));
        }

        let poll_interval = match raw.poll_interval {
            None | Some(0) => DEFAULT_POLL_INTERVAL_SECS,
            Some(n) => n,
        };

        let defaults = ApiSettings::default();
        let api_url = non_empty(raw.api_url)
            .or_else(|| non_empty(std::env::var("GITHUB_API_URL").ok()))
            .unwrap_or(defaults.api_url);
        if let Err(e) = url::Url::parse(&api_url) {
            return Err(ConfigError::InvalidApiUrl {
                url: api_url,
                reason: e.to_string(),
            });
        }
        let api = ApiSettings {
            api_url: api_url.trim_end_matches('/').to_string(),
            api_version: non_empty(raw.api_version).unwrap_or(defaults.api_version),
            user_agent: non_empty(raw.user_agent).unwrap_or(defaults.user_agent),
            timeout_secs: match raw.timeout_secs {
                None | Some(0) => defaults.timeout_secs,
                Some(n) => n,
            },
        };

        Ok(Self {
            users,
            listen_addr,
            metrics_path,
            poll_interval,
            api,
        })
    }

    /// Address suitable for binding. A bare `:port` binds every interface.
    pub fn bind_addr(&self) -> String {
        if self.listen_addr.starts_with(':') {
            format!("0.0.0.0{}", self.listen_addr)
        } else {
            self.listen_addr.clone()
        }
    }
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.trim().is_empty())
}

fn validate_users(raw: Vec<RawUser>) -> Result<Vec<User>, ConfigError> {
    if raw.is_empty() {
        return Err(ConfigError::NoUsers);
    }
    let mut seen = HashSet::new();
    let mut users = Vec::with_capacity(raw.len());
    for (index, u) in raw.into_iter().enumerate() {
        if u.name.is_empty() {
            return Err(ConfigError::MissingName { index });
        }
        if u.token.is_empty() {
            return Err(ConfigError::MissingToken { name: u.name });
        }
        if !seen.insert(u.name.clone()) {
            return Err(ConfigError::DuplicateUser { name: u.name });
        }
        users.push(User {
            name: u.name,
            token: u.token,
        });
    }
    Ok(users)
}

fn validate_listen_addr(addr: &str) -> Result<(), ConfigError> {
    let port_ok = addr
        .rsplit_once(':')
        .map(|(_, port)| port.parse::<u16>().is_ok())
        .unwrap_or(false);
    if port_ok {
        Ok(())
    } else {
        Err(ConfigError::InvalidListenAddr(addr.to_string()))
    }
}
