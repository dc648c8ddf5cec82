use crate::client::HttpClient;
use crate::error::{Error, Result};
use crate::resources::{ApiRole, Criterion, MatchPolicy, MobileDeviceGroup};
use crate::state::{DesiredState, Ensure};
use std::fmt;
use std::fs::File;
use std::path::Path;
use std::time::Duration;
use url::Url;

/// A manifest of resources to converge.
#[derive(Clone, Debug, serde::Deserialize)]
pub struct Config {
    #[serde(default)]
    pub resources: Vec<ResourceConfig>,
}

#[derive(Clone, Debug, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResourceConfig {
    ApiRole(ApiRoleConfig),
    MobileDeviceGroup(MobileDeviceGroupConfig),
}

impl ResourceConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ApiRole(_) => "api_role",
            Self::MobileDeviceGroup(_) => "mobile_device_group",
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::ApiRole(config) => &config.name,
            Self::MobileDeviceGroup(config) => &config.name,
        }
    }
}

/// How to reach and authenticate against the server.
#[derive(Clone, serde::Deserialize)]
pub struct ConnectionConfig {
    /// Base URL of the server
    pub api_url: Url,

    #[serde(default)]
    pub auth_token: Option<String>,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Clustered cloud instance, requires `jamf_cookie`
    #[serde(default)]
    pub is_cloud: bool,

    #[serde(default)]
    pub jamf_cookie: Option<String>,

    #[serde(default)]
    pub redirect_limit: Option<usize>,

    /// Network timeout per request
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,

    /// Ignore cert validation
    #[serde(default)]
    pub insecure_tls: bool,

    #[serde(default)]
    pub match_policy: MatchPolicy,
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redacted = |value: &Option<String>| value.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("ConnectionConfig")
            .field("api_url", &self.api_url.as_str())
            .field("auth_token", &redacted(&self.auth_token))
            .field("username", &self.username)
            .field("password", &redacted(&self.password))
            .field("is_cloud", &self.is_cloud)
            .field("jamf_cookie", &redacted(&self.jamf_cookie))
            .field("redirect_limit", &self.redirect_limit)
            .field("timeout", &self.timeout)
            .field("insecure_tls", &self.insecure_tls)
            .field("match_policy", &self.match_policy)
            .finish()
    }
}

impl ConnectionConfig {
    /// Build the authenticated client, shared by all calls of one resource.
    pub fn build_client(&self) -> Result<HttpClient> {
        let mut builder = HttpClient::builder().insecure_tls(self.insecure_tls);

        builder = match (&self.username, &self.password, &self.auth_token) {
            (Some(username), Some(password), None) => builder.basic_auth(username, password),
            (None, None, Some(token)) => builder.bearer_token(token),
            (None, None, None) if self.is_cloud => builder,
            (None, None, None) => {
                return Err(Error::Config(
                    "either auth_token or username and password are required".into(),
                ))
            }
            (Some(_), Some(_), Some(_)) => {
                return Err(Error::Config(
                    "auth_token and username/password are mutually exclusive".into(),
                ))
            }
            _ => {
                return Err(Error::Config(
                    "username and password must be given together".into(),
                ))
            }
        };

        match (self.is_cloud, &self.jamf_cookie) {
            (true, Some(cookie)) => builder = builder.cloud(cookie),
            (true, None) => return Err(Error::Config("is_cloud requires jamf_cookie".into())),
            (false, Some(_)) => log::warn!("Ignoring jamf_cookie, is_cloud is not set"),
            (false, None) => {}
        }

        if let Some(limit) = self.redirect_limit {
            builder = builder.redirect_limit(limit);
        }
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        builder.build()
    }

    /// Cloud instances may use a different display name than the resource name.
    fn remote_name(&self, name: &str, cloud_name: Option<&String>) -> String {
        match cloud_name {
            Some(cloud_name) if self.is_cloud => cloud_name.clone(),
            _ => name.to_string(),
        }
    }
}

#[derive(Clone, Debug, serde::Deserialize)]
pub struct ApiRoleConfig {
    pub name: String,
    #[serde(default)]
    pub ensure: Ensure,
    /// Display name to use instead of `name` in cloud mode
    #[serde(default)]
    pub role_name: Option<String>,
    #[serde(default)]
    pub privileges: Vec<String>,
    #[serde(flatten)]
    pub connection: ConnectionConfig,
}

impl ApiRoleConfig {
    pub fn desired(&self) -> DesiredState<ApiRole> {
        DesiredState {
            name: self
                .connection
                .remote_name(&self.name, self.role_name.as_ref()),
            ensure: self.ensure,
            attributes: ApiRole {
                privileges: self.privileges.clone(),
            },
        }
    }
}

#[derive(Clone, Debug, serde::Deserialize)]
pub struct MobileDeviceGroupConfig {
    pub name: String,
    #[serde(default)]
    pub ensure: Ensure,
    /// Display name to use instead of `name` in cloud mode
    #[serde(default)]
    pub group_name: Option<String>,
    #[serde(default)]
    pub is_smart: bool,
    #[serde(default)]
    pub criteria: Vec<Criterion>,
    #[serde(flatten)]
    pub connection: ConnectionConfig,
}

impl MobileDeviceGroupConfig {
    pub fn desired(&self) -> DesiredState<MobileDeviceGroup> {
        DesiredState {
            name: self
                .connection
                .remote_name(&self.name, self.group_name.as_ref()),
            ensure: self.ensure,
            attributes: MobileDeviceGroup {
                is_smart: self.is_smart,
                criteria: self.criteria.clone(),
            },
        }
    }
}

pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
    Ok(serde_yaml::from_reader(File::open(path)?)?)
}
