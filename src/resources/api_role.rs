use super::{endpoint, MatchPolicy};
use crate::client::{Body, HttpClient};
use crate::error::{Error, Result};
use crate::reconciler::{Mutation, ResourceClient};
use crate::state::{Attributes, Observed, ResourceId};
use async_trait::async_trait;
use serde_json::Value;
use tracing::instrument;
use url::Url;

const ROLES_PATH: &[&str] = &["api", "v1", "api-roles"];

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ApiRole {
    pub privileges: Vec<String>,
}

impl Attributes for ApiRole {
    fn diff(&self, observed: &Self) -> Vec<&'static str> {
        // the server doesn't keep the order privileges were given in
        let mut desired = self.privileges.clone();
        let mut current = observed.privileges.clone();
        desired.sort();
        desired.dedup();
        current.sort();
        current.dedup();

        if desired == current {
            vec![]
        } else {
            vec!["privileges"]
        }
    }
}

#[derive(serde::Deserialize)]
struct RoleList {
    #[serde(default)]
    results: Vec<Value>,
}

#[derive(serde::Deserialize)]
struct Role {
    id: Value,
    #[serde(default)]
    privileges: Option<Vec<String>>,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct RoleBody<'a> {
    display_name: &'a str,
    privileges: &'a [String],
}

/// API roles of the Jamf Pro API, exchanged as JSON.
#[derive(Clone, Debug)]
pub struct ApiRoleClient {
    http: HttpClient,
    roles_url: Url,
    policy: MatchPolicy,
}

impl ApiRoleClient {
    pub fn new(http: HttpClient, api_url: &Url, policy: MatchPolicy) -> Result<Self> {
        Ok(Self {
            http,
            roles_url: endpoint(api_url, ROLES_PATH)?,
            policy,
        })
    }

    fn role_url(&self, id: &ResourceId) -> Result<Url> {
        endpoint(&self.roles_url, &[id.as_str()])
    }

    fn body(name: &str, attributes: &ApiRole) -> Result<Body> {
        let body = RoleBody {
            display_name: name,
            privileges: &attributes.privileges,
        };
        serde_json::to_value(body)
            .map(Body::Json)
            .map_err(|err| Error::unsupported_shape("", err.to_string()))
    }
}

#[async_trait]
impl ResourceClient for ApiRoleClient {
    type Attributes = ApiRole;

    fn kind(&self) -> &'static str {
        "api_role"
    }

    #[instrument(skip(self), err)]
    async fn read(&self, name: &str) -> Result<Observed<ApiRole>> {
        let list: RoleList = self.http.get_json(self.roles_url.clone()).await?;

        let id = match self
            .policy
            .select(&self.roles_url, &list.results, "displayName", name)?
        {
            Some(id) => id,
            None => return Ok(Observed::Absent),
        };

        let role: Role = self.http.get_json(self.role_url(&id)?).await?;

        Ok(Observed::Present {
            id: ResourceId::from_value(&role.id).unwrap_or(id),
            attributes: ApiRole {
                privileges: role.privileges.unwrap_or_default(),
            },
        })
    }

    #[instrument(skip_all, err)]
    async fn flush(&self, mutation: Mutation<'_, ApiRole>) -> Result<()> {
        match mutation {
            Mutation::Create { name, attributes } => {
                self.http
                    .post(self.roles_url.clone(), Self::body(name, attributes)?)
                    .await?;
            }
            Mutation::Update {
                id,
                name,
                attributes,
            } => {
                self.http
                    .put(self.role_url(id)?, Self::body(name, attributes)?)
                    .await?;
            }
            Mutation::Delete { id } => {
                self.http.delete(self.role_url(id)?).await?;
            }
        }
        Ok(())
    }
}
