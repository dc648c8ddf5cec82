use super::{endpoint, MatchPolicy};
use crate::client::{Body, HttpClient, Request};
use crate::error::Result;
use crate::reconciler::{Mutation, ResourceClient};
use crate::state::{Attributes, Observed, ResourceId};
use crate::xml;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use serde_json::Value;
use tracing::instrument;
use url::Url;

const GROUPS_PATH: &[&str] = &["JSSResource", "mobiledevicegroups"];
const APPLICATION_XML: &str = "application/xml";

/// One rule of a smart group.
#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct Criterion {
    pub name: String,
    #[serde(default)]
    pub priority: i64,
    #[serde(default = "default_and_or")]
    pub and_or: String,
    pub search_type: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub opening_paren: bool,
    #[serde(default)]
    pub closing_paren: bool,
}

fn default_and_or() -> String {
    "and".to_string()
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MobileDeviceGroup {
    pub is_smart: bool,
    pub criteria: Vec<Criterion>,
}

impl Attributes for MobileDeviceGroup {
    fn diff(&self, observed: &Self) -> Vec<&'static str> {
        let mut changed = Vec::new();
        if self.is_smart != observed.is_smart {
            changed.push("is_smart");
        }
        if self.criteria != observed.criteria {
            changed.push("criteria");
        }
        changed
    }
}

#[derive(serde::Deserialize)]
struct GroupList {
    #[serde(default)]
    mobile_device_groups: Vec<Value>,
}

#[derive(serde::Deserialize)]
struct GroupDetail {
    mobile_device_group: Group,
}

#[derive(serde::Deserialize)]
struct Group {
    id: Value,
    #[serde(default)]
    is_smart: bool,
    #[serde(default)]
    criteria: Option<Vec<Criterion>>,
}

#[derive(serde::Serialize)]
struct GroupDocument<'a> {
    mobile_device_group: GroupBody<'a>,
}

#[derive(serde::Serialize)]
struct GroupBody<'a> {
    name: &'a str,
    is_smart: bool,
    criteria: CriteriaBody<'a>,
}

#[derive(serde::Serialize)]
struct CriteriaBody<'a> {
    criterion: &'a [Criterion],
}

/// Mobile device groups of the classic API, written as XML.
#[derive(Clone, Debug)]
pub struct MobileDeviceGroupClient {
    http: HttpClient,
    groups_url: Url,
    policy: MatchPolicy,
}

impl MobileDeviceGroupClient {
    pub fn new(http: HttpClient, api_url: &Url, policy: MatchPolicy) -> Result<Self> {
        Ok(Self {
            http,
            groups_url: endpoint(api_url, GROUPS_PATH)?,
            policy,
        })
    }

    /// `id/0` asks the server to assign a new id.
    fn group_url(&self, id: Option<&ResourceId>) -> Result<Url> {
        let id = id.map(ResourceId::as_str).unwrap_or("0");
        endpoint(&self.groups_url, &["id", id])
    }

    fn document(name: &str, attributes: &MobileDeviceGroup) -> Result<String> {
        xml::to_xml(&GroupDocument {
            mobile_device_group: GroupBody {
                name,
                is_smart: attributes.is_smart,
                criteria: CriteriaBody {
                    criterion: &attributes.criteria,
                },
            },
        })
    }

    async fn write(&self, method: Method, url: Url, document: String) -> Result<()> {
        if log::log_enabled!(log::Level::Debug) {
            match xml::pretty(&document) {
                Ok(pretty) => log::debug!("{method} {url}:\n{pretty}"),
                Err(err) => log::debug!("{method} {url}: {err}"),
            }
        }

        self.http
            .execute(
                Request::new(method, url)
                    .header(CONTENT_TYPE.as_str(), APPLICATION_XML)
                    .body(Body::Raw(document)),
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ResourceClient for MobileDeviceGroupClient {
    type Attributes = MobileDeviceGroup;

    fn kind(&self) -> &'static str {
        "mobile_device_group"
    }

    #[instrument(skip(self), err)]
    async fn read(&self, name: &str) -> Result<Observed<MobileDeviceGroup>> {
        let list: GroupList = self.http.get_json(self.groups_url.clone()).await?;

        let id = match self
            .policy
            .select(&self.groups_url, &list.mobile_device_groups, "name", name)?
        {
            Some(id) => id,
            None => return Ok(Observed::Absent),
        };

        let detail: GroupDetail = self.http.get_json(self.group_url(Some(&id))?).await?;
        let group = detail.mobile_device_group;

        Ok(Observed::Present {
            id: ResourceId::from_value(&group.id).unwrap_or(id),
            attributes: MobileDeviceGroup {
                is_smart: group.is_smart,
                criteria: group.criteria.unwrap_or_default(),
            },
        })
    }

    #[instrument(skip_all, err)]
    async fn flush(&self, mutation: Mutation<'_, MobileDeviceGroup>) -> Result<()> {
        match mutation {
            Mutation::Create { name, attributes } => {
                let document = Self::document(name, attributes)?;
                self.write(Method::POST, self.group_url(None)?, document)
                    .await
            }
            Mutation::Update {
                id,
                name,
                attributes,
            } => {
                let document = Self::document(name, attributes)?;
                self.write(Method::PUT, self.group_url(Some(id))?, document)
                    .await
            }
            Mutation::Delete { id } => {
                self.http.delete(self.group_url(Some(id))?).await?;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn criterion(name: &str, value: &str) -> Criterion {
        Criterion {
            name: name.into(),
            priority: 0,
            and_or: "and".into(),
            search_type: "is".into(),
            value: value.into(),
            opening_paren: false,
            closing_paren: false,
        }
    }

    #[test]
    fn test_document() {
        let group = MobileDeviceGroup {
            is_smart: true,
            criteria: vec![criterion("Model", "iPad")],
        };

        let document = MobileDeviceGroupClient::document("Lab & Co", &group).unwrap();

        assert_eq!(
            document,
            "<mobile_device_group>\n\
             \x20 <name>Lab &amp; Co</name>\n\
             \x20 <is_smart>true</is_smart>\n\
             \x20 <criteria>\n\
             \x20   <criterion>\n\
             \x20     <name>Model</name>\n\
             \x20     <priority>0</priority>\n\
             \x20     <and_or>and</and_or>\n\
             \x20     <search_type>is</search_type>\n\
             \x20     <value>iPad</value>\n\
             \x20     <opening_paren>false</opening_paren>\n\
             \x20     <closing_paren>false</closing_paren>\n\
             \x20   </criterion>\n\
             \x20 </criteria>\n\
             </mobile_device_group>"
        );
    }

    #[test]
    fn test_criterion_defaults() {
        let c: Criterion =
            serde_json::from_str(r#"{"name": "Model", "search_type": "like", "value": "iPad"}"#)
                .unwrap();
        assert_eq!(c.and_or, "and");
        assert_eq!(c.priority, 0);
        assert!(!c.opening_paren);
    }

    #[test]
    fn test_diff() {
        let desired = MobileDeviceGroup {
            is_smart: true,
            criteria: vec![criterion("Model", "iPad")],
        };
        assert!(desired.diff(&desired.clone()).is_empty());
        assert_eq!(
            desired.diff(&MobileDeviceGroup::default()),
            vec!["is_smart", "criteria"]
        );
    }
}
