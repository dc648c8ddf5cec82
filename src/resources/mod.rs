//! Resource kinds managed through the Jamf APIs.
//!
//! Every kind follows the same shape: list the collection, pick the record whose
//! display name matches, fetch its detail, and map it onto typed attributes.

pub mod api_role;
pub mod mobile_device_group;

pub use api_role::{ApiRole, ApiRoleClient};
pub use mobile_device_group::{Criterion, MobileDeviceGroup, MobileDeviceGroupClient};

use crate::error::{Error, Result};
use crate::state::ResourceId;
use serde_json::Value;
use url::Url;

/// What to do when several remote records carry the same display name.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchPolicy {
    /// Use the first record the server lists.
    #[default]
    First,
    /// Refuse to touch any of them.
    Unique,
}

impl MatchPolicy {
    /// Find the id of the record whose `field` equals `name`.
    pub fn select(
        &self,
        url: &Url,
        records: &[Value],
        field: &str,
        name: &str,
    ) -> Result<Option<ResourceId>> {
        let matches: Vec<&Value> = records
            .iter()
            .filter(|record| record.get(field).and_then(Value::as_str) == Some(name))
            .collect();

        let record = match (self, matches.as_slice()) {
            (_, []) => return Ok(None),
            (Self::Unique, [_, _, ..]) => {
                return Err(Error::AmbiguousMatch {
                    url: url.clone(),
                    name: name.to_string(),
                    count: matches.len(),
                })
            }
            (Self::First, [first, ..]) => {
                if matches.len() > 1 {
                    log::warn!(
                        "{} records named '{name}' at {url}, using the first one",
                        matches.len()
                    );
                }
                first
            }
            (Self::Unique, [only]) => only,
        };

        record
            .get("id")
            .and_then(ResourceId::from_value)
            .map(Some)
            .ok_or_else(|| Error::Decode {
                url: url.clone(),
                reason: format!("record '{name}' has no id"),
            })
    }
}

/// Append path segments to the API base URL.
pub(crate) fn endpoint(base: &Url, path: &[&str]) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| Error::Config(format!("{base} can't be used as an API base URL")))?
        .pop_if_empty()
        .extend(path);
    Ok(url)
}
