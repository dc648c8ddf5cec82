use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug, Display};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ensure {
    #[default]
    Present,
    Absent,
}

/// Identifier the remote server assigned to a record.
///
/// The newer API hands out string ids, the classic one numbers. Both are kept as
/// their textual form.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(s) if !s.is_empty() => Some(Self(s.clone())),
            serde_json::Value::Number(n) => Some(Self(n.to_string())),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind specific attributes of a resource.
pub trait Attributes: Clone + Debug + Send + Sync {
    /// Names of the fields where `self` (desired) diverges from `observed`.
    fn diff(&self, observed: &Self) -> Vec<&'static str>;
}

/// What the caller asked for, for one named resource.
#[derive(Clone, Debug, PartialEq)]
pub struct DesiredState<A> {
    /// Display name on the remote server, used to find the record.
    pub name: String,
    pub ensure: Ensure,
    pub attributes: A,
}

/// What a read found on the remote server.
#[derive(Clone, Debug, PartialEq)]
pub enum Observed<A> {
    Absent,
    Present { id: ResourceId, attributes: A },
}

impl<A> Observed<A> {
    pub fn ensure(&self) -> Ensure {
        match self {
            Self::Absent => Ensure::Absent,
            Self::Present { .. } => Ensure::Present,
        }
    }

    pub fn id(&self) -> Option<&ResourceId> {
        match self {
            Self::Absent => None,
            Self::Present { id, .. } => Some(id),
        }
    }

    pub fn attributes(&self) -> Option<&A> {
        match self {
            Self::Absent => None,
            Self::Present { attributes, .. } => Some(attributes),
        }
    }
}
