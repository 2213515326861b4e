use crate::error::ClosureError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of entity that appears on either side of a relationship
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    User,
    Group,
    Organization,
    Resource,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Group => "group",
            Self::Organization => "organization",
            Self::Resource => "resource",
        }
    }
}

impl FromStr for EntityKind {
    type Err = ClosureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "group" => Ok(Self::Group),
            "organization" | "org" => Ok(Self::Organization),
            "resource" => Ok(Self::Resource),
            other => Err(ClosureError::InvalidEdge(format!("Unknown entity kind: {}", other))),
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The relation vocabulary. Every ingested edge belongs to exactly one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EdgeKind {
    OrgAdmin,
    OrgMember,
    /// A group attached to an organization as a member
    OrgGroupMember,
    GroupMember,
    GroupManager,
    /// Child group (subject) whose members are members of the parent group (object)
    GroupSubgroupMember,
    /// Child group (subject) whose managers are managers of the parent group (object)
    GroupSubgroupManager,
    ResourceOrg,
    ResourceManagerUser,
    ResourceManagerGroup,
    ResourceViewerUser,
    ResourceViewerGroup,
}

impl EdgeKind {
    pub const ALL: [EdgeKind; 12] = [
        Self::OrgAdmin,
        Self::OrgMember,
        Self::OrgGroupMember,
        Self::GroupMember,
        Self::GroupManager,
        Self::GroupSubgroupMember,
        Self::GroupSubgroupManager,
        Self::ResourceOrg,
        Self::ResourceManagerUser,
        Self::ResourceManagerGroup,
        Self::ResourceViewerUser,
        Self::ResourceViewerGroup,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OrgAdmin => "org-admin",
            Self::OrgMember => "org-member",
            Self::OrgGroupMember => "org-group-member",
            Self::GroupMember => "group-member",
            Self::GroupManager => "group-manager",
            Self::GroupSubgroupMember => "group-subgroup-member",
            Self::GroupSubgroupManager => "group-subgroup-manager",
            Self::ResourceOrg => "resource-org",
            Self::ResourceManagerUser => "resource-manager-user",
            Self::ResourceManagerGroup => "resource-manager-group",
            Self::ResourceViewerUser => "resource-viewer-user",
            Self::ResourceViewerGroup => "resource-viewer-group",
        }
    }

    /// Entity kind expected on the subject side
    pub fn subject_kind(&self) -> EntityKind {
        match self {
            Self::OrgAdmin
            | Self::OrgMember
            | Self::GroupMember
            | Self::GroupManager
            | Self::ResourceManagerUser
            | Self::ResourceViewerUser => EntityKind::User,
            Self::OrgGroupMember
            | Self::GroupSubgroupMember
            | Self::GroupSubgroupManager
            | Self::ResourceManagerGroup
            | Self::ResourceViewerGroup => EntityKind::Group,
            Self::ResourceOrg => EntityKind::Organization,
        }
    }

    /// Entity kind expected on the object side
    pub fn object_kind(&self) -> EntityKind {
        match self {
            Self::OrgAdmin | Self::OrgMember | Self::OrgGroupMember => EntityKind::Organization,
            Self::GroupMember
            | Self::GroupManager
            | Self::GroupSubgroupMember
            | Self::GroupSubgroupManager => EntityKind::Group,
            Self::ResourceOrg
            | Self::ResourceManagerUser
            | Self::ResourceManagerGroup
            | Self::ResourceViewerUser
            | Self::ResourceViewerGroup => EntityKind::Resource,
        }
    }

    /// Map a raw relationship onto the vocabulary.
    ///
    /// Returns `Ok(None)` for relationships outside the vocabulary, which
    /// callers skip. Unknown entity kinds are treated the same way.
    pub fn classify(raw: &RawRelationship) -> Result<Option<EdgeKind>, ClosureError> {
        raw.validate()?;

        let (Ok(subject), Ok(object)) = (
            raw.subject_kind.parse::<EntityKind>(),
            raw.object_kind.parse::<EntityKind>(),
        ) else {
            return Ok(None);
        };

        use EntityKind::*;
        let kind = match (object, raw.relation.as_str(), subject) {
            (Organization, "admin", User) => Self::OrgAdmin,
            (Organization, "member", User) => Self::OrgMember,
            (Organization, "member", Group) => Self::OrgGroupMember,
            (Group, "member", User) => Self::GroupMember,
            (Group, "manager", User) => Self::GroupManager,
            (Group, "member", Group) => Self::GroupSubgroupMember,
            (Group, "manager", Group) => Self::GroupSubgroupManager,
            (Resource, "org", Organization) => Self::ResourceOrg,
            (Resource, "manager", User) => Self::ResourceManagerUser,
            (Resource, "manager", Group) => Self::ResourceManagerGroup,
            (Resource, "viewer", User) => Self::ResourceViewerUser,
            (Resource, "viewer", Group) => Self::ResourceViewerGroup,
            _ => return Ok(None),
        };

        Ok(Some(kind))
    }
}

impl FromStr for EdgeKind {
    type Err = ClosureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ClosureError::UnknownEdgeKind(s.to_string()))
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single fact as it arrives from a relationship dump
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRelationship {
    pub subject_kind: String,
    pub subject_id: String,
    /// Userset relation on the subject, e.g. `member` in `group:eng#member`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_relation: Option<String>,
    pub relation: String,
    pub object_kind: String,
    pub object_id: String,
}

impl RawRelationship {
    pub fn new(
        subject_kind: &str,
        subject_id: &str,
        relation: &str,
        object_kind: &str,
        object_id: &str,
    ) -> Self {
        Self {
            subject_kind: subject_kind.to_string(),
            subject_id: subject_id.to_string(),
            subject_relation: None,
            relation: relation.to_string(),
            object_kind: object_kind.to_string(),
            object_id: object_id.to_string(),
        }
    }

    pub fn with_subject_relation(mut self, relation: &str) -> Self {
        self.subject_relation = Some(relation.to_string());
        self
    }

    fn validate(&self) -> Result<(), ClosureError> {
        if self.subject_id.is_empty() {
            return Err(ClosureError::InvalidEdge(format!("Empty subject id in {}", self)));
        }
        if self.object_id.is_empty() {
            return Err(ClosureError::InvalidEdge(format!("Empty object id in {}", self)));
        }
        Ok(())
    }

    pub fn to_edge(&self) -> Edge {
        Edge::new(&self.subject_id, &self.object_id)
    }
}

impl fmt::Display for RawRelationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.object_kind, self.object_id)?;
        write!(f, "#{}@{}:{}", self.relation, self.subject_kind, self.subject_id)?;
        if let Some(ref relation) = self.subject_relation {
            write!(f, "#{}", relation)?;
        }
        Ok(())
    }
}

/// An ingested edge. Entity kinds are implied by the [`EdgeKind`] it is stored under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub subject: String,
    pub object: String,
}

impl Edge {
    pub fn new(subject: &str, object: &str) -> Self {
        Self {
            subject: subject.to_string(),
            object: object.to_string(),
        }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.subject, self.object)
    }
}

/// Access path a sample pair exercises
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessPath {
    DirectManager,
    OrgAdmin,
    GroupView,
}

/// A (resource, user) pair representing one access path
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SamplePair {
    pub resource_id: String,
    pub user_id: String,
}

impl SamplePair {
    pub fn new(resource_id: &str, user_id: &str) -> Self {
        Self {
            resource_id: resource_id.to_string(),
            user_id: user_id.to_string(),
        }
    }
}

impl fmt::Display for SamplePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "resource:{}@user:{}", self.resource_id, self.user_id)
    }
}
