//! Entity types for the organizational data document.
//!
//! These are the wire-facing structures: a producer publishes one JSON
//! document holding metadata plus per-kind lookup maps, and everything here
//! deserializes with permissive defaults so partially populated documents
//! still load. Derived lookup tables live in [`crate::index`], never in the
//! document itself.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind tag for the four entity kinds that participate in the parent
/// hierarchy.
///
/// Components and employees are entities too, but they never appear on a
/// parent walk: employees are leaves and components hang off their own
/// parent-path metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// A team, the leaf of the organizational hierarchy.
    Team,
    /// An organization.
    Org,
    /// A pillar grouping organizations or team groups.
    Pillar,
    /// A group of related teams.
    TeamGroup,
}

impl EntityKind {
    /// All hierarchy kinds in canonical scan order.
    ///
    /// Lookups that search "any kind" probe the maps in this order, so the
    /// order is part of the observable contract when names collide across
    /// kinds.
    pub const ALL: [Self; 4] = [Self::Team, Self::Org, Self::Pillar, Self::TeamGroup];

    /// Parses a kind tag case-insensitively.
    ///
    /// Parent references carry kind tags as free-form strings from the data
    /// producer; unknown tags are data dirt, not errors, so this returns
    /// `None` rather than failing.
    #[must_use]
    pub fn parse(tag: &str) -> Option<Self> {
        match tag.to_ascii_lowercase().as_str() {
            "team" => Some(Self::Team),
            "org" => Some(Self::Org),
            "pillar" => Some(Self::Pillar),
            "team_group" => Some(Self::TeamGroup),
            _ => None,
        }
    }

    /// The canonical lowercase tag for this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Team => "team",
            Self::Org => "org",
            Self::Pillar => "pillar",
            Self::TeamGroup => "team_group",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An employee record, keyed by `uid` in [`Lookups::employees`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Employee {
    /// Unique identifier.
    pub uid: String,
    /// Display name.
    pub full_name: String,
    /// Primary email address.
    pub email: String,
    /// Job title.
    pub job_title: String,
    /// Chat-system handle, if any. Matched exactly, never case-folded.
    pub slack_id: String,
    /// Code-host login, if any. Matched exactly, never case-folded.
    pub github_login: String,
    /// `uid` of this employee's manager, empty for the top of the chain.
    pub manager_uid: String,
    /// Whether this employee manages people.
    pub is_manager: bool,
}

/// Reference to the single parent of a hierarchy entity.
///
/// Both fields come straight from the document and are untrusted: the name
/// may dangle and the kind tag may be unknown. The hierarchy engine treats
/// the parent graph as possibly cyclic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParentRef {
    /// Name of the parent entity.
    pub name: String,
    /// Kind tag of the parent entity, as written by the producer.
    pub kind: String,
}

/// A chat channel attached to a group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelInfo {
    /// Channel name.
    pub channel: String,
    /// Channel identifier in the chat system.
    pub channel_id: String,
    /// Free-form description.
    pub description: String,
    /// Usage tags.
    pub types: Vec<String>,
}

/// A chat alias attached to a group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AliasInfo {
    /// Alias name.
    pub alias: String,
    /// Free-form description.
    pub description: String,
}

/// Chat configuration for a group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlackConfig {
    /// Channels owned by the group.
    pub channels: Vec<ChannelInfo>,
    /// Aliases owned by the group.
    pub aliases: Vec<AliasInfo>,
}

/// A role assignment within a group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleInfo {
    /// Employee uids holding the role.
    pub people: Vec<String>,
    /// Role tags.
    pub types: Vec<String>,
}

/// A Jira project/component claim attached to a group or component.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JiraInfo {
    /// Jira project key.
    pub project: String,
    /// Component name within the project; empty means the claim is at
    /// project level.
    pub component: String,
    /// Free-form description.
    pub description: String,
    /// Saved view or filter reference.
    pub view: String,
    /// Claim tags.
    pub types: Vec<String>,
}

/// A source repository attached to a group or component.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepoInfo {
    /// Repository name.
    pub repo: String,
    /// Free-form description.
    pub description: String,
    /// Repository tags.
    pub tags: Vec<String>,
    /// Path of interest within the repository.
    pub path: String,
    /// Roles that apply to the repository.
    pub roles: Vec<String>,
    /// Branch of interest.
    pub branch: String,
    /// Usage tags.
    pub types: Vec<String>,
}

/// A contact email attached to a group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailInfo {
    /// Email address.
    pub address: String,
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub description: String,
}

/// A documentation or resource link attached to a group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceInfo {
    /// Resource name.
    pub name: String,
    /// Resource URL.
    pub url: String,
    /// Free-form description.
    pub description: String,
}

/// A component-role claim attached to a group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComponentRoleInfo {
    /// Component name.
    pub component: String,
    /// Role tags.
    pub types: Vec<String>,
}

/// Membership and ownership payload shared by every hierarchy entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Group {
    /// Resolved direct members, as employee uids. "Resolved" means the
    /// producer already expanded any indirection; this list is taken as-is.
    pub resolved_members: Vec<String>,
    /// Chat configuration, if any.
    pub slack: Option<SlackConfig>,
    /// Role assignments.
    pub roles: Vec<RoleInfo>,
    /// Jira project/component claims.
    pub jiras: Vec<JiraInfo>,
    /// Source repositories.
    pub repos: Vec<RepoInfo>,
    /// Search keywords.
    pub keywords: Vec<String>,
    /// Contact emails.
    pub emails: Vec<EmailInfo>,
    /// Documentation links.
    pub resources: Vec<ResourceInfo>,
    /// Component-role claims.
    pub component_roles: Vec<ComponentRoleInfo>,
}

/// One hierarchy entity: a team, org, pillar, or team group.
///
/// The four kinds share a single shape; the map an entity lives in
/// ([`Lookups`]) states its kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrgUnit {
    /// Producer-assigned unique identifier.
    pub uid: String,
    /// Entity name, the lookup key.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Reference to the single parent, or `None` for roots.
    pub parent: Option<ParentRef>,
    /// Membership and ownership payload.
    pub group: Group,
}

/// A component record, keyed by name in [`Lookups::components`].
///
/// Components carry their own ownership metadata but do not participate in
/// the parent-walk hierarchy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Component {
    /// Component name, the lookup key.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Owning entity reference, if any.
    pub parent: Option<ParentRef>,
    /// Slash-joined path of the owning chain, as written by the producer.
    pub parent_path: String,
    /// Source repositories.
    pub repos: Vec<RepoInfo>,
    /// Jira project/component claims.
    pub jiras: Vec<JiraInfo>,
    /// Flat list of repository names.
    pub repo_names: Vec<String>,
}

/// Producer-supplied summary information about the document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metadata {
    /// When the producer generated the document, as an opaque string.
    pub generated_at: String,
    /// Producer's version string for the document.
    pub data_version: String,
    /// Employee count claimed by the producer.
    pub total_employees: usize,
    /// Org count claimed by the producer.
    pub total_orgs: usize,
    /// Team count claimed by the producer.
    pub total_teams: usize,
}

/// The per-kind entity maps of one document generation.
///
/// `BTreeMap` keeps iteration deterministic, which every derived index and
/// tree relies on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Lookups {
    /// Employees by uid.
    pub employees: BTreeMap<String, Employee>,
    /// Teams by name.
    pub teams: BTreeMap<String, OrgUnit>,
    /// Organizations by name.
    pub orgs: BTreeMap<String, OrgUnit>,
    /// Pillars by name.
    pub pillars: BTreeMap<String, OrgUnit>,
    /// Team groups by name.
    pub team_groups: BTreeMap<String, OrgUnit>,
    /// Components by name.
    pub components: BTreeMap<String, Component>,
}

impl Lookups {
    /// Returns the map holding entities of `kind`.
    #[must_use]
    pub const fn units_of(&self, kind: EntityKind) -> &BTreeMap<String, OrgUnit> {
        match kind {
            EntityKind::Team => &self.teams,
            EntityKind::Org => &self.orgs,
            EntityKind::Pillar => &self.pillars,
            EntityKind::TeamGroup => &self.team_groups,
        }
    }

    /// Looks up a hierarchy entity by kind and name.
    #[must_use]
    pub fn unit(&self, kind: EntityKind, name: &str) -> Option<&OrgUnit> {
        self.units_of(kind).get(name)
    }

    /// Resolves the kind of a named hierarchy entity by probing the maps in
    /// [`EntityKind::ALL`] order.
    #[must_use]
    pub fn kind_of(&self, name: &str) -> Option<EntityKind> {
        EntityKind::ALL
            .into_iter()
            .find(|kind| self.units_of(*kind).contains_key(name))
    }

    /// Iterates every hierarchy entity as `(kind, name, unit)`, kinds in
    /// [`EntityKind::ALL`] order, names in map order within a kind.
    pub fn hierarchy_units(&self) -> impl Iterator<Item = (EntityKind, &str, &OrgUnit)> {
        EntityKind::ALL.into_iter().flat_map(|kind| {
            self.units_of(kind)
                .iter()
                .map(move |(name, unit)| (kind, name.as_str(), unit))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_parse_is_case_insensitive() {
        assert_eq!(EntityKind::parse("team"), Some(EntityKind::Team));
        assert_eq!(EntityKind::parse("Team"), Some(EntityKind::Team));
        assert_eq!(EntityKind::parse("TEAM_GROUP"), Some(EntityKind::TeamGroup));
        assert_eq!(EntityKind::parse("division"), None);
        assert_eq!(EntityKind::parse(""), None);
    }

    #[test]
    fn kind_display_round_trips_through_parse() {
        for kind in EntityKind::ALL {
            assert_eq!(EntityKind::parse(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn employee_deserializes_with_defaults() {
        let employee: Employee =
            serde_json::from_str(r#"{"uid": "jsmith"}"#).expect("should deserialize");
        assert_eq!(employee.uid, "jsmith");
        assert_eq!(employee.email, "");
        assert!(!employee.is_manager);
    }

    #[test]
    fn org_unit_tolerates_unknown_fields() {
        let unit: OrgUnit = serde_json::from_str(
            r#"{"name": "test-team", "tab_name": "legacy", "parent": {"name": "test-org", "kind": "org"}}"#,
        )
        .expect("should deserialize");
        assert_eq!(unit.name, "test-team");
        let parent = unit.parent.expect("parent should be present");
        assert_eq!(parent.name, "test-org");
        assert_eq!(parent.kind, "org");
    }

    #[test]
    fn kind_of_probes_maps_in_fixed_order() {
        let mut lookups = Lookups::default();
        lookups.teams.insert("shared".into(), OrgUnit::default());
        lookups.orgs.insert("shared".into(), OrgUnit::default());
        // Team wins because it is probed first.
        assert_eq!(lookups.kind_of("shared"), Some(EntityKind::Team));
        assert_eq!(lookups.kind_of("absent"), None);
    }
}
