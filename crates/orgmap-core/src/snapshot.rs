//! One immutable generation of organizational data, plus every read query.
//!
//! A [`Snapshot`] is constructed once from raw bytes, indexed, and then only
//! ever shared behind an `Arc`. All query methods borrow `&self` and touch
//! nothing mutable, so any number of callers may read one generation while a
//! newer one is being built elsewhere.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::SnapshotError;
use crate::hierarchy::{self, HierarchyNode, PathEntry};
use crate::index::{self, Indexes, JiraClaim, JiraOwner, MembershipRef};
use crate::model::{Component, Employee, EntityKind, Lookups, Metadata, OrgUnit};

/// The wire document. Producers may also embed derived index blocks; those
/// are ignored here because indexes are always rebuilt locally.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Document {
    metadata: Metadata,
    lookups: Lookups,
}

/// One immutable generation: entity maps plus derived indexes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Producer-supplied summary information.
    pub metadata: Metadata,
    /// The per-kind entity maps.
    pub lookups: Lookups,
    /// Tables derived from the entity maps at construction time.
    pub indexes: Indexes,
}

/// Version descriptor of a loaded snapshot, replaced together with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    /// When this generation was loaded.
    pub loaded_at: DateTime<Utc>,
    /// Entity counts per kind at load time.
    pub entity_counts: BTreeMap<String, usize>,
}

impl Version {
    /// Builds the version descriptor for a freshly constructed snapshot,
    /// stamped with the current time.
    #[must_use]
    pub fn of(snapshot: &Snapshot) -> Self {
        let lookups = &snapshot.lookups;
        let entity_counts = BTreeMap::from([
            ("employees".to_string(), lookups.employees.len()),
            ("teams".to_string(), lookups.teams.len()),
            ("orgs".to_string(), lookups.orgs.len()),
            ("pillars".to_string(), lookups.pillars.len()),
            ("team_groups".to_string(), lookups.team_groups.len()),
            ("components".to_string(), lookups.components.len()),
        ]);
        Self {
            loaded_at: Utc::now(),
            entity_counts,
        }
    }

    /// Count for one entity-kind key, zero if absent.
    #[must_use]
    pub fn count(&self, kind: &str) -> usize {
        self.entity_counts.get(kind).copied().unwrap_or(0)
    }
}

/// Kind of an entry in an employee's affiliation rollup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AffiliationKind {
    /// A direct or ancestral organization.
    Organization,
    /// A directly joined team.
    Team,
    /// An ancestral pillar.
    Pillar,
    /// An ancestral team group.
    TeamGroup,
    /// An ancestral team (a parent of a directly joined team).
    ParentTeam,
}

impl AffiliationKind {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Organization => "Organization",
            Self::Team => "Team",
            Self::Pillar => "Pillar",
            Self::TeamGroup => "Team Group",
            Self::ParentTeam => "Parent Team",
        }
    }
}

impl fmt::Display for AffiliationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry in an employee's affiliation rollup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Affiliation {
    /// Entity name.
    pub name: String,
    /// How the employee relates to the entity.
    pub kind: AffiliationKind,
}

impl Snapshot {
    /// Parses a wire document and derives its indexes.
    ///
    /// # Errors
    ///
    /// [`SnapshotError::Parse`] if the bytes are not the expected JSON
    /// document; [`SnapshotError::Structural`] if the document carries no
    /// employees at all. A structurally empty document almost always means
    /// a broken producer, and loading it would make every lookup go dark.
    pub fn from_json(bytes: &[u8]) -> Result<Self, SnapshotError> {
        let document: Document = serde_json::from_slice(bytes)?;
        if document.lookups.employees.is_empty() {
            return Err(SnapshotError::structural("employee lookup is empty"));
        }
        let indexes = index::build(&document.lookups);
        Ok(Self {
            metadata: document.metadata,
            lookups: document.lookups,
            indexes,
        })
    }

    // ---- point lookups ----------------------------------------------------

    /// Employee by uid.
    #[must_use]
    pub fn employee_by_uid(&self, uid: &str) -> Option<&Employee> {
        self.lookups.employees.get(uid)
    }

    /// Employee by email, compared case-insensitively.
    ///
    /// Linear over the employee map; emails are not indexed because the
    /// case-folded comparison would make an exact-match table wrong.
    #[must_use]
    pub fn employee_by_email(&self, email: &str) -> Option<&Employee> {
        let needle = email.to_lowercase();
        self.lookups
            .employees
            .values()
            .find(|employee| employee.email.to_lowercase() == needle)
    }

    /// Employee by chat handle, exact match through the alias index.
    #[must_use]
    pub fn employee_by_slack_id(&self, slack_id: &str) -> Option<&Employee> {
        let uid = self.indexes.aliases.uid_for_slack(slack_id)?;
        self.lookups.employees.get(uid)
    }

    /// Employee by code-host login, exact match through the alias index.
    #[must_use]
    pub fn employee_by_github_login(&self, github_login: &str) -> Option<&Employee> {
        let uid = self.indexes.aliases.uid_for_github(github_login)?;
        self.lookups.employees.get(uid)
    }

    /// Manager of the named employee, if both records exist.
    #[must_use]
    pub fn manager_of(&self, uid: &str) -> Option<&Employee> {
        let employee = self.lookups.employees.get(uid)?;
        if employee.manager_uid.is_empty() {
            return None;
        }
        self.lookups.employees.get(&employee.manager_uid)
    }

    /// Team by name.
    #[must_use]
    pub fn team(&self, name: &str) -> Option<&OrgUnit> {
        self.lookups.teams.get(name)
    }

    /// Organization by name.
    #[must_use]
    pub fn org(&self, name: &str) -> Option<&OrgUnit> {
        self.lookups.orgs.get(name)
    }

    /// Pillar by name.
    #[must_use]
    pub fn pillar(&self, name: &str) -> Option<&OrgUnit> {
        self.lookups.pillars.get(name)
    }

    /// Team group by name.
    #[must_use]
    pub fn team_group(&self, name: &str) -> Option<&OrgUnit> {
        self.lookups.team_groups.get(name)
    }

    /// Component by name.
    #[must_use]
    pub fn component(&self, name: &str) -> Option<&Component> {
        self.lookups.components.get(name)
    }

    /// All components, in name order.
    #[must_use]
    pub fn components(&self) -> Vec<&Component> {
        self.lookups.components.values().collect()
    }

    // ---- enumeration ------------------------------------------------------

    /// All employee uids, in map order.
    #[must_use]
    pub fn employee_uids(&self) -> Vec<String> {
        self.lookups.employees.keys().cloned().collect()
    }

    /// All team names, in map order.
    #[must_use]
    pub fn team_names(&self) -> Vec<String> {
        self.lookups.teams.keys().cloned().collect()
    }

    /// All organization names, in map order.
    #[must_use]
    pub fn org_names(&self) -> Vec<String> {
        self.lookups.orgs.keys().cloned().collect()
    }

    /// All pillar names, in map order.
    #[must_use]
    pub fn pillar_names(&self) -> Vec<String> {
        self.lookups.pillars.keys().cloned().collect()
    }

    /// All team-group names, in map order.
    #[must_use]
    pub fn team_group_names(&self) -> Vec<String> {
        self.lookups.team_groups.keys().cloned().collect()
    }

    // ---- membership -------------------------------------------------------

    /// Direct memberships of an employee, teams first.
    #[must_use]
    pub fn memberships_for_uid(&self, uid: &str) -> &[MembershipRef] {
        self.indexes.membership.for_uid(uid)
    }

    /// Names of teams the employee directly belongs to.
    #[must_use]
    pub fn teams_for_uid(&self, uid: &str) -> Vec<String> {
        self.indexes
            .membership
            .for_uid(uid)
            .iter()
            .filter(|membership| membership.kind == EntityKind::Team)
            .map(|membership| membership.name.clone())
            .collect()
    }

    /// Names of teams the chat user directly belongs to.
    #[must_use]
    pub fn teams_for_slack_id(&self, slack_id: &str) -> Vec<String> {
        match self.indexes.aliases.uid_for_slack(slack_id) {
            Some(uid) => self.teams_for_uid(uid),
            None => Vec::new(),
        }
    }

    /// Resolved members of a team, skipping uids with no employee record.
    #[must_use]
    pub fn members_of_team(&self, name: &str) -> Vec<&Employee> {
        self.members_of(self.lookups.teams.get(name))
    }

    /// Resolved members of an organization, skipping uids with no employee
    /// record.
    #[must_use]
    pub fn members_of_org(&self, name: &str) -> Vec<&Employee> {
        self.members_of(self.lookups.orgs.get(name))
    }

    fn members_of(&self, unit: Option<&OrgUnit>) -> Vec<&Employee> {
        unit.map(|unit| {
            unit.group
                .resolved_members
                .iter()
                .filter_map(|uid| self.lookups.employees.get(uid))
                .collect()
        })
        .unwrap_or_default()
    }

    /// Whether the employee is a direct member of the named team.
    #[must_use]
    pub fn is_employee_in_team(&self, uid: &str, team_name: &str) -> bool {
        self.indexes
            .membership
            .for_uid(uid)
            .iter()
            .any(|membership| {
                membership.kind == EntityKind::Team && membership.name == team_name
            })
    }

    /// Whether the chat user is a direct member of the named team.
    #[must_use]
    pub fn is_slack_user_in_team(&self, slack_id: &str, team_name: &str) -> bool {
        self.indexes
            .aliases
            .uid_for_slack(slack_id)
            .is_some_and(|uid| self.is_employee_in_team(uid, team_name))
    }

    /// Whether the employee belongs to the named organization, directly or
    /// through the ancestry of any directly joined team.
    ///
    /// Membership and hierarchy compose only here: each team membership's
    /// ancestor path is walked lazily and the scan stops at the first
    /// match.
    #[must_use]
    pub fn is_employee_in_org(&self, uid: &str, org_name: &str) -> bool {
        for membership in self.indexes.membership.for_uid(uid) {
            match membership.kind {
                EntityKind::Org if membership.name == org_name => return true,
                EntityKind::Team => {
                    let path =
                        hierarchy::ancestor_path(&self.lookups, &membership.name, EntityKind::Team);
                    if path
                        .iter()
                        .any(|entry| entry.kind == EntityKind::Org && entry.name == org_name)
                    {
                        return true;
                    }
                }
                _ => {}
            }
        }
        false
    }

    /// Whether the chat user belongs to the named organization, directly or
    /// transitively.
    #[must_use]
    pub fn is_slack_user_in_org(&self, slack_id: &str, org_name: &str) -> bool {
        self.indexes
            .aliases
            .uid_for_slack(slack_id)
            .is_some_and(|uid| self.is_employee_in_org(uid, org_name))
    }

    /// The full affiliation rollup for a chat user: direct memberships
    /// first, then the ancestry of each directly joined team, deduplicated
    /// by name in first-appearance order.
    #[must_use]
    pub fn organizations_for_slack_id(&self, slack_id: &str) -> Vec<Affiliation> {
        let Some(uid) = self.indexes.aliases.uid_for_slack(slack_id) else {
            return Vec::new();
        };

        let mut seen = BTreeSet::new();
        let mut rollup = Vec::new();
        let push = |rollup: &mut Vec<Affiliation>,
                        seen: &mut BTreeSet<String>,
                        name: &str,
                        kind: AffiliationKind| {
            if seen.insert(name.to_string()) {
                rollup.push(Affiliation {
                    name: name.to_string(),
                    kind,
                });
            }
        };

        for membership in self.indexes.membership.for_uid(uid) {
            match membership.kind {
                EntityKind::Org => {
                    push(
                        &mut rollup,
                        &mut seen,
                        &membership.name,
                        AffiliationKind::Organization,
                    );
                }
                EntityKind::Team => {
                    push(&mut rollup, &mut seen, &membership.name, AffiliationKind::Team);
                    let path =
                        hierarchy::ancestor_path(&self.lookups, &membership.name, EntityKind::Team);
                    for entry in path.iter().skip(1) {
                        let kind = match entry.kind {
                            EntityKind::Org => AffiliationKind::Organization,
                            EntityKind::Pillar => AffiliationKind::Pillar,
                            EntityKind::TeamGroup => AffiliationKind::TeamGroup,
                            EntityKind::Team => AffiliationKind::ParentTeam,
                        };
                        push(&mut rollup, &mut seen, &entry.name, kind);
                    }
                }
                _ => {}
            }
        }
        rollup
    }

    // ---- hierarchy --------------------------------------------------------

    /// Ancestor path of a hierarchy entity; see
    /// [`hierarchy::ancestor_path`].
    #[must_use]
    pub fn ancestor_path(&self, name: &str, kind: EntityKind) -> Vec<PathEntry> {
        hierarchy::ancestor_path(&self.lookups, name, kind)
    }

    /// Descendant tree of a hierarchy entity; see
    /// [`hierarchy::descendant_tree`].
    #[must_use]
    pub fn descendant_tree(&self, name: &str) -> Option<HierarchyNode> {
        hierarchy::descendant_tree(&self.lookups, name)
    }

    // ---- Jira ownership ---------------------------------------------------

    /// All known Jira project keys.
    #[must_use]
    pub fn jira_projects(&self) -> Vec<String> {
        self.indexes.jira.projects()
    }

    /// Component keys of a Jira project.
    #[must_use]
    pub fn jira_components(&self, project: &str) -> Vec<String> {
        self.indexes.jira.components(project)
    }

    /// Entities owning any component of a Jira project.
    #[must_use]
    pub fn jira_owners_of_project(&self, project: &str) -> Vec<JiraOwner> {
        self.indexes.jira.owners_of_project(project)
    }

    /// Entities owning one Jira `(project, component)` pair.
    #[must_use]
    pub fn jira_owners_of_component(&self, project: &str, component: &str) -> &[JiraOwner] {
        self.indexes.jira.owners_of_component(project, component)
    }

    /// Every Jira pair claimed by the named entity.
    #[must_use]
    pub fn jira_ownership_of(&self, entity_name: &str) -> Vec<JiraClaim> {
        self.indexes.jira.claims_of(entity_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture_json() -> Vec<u8> {
        serde_json::json!({
            "metadata": {
                "generated_at": "2025-06-01T00:00:00Z",
                "data_version": "v42",
                "total_employees": 2,
                "total_orgs": 1,
                "total_teams": 1
            },
            "lookups": {
                "employees": {
                    "jsmith": {
                        "uid": "jsmith",
                        "full_name": "Jane Smith",
                        "email": "JSmith@Example.com",
                        "slack_id": "U123",
                        "github_login": "jsmith-gh",
                        "manager_uid": "adoe"
                    },
                    "adoe": {
                        "uid": "adoe",
                        "full_name": "Alex Doe",
                        "email": "adoe@example.com",
                        "is_manager": true
                    }
                },
                "teams": {
                    "test-team": {
                        "name": "test-team",
                        "parent": {"name": "test-org", "kind": "org"},
                        "group": {
                            "resolved_members": ["jsmith"],
                            "jiras": [{"project": "PROJ", "component": "api"}]
                        }
                    }
                },
                "orgs": {
                    "test-org": {
                        "name": "test-org",
                        "group": {"resolved_members": ["adoe"]}
                    }
                }
            }
        })
        .to_string()
        .into_bytes()
    }

    fn fixture() -> Snapshot {
        Snapshot::from_json(&fixture_json()).expect("fixture should parse")
    }

    #[test]
    fn from_json_rejects_malformed_payload() {
        let err = Snapshot::from_json(b"not json").expect_err("should fail");
        assert!(matches!(err, SnapshotError::Parse(_)));
    }

    #[test]
    fn from_json_rejects_empty_employees() {
        let err = Snapshot::from_json(br#"{"lookups": {"employees": {}}}"#)
            .expect_err("should fail");
        assert!(matches!(err, SnapshotError::Structural { .. }));
    }

    #[test]
    fn employee_lookups_cover_all_handles() {
        let snapshot = fixture();
        assert_eq!(
            snapshot.employee_by_uid("jsmith").map(|e| e.full_name.as_str()),
            Some("Jane Smith")
        );
        assert!(snapshot.employee_by_uid("ghost").is_none());

        // Email comparison is case-folded on both sides.
        assert!(snapshot.employee_by_email("jsmith@example.COM").is_some());
        // Handles are not.
        assert!(snapshot.employee_by_slack_id("U123").is_some());
        assert!(snapshot.employee_by_slack_id("u123").is_none());
        assert!(snapshot.employee_by_github_login("jsmith-gh").is_some());
    }

    #[test]
    fn manager_chain_resolves() {
        let snapshot = fixture();
        assert_eq!(
            snapshot.manager_of("jsmith").map(|e| e.uid.as_str()),
            Some("adoe")
        );
        // adoe has no manager_uid.
        assert!(snapshot.manager_of("adoe").is_none());
        assert!(snapshot.manager_of("ghost").is_none());
    }

    #[test]
    fn membership_queries_compose_with_hierarchy() {
        let snapshot = fixture();
        assert_eq!(snapshot.teams_for_uid("jsmith"), ["test-team"]);
        assert!(snapshot.is_employee_in_team("jsmith", "test-team"));
        assert!(!snapshot.is_employee_in_team("adoe", "test-team"));

        // jsmith is in test-org only through test-team's ancestry.
        assert!(snapshot.is_employee_in_org("jsmith", "test-org"));
        // adoe is a direct org member.
        assert!(snapshot.is_employee_in_org("adoe", "test-org"));
        assert!(!snapshot.is_employee_in_org("jsmith", "other-org"));
    }

    #[test]
    fn member_lists_skip_unknown_uids() {
        let mut bytes = fixture_json();
        let mut value: serde_json::Value =
            serde_json::from_slice(&bytes).expect("fixture should parse");
        value["lookups"]["teams"]["test-team"]["group"]["resolved_members"] =
            serde_json::json!(["jsmith", "ghost"]);
        bytes = value.to_string().into_bytes();

        let snapshot = Snapshot::from_json(&bytes).expect("fixture should parse");
        let members = snapshot.members_of_team("test-team");
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].uid, "jsmith");
    }

    #[test]
    fn affiliation_rollup_orders_and_dedups() {
        let snapshot = fixture();
        let rollup = snapshot.organizations_for_slack_id("U123");
        let entries: Vec<(&str, AffiliationKind)> = rollup
            .iter()
            .map(|a| (a.name.as_str(), a.kind))
            .collect();
        assert_eq!(
            entries,
            [
                ("test-team", AffiliationKind::Team),
                ("test-org", AffiliationKind::Organization),
            ]
        );
        assert!(snapshot.organizations_for_slack_id("U999").is_empty());
    }

    #[test]
    fn affiliation_kind_display_strings() {
        assert_eq!(AffiliationKind::Organization.to_string(), "Organization");
        assert_eq!(AffiliationKind::TeamGroup.to_string(), "Team Group");
        assert_eq!(AffiliationKind::ParentTeam.to_string(), "Parent Team");
    }

    #[test]
    fn jira_queries_route_through_index() {
        let snapshot = fixture();
        assert_eq!(snapshot.jira_projects(), ["PROJ"]);
        assert_eq!(snapshot.jira_components("PROJ"), ["api"]);
        assert_eq!(
            snapshot
                .jira_owners_of_component("PROJ", "api")
                .first()
                .map(|o| o.name.as_str()),
            Some("test-team")
        );
        assert_eq!(snapshot.jira_ownership_of("test-team").len(), 1);
    }

    #[test]
    fn version_counts_every_kind() {
        let snapshot = fixture();
        let version = Version::of(&snapshot);
        assert_eq!(version.count("employees"), 2);
        assert_eq!(version.count("teams"), 1);
        assert_eq!(version.count("orgs"), 1);
        assert_eq!(version.count("pillars"), 0);
        assert_eq!(version.count("nonsense"), 0);
    }
}
