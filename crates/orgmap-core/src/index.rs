//! Derived lookup tables, built once per snapshot.
//!
//! The builder runs a single linear scan over each entity map of a freshly
//! parsed [`Lookups`] and produces three indexes: direct memberships per
//! employee, external-handle aliases, and Jira ownership. Documents may
//! carry their own index blocks; those are never trusted. The tables here
//! are always derived locally so they cannot disagree with the entity maps.

use std::collections::BTreeMap;

use crate::model::{EntityKind, Lookups};

/// Reserved component key marking project-level Jira ownership.
pub const PROJECT_LEVEL: &str = "_project_level";

/// One direct membership: the employee belongs to this entity itself, not
/// to one of its ancestors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipRef {
    /// Entity name.
    pub name: String,
    /// Entity kind; only teams and orgs carry direct membership.
    pub kind: EntityKind,
}

/// Direct memberships per employee uid.
///
/// Ancestry is deliberately absent: transitive membership is derived on
/// demand through the hierarchy engine, never stored redundantly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipIndex {
    by_uid: BTreeMap<String, Vec<MembershipRef>>,
}

impl MembershipIndex {
    /// Direct memberships of `uid`: teams first, then orgs, name order
    /// within each kind. Empty for unknown uids.
    #[must_use]
    pub fn for_uid(&self, uid: &str) -> &[MembershipRef] {
        self.by_uid.get(uid).map_or(&[], Vec::as_slice)
    }

    /// Number of employees with at least one direct membership.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_uid.len()
    }

    /// Whether no employee has a direct membership.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_uid.is_empty()
    }
}

/// External-handle aliases for employees.
///
/// Handles are matched exactly; they are identifiers in their home systems
/// and case-folding them would invent collisions. (Emails, by contrast,
/// are case-folded at query time and have no index at all.)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasIndex {
    slack_to_uid: BTreeMap<String, String>,
    github_to_uid: BTreeMap<String, String>,
}

impl AliasIndex {
    /// Resolves a chat handle to an employee uid.
    #[must_use]
    pub fn uid_for_slack(&self, slack_id: &str) -> Option<&str> {
        self.slack_to_uid.get(slack_id).map(String::as_str)
    }

    /// Resolves a code-host login to an employee uid.
    #[must_use]
    pub fn uid_for_github(&self, github_login: &str) -> Option<&str> {
        self.github_to_uid.get(github_login).map(String::as_str)
    }
}

/// An entity that owns a Jira project or component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JiraOwner {
    /// Owning entity name.
    pub name: String,
    /// Owning entity kind.
    pub kind: EntityKind,
}

/// A `(project, component)` pair claimed by an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JiraClaim {
    /// Jira project key.
    pub project: String,
    /// Component key, [`PROJECT_LEVEL`] for project-level claims.
    pub component: String,
}

/// Jira ownership: project key → component key → owners.
///
/// Ownership is many-to-many; a component may list several owners and an
/// entity may claim any number of pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JiraIndex {
    owners: BTreeMap<String, BTreeMap<String, Vec<JiraOwner>>>,
}

impl JiraIndex {
    /// All known project keys.
    #[must_use]
    pub fn projects(&self) -> Vec<String> {
        self.owners.keys().cloned().collect()
    }

    /// All component keys of a project, [`PROJECT_LEVEL`] included.
    #[must_use]
    pub fn components(&self, project: &str) -> Vec<String> {
        self.owners
            .get(project)
            .map(|components| components.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Owners of one `(project, component)` pair.
    #[must_use]
    pub fn owners_of_component(&self, project: &str, component: &str) -> &[JiraOwner] {
        self.owners
            .get(project)
            .and_then(|components| components.get(component))
            .map_or(&[], Vec::as_slice)
    }

    /// Owners of any component in a project, deduplicated by name in first
    /// appearance order.
    #[must_use]
    pub fn owners_of_project(&self, project: &str) -> Vec<JiraOwner> {
        let mut seen = std::collections::BTreeSet::new();
        let mut result = Vec::new();
        if let Some(components) = self.owners.get(project) {
            for owners in components.values() {
                for owner in owners {
                    if seen.insert(owner.name.clone()) {
                        result.push(owner.clone());
                    }
                }
            }
        }
        result
    }

    /// Every `(project, component)` pair claimed by the named entity.
    #[must_use]
    pub fn claims_of(&self, entity_name: &str) -> Vec<JiraClaim> {
        let mut result = Vec::new();
        for (project, components) in &self.owners {
            for (component, owners) in components {
                if owners.iter().any(|owner| owner.name == entity_name) {
                    result.push(JiraClaim {
                        project: project.clone(),
                        component: component.clone(),
                    });
                }
            }
        }
        result
    }
}

/// The derived tables of one snapshot generation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Indexes {
    /// Direct memberships per employee.
    pub membership: MembershipIndex,
    /// External-handle aliases.
    pub aliases: AliasIndex,
    /// Jira ownership.
    pub jira: JiraIndex,
}

/// Derives all index tables from the entity maps.
///
/// Deterministic for a given `Lookups`: the scans follow map order, teams
/// before orgs for membership, and [`EntityKind::ALL`] order for Jira
/// claims.
#[must_use]
pub fn build(lookups: &Lookups) -> Indexes {
    let mut membership = MembershipIndex::default();
    for kind in [EntityKind::Team, EntityKind::Org] {
        for (name, unit) in lookups.units_of(kind) {
            for uid in &unit.group.resolved_members {
                membership
                    .by_uid
                    .entry(uid.clone())
                    .or_default()
                    .push(MembershipRef {
                        name: name.clone(),
                        kind,
                    });
            }
        }
    }

    let mut aliases = AliasIndex::default();
    for (uid, employee) in &lookups.employees {
        if !employee.slack_id.is_empty() {
            aliases
                .slack_to_uid
                .insert(employee.slack_id.clone(), uid.clone());
        }
        if !employee.github_login.is_empty() {
            aliases
                .github_to_uid
                .insert(employee.github_login.clone(), uid.clone());
        }
    }

    let mut jira = JiraIndex::default();
    for (kind, name, unit) in lookups.hierarchy_units() {
        for claim in &unit.group.jiras {
            if claim.project.is_empty() {
                continue;
            }
            let component = if claim.component.is_empty() {
                PROJECT_LEVEL
            } else {
                claim.component.as_str()
            };
            jira.owners
                .entry(claim.project.clone())
                .or_default()
                .entry(component.to_string())
                .or_default()
                .push(JiraOwner {
                    name: name.to_string(),
                    kind,
                });
        }
    }

    Indexes {
        membership,
        aliases,
        jira,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Employee, Group, JiraInfo, OrgUnit};

    fn member_unit(name: &str, members: &[&str]) -> OrgUnit {
        OrgUnit {
            name: name.to_string(),
            group: Group {
                resolved_members: members.iter().map(ToString::to_string).collect(),
                ..Group::default()
            },
            ..OrgUnit::default()
        }
    }

    fn jira_unit(name: &str, claims: &[(&str, &str)]) -> OrgUnit {
        OrgUnit {
            name: name.to_string(),
            group: Group {
                jiras: claims
                    .iter()
                    .map(|(project, component)| JiraInfo {
                        project: (*project).to_string(),
                        component: (*component).to_string(),
                        ..JiraInfo::default()
                    })
                    .collect(),
                ..Group::default()
            },
            ..OrgUnit::default()
        }
    }

    #[test]
    fn membership_lists_teams_before_orgs() {
        let mut lookups = Lookups::default();
        lookups
            .orgs
            .insert("test-org".into(), member_unit("test-org", &["jsmith"]));
        lookups
            .teams
            .insert("zeta-team".into(), member_unit("zeta-team", &["jsmith"]));
        lookups
            .teams
            .insert("alpha-team".into(), member_unit("alpha-team", &["jsmith"]));

        let indexes = build(&lookups);
        let refs = indexes.membership.for_uid("jsmith");
        let names: Vec<&str> = refs.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["alpha-team", "zeta-team", "test-org"]);
        assert_eq!(refs[0].kind, EntityKind::Team);
        assert_eq!(refs[2].kind, EntityKind::Org);
    }

    #[test]
    fn membership_is_direct_only() {
        let mut lookups = Lookups::default();
        lookups
            .teams
            .insert("test-team".into(), member_unit("test-team", &["jsmith"]));
        lookups
            .orgs
            .insert("test-org".into(), member_unit("test-org", &[]));

        let indexes = build(&lookups);
        // The parent org never shows up as a direct membership.
        assert_eq!(indexes.membership.for_uid("jsmith").len(), 1);
        assert!(indexes.membership.for_uid("unknown").is_empty());
    }

    #[test]
    fn aliases_are_exact_match() {
        let mut lookups = Lookups::default();
        lookups.employees.insert(
            "jsmith".into(),
            Employee {
                uid: "jsmith".into(),
                slack_id: "U123".into(),
                github_login: "JSmith".into(),
                ..Employee::default()
            },
        );

        let indexes = build(&lookups);
        assert_eq!(indexes.aliases.uid_for_slack("U123"), Some("jsmith"));
        assert_eq!(indexes.aliases.uid_for_slack("u123"), None);
        assert_eq!(indexes.aliases.uid_for_github("JSmith"), Some("jsmith"));
        assert_eq!(indexes.aliases.uid_for_github("jsmith"), None);
    }

    #[test]
    fn empty_handles_are_not_indexed() {
        let mut lookups = Lookups::default();
        lookups.employees.insert(
            "jsmith".into(),
            Employee {
                uid: "jsmith".into(),
                ..Employee::default()
            },
        );

        let indexes = build(&lookups);
        assert_eq!(indexes.aliases.uid_for_slack(""), None);
        assert_eq!(indexes.aliases.uid_for_github(""), None);
    }

    #[test]
    fn empty_jira_component_maps_to_project_level() {
        let mut lookups = Lookups::default();
        lookups
            .teams
            .insert("test-team".into(), jira_unit("test-team", &[("PROJ", "")]));

        let indexes = build(&lookups);
        assert_eq!(indexes.jira.projects(), ["PROJ"]);
        assert_eq!(indexes.jira.components("PROJ"), [PROJECT_LEVEL]);
        let owners = indexes.jira.owners_of_component("PROJ", PROJECT_LEVEL);
        assert_eq!(owners.len(), 1);
        assert_eq!(owners[0].name, "test-team");
        assert_eq!(owners[0].kind, EntityKind::Team);
    }

    #[test]
    fn multiple_owners_per_component_are_kept() {
        let mut lookups = Lookups::default();
        lookups
            .teams
            .insert("a-team".into(), jira_unit("a-team", &[("PROJ", "api")]));
        lookups
            .teams
            .insert("b-team".into(), jira_unit("b-team", &[("PROJ", "api")]));

        let indexes = build(&lookups);
        let owners = indexes.jira.owners_of_component("PROJ", "api");
        let names: Vec<&str> = owners.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, ["a-team", "b-team"]);
    }

    #[test]
    fn project_owners_deduplicate_across_components() {
        let mut lookups = Lookups::default();
        lookups.teams.insert(
            "a-team".into(),
            jira_unit("a-team", &[("PROJ", "api"), ("PROJ", "cli")]),
        );
        lookups
            .orgs
            .insert("test-org".into(), jira_unit("test-org", &[("PROJ", "api")]));

        let indexes = build(&lookups);
        let owners = indexes.jira.owners_of_project("PROJ");
        let names: Vec<&str> = owners.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, ["a-team", "test-org"]);
    }

    #[test]
    fn claims_of_entity_cover_every_pair() {
        let mut lookups = Lookups::default();
        lookups.teams.insert(
            "a-team".into(),
            jira_unit("a-team", &[("PROJ", "api"), ("OTHER", "")]),
        );

        let indexes = build(&lookups);
        let claims = indexes.jira.claims_of("a-team");
        assert_eq!(claims.len(), 2);
        assert!(claims
            .iter()
            .any(|c| c.project == "PROJ" && c.component == "api"));
        assert!(claims
            .iter()
            .any(|c| c.project == "OTHER" && c.component == PROJECT_LEVEL));
        assert!(indexes.jira.claims_of("nobody").is_empty());
    }

    #[test]
    fn claims_without_project_key_are_skipped() {
        let mut lookups = Lookups::default();
        lookups
            .teams
            .insert("a-team".into(), jira_unit("a-team", &[("", "api")]));

        let indexes = build(&lookups);
        assert!(indexes.jira.projects().is_empty());
    }
}
