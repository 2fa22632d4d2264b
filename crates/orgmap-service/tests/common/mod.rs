//! Shared fixture data for the service integration tests.
//!
//! The topology mirrors a small but complete org: a root org holding a
//! team directly plus a chain through org → pillar → team group → team.

#![allow(dead_code)]

use serde_json::{Value, json};

/// Full fixture document.
pub fn org_fixture() -> Value {
    json!({
        "metadata": {
            "generated_at": "2025-06-01T00:00:00Z",
            "data_version": "v1",
            "total_employees": 3,
            "total_orgs": 2,
            "total_teams": 2
        },
        "lookups": {
            "employees": {
                "jsmith": {
                    "uid": "jsmith",
                    "full_name": "Jane Smith",
                    "email": "JSmith@Example.com",
                    "job_title": "Engineer",
                    "slack_id": "U123",
                    "github_login": "jsmith-gh",
                    "manager_uid": "adoe"
                },
                "adoe": {
                    "uid": "adoe",
                    "full_name": "Alex Doe",
                    "email": "adoe@example.com",
                    "job_title": "Manager",
                    "slack_id": "U456",
                    "is_manager": true
                },
                "bwong": {
                    "uid": "bwong",
                    "full_name": "Bo Wong",
                    "email": "bwong@example.com",
                    "slack_id": "U789"
                }
            },
            "teams": {
                "test-team": {
                    "name": "test-team",
                    "parent": {"name": "test-org", "kind": "org"},
                    "group": {
                        "resolved_members": ["jsmith"],
                        "jiras": [
                            {"project": "PROJ", "component": "api"},
                            {"project": "PROJ", "component": ""}
                        ]
                    }
                },
                "platform-team": {
                    "name": "platform-team",
                    "parent": {"name": "backend-teams", "kind": "team_group"},
                    "group": {
                        "resolved_members": ["bwong"],
                        "jiras": [{"project": "PROJ", "component": "api"}]
                    }
                }
            },
            "orgs": {
                "test-org": {
                    "name": "test-org",
                    "group": {"resolved_members": ["adoe"]}
                },
                "platform-org": {
                    "name": "platform-org",
                    "parent": {"name": "test-org", "kind": "org"}
                }
            },
            "pillars": {
                "engineering": {
                    "name": "engineering",
                    "parent": {"name": "platform-org", "kind": "org"}
                }
            },
            "team_groups": {
                "backend-teams": {
                    "name": "backend-teams",
                    "parent": {"name": "engineering", "kind": "pillar"}
                }
            },
            "components": {
                "gateway": {
                    "name": "gateway",
                    "description": "API gateway",
                    "parent": {"name": "test-team", "kind": "team"},
                    "repo_names": ["gateway"]
                }
            }
        }
    })
}

/// Fixture document as bytes.
pub fn fixture_bytes() -> Vec<u8> {
    org_fixture().to_string().into_bytes()
}

/// Fixture with an extra employee, for observing a reload.
pub fn fixture_with_newhire_bytes() -> Vec<u8> {
    let mut fixture = org_fixture();
    fixture["metadata"]["data_version"] = json!("v2");
    fixture["lookups"]["employees"]["newhire"] = json!({
        "uid": "newhire",
        "full_name": "New Hire",
        "email": "newhire@example.com"
    });
    fixture.to_string().into_bytes()
}

/// Fixture corrupted so `test-team` is its own parent.
pub fn fixture_with_self_cycle_bytes() -> Vec<u8> {
    let mut fixture = org_fixture();
    fixture["lookups"]["teams"]["test-team"]["parent"] =
        json!({"name": "test-team", "kind": "team"});
    fixture.to_string().into_bytes()
}

/// Structurally invalid fixture: parses, but has no employees.
pub fn fixture_without_employees_bytes() -> Vec<u8> {
    let mut fixture = org_fixture();
    fixture["lookups"]["employees"] = json!({});
    fixture.to_string().into_bytes()
}
