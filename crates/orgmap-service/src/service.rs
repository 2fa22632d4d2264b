//! Asynchronous organizational data service.
//!
//! The service drives one [`SnapshotStore`] through its lifecycle (load,
//! optionally watch, reload, stop) and fronts every read query. Reads
//! acquire the current generation, release the store guard, and work on
//! the immutable snapshot; none of them suspends or blocks on anything but
//! the pointer fetch.
//!
//! Reload failures never disturb the store: a failed attempt leaves the
//! previous generation serving, and the background loop logs and swallows
//! errors so one bad publish cannot take the service down.

use std::sync::Arc;

use tracing::{Instrument, debug, info, warn};

use orgmap_core::observability;
use orgmap_core::snapshot::{Affiliation, Snapshot, Version};
use orgmap_core::source::{ChangeCallback, DataSource, WatchHandle};
use orgmap_core::{
    Component, Employee, EntityKind, HierarchyNode, JiraClaim, JiraOwner, MembershipRef, OrgUnit,
    PathEntry,
};

use crate::error::{LoadError, WatchError};
use crate::retry::{RetryPolicy, fetch_with_retry};
use crate::store::{LoadedSnapshot, SnapshotStore};

/// Runs the full load pipeline without touching any store: fetch (with
/// retry), parse, validate, index, stamp a version.
pub(crate) async fn load_snapshot(
    source: &dyn DataSource,
    retry: &RetryPolicy,
) -> Result<LoadedSnapshot, LoadError> {
    let descriptor = source.descriptor();
    debug!(source = %descriptor, "loading organizational data");

    let bytes = fetch_with_retry(source, retry).await?;
    let snapshot = Snapshot::from_json(&bytes)
        .map_err(|error| LoadError::from_snapshot(&descriptor, error))?;
    let version = Version::of(&snapshot);

    info!(
        source = %descriptor,
        employees = version.count("employees"),
        teams = version.count("teams"),
        orgs = version.count("orgs"),
        "data loaded"
    );
    Ok(LoadedSnapshot { snapshot, version })
}

struct ActiveWatch {
    source_watch: WatchHandle,
    shutdown: tokio::sync::watch::Sender<bool>,
    task: tokio::task::JoinHandle<()>,
}

/// Asynchronous organizational data service.
///
/// Create one per process, load it (directly or via [`Self::start_watch`]),
/// and share it freely: every method takes `&self` and queries may run
/// concurrently with one reload.
#[derive(Debug)]
pub struct Service {
    store: SnapshotStore,
    retry: RetryPolicy,
    watcher: tokio::sync::Mutex<Option<ActiveWatch>>,
}

impl std::fmt::Debug for ActiveWatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveWatch").finish_non_exhaustive()
    }
}

impl Default for Service {
    fn default() -> Self {
        Self::new()
    }
}

impl Service {
    /// An empty service with the default retry policy.
    #[must_use]
    pub fn new() -> Self {
        Self::with_retry_policy(RetryPolicy::default())
    }

    /// An empty service with a custom retry policy.
    #[must_use]
    pub fn with_retry_policy(retry: RetryPolicy) -> Self {
        Self {
            store: SnapshotStore::new(),
            retry,
            watcher: tokio::sync::Mutex::new(None),
        }
    }

    // ---- lifecycle --------------------------------------------------------

    /// Loads from the source once, replacing the current snapshot on
    /// success.
    ///
    /// # Errors
    ///
    /// Returns the [`LoadError`] of the failed stage. On any failure the
    /// store keeps serving exactly what it served before the attempt.
    pub async fn load_once(&self, source: &dyn DataSource) -> Result<(), LoadError> {
        let span = observability::load_span("load_once", &source.descriptor());
        async {
            let loaded = load_snapshot(source, &self.retry).await?;
            self.store.replace(loaded).await;
            Ok(())
        }
        .instrument(span)
        .await
    }

    /// Loads once synchronously, then keeps reloading in the background
    /// whenever the source signals a change.
    ///
    /// Background reload failures are logged and swallowed; the last good
    /// snapshot keeps serving.
    ///
    /// # Errors
    ///
    /// [`WatchError::AlreadyRunning`] if this instance already has an
    /// active watch, [`WatchError::Load`] if the initial load fails, and
    /// [`WatchError::Setup`] if the source cannot register its
    /// change-notification mechanism.
    pub async fn start_watch(&self, source: Arc<dyn DataSource>) -> Result<(), WatchError> {
        let mut slot = self.watcher.lock().await;
        if slot.is_some() {
            return Err(WatchError::AlreadyRunning);
        }

        self.load_once(source.as_ref()).await?;

        let (changes_tx, changes_rx) = tokio::sync::mpsc::channel::<()>(1);
        let on_change: ChangeCallback = Arc::new(move || {
            // A full queue already carries a pending reload, and every
            // reload fetches the latest bytes.
            let _ = changes_tx.try_send(());
        });
        let source_watch = source.watch(on_change).map_err(|cause| WatchError::Setup {
            descriptor: source.descriptor(),
            cause,
        })?;

        let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
        info!(source = %source.descriptor(), "starting data source watch");
        let task = tokio::spawn(reload_loop(
            self.store.clone(),
            self.retry.clone(),
            source,
            changes_rx,
            shutdown_rx,
        ));

        *slot = Some(ActiveWatch {
            source_watch,
            shutdown: shutdown_tx,
            task,
        });
        Ok(())
    }

    /// Stops the active watch, if any, and waits for the background loop
    /// to fully exit. Idempotent.
    ///
    /// After this returns no further snapshot replacement can happen; a
    /// fetch that was in flight when the stop was requested has its result
    /// abandoned.
    pub async fn stop_watch(&self) {
        let active = self.watcher.lock().await.take();
        let Some(active) = active else {
            return;
        };
        active.source_watch.stop();
        let _ = active.shutdown.send(true);
        let _ = active.task.await;
        info!("data source watch stopped");
    }

    /// Whether a background watch is currently active.
    pub async fn is_watching(&self) -> bool {
        self.watcher.lock().await.is_some()
    }

    // ---- store state ------------------------------------------------------

    /// The current generation, for callers that need several reads against
    /// one consistent snapshot.
    pub async fn current(&self) -> Option<Arc<LoadedSnapshot>> {
        self.store.read().await
    }

    /// Version of the current generation. Cheap; never touches the main
    /// store guard.
    #[must_use]
    pub fn version(&self) -> Option<Version> {
        self.store.version()
    }

    /// Whether any snapshot has been loaded.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.store.is_loaded()
    }

    /// Whether the service can answer queries: a snapshot is loaded and
    /// its employee map is non-empty.
    pub async fn is_ready(&self) -> bool {
        self.with_snapshot(|snapshot| !snapshot.lookups.employees.is_empty())
            .await
            .unwrap_or(false)
    }

    async fn with_snapshot<T>(&self, read: impl FnOnce(&Snapshot) -> T) -> Option<T> {
        let loaded = self.store.read().await?;
        Some(read(&loaded.snapshot))
    }

    // ---- point lookups ----------------------------------------------------

    /// Employee by uid.
    pub async fn employee_by_uid(&self, uid: &str) -> Option<Employee> {
        self.with_snapshot(|s| s.employee_by_uid(uid).cloned())
            .await
            .flatten()
    }

    /// Employee by email, compared case-insensitively.
    pub async fn employee_by_email(&self, email: &str) -> Option<Employee> {
        self.with_snapshot(|s| s.employee_by_email(email).cloned())
            .await
            .flatten()
    }

    /// Employee by chat handle, exact match.
    pub async fn employee_by_slack_id(&self, slack_id: &str) -> Option<Employee> {
        self.with_snapshot(|s| s.employee_by_slack_id(slack_id).cloned())
            .await
            .flatten()
    }

    /// Employee by code-host login, exact match.
    pub async fn employee_by_github_login(&self, github_login: &str) -> Option<Employee> {
        self.with_snapshot(|s| s.employee_by_github_login(github_login).cloned())
            .await
            .flatten()
    }

    /// Manager of the named employee.
    pub async fn manager_of(&self, uid: &str) -> Option<Employee> {
        self.with_snapshot(|s| s.manager_of(uid).cloned())
            .await
            .flatten()
    }

    /// Team by name.
    pub async fn team(&self, name: &str) -> Option<OrgUnit> {
        self.with_snapshot(|s| s.team(name).cloned()).await.flatten()
    }

    /// Organization by name.
    pub async fn org(&self, name: &str) -> Option<OrgUnit> {
        self.with_snapshot(|s| s.org(name).cloned()).await.flatten()
    }

    /// Pillar by name.
    pub async fn pillar(&self, name: &str) -> Option<OrgUnit> {
        self.with_snapshot(|s| s.pillar(name).cloned())
            .await
            .flatten()
    }

    /// Team group by name.
    pub async fn team_group(&self, name: &str) -> Option<OrgUnit> {
        self.with_snapshot(|s| s.team_group(name).cloned())
            .await
            .flatten()
    }

    /// Component by name.
    pub async fn component(&self, name: &str) -> Option<Component> {
        self.with_snapshot(|s| s.component(name).cloned())
            .await
            .flatten()
    }

    /// All components.
    pub async fn components(&self) -> Vec<Component> {
        self.with_snapshot(|s| s.components().into_iter().cloned().collect())
            .await
            .unwrap_or_default()
    }

    // ---- enumeration ------------------------------------------------------

    /// All employee uids.
    pub async fn employee_uids(&self) -> Vec<String> {
        self.with_snapshot(Snapshot::employee_uids)
            .await
            .unwrap_or_default()
    }

    /// All team names.
    pub async fn team_names(&self) -> Vec<String> {
        self.with_snapshot(Snapshot::team_names)
            .await
            .unwrap_or_default()
    }

    /// All organization names.
    pub async fn org_names(&self) -> Vec<String> {
        self.with_snapshot(Snapshot::org_names)
            .await
            .unwrap_or_default()
    }

    /// All pillar names.
    pub async fn pillar_names(&self) -> Vec<String> {
        self.with_snapshot(Snapshot::pillar_names)
            .await
            .unwrap_or_default()
    }

    /// All team-group names.
    pub async fn team_group_names(&self) -> Vec<String> {
        self.with_snapshot(Snapshot::team_group_names)
            .await
            .unwrap_or_default()
    }

    // ---- membership -------------------------------------------------------

    /// Direct memberships of an employee, teams first.
    pub async fn memberships_for_uid(&self, uid: &str) -> Vec<MembershipRef> {
        self.with_snapshot(|s| s.memberships_for_uid(uid).to_vec())
            .await
            .unwrap_or_default()
    }

    /// Names of teams the employee directly belongs to.
    pub async fn teams_for_uid(&self, uid: &str) -> Vec<String> {
        self.with_snapshot(|s| s.teams_for_uid(uid))
            .await
            .unwrap_or_default()
    }

    /// Names of teams the chat user directly belongs to.
    pub async fn teams_for_slack_id(&self, slack_id: &str) -> Vec<String> {
        self.with_snapshot(|s| s.teams_for_slack_id(slack_id))
            .await
            .unwrap_or_default()
    }

    /// Resolved members of a team.
    pub async fn members_of_team(&self, name: &str) -> Vec<Employee> {
        self.with_snapshot(|s| s.members_of_team(name).into_iter().cloned().collect())
            .await
            .unwrap_or_default()
    }

    /// Resolved members of an organization.
    pub async fn members_of_org(&self, name: &str) -> Vec<Employee> {
        self.with_snapshot(|s| s.members_of_org(name).into_iter().cloned().collect())
            .await
            .unwrap_or_default()
    }

    /// Whether the employee is a direct member of the named team.
    pub async fn is_employee_in_team(&self, uid: &str, team_name: &str) -> bool {
        self.with_snapshot(|s| s.is_employee_in_team(uid, team_name))
            .await
            .unwrap_or(false)
    }

    /// Whether the chat user is a direct member of the named team.
    pub async fn is_slack_user_in_team(&self, slack_id: &str, team_name: &str) -> bool {
        self.with_snapshot(|s| s.is_slack_user_in_team(slack_id, team_name))
            .await
            .unwrap_or(false)
    }

    /// Whether the employee belongs to the named organization, directly or
    /// through team ancestry.
    pub async fn is_employee_in_org(&self, uid: &str, org_name: &str) -> bool {
        self.with_snapshot(|s| s.is_employee_in_org(uid, org_name))
            .await
            .unwrap_or(false)
    }

    /// Whether the chat user belongs to the named organization, directly
    /// or through team ancestry.
    pub async fn is_slack_user_in_org(&self, slack_id: &str, org_name: &str) -> bool {
        self.with_snapshot(|s| s.is_slack_user_in_org(slack_id, org_name))
            .await
            .unwrap_or(false)
    }

    /// Affiliation rollup for a chat user.
    pub async fn organizations_for_slack_id(&self, slack_id: &str) -> Vec<Affiliation> {
        self.with_snapshot(|s| s.organizations_for_slack_id(slack_id))
            .await
            .unwrap_or_default()
    }

    // ---- hierarchy --------------------------------------------------------

    /// Ancestor path of a hierarchy entity.
    pub async fn ancestor_path(&self, name: &str, kind: EntityKind) -> Vec<PathEntry> {
        self.with_snapshot(|s| s.ancestor_path(name, kind))
            .await
            .unwrap_or_default()
    }

    /// Descendant tree of a hierarchy entity.
    pub async fn descendant_tree(&self, name: &str) -> Option<HierarchyNode> {
        self.with_snapshot(|s| s.descendant_tree(name))
            .await
            .flatten()
    }

    // ---- Jira ownership ---------------------------------------------------

    /// All known Jira project keys.
    pub async fn jira_projects(&self) -> Vec<String> {
        self.with_snapshot(Snapshot::jira_projects)
            .await
            .unwrap_or_default()
    }

    /// Component keys of a Jira project.
    pub async fn jira_components(&self, project: &str) -> Vec<String> {
        self.with_snapshot(|s| s.jira_components(project))
            .await
            .unwrap_or_default()
    }

    /// Entities owning any component of a Jira project.
    pub async fn jira_owners_of_project(&self, project: &str) -> Vec<JiraOwner> {
        self.with_snapshot(|s| s.jira_owners_of_project(project))
            .await
            .unwrap_or_default()
    }

    /// Entities owning one Jira `(project, component)` pair.
    pub async fn jira_owners_of_component(
        &self,
        project: &str,
        component: &str,
    ) -> Vec<JiraOwner> {
        self.with_snapshot(|s| s.jira_owners_of_component(project, component).to_vec())
            .await
            .unwrap_or_default()
    }

    /// Every Jira pair claimed by the named entity.
    pub async fn jira_ownership_of(&self, entity_name: &str) -> Vec<JiraClaim> {
        self.with_snapshot(|s| s.jira_ownership_of(entity_name))
            .await
            .unwrap_or_default()
    }
}

/// Background reload loop: wait for a change signal, reload, repeat.
///
/// Shutdown wins every race: it is checked both while idle and while a
/// load is in flight, and a load interrupted by shutdown is dropped before
/// it can replace anything.
async fn reload_loop(
    store: SnapshotStore,
    retry: RetryPolicy,
    source: Arc<dyn DataSource>,
    mut changes: tokio::sync::mpsc::Receiver<()>,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            received = changes.recv() => {
                let Some(()) = received else { break };
                tokio::select! {
                    _ = shutdown.changed() => break,
                    result = load_snapshot(source.as_ref(), &retry) => match result {
                        Ok(loaded) => store.replace(loaded).await,
                        Err(error) => warn!(
                            source = %source.descriptor(),
                            error = %error,
                            "reload failed, keeping last good snapshot"
                        ),
                    }
                }
            }
        }
    }
}
