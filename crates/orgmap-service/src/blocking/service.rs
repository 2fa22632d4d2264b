//! Thread-based organizational data service.
//!
//! Mirror of [`crate::Service`] for embedders without an async runtime.
//! The watch loop runs on a dedicated thread and shuts down cooperatively:
//! stopping sets a flag, wakes the loop through its event channel, and
//! joins the thread, so no replacement can happen after `stop_watch`
//! returns. A reload that was mid-fetch when the stop was requested has
//! its result discarded before it can reach the store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, mpsc};
use std::thread;

use tracing::{debug, info, warn};

use orgmap_core::observability;
use orgmap_core::snapshot::{Affiliation, Snapshot, Version};
use orgmap_core::source::WatchHandle;
use orgmap_core::source::blocking::DataSource;
use orgmap_core::{
    Component, Employee, EntityKind, HierarchyNode, JiraClaim, JiraOwner, MembershipRef, OrgUnit,
    PathEntry,
};

use super::store::SnapshotStore;
use crate::error::{LoadError, WatchError};
use crate::retry::{RetryPolicy, fetch_with_retry_blocking};
use crate::store::LoadedSnapshot;

/// Runs the full load pipeline without touching any store.
///
/// `cancel` is forwarded to the retry loop so a shutdown request aborts
/// the backoff schedule instead of sleeping through it.
fn load_snapshot(
    source: &dyn DataSource,
    retry: &RetryPolicy,
    cancel: Option<&AtomicBool>,
) -> Result<LoadedSnapshot, LoadError> {
    let descriptor = source.descriptor();
    debug!(source = %descriptor, "loading organizational data");

    let bytes = fetch_with_retry_blocking(source, retry, cancel)?;
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

enum WatchEvent {
    Reload,
    Shutdown,
}

struct ActiveWatch {
    source_watch: WatchHandle,
    shutdown: Arc<AtomicBool>,
    events_tx: mpsc::Sender<WatchEvent>,
    thread: thread::JoinHandle<()>,
}

impl std::fmt::Debug for ActiveWatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveWatch").finish_non_exhaustive()
    }
}

/// Thread-based organizational data service.
///
/// Create one per process and share it behind an `Arc`; every method takes
/// `&self` and queries may run concurrently with one reload.
#[derive(Debug)]
pub struct Service {
    store: SnapshotStore,
    retry: RetryPolicy,
    watcher: Mutex<Option<ActiveWatch>>,
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
            watcher: Mutex::new(None),
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
    pub fn load_once(&self, source: &dyn DataSource) -> Result<(), LoadError> {
        let span = observability::load_span("load_once", &source.descriptor());
        let _guard = span.enter();
        let loaded = load_snapshot(source, &self.retry, None)?;
        self.store.replace(loaded);
        Ok(())
    }

    /// Loads once synchronously, then keeps reloading on a background
    /// thread whenever the source signals a change.
    ///
    /// Background reload failures are logged and swallowed; the last good
    /// snapshot keeps serving.
    ///
    /// # Errors
    ///
    /// [`WatchError::AlreadyRunning`] if this instance already has an
    /// active watch, [`WatchError::Load`] if the initial load fails, and
    /// [`WatchError::Setup`] if the source cannot register its
    /// change-notification mechanism or the loop thread cannot be spawned.
    pub fn start_watch(&self, source: Arc<dyn DataSource>) -> Result<(), WatchError> {
        let mut slot = self
            .watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return Err(WatchError::AlreadyRunning);
        }

        self.load_once(source.as_ref())?;

        let (events_tx, events_rx) = mpsc::channel::<WatchEvent>();
        let notifier = events_tx.clone();
        let source_watch = source
            .watch(Arc::new(move || {
                let _ = notifier.send(WatchEvent::Reload);
            }))
            .map_err(|cause| WatchError::Setup {
                descriptor: source.descriptor(),
                cause,
            })?;

        let shutdown = Arc::new(AtomicBool::new(false));
        info!(source = %source.descriptor(), "starting data source watch");
        let thread = {
            let store = self.store.clone();
            let retry = self.retry.clone();
            let shutdown = Arc::clone(&shutdown);
            thread::Builder::new()
                .name("orgmap-reload".to_string())
                .spawn(move || reload_loop(&store, &retry, &source, &events_rx, &shutdown))
                .map_err(|cause| WatchError::Setup {
                    descriptor: "reload loop".to_string(),
                    cause: orgmap_core::SourceError::watch_setup(format!(
                        "spawn reload thread: {cause}"
                    )),
                })?
        };

        *slot = Some(ActiveWatch {
            source_watch,
            shutdown,
            events_tx,
            thread,
        });
        Ok(())
    }

    /// Stops the active watch, if any, and joins the background loop.
    /// Idempotent.
    ///
    /// After this returns no further snapshot replacement can happen.
    pub fn stop_watch(&self) {
        let active = self
            .watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(active) = active else {
            return;
        };
        active.shutdown.store(true, Ordering::SeqCst);
        let _ = active.events_tx.send(WatchEvent::Shutdown);
        active.source_watch.stop();
        let _ = active.thread.join();
        info!("data source watch stopped");
    }

    /// Whether a background watch is currently active.
    #[must_use]
    pub fn is_watching(&self) -> bool {
        self.watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    // ---- store state ------------------------------------------------------

    /// The current generation, for callers that need several reads against
    /// one consistent snapshot.
    #[must_use]
    pub fn current(&self) -> Option<Arc<LoadedSnapshot>> {
        self.store.read()
    }

    /// Version of the current generation.
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
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.with_snapshot(|snapshot| !snapshot.lookups.employees.is_empty())
            .unwrap_or(false)
    }

    fn with_snapshot<T>(&self, read: impl FnOnce(&Snapshot) -> T) -> Option<T> {
        let loaded = self.store.read()?;
        Some(read(&loaded.snapshot))
    }

    // ---- point lookups ----------------------------------------------------

    /// Employee by uid.
    #[must_use]
    pub fn employee_by_uid(&self, uid: &str) -> Option<Employee> {
        self.with_snapshot(|s| s.employee_by_uid(uid).cloned())
            .flatten()
    }

    /// Employee by email, compared case-insensitively.
    #[must_use]
    pub fn employee_by_email(&self, email: &str) -> Option<Employee> {
        self.with_snapshot(|s| s.employee_by_email(email).cloned())
            .flatten()
    }

    /// Employee by chat handle, exact match.
    #[must_use]
    pub fn employee_by_slack_id(&self, slack_id: &str) -> Option<Employee> {
        self.with_snapshot(|s| s.employee_by_slack_id(slack_id).cloned())
            .flatten()
    }

    /// Employee by code-host login, exact match.
    #[must_use]
    pub fn employee_by_github_login(&self, github_login: &str) -> Option<Employee> {
        self.with_snapshot(|s| s.employee_by_github_login(github_login).cloned())
            .flatten()
    }

    /// Manager of the named employee.
    #[must_use]
    pub fn manager_of(&self, uid: &str) -> Option<Employee> {
        self.with_snapshot(|s| s.manager_of(uid).cloned()).flatten()
    }

    /// Team by name.
    #[must_use]
    pub fn team(&self, name: &str) -> Option<OrgUnit> {
        self.with_snapshot(|s| s.team(name).cloned()).flatten()
    }

    /// Organization by name.
    #[must_use]
    pub fn org(&self, name: &str) -> Option<OrgUnit> {
        self.with_snapshot(|s| s.org(name).cloned()).flatten()
    }

    /// Pillar by name.
    #[must_use]
    pub fn pillar(&self, name: &str) -> Option<OrgUnit> {
        self.with_snapshot(|s| s.pillar(name).cloned()).flatten()
    }

    /// Team group by name.
    #[must_use]
    pub fn team_group(&self, name: &str) -> Option<OrgUnit> {
        self.with_snapshot(|s| s.team_group(name).cloned()).flatten()
    }

    /// Component by name.
    #[must_use]
    pub fn component(&self, name: &str) -> Option<Component> {
        self.with_snapshot(|s| s.component(name).cloned()).flatten()
    }

    /// All components.
    #[must_use]
    pub fn components(&self) -> Vec<Component> {
        self.with_snapshot(|s| s.components().into_iter().cloned().collect())
            .unwrap_or_default()
    }

    // ---- enumeration ------------------------------------------------------

    /// All employee uids.
    #[must_use]
    pub fn employee_uids(&self) -> Vec<String> {
        self.with_snapshot(Snapshot::employee_uids).unwrap_or_default()
    }

    /// All team names.
    #[must_use]
    pub fn team_names(&self) -> Vec<String> {
        self.with_snapshot(Snapshot::team_names).unwrap_or_default()
    }

    /// All organization names.
    #[must_use]
    pub fn org_names(&self) -> Vec<String> {
        self.with_snapshot(Snapshot::org_names).unwrap_or_default()
    }

    /// All pillar names.
    #[must_use]
    pub fn pillar_names(&self) -> Vec<String> {
        self.with_snapshot(Snapshot::pillar_names).unwrap_or_default()
    }

    /// All team-group names.
    #[must_use]
    pub fn team_group_names(&self) -> Vec<String> {
        self.with_snapshot(Snapshot::team_group_names)
            .unwrap_or_default()
    }

    // ---- membership -------------------------------------------------------

    /// Direct memberships of an employee, teams first.
    #[must_use]
    pub fn memberships_for_uid(&self, uid: &str) -> Vec<MembershipRef> {
        self.with_snapshot(|s| s.memberships_for_uid(uid).to_vec())
            .unwrap_or_default()
    }

    /// Names of teams the employee directly belongs to.
    #[must_use]
    pub fn teams_for_uid(&self, uid: &str) -> Vec<String> {
        self.with_snapshot(|s| s.teams_for_uid(uid)).unwrap_or_default()
    }

    /// Names of teams the chat user directly belongs to.
    #[must_use]
    pub fn teams_for_slack_id(&self, slack_id: &str) -> Vec<String> {
        self.with_snapshot(|s| s.teams_for_slack_id(slack_id))
            .unwrap_or_default()
    }

    /// Resolved members of a team.
    #[must_use]
    pub fn members_of_team(&self, name: &str) -> Vec<Employee> {
        self.with_snapshot(|s| s.members_of_team(name).into_iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Resolved members of an organization.
    #[must_use]
    pub fn members_of_org(&self, name: &str) -> Vec<Employee> {
        self.with_snapshot(|s| s.members_of_org(name).into_iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Whether the employee is a direct member of the named team.
    #[must_use]
    pub fn is_employee_in_team(&self, uid: &str, team_name: &str) -> bool {
        self.with_snapshot(|s| s.is_employee_in_team(uid, team_name))
            .unwrap_or(false)
    }

    /// Whether the chat user is a direct member of the named team.
    #[must_use]
    pub fn is_slack_user_in_team(&self, slack_id: &str, team_name: &str) -> bool {
        self.with_snapshot(|s| s.is_slack_user_in_team(slack_id, team_name))
            .unwrap_or(false)
    }

    /// Whether the employee belongs to the named organization, directly or
    /// through team ancestry.
    #[must_use]
    pub fn is_employee_in_org(&self, uid: &str, org_name: &str) -> bool {
        self.with_snapshot(|s| s.is_employee_in_org(uid, org_name))
            .unwrap_or(false)
    }

    /// Whether the chat user belongs to the named organization, directly
    /// or through team ancestry.
    #[must_use]
    pub fn is_slack_user_in_org(&self, slack_id: &str, org_name: &str) -> bool {
        self.with_snapshot(|s| s.is_slack_user_in_org(slack_id, org_name))
            .unwrap_or(false)
    }

    /// Affiliation rollup for a chat user.
    #[must_use]
    pub fn organizations_for_slack_id(&self, slack_id: &str) -> Vec<Affiliation> {
        self.with_snapshot(|s| s.organizations_for_slack_id(slack_id))
            .unwrap_or_default()
    }

    // ---- hierarchy --------------------------------------------------------

    /// Ancestor path of a hierarchy entity.
    #[must_use]
    pub fn ancestor_path(&self, name: &str, kind: EntityKind) -> Vec<PathEntry> {
        self.with_snapshot(|s| s.ancestor_path(name, kind))
            .unwrap_or_default()
    }

    /// Descendant tree of a hierarchy entity.
    #[must_use]
    pub fn descendant_tree(&self, name: &str) -> Option<HierarchyNode> {
        self.with_snapshot(|s| s.descendant_tree(name)).flatten()
    }

    // ---- Jira ownership ---------------------------------------------------

    /// All known Jira project keys.
    #[must_use]
    pub fn jira_projects(&self) -> Vec<String> {
        self.with_snapshot(Snapshot::jira_projects).unwrap_or_default()
    }

    /// Component keys of a Jira project.
    #[must_use]
    pub fn jira_components(&self, project: &str) -> Vec<String> {
        self.with_snapshot(|s| s.jira_components(project))
            .unwrap_or_default()
    }

    /// Entities owning any component of a Jira project.
    #[must_use]
    pub fn jira_owners_of_project(&self, project: &str) -> Vec<JiraOwner> {
        self.with_snapshot(|s| s.jira_owners_of_project(project))
            .unwrap_or_default()
    }

    /// Entities owning one Jira `(project, component)` pair.
    #[must_use]
    pub fn jira_owners_of_component(&self, project: &str, component: &str) -> Vec<JiraOwner> {
        self.with_snapshot(|s| s.jira_owners_of_component(project, component).to_vec())
            .unwrap_or_default()
    }

    /// Every Jira pair claimed by the named entity.
    #[must_use]
    pub fn jira_ownership_of(&self, entity_name: &str) -> Vec<JiraClaim> {
        self.with_snapshot(|s| s.jira_ownership_of(entity_name))
            .unwrap_or_default()
    }
}

/// Background reload loop: block on the event channel, reload on demand.
///
/// The shutdown flag is checked before a reload starts and again between
/// the load finishing and the store swap, so a stop request discards any
/// in-flight result instead of installing it late.
fn reload_loop(
    store: &SnapshotStore,
    retry: &RetryPolicy,
    source: &Arc<dyn DataSource>,
    events: &mpsc::Receiver<WatchEvent>,
    shutdown: &AtomicBool,
) {
    loop {
        match events.recv() {
            Ok(WatchEvent::Reload) => {
                if shutdown.load(Ordering::SeqCst) {
                    break;
                }
                match load_snapshot(source.as_ref(), retry, Some(shutdown)) {
                    Ok(loaded) => {
                        if shutdown.load(Ordering::SeqCst) {
                            break;
                        }
                        store.replace(loaded);
                    }
                    Err(error) => warn!(
                        source = %source.descriptor(),
                        error = %error,
                        "reload failed, keeping last good snapshot"
                    ),
                }
            }
            Ok(WatchEvent::Shutdown) | Err(_) => break,
        }
    }
}
