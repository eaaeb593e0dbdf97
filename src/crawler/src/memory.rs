//! In-memory implementations of the remote services and the warehouse sink
//!
//! Compiled for tests and behind the `test-utils` feature. Each fake pages its data, records the
//! calls it receives, and can be told to fail specific calls.

use async_trait::async_trait;
use parking_lot::Mutex;
use rolemap_core::{
    CoreError, LoadReceipt, Organization, Page, Permission, PermissionCatalog,
    PermissionDescriptor, Project, ResourceHierarchy, Result, Role, RoleDetail, RoleDirectory,
    RoleSummary, WarehouseSink,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;

const DEFAULT_PAGE_SIZE: usize = 2;

/// Slice `items` at the offset encoded in `token`
fn page_of<T: Clone>(items: &[T], token: Option<&str>, page_size: usize) -> Result<Page<T>> {
    let start = match token {
        None => 0,
        Some(t) => t
            .parse::<usize>()
            .map_err(|_| CoreError::remote(400, format!("invalid page token '{}'", t)))?,
    };
    let end = (start + page_size.max(1)).min(items.len());
    let slice = items.get(start..end).unwrap_or_default().to_vec();

    if end < items.len() {
        Ok(Page::with_next(slice, end.to_string()))
    } else {
        Ok(Page::last(slice))
    }
}

#[derive(Default)]
struct DirectoryState {
    summaries: HashMap<String, Vec<RoleSummary>>,
    details: HashMap<String, RoleDetail>,
    failing_gets: HashSet<String>,
    /// parent → number of pages served before listing fails
    failing_lists: HashMap<String, usize>,
    get_calls: HashMap<String, usize>,
    get_times: Vec<Instant>,
    list_calls: usize,
}

/// Role directory backed by maps
pub struct MemoryDirectory {
    state: Mutex<DirectoryState>,
    page_size: usize,
    get_delay: Mutex<Option<Duration>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// Serve listings `page_size` summaries at a time
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            state: Mutex::new(DirectoryState::default()),
            page_size,
            get_delay: Mutex::new(None),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Register a role under `parent` with its detail record
    pub fn add_role(&self, parent: &str, summary: RoleSummary, detail: RoleDetail) {
        let mut state = self.state.lock();
        state.details.insert(summary.name.clone(), detail);
        state
            .summaries
            .entry(parent.to_string())
            .or_default()
            .push(summary);
    }

    /// Register a role by name and included permissions
    pub fn add(&self, parent: &str, name: &str, permissions: &[&str]) {
        self.add_role(
            parent,
            RoleSummary::new(name),
            RoleDetail::new(name, permissions.iter().copied()),
        );
    }

    /// Listed summary of a registered role
    pub fn summary(&self, name: &str) -> Option<RoleSummary> {
        self.state
            .lock()
            .summaries
            .values()
            .flatten()
            .find(|s| s.name == name)
            .cloned()
    }

    /// Make detail lookups of `name` fail with a 500
    pub fn fail_get(&self, name: &str) {
        self.state.lock().failing_gets.insert(name.to_string());
    }

    /// Make listing of `parent` fail after serving `pages` pages
    pub fn fail_list(&self, parent: &str, pages: usize) {
        self.state
            .lock()
            .failing_lists
            .insert(parent.to_string(), pages);
    }

    /// Delay every detail lookup by `delay`
    pub fn set_get_delay(&self, delay: Duration) {
        *self.get_delay.lock() = Some(delay);
    }

    /// Number of detail lookups of `name`
    pub fn get_calls(&self, name: &str) -> usize {
        self.state.lock().get_calls.get(name).copied().unwrap_or(0)
    }

    /// Number of detail lookups in total
    pub fn total_get_calls(&self) -> usize {
        self.state.lock().get_calls.values().sum()
    }

    /// Start times of every detail lookup, in call order
    pub fn get_call_times(&self) -> Vec<Instant> {
        self.state.lock().get_times.clone()
    }

    /// Number of listing calls
    pub fn list_calls(&self) -> usize {
        self.state.lock().list_calls
    }

    /// Highest number of detail lookups observed in flight at once
    pub fn max_concurrent_gets(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl Default for MemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RoleDirectory for MemoryDirectory {
    async fn list_roles(
        &self,
        parent: &str,
        page_token: Option<&str>,
        page_size: Option<u32>,
    ) -> Result<Page<RoleSummary>> {
        let mut state = self.state.lock();
        state.list_calls += 1;

        if let Some(remaining) = state.failing_lists.get_mut(parent) {
            if *remaining == 0 {
                return Err(CoreError::remote(503, format!("listing {} unavailable", parent)));
            }
            *remaining -= 1;
        }

        let size = page_size.map(|s| s as usize).unwrap_or(self.page_size);
        let summaries = state.summaries.get(parent).cloned().unwrap_or_default();
        page_of(&summaries, page_token, size)
    }

    async fn get_role(&self, name: &str) -> Result<RoleDetail> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        let result = {
            let mut state = self.state.lock();
            *state.get_calls.entry(name.to_string()).or_default() += 1;
            state.get_times.push(Instant::now());

            if state.failing_gets.contains(name) {
                Err(CoreError::remote(500, format!("lookup of {} failed", name)))
            } else {
                state
                    .details
                    .get(name)
                    .cloned()
                    .ok_or_else(|| CoreError::remote(404, format!("role {} not found", name)))
            }
        };

        let delay = *self.get_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

#[derive(Default)]
struct HierarchyState {
    organizations: HashMap<String, Organization>,
    projects: Vec<Project>,
    fail_projects: bool,
}

/// Resource hierarchy backed by maps
#[derive(Default)]
pub struct MemoryHierarchy {
    state: Mutex<HierarchyState>,
}

impl MemoryHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register organization `organizations/<id>`
    pub fn add_organization(&self, id: &str, display_name: &str) {
        let name = format!("organizations/{}", id);
        self.state.lock().organizations.insert(
            name.clone(),
            Organization {
                name,
                display_name: display_name.to_string(),
                lifecycle_state: "ACTIVE".to_string(),
            },
        );
    }

    /// Register a project in the given lifecycle state, optionally under an organization
    pub fn add_project(&self, project_id: &str, lifecycle_state: &str, organization: Option<&str>) {
        self.state.lock().projects.push(Project {
            project_id: project_id.to_string(),
            name: project_id.to_string(),
            lifecycle_state: lifecycle_state.to_string(),
            parent: organization.map(|id| rolemap_core::ParentRef {
                kind: "organization".to_string(),
                id: id.to_string(),
            }),
            ..Default::default()
        });
    }

    /// Make project listing fail
    pub fn fail_projects(&self) {
        self.state.lock().fail_projects = true;
    }
}

#[async_trait]
impl ResourceHierarchy for MemoryHierarchy {
    async fn get_organization(&self, name: &str) -> Result<Organization> {
        self.state
            .lock()
            .organizations
            .get(name)
            .cloned()
            .ok_or_else(|| CoreError::remote(404, format!("{} not found", name)))
    }

    async fn list_projects(&self, page_token: Option<&str>) -> Result<Page<Project>> {
        let state = self.state.lock();
        if state.fail_projects {
            return Err(CoreError::remote(503, "project listing unavailable"));
        }
        page_of(&state.projects, page_token, DEFAULT_PAGE_SIZE)
    }
}

#[derive(Default)]
struct CatalogState {
    permissions: HashMap<String, Vec<PermissionDescriptor>>,
    failing: HashSet<String>,
    queries: Vec<String>,
}

/// Testable-permission catalog backed by a map of resource name → descriptors
#[derive(Default)]
pub struct MemoryCatalog {
    state: Mutex<CatalogState>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a permission testable on `full_resource_name`
    pub fn add(&self, full_resource_name: &str, descriptor: PermissionDescriptor) {
        self.state
            .lock()
            .permissions
            .entry(full_resource_name.to_string())
            .or_default()
            .push(descriptor);
    }

    /// Make queries for `full_resource_name` fail
    pub fn fail(&self, full_resource_name: &str) {
        self.state
            .lock()
            .failing
            .insert(full_resource_name.to_string());
    }

    /// Resource names queried, one entry per page request
    pub fn queries(&self) -> Vec<String> {
        self.state.lock().queries.clone()
    }
}

#[async_trait]
impl PermissionCatalog for MemoryCatalog {
    async fn query_testable_permissions(
        &self,
        full_resource_name: &str,
        page_token: Option<&str>,
        page_size: Option<u32>,
    ) -> Result<Page<PermissionDescriptor>> {
        let mut state = self.state.lock();
        state.queries.push(full_resource_name.to_string());

        if state.failing.contains(full_resource_name) {
            return Err(CoreError::remote(403, "catalog access denied"));
        }

        let size = page_size.map(|s| s as usize).unwrap_or(DEFAULT_PAGE_SIZE);
        let permissions = state
            .permissions
            .get(full_resource_name)
            .cloned()
            .unwrap_or_default();
        page_of(&permissions, page_token, size)
    }
}

/// Warehouse sink keeping every loaded row in memory
#[derive(Default)]
pub struct MemorySink {
    roles: Mutex<Vec<Role>>,
    permissions: Mutex<Vec<Permission>>,
    loads: AtomicUsize,
    failing: Mutex<bool>,
    rejecting: Mutex<bool>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following load fail
    pub fn fail_loads(&self) {
        *self.failing.lock() = true;
    }

    /// Make validation of every following batch fail
    pub fn reject_rows(&self) {
        *self.rejecting.lock() = true;
    }

    /// All role rows loaded so far
    pub fn roles(&self) -> Vec<Role> {
        self.roles.lock().clone()
    }

    /// All permission rows loaded so far
    pub fn permissions(&self) -> Vec<Permission> {
        self.permissions.lock().clone()
    }

    /// Number of load calls that succeeded
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<()> {
        if *self.failing.lock() {
            Err(CoreError::sink("memory sink configured to fail"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl WarehouseSink for MemorySink {
    async fn validate(&self, _roles: &[Role], _permissions: &[Permission]) -> Result<()> {
        if *self.rejecting.lock() {
            Err(CoreError::sink("memory sink configured to reject rows"))
        } else {
            Ok(())
        }
    }

    async fn load_roles(&self, roles: &[Role]) -> Result<LoadReceipt> {
        self.check()?;
        self.roles.lock().extend_from_slice(roles);
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(LoadReceipt {
            table: "roles".to_string(),
            rows: roles.len(),
            location: "memory".to_string(),
        })
    }

    async fn load_permissions(&self, permissions: &[Permission]) -> Result<LoadReceipt> {
        self.check()?;
        self.permissions.lock().extend_from_slice(permissions);
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(LoadReceipt {
            table: "permissions".to_string(),
            rows: permissions.len(),
            location: "memory".to_string(),
        })
    }
}
