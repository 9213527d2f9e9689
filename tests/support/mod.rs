// ABOUTME: Test support utilities.
// ABOUTME: In-memory collaborator fakes with failure injection, and a temp project fixture.

#![allow(dead_code)]

use async_trait::async_trait;
use horsestrap::config::Config;
use horsestrap::output::{Output, OutputMode};
use horsestrap::runtime::{
    Database, DatabaseError, HealthState, HttpProbe, ProvisionError, Provisioner, SourceControl,
    SourceError,
};
use horsestrap::types::{ImageId, Revision, ServiceName};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Once;
use tempfile::TempDir;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter =
            EnvFilter::from_default_env().add_directive("horsestrap=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub fn quiet() -> Output {
    Output::new(OutputMode::Quiet)
}

pub fn svc(name: &str) -> ServiceName {
    ServiceName::new(name).unwrap()
}

// =============================================================================
// Project fixture
// =============================================================================

pub const BASE_CONFIG: &str = r#"
branch: main
primary_service: web
app_services: [web, worker]
database:
  service: db
  user: app
  name: app
config_files:
  - .env
  - config/app.toml
health:
  services: { max_attempts: 3, interval: 10ms }
  http:
    url: http://app.test/
    budget: { max_attempts: 3, interval: 10ms }
rollback_probe: { max_attempts: 2, interval: 10ms }
"#;

/// A temporary project directory with a compose file and config files.
pub struct Project {
    pub dir: TempDir,
    pub config: Config,
}

impl Project {
    pub fn new() -> Self {
        Self::with_config(BASE_CONFIG)
    }

    pub fn with_config(yaml: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("docker-compose.yml"),
            "services:\n  web: {}\n  worker: {}\n  db: {}\n",
        )
        .unwrap();
        std::fs::write(dir.path().join(".env"), "APP_MODE=blue\n").unwrap();
        std::fs::create_dir_all(dir.path().join("config")).unwrap();
        std::fs::write(dir.path().join("config/app.toml"), "workers = 2\n").unwrap();

        let config = Config::from_yaml(yaml)
            .unwrap()
            .with_project_dir(dir.path());
        Self { dir, config }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn read(&self, rel: &str) -> String {
        std::fs::read_to_string(self.path().join(rel)).unwrap()
    }

    pub fn write(&self, rel: &str, content: &str) {
        std::fs::write(self.path().join(rel), content).unwrap();
    }
}

// =============================================================================
// Source control fake
// =============================================================================

#[derive(Debug)]
struct SourceState {
    head: Revision,
    upstream: Revision,
    dirty: bool,
    stashes: Vec<String>,
    resets: Vec<Revision>,
    fetches: usize,
    fail_fetch: bool,
    fail_pull: bool,
    on_pull: Option<(PathBuf, String)>,
}

/// Working tree that fast-forwards to `upstream` on pull.
pub struct FakeSource {
    state: Mutex<SourceState>,
}

impl FakeSource {
    pub fn at(rev: &str) -> Self {
        Self {
            state: Mutex::new(SourceState {
                head: Revision::new(rev),
                upstream: Revision::new(rev),
                dirty: false,
                stashes: Vec::new(),
                resets: Vec::new(),
                fetches: 0,
                fail_fetch: false,
                fail_pull: false,
                on_pull: None,
            }),
        }
    }

    /// File the next pull rewrites, the way an upstream change to a
    /// tracked file would.
    pub fn pull_writes(&self, path: impl Into<PathBuf>, content: &str) {
        self.state.lock().on_pull = Some((path.into(), content.to_string()));
    }

    /// New commit available on the remote.
    pub fn push_upstream(&self, rev: &str) {
        self.state.lock().upstream = Revision::new(rev);
    }

    pub fn set_dirty(&self, dirty: bool) {
        self.state.lock().dirty = dirty;
    }

    pub fn fail_fetch(&self, fail: bool) {
        self.state.lock().fail_fetch = fail;
    }

    pub fn fail_pull(&self, fail: bool) {
        self.state.lock().fail_pull = fail;
    }

    pub fn head(&self) -> Revision {
        self.state.lock().head.clone()
    }

    pub fn stashes(&self) -> Vec<String> {
        self.state.lock().stashes.clone()
    }

    pub fn resets(&self) -> Vec<Revision> {
        self.state.lock().resets.clone()
    }

    pub fn fetches(&self) -> usize {
        self.state.lock().fetches
    }
}

#[async_trait]
impl SourceControl for FakeSource {
    async fn check_available(&self) -> Result<(), SourceError> {
        Ok(())
    }

    async fn current_revision(&self) -> Result<Revision, SourceError> {
        Ok(self.head())
    }

    async fn fetch(&self) -> Result<(), SourceError> {
        let mut state = self.state.lock();
        state.fetches += 1;
        if state.fail_fetch {
            return Err(SourceError::RemoteUnreachable("connection refused".into()));
        }
        Ok(())
    }

    async fn pull(&self, _branch: &str) -> Result<Revision, SourceError> {
        let mut state = self.state.lock();
        if state.fail_pull {
            return Err(SourceError::RemoteUnreachable("pull failed".into()));
        }
        if let Some((path, content)) = state.on_pull.take() {
            std::fs::write(&path, content)
                .map_err(|e| SourceError::OperationFailed(e.to_string()))?;
        }
        state.head = state.upstream.clone();
        Ok(state.head.clone())
    }

    async fn has_uncommitted_changes(&self) -> Result<bool, SourceError> {
        Ok(self.state.lock().dirty)
    }

    async fn stash(&self, label: &str) -> Result<(), SourceError> {
        let mut state = self.state.lock();
        state.stashes.push(label.to_string());
        state.dirty = false;
        Ok(())
    }

    async fn reset_hard(&self, revision: &Revision) -> Result<(), SourceError> {
        let mut state = self.state.lock();
        state.head = revision.clone();
        state.resets.push(revision.clone());
        Ok(())
    }
}

// =============================================================================
// Provisioner fake
// =============================================================================

#[derive(Debug)]
struct ProvisionState {
    running_image: ImageId,
    available_image: ImageId,
    health: HealthState,
    health_script: VecDeque<HealthState>,
    per_service: HashMap<ServiceName, HealthState>,
    missing: bool,
    started: bool,
    recreated: Vec<Vec<ServiceName>>,
    stopped: Vec<Vec<ServiceName>>,
    stop_all_calls: usize,
    start_all_calls: usize,
    health_calls: usize,
    fail_pull: bool,
    fail_recreate: bool,
    fail_stop_all: bool,
    fail_start_all: bool,
}

/// Compose stack where recreate swaps in the last pulled image.
pub struct FakeProvisioner {
    state: Mutex<ProvisionState>,
}

impl FakeProvisioner {
    pub fn healthy() -> Self {
        Self::with_health(HealthState::Healthy)
    }

    pub fn with_health(health: HealthState) -> Self {
        Self {
            state: Mutex::new(ProvisionState {
                running_image: ImageId::new("sha256:old"),
                available_image: ImageId::new("sha256:old"),
                health,
                health_script: VecDeque::new(),
                per_service: HashMap::new(),
                missing: false,
                started: true,
                recreated: Vec::new(),
                stopped: Vec::new(),
                stop_all_calls: 0,
                start_all_calls: 0,
                health_calls: 0,
                fail_pull: false,
                fail_recreate: false,
                fail_stop_all: false,
                fail_start_all: false,
            }),
        }
    }

    /// Image a pull makes available to the next recreate.
    pub fn publish_image(&self, id: &str) {
        self.state.lock().available_image = ImageId::new(id);
    }

    pub fn set_health(&self, health: HealthState) {
        self.state.lock().health = health;
    }

    pub fn set_service_health(&self, service: &str, health: HealthState) {
        self.state.lock().per_service.insert(svc(service), health);
    }

    /// Health answers returned before falling back to the steady state.
    pub fn script_health(&self, script: Vec<HealthState>) {
        self.state.lock().health_script = script.into();
    }

    /// No containers exist for any service.
    pub fn set_missing(&self, missing: bool) {
        self.state.lock().missing = missing;
    }

    pub fn fail_pull(&self, fail: bool) {
        self.state.lock().fail_pull = fail;
    }

    pub fn fail_recreate(&self, fail: bool) {
        self.state.lock().fail_recreate = fail;
    }

    /// Stop times out after taking the stack partly down.
    pub fn fail_stop_all(&self, fail: bool) {
        self.state.lock().fail_stop_all = fail;
    }

    pub fn fail_start_all(&self, fail: bool) {
        self.state.lock().fail_start_all = fail;
    }

    pub fn running_image_id(&self) -> ImageId {
        self.state.lock().running_image.clone()
    }

    pub fn recreated(&self) -> Vec<Vec<ServiceName>> {
        self.state.lock().recreated.clone()
    }

    pub fn stopped(&self) -> Vec<Vec<ServiceName>> {
        self.state.lock().stopped.clone()
    }

    pub fn stop_all_calls(&self) -> usize {
        self.state.lock().stop_all_calls
    }

    pub fn start_all_calls(&self) -> usize {
        self.state.lock().start_all_calls
    }

    pub fn health_calls(&self) -> usize {
        self.state.lock().health_calls
    }

    pub fn is_started(&self) -> bool {
        self.state.lock().started
    }
}

#[async_trait]
impl Provisioner for FakeProvisioner {
    async fn check_available(&self) -> Result<(), ProvisionError> {
        Ok(())
    }

    async fn pull_images(&self) -> Result<(), ProvisionError> {
        if self.state.lock().fail_pull {
            return Err(ProvisionError::PullFailed("registry unavailable".into()));
        }
        Ok(())
    }

    async fn recreate(&self, services: &[ServiceName]) -> Result<(), ProvisionError> {
        let mut state = self.state.lock();
        state.recreated.push(services.to_vec());
        if state.fail_recreate {
            return Err(ProvisionError::OperationFailed("recreate failed".into()));
        }
        state.running_image = state.available_image.clone();
        state.started = true;
        Ok(())
    }

    async fn stop(&self, services: &[ServiceName]) -> Result<(), ProvisionError> {
        self.state.lock().stopped.push(services.to_vec());
        Ok(())
    }

    async fn stop_all(&self) -> Result<(), ProvisionError> {
        let mut state = self.state.lock();
        state.stop_all_calls += 1;
        state.started = false;
        if state.fail_stop_all {
            return Err(ProvisionError::OperationFailed("stop timed out".into()));
        }
        Ok(())
    }

    async fn start_all(&self) -> Result<(), ProvisionError> {
        let mut state = self.state.lock();
        state.start_all_calls += 1;
        if state.fail_start_all {
            return Err(ProvisionError::OperationFailed("up failed".into()));
        }
        state.started = true;
        Ok(())
    }

    async fn health_of(&self, service: &ServiceName) -> Result<HealthState, ProvisionError> {
        let mut state = self.state.lock();
        state.health_calls += 1;
        if state.missing {
            return Err(ProvisionError::ServiceNotFound(service.to_string()));
        }
        if let Some(next) = state.health_script.pop_front() {
            return Ok(next);
        }
        Ok(state
            .per_service
            .get(service)
            .copied()
            .unwrap_or(state.health))
    }

    async fn running_image(
        &self,
        _service: &ServiceName,
    ) -> Result<Option<ImageId>, ProvisionError> {
        Ok(Some(self.state.lock().running_image.clone()))
    }
}

// =============================================================================
// Database fake
// =============================================================================

#[derive(Default)]
pub struct FakeDatabase {
    fail_dump: Mutex<bool>,
    fail_queries: Mutex<bool>,
    dumps: Mutex<Vec<PathBuf>>,
    queries: Mutex<Vec<String>>,
}

impl FakeDatabase {
    pub fn failing() -> Self {
        let db = Self::default();
        *db.fail_dump.lock() = true;
        db
    }

    /// Server down: every query is refused.
    pub fn fail_queries(&self, fail: bool) {
        *self.fail_queries.lock() = fail;
    }

    pub fn dumps(&self) -> Vec<PathBuf> {
        self.dumps.lock().clone()
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().clone()
    }
}

#[async_trait]
impl Database for FakeDatabase {
    async fn exec_sql(&self, query: &str) -> Result<(), DatabaseError> {
        self.queries.lock().push(query.to_string());
        if *self.fail_queries.lock() {
            return Err(DatabaseError::QueryFailed(
                "psql: could not connect to server".into(),
            ));
        }
        Ok(())
    }

    async fn backup_to(&self, path: &Path) -> Result<(), DatabaseError> {
        self.dumps.lock().push(path.to_path_buf());
        // Leave a partial file behind, the way an interrupted dump would.
        std::fs::write(path, "-- PostgreSQL database dump\n")?;
        if *self.fail_dump.lock() {
            return Err(DatabaseError::DumpFailed("pg_dump: connection refused".into()));
        }
        Ok(())
    }
}

// =============================================================================
// HTTP probe fake
// =============================================================================

/// Answers from a script, then a steady status.
pub struct FakeHttp {
    script: Mutex<VecDeque<Option<u16>>>,
    steady: Mutex<Option<u16>>,
    calls: Mutex<Vec<String>>,
}

impl FakeHttp {
    pub fn always(status: Option<u16>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            steady: Mutex::new(status),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn scripted(script: Vec<Option<u16>>, then: Option<u16>) -> Self {
        let http = Self::always(then);
        *http.script.lock() = script.into();
        http
    }

    pub fn set(&self, status: Option<u16>) {
        *self.steady.lock() = status;
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl HttpProbe for FakeHttp {
    async fn status_code(&self, url: &str) -> Option<u16> {
        self.calls.lock().push(url.to_string());
        if let Some(next) = self.script.lock().pop_front() {
            return next;
        }
        *self.steady.lock()
    }
}
