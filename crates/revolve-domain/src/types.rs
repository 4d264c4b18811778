use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

// ── Identifiers ──────────────────────────────────────────────────────────────

const RESOURCE_ID_ALPHABET: &[u8] = b"123456789abcdefghijklmnopqrstuvwxyz";
const RESOURCE_ID_LEN: usize = 16;

/// Opaque resource identifier. Generated the same way the original
/// `ShortUUIDField(length=16)` was: 16 characters drawn from a
/// digit-and-lowercase alphabet that excludes `0`, `o`, `i`, `l`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceId(pub String);

impl ResourceId {
    pub fn new(s: impl Into<String>) -> Self {
        ResourceId(s.into())
    }

    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let s: String = (0..RESOURCE_ID_LEN)
            .map(|_| RESOURCE_ID_ALPHABET[rng.gen_range(0..RESOURCE_ID_ALPHABET.len())] as char)
            .collect();
        ResourceId(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for one scheduled attempt to drive a resource through a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransitionId(pub uuid::Uuid);

impl TransitionId {
    pub fn generate() -> Self {
        TransitionId(uuid::Uuid::new_v4())
    }
}

impl fmt::Display for TransitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Cloud project the resource lives in. Opaque to the engine; adapters
/// interpret it (e.g. a GCP project id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectId(pub String);

impl ProjectId {
    pub fn new(s: impl Into<String>) -> Self {
        ProjectId(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Desired vs. observed state ───────────────────────────────────────────────

/// What the declared configuration wants for a resource. Set once at
/// ingestion time (or when the config changes) and otherwise stable;
/// contrast with `ResourceState`, which tracks where reconciliation
/// currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DesiredState {
    Healthy,
    Deleted,
    Updated,
    Untracked,
}

impl fmt::Display for DesiredState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DesiredState::Healthy => write!(f, "healthy"),
            DesiredState::Deleted => write!(f, "deleted"),
            DesiredState::Updated => write!(f, "updated"),
            DesiredState::Untracked => write!(f, "untracked"),
        }
    }
}

/// Coarse-grained reconciliation state of a resource, projected from its
/// event log. Mirrors the original `ResourceStateEnum`; `newborn_model`
/// (a pre-persistence marker that never appears once a row exists) is
/// collapsed into `Newborn`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceState {
    Newborn,
    DependenciesPending,
    Declared,
    Exists,
    DoesntExist,
    Healthy,
    Deleted,
    CreationTerminated,
    /// Terminal sink for a failed deletion attempt (reverse-dependency
    /// stuck, or `ensure_deleted` exhausted retries). Named in the
    /// original's design notes alongside `creation_terminated` though
    /// omitted from its own state enum listing.
    DeletionTerminated,
    /// Terminal sink for `ensure_healthy` exhausting a terminal health
    /// check. Distinct from the fine-grained `health` field: this is the
    /// coarse reconciliation state the projector parks the resource in.
    Unhealthy,
    Unknown,
}

impl fmt::Display for ResourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResourceState::Newborn => "newborn",
            ResourceState::DependenciesPending => "dependencies_pending",
            ResourceState::Declared => "declared",
            ResourceState::Exists => "exists",
            ResourceState::DoesntExist => "doesnt_exist",
            ResourceState::Healthy => "healthy",
            ResourceState::Deleted => "deleted",
            ResourceState::CreationTerminated => "creation_terminated",
            ResourceState::DeletionTerminated => "deletion_terminated",
            ResourceState::Unhealthy => "unhealthy",
            ResourceState::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// Fine-grained existence check, independent of the coarse `ResourceState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Existence {
    Exists,
    DoesntExist,
    Unknown,
}

impl fmt::Display for Existence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Existence::Exists => write!(f, "exists"),
            Existence::DoesntExist => write!(f, "doesnt_exist"),
            Existence::Unknown => write!(f, "unknown"),
        }
    }
}

/// Fine-grained health-check outcome, independent of existence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Health {
    Healthy,
    Unhealthy,
    Unknown,
}

impl fmt::Display for Health {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Health::Healthy => write!(f, "healthy"),
            Health::Unhealthy => write!(f, "unhealthy"),
            Health::Unknown => write!(f, "unknown"),
        }
    }
}

// ── Transitions ───────────────────────────────────────────────────────────────

/// One step of the per-resource lifecycle that a transition can attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    EnsureDependenciesReady,
    EnsureExists,
    EnsureHealthy,
    EnsureUpdated,
    EnsureForwardDependenciesDeleted,
    EnsureDeleted,
    Test,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::EnsureDependenciesReady => "ensure_dependencies_ready",
            Phase::EnsureExists => "ensure_exists",
            Phase::EnsureHealthy => "ensure_healthy",
            Phase::EnsureUpdated => "ensure_updated",
            Phase::EnsureForwardDependenciesDeleted => "ensure_forward_dependencies_deleted",
            Phase::EnsureDeleted => "ensure_deleted",
            Phase::Test => "test",
        };
        write!(f, "{}", s)
    }
}

/// Lifecycle status of a single transition attempt. `InProgress ->
/// SentToBroker` is the one backward edge, permitted exactly once when a
/// hard-timeout forces a reschedule of an attempt the worker already
/// picked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionStatus {
    Pending,
    SentToBroker,
    InProgress,
    Succeeded,
    Failed,
}

impl fmt::Display for TransitionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransitionStatus::Pending => "pending",
            TransitionStatus::SentToBroker => "sent_to_broker",
            TransitionStatus::InProgress => "in_progress",
            TransitionStatus::Succeeded => "succeeded",
            TransitionStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

impl TransitionStatus {
    /// Whether this status represents a transition that has stopped making
    /// progress and can be garbage-collected from the "in-flight" set.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransitionStatus::Succeeded | TransitionStatus::Failed)
    }
}

/// One scheduled attempt to drive a resource through a single `phase`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transition {
    pub id: TransitionId,
    pub resource_id: ResourceId,
    pub phase: Phase,
    pub status: TransitionStatus,
    /// Zero-based retry counter for this transition; bumped on each retry,
    /// reset to zero only when a fresh `Transition` row is created.
    pub attempt: u32,
    /// Set when a hard-timeout or duplicate-detection forced this
    /// transition to be rescheduled once; never set twice (an attempt that
    /// times out a second time becomes terminal).
    pub rescheduled: bool,
    /// The transition that preceded this one for the same resource, if
    /// any — walked backwards to reconstruct the resource's full history.
    pub previous_transition: Option<TransitionId>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    /// When a retry or reschedule should next be attempted. `None` while
    /// `status` is `InProgress` or terminal.
    pub scheduled_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Transition {
    pub fn new(resource_id: ResourceId, phase: Phase) -> Self {
        let now = chrono::Utc::now();
        Transition {
            id: TransitionId::generate(),
            resource_id,
            phase,
            status: TransitionStatus::Pending,
            attempt: 0,
            rescheduled: false,
            previous_transition: None,
            created_at: now,
            updated_at: now,
            scheduled_at: Some(now),
        }
    }

    pub fn age(&self) -> chrono::Duration {
        chrono::Utc::now() - self.created_at
    }
}

// ── Resources and their dependency edges ─────────────────────────────────────

/// A directed dependency edge: `resource_id` cannot proceed past
/// `ensure_dependencies_ready` until `depends_on` is healthy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDependency {
    pub resource_id: ResourceId,
    pub depends_on: ResourceId,
}

/// A declared cloud resource under management, along with the coarse and
/// fine-grained state the engine has projected for it from its event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub id: ResourceId,
    pub project_id: ProjectId,
    /// Registry key identifying the `ResourceAdapter` that handles this
    /// resource, e.g. `"vpc_network"`, `"firewall"`, `"subnet"`, `"instance"`.
    pub kind: String,
    /// Human-readable slug derived from the declaring config block, unique
    /// within a project. Supplements the opaque `id` for log readability.
    pub hcl_slug: String,
    /// Declared configuration for this resource, as parsed from the
    /// config document. Interpreted by the resource's adapter.
    pub config: serde_json::Value,
    /// SHA-256 hex digest of the canonicalized `config`, used to detect
    /// configuration drift that should trigger `ensure_updated`.
    pub desired_config_hash: String,
    pub desired_state: DesiredState,
    pub state: ResourceState,
    pub existence: Existence,
    pub health: Health,
    /// Last-known raw response from the adapter's creation call, written
    /// once `ensure_exists` records a successful creation. `None` until
    /// then.
    pub creation_response: Option<serde_json::Value>,
    /// Last-known raw response from the adapter's bulk `list` call, when a
    /// list-based check supplied one. `None` until a phase or CLI flow
    /// invokes `ResourceAdapter::list` against this resource's kind.
    pub list_response: Option<serde_json::Value>,
    /// Last-known raw response from the adapter's single-resource
    /// `identify` lookup — this crate's "getter" call — written whenever
    /// `ensure_exists` observes the resource present, before or after
    /// creation.
    pub getter_response: Option<serde_json::Value>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Resource {
    pub fn new(project_id: ProjectId, kind: impl Into<String>, hcl_slug: impl Into<String>, config: serde_json::Value) -> Self {
        let now = chrono::Utc::now();
        let desired_config_hash = compute_desired_hash(&config);
        Resource {
            id: ResourceId::generate(),
            project_id,
            kind: kind.into(),
            hcl_slug: hcl_slug.into(),
            config,
            desired_config_hash,
            desired_state: DesiredState::Healthy,
            state: ResourceState::Newborn,
            existence: Existence::Unknown,
            health: Health::Unknown,
            creation_response: None,
            list_response: None,
            getter_response: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Update the fine-grained `existence`/`health` fields in response to
    /// one projected event, the way the original's
    /// `log_activity_on_resource` updates its model in place. Does not
    /// touch the coarse `state` field — that is the projector's job.
    pub fn apply_fine_grained_event(&mut self, event_type: ResourceEventType) {
        match event_type {
            ResourceEventType::ResourceFound => {
                self.existence = Existence::Exists;
            }
            ResourceEventType::ResourceNotFound => {
                self.existence = Existence::DoesntExist;
                self.health = Health::Unhealthy;
            }
            ResourceEventType::HealthChecksSucceeded | ResourceEventType::ResourceFoundAndHealthy => {
                self.existence = Existence::Exists;
                self.health = Health::Healthy;
            }
            ResourceEventType::HealthCheckFailed | ResourceEventType::HealthChecksTerminated => {
                self.health = Health::Unhealthy;
            }
            _ => {}
        }
        self.updated_at = chrono::Utc::now();
    }
}

/// SHA-256 hex digest of the canonical (key-sorted) JSON encoding of
/// `config`. Two logically-equal configs hash identically regardless of
/// field order, matching how `desired_config_hash` is compared to detect
/// drift between declared and applied configuration.
pub fn compute_desired_hash(config: &serde_json::Value) -> String {
    use sha2::{Digest, Sha256};
    let canonical = canonicalize(config);
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn canonicalize(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let parts: Vec<String> = keys
                .into_iter()
                .map(|k| format!("{}:{}", serde_json::to_string(k).unwrap(), canonicalize(&map[k])))
                .collect();
            format!("{{{}}}", parts.join(","))
        }
        serde_json::Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(canonicalize).collect();
            format!("[{}]", parts.join(","))
        }
        other => other.to_string(),
    }
}

// ── Events ────────────────────────────────────────────────────────────────────

/// Append-only event describing something that happened to a resource.
/// The engine never mutates `Resource::state`/`existence`/`health`
/// directly; it appends a `ResourceEvent` and re-projects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceEventType {
    DependenciesPending,
    DependenciesReady,
    ResourceFound,
    ResourceNotFound,
    CreationRequested,
    CreationSucceeded,
    CreationFailed,
    HealthCheckPassed,
    HealthCheckFailed,
    HealthChecksSucceeded,
    HealthChecksTerminated,
    /// A dependency's health check discovered this resource already
    /// existing and healthy in the same pass (e.g. a VPC network's
    /// `healthy_hook` discovering its auto-created subnetworks).
    ResourceFoundAndHealthy,
    UpdateRequested,
    UpdateSucceeded,
    UpdateFailed,
    DeletionRequested,
    DeletionSucceeded,
    DeletionFailed,
    DeletionTerminated,
    Warning,
    Error,
    TerminalFailure,
}

impl fmt::Display for ResourceEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResourceEventType::DependenciesPending => "dependencies_pending",
            ResourceEventType::DependenciesReady => "dependencies_ready",
            ResourceEventType::ResourceFound => "resource_found",
            ResourceEventType::ResourceNotFound => "resource_not_found",
            ResourceEventType::CreationRequested => "creation_requested",
            ResourceEventType::CreationSucceeded => "creation_succeeded",
            ResourceEventType::CreationFailed => "creation_failed",
            ResourceEventType::HealthCheckPassed => "health_check_passed",
            ResourceEventType::HealthCheckFailed => "health_check_failed",
            ResourceEventType::HealthChecksSucceeded => "health_checks_succeeded",
            ResourceEventType::HealthChecksTerminated => "health_checks_terminated",
            ResourceEventType::ResourceFoundAndHealthy => "resource_found_and_healthy",
            ResourceEventType::UpdateRequested => "update_requested",
            ResourceEventType::UpdateSucceeded => "update_succeeded",
            ResourceEventType::UpdateFailed => "update_failed",
            ResourceEventType::DeletionRequested => "deletion_requested",
            ResourceEventType::DeletionSucceeded => "deletion_succeeded",
            ResourceEventType::DeletionFailed => "deletion_failed",
            ResourceEventType::DeletionTerminated => "deletion_terminated",
            ResourceEventType::Warning => "warning",
            ResourceEventType::Error => "error",
            ResourceEventType::TerminalFailure => "terminal_failure",
        };
        write!(f, "{}", s)
    }
}

/// A single entry in a resource's append-only event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceEvent {
    pub id: uuid::Uuid,
    pub resource_id: ResourceId,
    pub transition_id: Option<TransitionId>,
    pub phase: Option<Phase>,
    pub event_type: ResourceEventType,
    /// Free-text discriminator for events whose side effect depends on
    /// more than the `(phase, event_type)` pair, e.g. `"found_before_creation"`
    /// vs. `"found_after_creation"` for a `ResourceFound` seen during
    /// `ensure_exists`.
    pub reason: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl ResourceEvent {
    pub fn new(
        resource_id: ResourceId,
        transition_id: Option<TransitionId>,
        phase: Option<Phase>,
        event_type: ResourceEventType,
        reason: Option<String>,
    ) -> Self {
        ResourceEvent {
            id: uuid::Uuid::new_v4(),
            resource_id,
            transition_id,
            phase,
            event_type,
            reason,
            created_at: chrono::Utc::now(),
        }
    }
}

/// Lifecycle event on a `Transition` itself, as opposed to on the
/// resource it targets. Used for the task-runner's own bookkeeping
/// (dedup detection, hard-timeout rescheduling) independent of the
/// resource-level projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionEventType {
    Started,
    Retrying,
    Rescheduled,
    DuplicateDetected,
    HardTimeout,
    Succeeded,
    Failed,
}

impl fmt::Display for TransitionEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransitionEventType::Started => "started",
            TransitionEventType::Retrying => "retrying",
            TransitionEventType::Rescheduled => "rescheduled",
            TransitionEventType::DuplicateDetected => "duplicate_detected",
            TransitionEventType::HardTimeout => "hard_timeout",
            TransitionEventType::Succeeded => "succeeded",
            TransitionEventType::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionEvent {
    pub id: uuid::Uuid,
    pub transition_id: TransitionId,
    pub event_type: TransitionEventType,
    pub reason: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl TransitionEvent {
    pub fn new(transition_id: TransitionId, event_type: TransitionEventType, reason: Option<String>) -> Self {
        TransitionEvent {
            id: uuid::Uuid::new_v4(),
            transition_id,
            event_type,
            reason,
            created_at: chrono::Utc::now(),
        }
    }
}

// ── Checkpoints ───────────────────────────────────────────────────────────────

/// A memoized successful result of one idempotent step within a phase
/// handler, keyed by `(transition_id, step_name)`. Lets a retried
/// attempt skip side effects it already completed (e.g. re-reading a
/// "creation requested" API response) rather than re-issuing them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub transition_id: TransitionId,
    pub step_name: String,
    pub result: serde_json::Value,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

// ── Retry policy parameters ───────────────────────────────────────────────────

/// Per-`(kind, phase)` retry tuning, analogous to the original's
/// `RETRY_PARAMS` class attribute that some resource kinds override for
/// slow-converging phases (e.g. a VPC network's `ensure_healthy` waiting
/// on GCP subnetwork auto-creation).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryParams {
    /// Multiplier applied to `2^attempt` when computing backoff, in seconds.
    pub retry_backoff: f64,
    /// Attempt index (0-based) at which the transition is considered exhausted.
    pub max_retries: u32,
    /// Total wall-clock seconds since the transition's first attempt after
    /// which it is considered exhausted regardless of `max_retries`.
    pub total_timeout_secs: i64,
    /// Upper bound on any single backoff delay, in seconds.
    pub retry_backoff_max: f64,
    /// Whether to apply full jitter (uniform random in `[0, countdown]`)
    /// on top of the exponential backoff.
    pub full_jitter: bool,
}

impl Default for RetryParams {
    fn default() -> Self {
        RetryParams {
            retry_backoff: 1.0,
            max_retries: 6,
            total_timeout_secs: 1800,
            retry_backoff_max: 600.0,
            full_jitter: false,
        }
    }
}
