use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use revolve_adapter::{gcp_registry, AdapterRegistry, GcpRestClient};
use revolve_domain::{DesiredState, TransitionId, TransitionStatus};
use revolve_engine::{daemons, register_builtin_handlers, CheckpointCache, TaskRunner};
use revolve_store::{InMemoryStore, RedbStore, Store};

use crate::cli::DesiredStateArg;
use crate::output;

// ── hcl-apply ─────────────────────────────────────────────────────────────────

pub async fn hcl_apply(path: PathBuf, desired_state: DesiredStateArg, db_path: Option<PathBuf>) -> Result<()> {
    let loaded = revolve_config::load_config(&path)
        .with_context(|| format!("failed to load config from {}", path.display()))?;

    let store = open_store(db_path)?;
    let target = desired_state_from_arg(desired_state);

    let mut applied = Vec::with_capacity(loaded.resources.len());
    for mut resource in loaded.resources {
        resource.desired_state = target;
        store.upsert_resource(&resource).await?;
        applied.push(resource);
    }
    for dependency in &loaded.dependencies {
        store.add_dependency(dependency).await?;
    }

    print!("{}", output::render_apply_summary(&applied, loaded.dependencies.len(), target));
    Ok(())
}

// ── do-transition ─────────────────────────────────────────────────────────────

pub async fn do_transition(
    transition_id: String,
    status_override: Option<String>,
    db_path: Option<PathBuf>,
    gcp_credentials: Option<PathBuf>,
) -> Result<()> {
    let id = TransitionId(
        uuid::Uuid::parse_str(&transition_id).with_context(|| format!("invalid transition id: {transition_id}"))?,
    );

    let store = open_store(db_path)?;

    if let Some(raw) = status_override {
        let mut transition = store
            .get_transition(&id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("transition '{transition_id}' not found"))?;
        transition.status = parse_status(&raw)?;
        store.upsert_transition(&transition).await?;
        println!("Forced transition {transition_id} status to {raw}");
    }

    let registry = build_adapter_registry(gcp_credentials).await?;
    let mut runner = TaskRunner::new(store.clone(), registry, CheckpointCache::default());
    register_builtin_handlers(&mut runner);

    runner.execute_attempt(id, false).await.context("transition attempt failed")?;

    let transition = store
        .get_transition(&id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("transition '{transition_id}' vanished after execution"))?;
    println!("{}", output::render_transition(&transition));
    Ok(())
}

fn parse_status(raw: &str) -> Result<TransitionStatus> {
    match raw {
        "pending" => Ok(TransitionStatus::Pending),
        "sent_to_broker" => Ok(TransitionStatus::SentToBroker),
        "in_progress" => Ok(TransitionStatus::InProgress),
        "succeeded" => Ok(TransitionStatus::Succeeded),
        "failed" => Ok(TransitionStatus::Failed),
        other => anyhow::bail!("unknown transition status '{other}'"),
    }
}

// ── init-db ───────────────────────────────────────────────────────────────────

pub fn init_db(path: PathBuf) -> Result<()> {
    RedbStore::open(&path).with_context(|| format!("failed to create store at {}", path.display()))?;
    println!("Initialized store at {}", path.display());
    Ok(())
}

// ── create-gcp-project / import-gcp-project ──────────────────────────────────
//
// Bootstrap stubs. The original implementation automates these against the
// live GCP Resource Manager and Billing APIs; reimplementing that surface
// is out of scope here, so these print the operator steps instead.

pub fn create_gcp_project() {
    println!("create-gcp-project is a manual step in this build. To provision a new project:");
    println!("  1. gcloud projects create <project-id> --folder=<folder-id>");
    println!("  2. gcloud billing projects link <project-id> --billing-account=<billing-account-id>");
    println!("  3. gcloud services enable compute.googleapis.com --project=<project-id>");
    println!("  4. Set REVOLVE_GCP_CREDENTIALS to a service account key with Compute Admin on <project-id>");
    println!("  5. Run `revolve hcl-apply <config-dir> healthy` against that project.");
}

pub fn import_gcp_project() {
    println!("import-gcp-project is a manual step in this build. To bring an existing project under management:");
    println!("  1. Confirm the operator has Compute Admin on the target project.");
    println!("  2. Write resource config blocks describing the project's existing vpc_network/firewall/subnet/instance resources.");
    println!("  3. Run `revolve hcl-apply <config-dir> healthy` — ensure_exists will identify the resources as already present.");
}

// ── serve ─────────────────────────────────────────────────────────────────────

pub async fn serve(bind: String, db_path: Option<PathBuf>, gcp_credentials: Option<PathBuf>, auth_token: String) -> Result<()> {
    let store = open_store(db_path)?;
    let registry = build_adapter_registry(gcp_credentials).await?;

    let mut runner = TaskRunner::new(store.clone(), registry, CheckpointCache::default());
    register_builtin_handlers(&mut runner);
    let runner = Arc::new(runner);

    let daemon_store = store.clone();
    let daemon_runner = runner.clone();
    tokio::spawn(async move {
        daemons::run_daemon_loops(daemon_store, daemon_runner, std::time::Duration::from_secs(15)).await;
    });

    let app = revolve_api::build_app(store, runner, Arc::new(auth_token));
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind to {bind}"))?;
    tracing::info!(%bind, "revolve server listening");
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

// ── shared helpers ────────────────────────────────────────────────────────────

fn open_store(db_path: Option<PathBuf>) -> Result<Arc<dyn Store>> {
    match db_path {
        Some(path) => {
            let store = RedbStore::open(&path).with_context(|| format!("failed to open store at {}", path.display()))?;
            Ok(Arc::new(store))
        }
        None => {
            eprintln!("warning: REVOLVE_DB_PATH not set, using an in-memory store — state will not survive this process");
            Ok(Arc::new(InMemoryStore::new()))
        }
    }
}

async fn build_adapter_registry(gcp_credentials: Option<PathBuf>) -> Result<AdapterRegistry> {
    if let Some(path) = gcp_credentials {
        std::env::set_var("GOOGLE_APPLICATION_CREDENTIALS", &path);
    }
    let client = GcpRestClient::from_adc()
        .await
        .context("failed to initialize GCP credentials (set REVOLVE_GCP_CREDENTIALS or configure ADC)")?;
    Ok(gcp_registry(Arc::new(client)))
}

fn desired_state_from_arg(arg: DesiredStateArg) -> DesiredState {
    match arg {
        DesiredStateArg::Healthy => DesiredState::Healthy,
        DesiredStateArg::Deleted => DesiredState::Deleted,
    }
}
