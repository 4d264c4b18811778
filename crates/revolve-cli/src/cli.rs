use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "revolve",
    about = "Declarative cloud-resource reconciliation via a durable transition engine",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Load a resource config directory and seed its resources into the
    /// store at the given desired state.
    HclApply {
        /// Path to the resource config directory.
        path: PathBuf,

        /// Desired state to apply to every resource declared under `path`.
        #[arg(value_enum, default_value = "healthy")]
        desired_state: DesiredStateArg,

        #[arg(long, env = "REVOLVE_DB_PATH")]
        db_path: Option<PathBuf>,
    },

    /// Run a single transition attempt directly against the store,
    /// optionally forcing its status first. Intended for manual recovery
    /// of a transition stuck outside the normal daemon loop.
    DoTransition {
        /// UUID of the transition to execute.
        transition_id: String,

        /// Force the transition's status before executing the attempt.
        #[arg(long)]
        status_override: Option<String>,

        #[arg(long, env = "REVOLVE_DB_PATH")]
        db_path: Option<PathBuf>,

        #[arg(long, env = "REVOLVE_GCP_CREDENTIALS")]
        gcp_credentials: Option<PathBuf>,
    },

    /// Create (or open) a redb-backed store file and exit.
    InitDb {
        /// Path to the redb database file.
        path: PathBuf,
    },

    /// Print the manual steps to bootstrap a new GCP project for this engine.
    ///
    /// This crate does not reimplement GCP project creation; that API
    /// surface is out of scope here.
    CreateGcpProject,

    /// Print the manual steps to import an existing GCP project so this
    /// engine can reconcile resources inside it.
    ImportGcpProject,

    /// Run the reconciliation daemon loops alongside the HTTP API.
    Serve {
        #[arg(long, env = "REVOLVE_BIND_ADDR", default_value = "0.0.0.0:8080")]
        bind: String,

        #[arg(long, env = "REVOLVE_DB_PATH")]
        db_path: Option<PathBuf>,

        #[arg(long, env = "REVOLVE_GCP_CREDENTIALS")]
        gcp_credentials: Option<PathBuf>,

        #[arg(long, env = "REVOLVE_AUTH_TOKEN")]
        auth_token: String,
    },
}

#[derive(Debug, Clone, ValueEnum)]
pub enum DesiredStateArg {
    Healthy,
    Deleted,
}
