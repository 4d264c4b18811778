mod cli;
mod commands;
mod output;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Command};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::HclApply { path, desired_state, db_path } => {
            commands::hcl_apply(path, desired_state, db_path).await
        }
        Command::DoTransition { transition_id, status_override, db_path, gcp_credentials } => {
            commands::do_transition(transition_id, status_override, db_path, gcp_credentials).await
        }
        Command::InitDb { path } => commands::init_db(path),
        Command::CreateGcpProject => {
            commands::create_gcp_project();
            Ok(())
        }
        Command::ImportGcpProject => {
            commands::import_gcp_project();
            Ok(())
        }
        Command::Serve { bind, db_path, gcp_credentials, auth_token } => {
            commands::serve(bind, db_path, gcp_credentials, auth_token).await
        }
    }
}
