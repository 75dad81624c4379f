//! scim-mediator - Identity lifecycle mediator for a remote SCIM directory
//!
//! This CLI enables operators to:
//! - Populate and reconcile a local mirror of directory users and groups
//! - Create users and groups and manage group membership
//! - Apply resumable task batches with checkpointing
//! - Permanently delete users past their deactivation grace period

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use scim_mediator::MediatorConfig;

mod commands;
mod error;
mod logging;
mod shutdown;

use commands::Context;
use error::CliResult;

/// scim-mediator - SCIM identity lifecycle mediator
#[derive(Parser, Debug)]
#[command(name = "scim-mediator")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Directory holding the mirror, checkpoint and audit files
    #[arg(long, global = true, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Base URL of the SCIM directory (overrides SCIM_MEDIATOR_API_URL)
    #[arg(long, global = true, value_name = "URL")]
    api_url: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load the local mirror from the directory (initial setup)
    Populate(commands::populate::PopulateArgs),

    /// Reconcile the local mirror and audit out-of-band changes
    Refresh(commands::refresh::RefreshArgs),

    /// Create a user from a JSON file
    CreateUser(commands::create_user::CreateUserArgs),

    /// Create a group from a JSON file
    CreateGroup(commands::create_group::CreateGroupArgs),

    /// Add or remove members of a group
    ManageGroupMembers(commands::manage_group_members::ManageGroupMembersArgs),

    /// Process a batch of tasks, resuming from the checkpoint if present
    ProcessBatch(commands::process_batch::ProcessBatchArgs),

    /// Delete users whose deactivation grace period has expired
    CleanupUsers(commands::cleanup_users::CleanupUsersArgs),
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let result = run(cli).await;

    match result {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            e.print();
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    logging::init_logging(logging::default_filter(cli.global.debug))?;

    let config = load_config(&cli.global, |key| std::env::var(key))?;
    tracing::info!(
        api_url = %config.api_url,
        data_dir = %config.data_dir.display(),
        "Configuration loaded"
    );
    let ctx = Context::new(config, shutdown::shutdown_token())?;

    match cli.command {
        Commands::Populate(args) => commands::populate::execute(args, &ctx).await,
        Commands::Refresh(args) => commands::refresh::execute(args, &ctx).await,
        Commands::CreateUser(args) => commands::create_user::execute(args, &ctx).await,
        Commands::CreateGroup(args) => commands::create_group::execute(args, &ctx).await,
        Commands::ManageGroupMembers(args) => {
            commands::manage_group_members::execute(args, &ctx).await
        }
        Commands::ProcessBatch(args) => commands::process_batch::execute(args, &ctx).await,
        Commands::CleanupUsers(args) => commands::cleanup_users::execute(args, &ctx).await,
    }
}

/// Build the configuration from `reader`, applying command-line overrides.
fn load_config<F>(global: &GlobalArgs, reader: F) -> CliResult<MediatorConfig>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let mut config = MediatorConfig::from_reader(|key| match (key, &global.api_url) {
        ("SCIM_MEDIATOR_API_URL", Some(url)) => Ok(url.clone()),
        _ => reader(key),
    })?;
    if let Some(data_dir) = &global.data_dir {
        config = config.with_data_dir(data_dir);
    }
    Ok(config)
}
