//! Cleanup-users command - Permanently delete long-deactivated users

use clap::Args;
use scim_mediator::cleanup::cleanup_deactivated_users;
use scim_mediator::config::{grace_period_from_days, MAX_GRACE_PERIOD_DAYS};

use super::{print_summary, Context};
use crate::error::{CliError, CliResult};

/// Arguments for the cleanup-users command
#[derive(Args, Debug)]
pub struct CleanupUsersArgs {
    /// Override the grace period (days) from SCIM_MEDIATOR_GRACE_PERIOD_DAYS
    #[arg(long, value_name = "DAYS", value_parser = clap::value_parser!(i64).range(0..=MAX_GRACE_PERIOD_DAYS))]
    pub grace_days: Option<i64>,
}

pub async fn execute(args: CleanupUsersArgs, ctx: &Context) -> CliResult<()> {
    let grace_period = match args.grace_days {
        Some(days) => grace_period_from_days(days)?,
        None => ctx.config.grace_period,
    };

    let summary = cleanup_deactivated_users(
        &ctx.client,
        &ctx.store,
        chrono::Utc::now(),
        grace_period,
        &ctx.cancel,
    )
    .await?;
    print_summary(&summary)?;

    if summary.interrupted {
        return Err(CliError::Interrupted);
    }
    if !summary.failed.is_empty() {
        return Err(CliError::Incomplete(format!(
            "{} user(s) could not be deleted and will be retried on the next run",
            summary.failed.len()
        )));
    }
    Ok(())
}
