//! Refresh command - Reconcile the local mirror against the directory

use clap::Args;
use scim_mediator::reconciler::Reconciler;
use serde_json::json;

use super::{print_summary, Context};
use crate::error::{CliError, CliResult};

/// Arguments for the refresh command
#[derive(Args, Debug)]
pub struct RefreshArgs {}

/// Detect and audit drift, then overwrite the mirrors.
///
/// Both entity kinds are always reported; the first failure decides the
/// exit code.
pub async fn execute(_args: RefreshArgs, ctx: &Context) -> CliResult<()> {
    let report = Reconciler::new(&ctx.client, &ctx.store)
        .run(&ctx.cancel)
        .await;

    print_summary(&json!({
        "users": report.users.as_ref().ok(),
        "groups": report.groups.as_ref().ok(),
    }))?;

    if report.is_cancelled() {
        return Err(CliError::Interrupted);
    }
    report.users?;
    report.groups?;
    Ok(())
}
