//! Populate command - Initial load of the local mirror

use clap::Args;
use scim_mediator::reconciler::Reconciler;

use super::{print_summary, Context};
use crate::error::CliResult;

/// Arguments for the populate command
#[derive(Args, Debug)]
pub struct PopulateArgs {}

/// Overwrite both mirrors with the directory's current state.
pub async fn execute(_args: PopulateArgs, ctx: &Context) -> CliResult<()> {
    let summary = Reconciler::new(&ctx.client, &ctx.store)
        .populate(&ctx.cancel)
        .await?;
    print_summary(&summary)
}
