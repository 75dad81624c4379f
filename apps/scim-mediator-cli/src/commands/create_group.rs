//! Create-group command

use std::path::PathBuf;

use clap::Args;
use scim_mediator::models::ScimGroup;
use scim_mediator::provisioner::Provisioner;

use super::{print_summary, read_json_file, Context};
use crate::error::CliResult;

/// Arguments for the create-group command
#[derive(Args, Debug)]
pub struct CreateGroupArgs {
    /// JSON file holding the SCIM group (must contain "displayName")
    #[arg(long = "from-file", value_name = "PATH")]
    pub from_file: PathBuf,
}

pub async fn execute(args: CreateGroupArgs, ctx: &Context) -> CliResult<()> {
    let group: ScimGroup = read_json_file(&args.from_file)?;
    let created = Provisioner::new(&ctx.client, &ctx.store)
        .create_group(&group, &ctx.cancel)
        .await?;
    print_summary(&created)
}
