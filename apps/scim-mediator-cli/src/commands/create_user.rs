//! Create-user command

use std::path::PathBuf;

use clap::Args;
use scim_mediator::models::ScimUser;
use scim_mediator::provisioner::Provisioner;

use super::{print_summary, read_json_file, Context};
use crate::error::CliResult;

/// Arguments for the create-user command
#[derive(Args, Debug)]
pub struct CreateUserArgs {
    /// JSON file holding the SCIM user (must contain "userName")
    #[arg(long = "from-file", value_name = "PATH")]
    pub from_file: PathBuf,
}

/// Create a user remotely and record it in the mirror.
pub async fn execute(args: CreateUserArgs, ctx: &Context) -> CliResult<()> {
    let user: ScimUser = read_json_file(&args.from_file)?;
    let created = Provisioner::new(&ctx.client, &ctx.store)
        .create_user(&user, &ctx.cancel)
        .await?;
    print_summary(&created)
}
