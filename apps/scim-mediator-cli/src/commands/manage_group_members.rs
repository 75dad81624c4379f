//! Manage-group-members command

use clap::Args;
use scim_mediator::provisioner::Provisioner;

use super::{print_summary, Context};
use crate::error::{CliError, CliResult};

/// Arguments for the manage-group-members command
#[derive(Args, Debug)]
pub struct ManageGroupMembersArgs {
    /// Display name of the group
    #[arg(long)]
    pub group: String,

    /// Usernames to add (comma-separated or repeated)
    #[arg(long, value_delimiter = ',', num_args = 1..)]
    pub add: Vec<String>,

    /// Usernames to remove (comma-separated or repeated)
    #[arg(long, value_delimiter = ',', num_args = 1..)]
    pub remove: Vec<String>,
}

impl ManageGroupMembersArgs {
    fn validate(&self) -> CliResult<()> {
        if self.add.is_empty() && self.remove.is_empty() {
            return Err(CliError::Input(
                "at least one of --add or --remove is required".to_string(),
            ));
        }
        Ok(())
    }
}

pub async fn execute(args: ManageGroupMembersArgs, ctx: &Context) -> CliResult<()> {
    args.validate()?;
    let summary = Provisioner::new(&ctx.client, &ctx.store)
        .manage_group_members(&args.group, &args.add, &args.remove, &ctx.cancel)
        .await?;
    print_summary(&summary)
}
