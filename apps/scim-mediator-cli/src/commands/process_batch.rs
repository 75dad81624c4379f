//! Process-batch command - Apply a task file with checkpoint and resume

use std::path::PathBuf;

use clap::Args;
use scim_mediator::checkpoint::Checkpoint;
use scim_mediator::processor::BatchProcessor;

use super::{print_summary, Context};
use crate::error::{CliError, CliResult};

/// Arguments for the process-batch command
#[derive(Args, Debug)]
pub struct ProcessBatchArgs {
    /// Task file to ingest; ignored while an unfinished checkpoint exists
    #[arg(long = "from-file", value_name = "PATH")]
    pub from_file: Option<PathBuf>,
}

/// Run (or resume) a batch.
///
/// Exits non-zero when any task failed so that schedulers notice; the
/// checkpoint keeps the failed tasks for inspection.
pub async fn execute(args: ProcessBatchArgs, ctx: &Context) -> CliResult<()> {
    let checkpoint = Checkpoint::in_dir(ctx.store.data_dir());
    let summary = BatchProcessor::new(&ctx.client, &ctx.store, checkpoint)
        .run(args.from_file.as_deref(), &ctx.cancel)
        .await?;
    print_summary(&summary)?;

    if summary.interrupted {
        return Err(CliError::Interrupted);
    }
    if summary.failed > 0 {
        return Err(CliError::Incomplete(format!(
            "{} of {} task(s) failed; see audit.log and the checkpoint file",
            summary.failed, summary.total
        )));
    }
    Ok(())
}
