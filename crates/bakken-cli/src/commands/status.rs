use bakken_sync::SyncManager;

use crate::commands::common::{
    collection_summaries, connect_manager, format_status_lines, now_ms, Context, StatusOutput,
};
use crate::error::CliError;

pub async fn run_status(as_json: bool, context: &Context) -> Result<(), CliError> {
    let manager = connect_manager(context).await?;
    let output = status_output(&manager, context).await;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        for line in format_status_lines(&output) {
            println!("{line}");
        }
    }

    manager.shutdown();
    Ok(())
}

pub async fn status_output(manager: &SyncManager, context: &Context) -> StatusOutput {
    StatusOutput {
        report: manager.status().await,
        store_path: context.store_path.display().to_string(),
        collections: collection_summaries(manager.mirror(), now_ms()),
    }
}
