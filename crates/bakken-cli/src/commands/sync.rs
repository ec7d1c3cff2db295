use std::time::Duration;

use bakken_sync::{CollectionKind, SyncEvent};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};

use crate::commands::common::{open_manager, require_remote, Context};
use crate::error::CliError;

pub async fn run_pull(context: &Context) -> Result<(), CliError> {
    if context.offline {
        return Err(CliError::RemoteUnavailable);
    }

    let manager = open_manager(context)?;
    let mut events = manager.subscribe_events();
    manager.initialize().await;
    require_remote(&manager).await?;

    match loaded_collections(&mut events) {
        Some(adopted) => println!("{}", format_adopted(&adopted)),
        None => eprintln!("Remote data could not be loaded; local data left unchanged"),
    }
    manager.shutdown();
    Ok(())
}

pub async fn run_push(context: &Context) -> Result<(), CliError> {
    if context.offline {
        return Err(CliError::RemoteUnavailable);
    }

    let manager = open_manager(context)?;
    let queued = manager.status().await.pending_sync_count;
    manager.initialize().await;
    require_remote(&manager).await?;

    let report = manager.drain_pending().await;
    let pushed = queued.saturating_sub(report.remaining);
    if queued == 0 {
        println!("Nothing to push");
    } else {
        println!("Pushed {pushed} of {queued} pending write(s)");
    }
    if report.remaining > 0 {
        eprintln!("{} write(s) still pending", report.remaining);
    }
    manager.shutdown();
    Ok(())
}

pub async fn run_watch(seconds: Option<u64>, context: &Context) -> Result<(), CliError> {
    if context.offline {
        return Err(CliError::RemoteUnavailable);
    }

    let manager = open_manager(context)?;
    let mut events = manager.subscribe_events();
    manager.initialize().await;
    require_remote(&manager).await?;

    let deadline = seconds.map(|seconds| tokio::time::Instant::now() + Duration::from_secs(seconds));
    loop {
        let next = async {
            match deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, events.recv()).await.ok(),
                None => Some(events.recv().await),
            }
        };

        tokio::select! {
            received = next => match received {
                Some(Ok(event)) => println!("{}", serde_json::to_string(&event)?),
                Some(Err(RecvError::Lagged(skipped))) => {
                    tracing::warn!("Skipped {} events", skipped);
                }
                Some(Err(RecvError::Closed)) | None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    manager.shutdown();
    Ok(())
}

/// Collections adopted during initialization, if the cloud load succeeded.
pub fn loaded_collections(
    events: &mut broadcast::Receiver<SyncEvent>,
) -> Option<Vec<CollectionKind>> {
    loop {
        match events.try_recv() {
            Ok(SyncEvent::DataLoaded { adopted }) => return Some(adopted),
            Ok(_) | Err(TryRecvError::Lagged(_)) => {}
            Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
        }
    }
}

pub fn format_adopted(adopted: &[CollectionKind]) -> String {
    if adopted.is_empty() {
        return "Local data is up to date".to_string();
    }
    let names = adopted
        .iter()
        .map(|collection| collection.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    format!("Adopted remote {names}")
}
