use bakken_sync::CollectionKind;

use crate::commands::common::{connect_manager, format_outcome, open_manager, read_snapshot, Context};
use crate::error::CliError;

pub fn run_snapshot_show(collection: CollectionKind, context: &Context) -> Result<(), CliError> {
    let manager = open_manager(context)?;
    match manager.mirror().snapshot(collection) {
        Some(snapshot) => println!("{}", serde_json::to_string_pretty(&snapshot)?),
        None => println!("No {collection} stored."),
    }
    Ok(())
}

pub async fn run_snapshot_set(
    collection: CollectionKind,
    input: &str,
    context: &Context,
) -> Result<(), CliError> {
    let snapshot = read_snapshot(input)?;

    let manager = connect_manager(context).await?;
    let outcome = match collection {
        CollectionKind::Teams => manager.save_teams(snapshot).await?,
        CollectionKind::Games => manager.save_games(snapshot).await?,
        CollectionKind::Players => {
            return Err(CliError::InvalidInput(
                "players are managed with `bakken players`".to_string(),
            ));
        }
    };

    println!("{}", format_outcome(collection, outcome));
    manager.shutdown();
    Ok(())
}
