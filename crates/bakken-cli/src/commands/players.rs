use bakken_sync::{CollectionKind, Player, SyncManager, SyncOutcome, SystemClock};

use crate::commands::common::{
    connect_manager, format_outcome, format_player_lines, normalize_player_name, open_manager,
    parse_player_id, Context,
};
use crate::error::CliError;

pub fn run_players_list(as_json: bool, context: &Context) -> Result<(), CliError> {
    let manager = open_manager(context)?;
    let players = manager.mirror().players();

    if as_json {
        println!("{}", serde_json::to_string_pretty(&players)?);
    } else if players.is_empty() {
        println!("No players stored.");
    } else {
        for line in format_player_lines(&players) {
            println!("{line}");
        }
    }
    Ok(())
}

pub async fn run_players_add(
    name_parts: &[String],
    id: Option<&str>,
    context: &Context,
) -> Result<(), CliError> {
    let name = normalize_player_name(name_parts)?;
    let player = match id {
        Some(raw) => Player::new(parse_player_id(raw)?, name),
        None => Player::with_generated_id(&SystemClock, name),
    };

    let manager = connect_manager(context).await?;
    let players = add_player(manager.mirror().players(), player.clone())?;
    let outcome = save_roster(&manager, players).await?;

    println!("{}", player.id);
    eprintln!("{}", format_outcome(CollectionKind::Players, outcome));
    manager.shutdown();
    Ok(())
}

pub async fn run_players_remove(raw_id: &str, context: &Context) -> Result<(), CliError> {
    let id = parse_player_id(raw_id)?;

    let manager = connect_manager(context).await?;
    let (players, removed) = remove_player(manager.mirror().players(), &id)?;
    let outcome = save_roster(&manager, players).await?;

    println!("Removed {} ({})", removed.name, removed.id);
    eprintln!("{}", format_outcome(CollectionKind::Players, outcome));
    manager.shutdown();
    Ok(())
}

async fn save_roster(manager: &SyncManager, players: Vec<Player>) -> Result<SyncOutcome, CliError> {
    Ok(manager.save_players(players).await?)
}

pub fn add_player(mut players: Vec<Player>, player: Player) -> Result<Vec<Player>, CliError> {
    if players.iter().any(|existing| existing.id == player.id) {
        return Err(CliError::DuplicatePlayer(player.id.to_string()));
    }
    players.push(player);
    Ok(players)
}

pub fn remove_player(
    mut players: Vec<Player>,
    id: &bakken_sync::PlayerId,
) -> Result<(Vec<Player>, Player), CliError> {
    let index = players
        .iter()
        .position(|player| &player.id == id)
        .ok_or_else(|| CliError::PlayerNotFound(id.to_string()))?;
    let removed = players.remove(index);
    Ok((players, removed))
}
