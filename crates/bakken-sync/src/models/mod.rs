//! Data models for Bakken

mod collection;
mod player;
mod tournament;

pub use collection::{CloudData, CollectionKind, Payload, Snapshot};
pub use player::{Player, PlayerId, PlayerRow};
pub use tournament::{Tournament, TournamentIdStrategy};
