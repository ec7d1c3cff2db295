pub mod common;
pub mod completions;
pub mod players;
pub mod snapshots;
pub mod status;
pub mod sync;
