/// Overlay playback: the player seam, the shipped players and the controller
/// that reports how each run ended
pub mod controller;
pub mod player;

pub use controller::{PlaybackController, PlaybackOutcome};
pub use player::{MediaPlayer, PlayerStatus, ProcessPlayer, TimedPlayer, player_from_config};
