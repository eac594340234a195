// Detection module - the scan / detect / play state machine.
// Frames come from `camera`, scores from `template_matching`, overlays go
// through `playback`.

pub mod channels;
pub mod fsm;
pub mod types;


pub use channels::create_detection_channels;
pub use fsm::DetectionLoop;
pub use types::{DetectionCommand, DetectionEvent, DetectionState, DetectionStats, TickOutcome};
