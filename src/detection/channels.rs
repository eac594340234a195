// Communication channels for the detection loop
use super::types::{DetectionCommand, DetectionEvent};
use tokio::sync::mpsc;

/// Helper function to create detection channels
pub fn create_detection_channels() -> (
    mpsc::Sender<DetectionCommand>,
    mpsc::Receiver<DetectionCommand>,
    mpsc::Sender<DetectionEvent>,
    mpsc::Receiver<DetectionEvent>,
) {
    let (cmd_tx, cmd_rx) = mpsc::channel(32);
    let (event_tx, event_rx) = mpsc::channel(32);
    (cmd_tx, cmd_rx, event_tx, event_rx)
}
