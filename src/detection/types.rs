// Types and enums for the detection loop
use crate::camera::FacingMode;
use crate::playback::PlaybackOutcome;
use crate::template_matching::MatchResult;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionState {
    Idle,
    Scanning,
    Playing,
}

/// What a single tick did
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Not scanning, nothing captured
    Inactive,
    /// Template larger than the frame, matcher not called
    Skipped,
    NoMatch(MatchResult),
    Detected(MatchResult),
    /// Capture or matching failed; contained, the loop carries on
    Faulted,
}

#[derive(Debug, Clone)]
pub enum DetectionCommand {
    Start,
    Stop,
    ToggleCamera,
    ClosePlayback,
    SetMuted(bool),
    UpdateThreshold(f32),
    Shutdown,
}

#[derive(Debug, Clone)]
pub enum DetectionEvent {
    StateChanged(DetectionState),
    Confidence(MatchResult),
    TargetDetected(MatchResult),
    PlaybackStarted(PathBuf),
    PlaybackFinished(PlaybackOutcome),
    CameraSwitched(FacingMode),
    Error(String),
}

/// Counters kept across the lifetime of a loop
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionStats {
    pub ticks: u64,
    pub frames_skipped: u64,
    pub faults: u64,
    pub matcher_calls: u64,
    pub detections: u64,
}
