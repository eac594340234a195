//! Full-screen overlay playback and its two exit paths

use super::player::{MediaPlayer, PlayerStatus};
use crate::config::PlaybackConfig;
use crate::error::ViewerResult;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::Instant;

/// How an overlay run ended
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackOutcome {
    /// Media reached its end
    Ended,
    /// User dismissed the overlay
    Closed { resume: bool },
    /// The player broke mid-run
    Failed(String),
}

impl PlaybackOutcome {
    /// Whether the detection loop should go back to scanning
    pub fn resume(&self) -> bool {
        match self {
            PlaybackOutcome::Ended => true,
            PlaybackOutcome::Closed { resume } => *resume,
            PlaybackOutcome::Failed(_) => true,
        }
    }
}

pub struct PlaybackController {
    player: Box<dyn MediaPlayer>,
    overlay: PathBuf,
    completion_delay: Duration,
    resume_on_close: bool,
    active: bool,
    ended_at: Option<Instant>,
    muted: bool,
}

impl PlaybackController {
    pub fn new(player: Box<dyn MediaPlayer>, config: &PlaybackConfig) -> Self {
        Self {
            player,
            overlay: config.video_path.clone(),
            completion_delay: config.completion_delay(),
            resume_on_close: config.resume_on_close,
            active: false,
            ended_at: None,
            muted: config.start_muted,
        }
    }

    /// Hide the camera view and start `asset` full-screen
    pub fn play(&mut self, asset: &Path) -> ViewerResult<()> {
        self.player.set_muted(self.muted);
        self.ended_at = None;
        if let Err(e) = self.player.load(asset) {
            self.active = false;
            return Err(e);
        }
        self.active = true;
        log::info!("🎬 Overlay playing: {}", asset.display());
        Ok(())
    }

    /// Play the configured overlay clip
    pub fn play_overlay(&mut self) -> ViewerResult<()> {
        let overlay = self.overlay.clone();
        self.play(&overlay)
    }

    /// Check the player; yields an outcome once per run.
    ///
    /// A natural end is reported only after the completion delay has passed.
    pub fn poll(&mut self) -> Option<PlaybackOutcome> {
        if !self.active {
            return None;
        }
        match self.player.status() {
            PlayerStatus::Idle | PlayerStatus::Playing => None,
            PlayerStatus::Ended => {
                let ended_at = *self.ended_at.get_or_insert_with(Instant::now);
                if ended_at.elapsed() < self.completion_delay {
                    return None;
                }
                log::info!("🏁 Overlay finished");
                self.finish();
                Some(PlaybackOutcome::Ended)
            }
            PlayerStatus::Failed(reason) => {
                log::warn!("⚠️ Overlay playback failed: {}", reason);
                self.finish();
                Some(PlaybackOutcome::Failed(reason))
            }
        }
    }

    /// User close: stop, rewind, report
    pub fn close(&mut self) -> Option<PlaybackOutcome> {
        if !self.active {
            return None;
        }
        self.finish();
        log::info!("✖️ Overlay closed by user");
        Some(PlaybackOutcome::Closed {
            resume: self.resume_on_close,
        })
    }

    /// Tear down without reporting an outcome
    pub fn stop(&mut self) {
        if self.active {
            self.finish();
        }
    }

    fn finish(&mut self) {
        self.player.stop();
        self.active = false;
        self.ended_at = None;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// The camera view is hidden while the overlay is up
    pub fn camera_visible(&self) -> bool {
        !self.active
    }

    pub fn position(&self) -> Duration {
        self.player.position()
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        self.player.set_muted(muted);
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn overlay(&self) -> &Path {
        &self.overlay
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ScriptedPlayer;
    use std::sync::atomic::Ordering;

    fn controller(player: &ScriptedPlayer, config: &PlaybackConfig) -> PlaybackController {
        PlaybackController::new(Box::new(player.clone()), config)
    }

    #[tokio::test(start_paused = true)]
    async fn test_natural_end_waits_for_completion_delay() {
        let player = ScriptedPlayer::new();
        let mut playback = controller(&player, &PlaybackConfig::default());

        playback.play_overlay().unwrap();
        assert!(playback.is_active());
        assert!(!playback.camera_visible());
        assert_eq!(playback.poll(), None);

        player.finish();
        assert_eq!(playback.poll(), None);
        tokio::time::advance(Duration::from_millis(999)).await;
        assert_eq!(playback.poll(), None);
        tokio::time::advance(Duration::from_millis(1)).await;

        let outcome = playback.poll().unwrap();
        assert_eq!(outcome, PlaybackOutcome::Ended);
        assert!(outcome.resume());
        assert!(playback.camera_visible());
        // Reported once
        assert_eq!(playback.poll(), None);
    }

    #[test]
    fn test_close_rewinds_and_follows_config() {
        let player = ScriptedPlayer::new();
        let mut playback = controller(&player, &PlaybackConfig::default());
        playback.play_overlay().unwrap();
        assert!(playback.position() > Duration::ZERO);

        let outcome = playback.close().unwrap();
        assert_eq!(outcome, PlaybackOutcome::Closed { resume: false });
        assert!(!outcome.resume());
        assert_eq!(playback.position(), Duration::ZERO);
        assert_eq!(player.stops.load(Ordering::SeqCst), 1);
        assert_eq!(playback.close(), None);

        let config = PlaybackConfig {
            resume_on_close: true,
            ..PlaybackConfig::default()
        };
        let mut playback = controller(&player, &config);
        playback.play_overlay().unwrap();
        assert!(playback.close().unwrap().resume());
    }

    #[test]
    fn test_load_failure_leaves_controller_inactive() {
        let player = ScriptedPlayer::failing();
        let mut playback = controller(&player, &PlaybackConfig::default());

        assert!(playback.play_overlay().is_err());
        assert!(!playback.is_active());
        assert!(playback.camera_visible());
        assert_eq!(playback.poll(), None);
    }

    #[test]
    fn test_runtime_failure_resumes() {
        let player = ScriptedPlayer::new();
        let mut playback = controller(&player, &PlaybackConfig::default());
        playback.play_overlay().unwrap();

        *player.status.lock().unwrap() = PlayerStatus::Failed("decoder crashed".to_string());
        let outcome = playback.poll().unwrap();
        assert!(matches!(outcome, PlaybackOutcome::Failed(_)));
        assert!(outcome.resume());
        assert!(!playback.is_active());
    }

    #[test]
    fn test_mute_is_forwarded_to_player() {
        let player = ScriptedPlayer::new();
        let config = PlaybackConfig {
            start_muted: true,
            ..PlaybackConfig::default()
        };
        let mut playback = controller(&player, &config);
        playback.play_overlay().unwrap();
        assert!(*player.muted.lock().unwrap());

        playback.set_muted(false);
        assert!(!playback.is_muted());
        assert!(!*player.muted.lock().unwrap());
    }
}
