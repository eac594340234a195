// Media player seam and the two shipped players
use crate::config::{PlaybackConfig, PlayerKind};
use crate::error::{ViewerError, ViewerResult};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq)]
pub enum PlayerStatus {
    Idle,
    Playing,
    /// Media reached its end
    Ended,
    /// Playback broke after it had started
    Failed(String),
}

/// Capabilities the playback controller needs from a video player
pub trait MediaPlayer: Send {
    /// Load the asset and start playing it full-screen
    fn load(&mut self, asset: &Path) -> ViewerResult<()>;
    fn status(&mut self) -> PlayerStatus;
    /// Pause and rewind to the start
    fn stop(&mut self);
    fn position(&self) -> Duration;
    fn set_muted(&mut self, muted: bool);
}

/// Build the player selected in the configuration
pub fn player_from_config(config: &PlaybackConfig) -> Box<dyn MediaPlayer> {
    match config.player {
        PlayerKind::Timed => Box::new(TimedPlayer::new(Duration::from_millis(
            config.timed_duration_ms,
        ))),
        PlayerKind::Command => Box::new(ProcessPlayer::new(config.player_command.clone())),
    }
}

/// Headless player: the clip "plays" for a fixed duration
pub struct TimedPlayer {
    duration: Duration,
    started: Option<Instant>,
    muted: bool,
}

impl TimedPlayer {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            started: None,
            muted: false,
        }
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }
}

impl MediaPlayer for TimedPlayer {
    fn load(&mut self, asset: &Path) -> ViewerResult<()> {
        if !asset.is_file() {
            return Err(ViewerError::PlaybackLoadFailure {
                path: asset.to_path_buf(),
                description: "asset not found".to_string(),
            });
        }
        log::debug!("🎬 Timed playback of {} ({:?})", asset.display(), self.duration);
        self.started = Some(Instant::now());
        Ok(())
    }

    fn status(&mut self) -> PlayerStatus {
        match self.started {
            None => PlayerStatus::Idle,
            Some(start) if start.elapsed() >= self.duration => PlayerStatus::Ended,
            Some(_) => PlayerStatus::Playing,
        }
    }

    fn stop(&mut self) {
        self.started = None;
    }

    fn position(&self) -> Duration {
        self.started
            .map(|start| start.elapsed().min(self.duration))
            .unwrap_or_default()
    }

    fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }
}

/// Plays the clip in an external program, e.g. `ffplay -autoexit -fs {asset}`.
/// Exit status 0 is a natural end.
///
/// Muting while a clip plays restarts the player at the current position with
/// the mute flag, since the external program has no control channel.
pub struct ProcessPlayer {
    command: Vec<String>,
    /// Inserted after the program name when muted
    mute_args: Vec<String>,
    /// Followed by the resume position in seconds on a restart
    seek_arg: String,
    asset: Option<PathBuf>,
    /// Set when a mute restart could not bring the player back
    restart_failure: Option<String>,
    child: Option<Child>,
    started: Option<Instant>,
    muted: bool,
}

impl ProcessPlayer {
    pub fn new(command: Vec<String>) -> Self {
        Self {
            command,
            mute_args: vec!["-an".to_string()],
            seek_arg: "-ss".to_string(),
            asset: None,
            restart_failure: None,
            child: None,
            started: None,
            muted: false,
        }
    }

    /// Program arguments for one run, `{asset}` substituted
    fn player_args(&self, asset: &Path, seek: Option<Duration>) -> Vec<String> {
        let asset_str = asset.to_string_lossy();
        let mut args = Vec::new();
        if self.muted {
            args.extend(self.mute_args.iter().cloned());
        }
        if let Some(position) = seek {
            args.push(self.seek_arg.clone());
            args.push(format!("{:.3}", position.as_secs_f64()));
        }
        args.extend(
            self.command
                .iter()
                .skip(1)
                .map(|arg| arg.replace("{asset}", &asset_str)),
        );
        args
    }

    fn spawn(&self, asset: &Path, seek: Option<Duration>) -> ViewerResult<Child> {
        let program = self
            .command
            .first()
            .ok_or_else(|| ViewerError::PlaybackLoadFailure {
                path: asset.to_path_buf(),
                description: "player command is empty".to_string(),
            })?;

        Command::new(program)
            .args(self.player_args(asset, seek))
            .stdin(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ViewerError::PlaybackLoadFailure {
                path: asset.to_path_buf(),
                description: format!("failed to start player: {e}"),
            })
    }

    fn is_running(&mut self) -> bool {
        self.child
            .as_mut()
            .is_some_and(|child| matches!(child.try_wait(), Ok(None)))
    }

    /// Kill the running player and start it again where it was
    fn restart_at_position(&mut self) {
        let Some(asset) = self.asset.clone() else {
            return;
        };
        let resume_at = self.position();
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.start_kill() {
                log::debug!("Player already gone: {}", e);
            }
        }

        match self.spawn(&asset, Some(resume_at)) {
            Ok(child) => {
                log::debug!(
                    "🔇 Player restarted at {:.1}s (pid {:?}, muted {})",
                    resume_at.as_secs_f32(),
                    child.id(),
                    self.muted
                );
                self.child = Some(child);
                let now = Instant::now();
                self.started = Some(now.checked_sub(resume_at).unwrap_or(now));
            }
            Err(e) => {
                log::warn!("⚠️ Could not restart player after mute change: {}", e);
                self.restart_failure = Some(e.to_string());
            }
        }
    }
}

impl MediaPlayer for ProcessPlayer {
    fn load(&mut self, asset: &Path) -> ViewerResult<()> {
        self.stop();
        if !asset.is_file() {
            return Err(ViewerError::PlaybackLoadFailure {
                path: asset.to_path_buf(),
                description: "asset not found".to_string(),
            });
        }

        let child = self.spawn(asset, None)?;
        log::debug!("🎬 Player started (pid {:?})", child.id());
        self.child = Some(child);
        self.asset = Some(asset.to_path_buf());
        self.started = Some(Instant::now());
        Ok(())
    }

    fn status(&mut self) -> PlayerStatus {
        if let Some(reason) = &self.restart_failure {
            return PlayerStatus::Failed(reason.clone());
        }
        let Some(child) = self.child.as_mut() else {
            return PlayerStatus::Idle;
        };
        match child.try_wait() {
            Ok(None) => PlayerStatus::Playing,
            Ok(Some(status)) if status.success() => PlayerStatus::Ended,
            Ok(Some(status)) => PlayerStatus::Failed(format!("player exited with {status}")),
            Err(e) => PlayerStatus::Failed(format!("player status unavailable: {e}")),
        }
    }

    fn stop(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.start_kill() {
                log::debug!("Player already gone: {}", e);
            }
        }
        self.asset = None;
        self.restart_failure = None;
        self.started = None;
    }

    fn position(&self) -> Duration {
        self.started
            .map(|start| start.elapsed())
            .unwrap_or_default()
    }

    fn set_muted(&mut self, muted: bool) {
        if muted == self.muted {
            return;
        }
        self.muted = muted;
        if self.is_running() {
            self.restart_at_position();
        }
    }
}
