// Finite state machine driving capture, matching and overlay playback
use super::types::{DetectionCommand, DetectionEvent, DetectionState, DetectionStats, TickOutcome};
use crate::camera::{FacingMode, FrameSource};
use crate::config::DetectionConfig;
use crate::error::{ViewerError, ViewerResult};
use crate::playback::{PlaybackController, PlaybackOutcome};
use crate::template_matching::{FrameMatcher, Template, TemplateStore, fits};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio::time::{Duration, MissedTickBehavior};

pub struct DetectionLoop<M: FrameMatcher> {
    state: DetectionState,
    threshold: f32,
    tick_interval: Duration,
    template_path: PathBuf,
    templates: TemplateStore,
    /// Handle taken at start; kept across playback so resume never reloads
    template: Option<Template>,
    frames: FrameSource,
    matcher: M,
    playback: PlaybackController,
    event_tx: Option<mpsc::Sender<DetectionEvent>>,
    stats: DetectionStats,
    should_exit: bool,
}

impl<M: FrameMatcher> DetectionLoop<M> {
    pub fn new(
        config: &DetectionConfig,
        templates: TemplateStore,
        frames: FrameSource,
        matcher: M,
        playback: PlaybackController,
    ) -> Self {
        Self {
            state: DetectionState::Idle,
            threshold: config.confidence_threshold,
            tick_interval: config.tick_interval(),
            template_path: config.template_path.clone(),
            templates,
            template: None,
            frames,
            matcher,
            playback,
            event_tx: None,
            stats: DetectionStats::default(),
            should_exit: false,
        }
    }

    /// Publish events on `event_tx`; sends never block the loop
    pub fn with_events(mut self, event_tx: mpsc::Sender<DetectionEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    fn emit(&self, event: DetectionEvent) {
        if let Some(tx) = &self.event_tx {
            if let Err(e) = tx.try_send(event) {
                log::trace!("Detection event dropped: {}", e);
            }
        }
    }

    fn change_state(&mut self, new_state: DetectionState) {
        if self.state != new_state {
            log::info!("🎯 Detection state: {:?} -> {:?}", self.state, new_state);
            self.state = new_state;
            self.emit(DetectionEvent::StateChanged(new_state));
        }
    }

    fn contain(&mut self, error: ViewerError) {
        self.stats.faults += 1;
        log::warn!("⚠️ Tick #{} failed, continuing: {}", self.stats.ticks, error);
        self.emit(DetectionEvent::Error(error.to_string()));
    }

    /// Load the configured template off the scheduler thread
    pub async fn load_template(&mut self) -> ViewerResult<()> {
        self.templates
            .load_async(self.template_path.clone())
            .await
            .map(|_| ())
    }

    /// Acquire the camera stream for the current facing mode
    pub fn open_camera(&mut self) -> ViewerResult<()> {
        self.frames.open()
    }

    /// `Idle -> Scanning`. Requires a ready template and an open stream;
    /// on failure the loop stays `Idle`.
    pub fn start(&mut self) -> ViewerResult<()> {
        if self.state != DetectionState::Idle {
            log::debug!("Detection already running ({:?})", self.state);
            return Ok(());
        }

        let template = match self.templates.require() {
            Ok(template) => template,
            Err(e) => {
                log::error!("❌ Cannot start detection: {}", e);
                self.emit(DetectionEvent::Error(e.to_string()));
                return Err(e);
            }
        };
        if !self.frames.is_open() {
            let e = ViewerError::DeviceNotFound {
                description: "camera stream is not open".to_string(),
            };
            log::error!("❌ Cannot start detection: {}", e);
            self.emit(DetectionEvent::Error(e.to_string()));
            return Err(e);
        }

        self.template = Some(template);
        self.change_state(DetectionState::Scanning);
        log::info!(
            "🚀 Scanning for target (threshold {:.2}, every {}ms)",
            self.threshold,
            self.tick_interval.as_millis()
        );
        Ok(())
    }

    /// One capture + match step. Only acts while `Scanning`.
    pub fn tick(&mut self) -> TickOutcome {
        if self.state != DetectionState::Scanning {
            return TickOutcome::Inactive;
        }
        let Some(template) = self.template.clone() else {
            self.contain(ViewerError::TemplateNotReady);
            return TickOutcome::Faulted;
        };
        self.stats.ticks += 1;

        let frame = match self.frames.current_frame() {
            Ok(frame) => frame,
            Err(e) => {
                self.contain(e);
                return TickOutcome::Faulted;
            }
        };

        if !fits(&frame, &template) {
            self.stats.frames_skipped += 1;
            log::debug!(
                "📐 Frame #{} {}x{} smaller than template {}x{}, skipping",
                frame.index,
                frame.width(),
                frame.height(),
                template.width(),
                template.height()
            );
            return TickOutcome::Skipped;
        }

        self.stats.matcher_calls += 1;
        let result = match self.matcher.match_frame(&frame, &template) {
            Ok(result) => result,
            Err(e) => {
                self.contain(e);
                return TickOutcome::Faulted;
            }
        };
        log::debug!(
            "📸 Frame #{} confidence {:.3} at ({},{})",
            frame.index,
            result.confidence,
            result.location.0,
            result.location.1
        );
        self.emit(DetectionEvent::Confidence(result));

        // A stop or detection may have landed while the frame was in flight
        if self.state != DetectionState::Scanning {
            return TickOutcome::Inactive;
        }
        if !result.meets(self.threshold) {
            return TickOutcome::NoMatch(result);
        }

        self.stats.detections += 1;
        log::info!("🎯 Target detected: {}", result.describe(&template));
        self.change_state(DetectionState::Playing);
        self.emit(DetectionEvent::TargetDetected(result));

        match self.playback.play_overlay() {
            Ok(()) => {
                self.emit(DetectionEvent::PlaybackStarted(
                    self.playback.overlay().to_path_buf(),
                ));
            }
            Err(e) => {
                log::error!("❌ {}", e);
                self.emit(DetectionEvent::Error(e.to_string()));
                self.change_state(DetectionState::Scanning);
            }
        }
        TickOutcome::Detected(result)
    }

    /// Any state `-> Idle`; no matcher call happens after this returns
    pub fn stop(&mut self) {
        self.playback.stop();
        self.change_state(DetectionState::Idle);
    }

    /// `Playing -> Scanning` when the outcome asks to resume, else `Idle`
    pub fn on_playback_complete(&mut self, outcome: PlaybackOutcome) {
        if self.state != DetectionState::Playing {
            return;
        }
        let resume = outcome.resume();
        self.emit(DetectionEvent::PlaybackFinished(outcome));
        if resume {
            self.change_state(DetectionState::Scanning);
        } else {
            self.change_state(DetectionState::Idle);
        }
    }

    /// Check the overlay for a natural end or a failure
    pub fn poll_playback(&mut self) -> Option<PlaybackOutcome> {
        if self.state != DetectionState::Playing {
            return None;
        }
        let outcome = self.playback.poll()?;
        self.on_playback_complete(outcome.clone());
        Some(outcome)
    }

    /// User dismissed the overlay
    pub fn close_playback(&mut self) -> Option<PlaybackOutcome> {
        let outcome = self.playback.close()?;
        self.on_playback_complete(outcome.clone());
        Some(outcome)
    }

    /// Switch front/back camera. Scanning continues on the new stream.
    pub fn toggle_camera(&mut self) -> ViewerResult<FacingMode> {
        if !self.frames.has_multiple_cameras() {
            return Err(ViewerError::DeviceNotFound {
                description: "no second camera to switch to".to_string(),
            });
        }
        match self.frames.toggle_facing() {
            Ok(facing) => {
                self.emit(DetectionEvent::CameraSwitched(facing));
                Ok(facing)
            }
            Err(e) => {
                log::error!("❌ Camera switch failed: {}", e);
                self.emit(DetectionEvent::Error(e.to_string()));
                if self.state == DetectionState::Scanning {
                    self.change_state(DetectionState::Idle);
                }
                Err(e)
            }
        }
    }

    pub fn set_threshold(&mut self, threshold: f32) -> ViewerResult<()> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ViewerError::InvalidConfig {
                description: format!("confidence threshold {threshold} outside [0, 1]"),
            });
        }
        log::info!("🎚️ Threshold {:.2} -> {:.2}", self.threshold, threshold);
        self.threshold = threshold;
        Ok(())
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.playback.set_muted(muted);
    }

    /// Stop detection and release the camera tracks
    pub fn shutdown_camera(&mut self) {
        self.stop();
        self.frames.release();
    }

    pub fn state(&self) -> DetectionState {
        self.state
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn stats(&self) -> &DetectionStats {
        &self.stats
    }

    pub fn templates(&self) -> &TemplateStore {
        &self.templates
    }

    pub fn frames(&self) -> &FrameSource {
        &self.frames
    }

    pub fn camera_visible(&self) -> bool {
        self.frames.is_open() && self.playback.camera_visible()
    }

    pub fn process_command(&mut self, command: DetectionCommand) {
        log::debug!("🤖 Processing detection command: {:?}", command);
        match command {
            DetectionCommand::Start => {
                // Failure already logged and reported as an event
                let _ = self.start();
            }
            DetectionCommand::Stop => self.stop(),
            DetectionCommand::ToggleCamera => {
                let _ = self.toggle_camera();
            }
            DetectionCommand::ClosePlayback => {
                self.close_playback();
            }
            DetectionCommand::SetMuted(muted) => self.set_muted(muted),
            DetectionCommand::UpdateThreshold(threshold) => {
                if let Err(e) = self.set_threshold(threshold) {
                    log::warn!("⚠️ {}", e);
                    self.emit(DetectionEvent::Error(e.to_string()));
                }
            }
            DetectionCommand::Shutdown => {
                log::info!("🛑 Detection shutting down");
                self.should_exit = true;
            }
        }
    }

    /// Cooperative driver: commands first, then one step per tick interval
    pub async fn run(&mut self, mut command_rx: mpsc::Receiver<DetectionCommand>) {
        log::debug!("🎯 Detection loop started");
        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        while !self.should_exit {
            tokio::select! {
                biased;
                command = command_rx.recv() => match command {
                    Some(command) => self.process_command(command),
                    None => {
                        log::debug!("Detection command channel closed");
                        self.should_exit = true;
                    }
                },
                _ = ticker.tick() => match self.state {
                    DetectionState::Idle => {}
                    DetectionState::Scanning => {
                        self.tick();
                    }
                    DetectionState::Playing => {
                        self.poll_playback();
                    }
                },
            }
        }

        self.shutdown_camera();
        log::debug!("🎯 Detection loop exited");
    }
}
