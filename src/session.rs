//! Headless viewer session: the screen flow driven from the command line,
//! with frames replayed from disk and notices written to the log.

use crate::camera::{Frame, FrameSource, ImageSequenceDevice};
use crate::config::ViewerConfig;
use crate::detection::{
    DetectionCommand, DetectionEvent, DetectionLoop, DetectionStats, create_detection_channels,
};
use crate::error::{ViewerError, ViewerResult};
use crate::playback::{PlaybackController, PlaybackOutcome, player_from_config};
use crate::screen_flow::{CameraStatus, Notice, NoticeLevel, PinOutcome, ScreenFlow};
use crate::template_matching::{FrameMatcher, MatchResult, NccMatcher, TemplateStore, fits};
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub struct SessionReport {
    pub access: PinOutcome,
    pub camera: Option<CameraStatus>,
    pub detections: usize,
    /// Overlays the user closed before their natural end
    pub overlays_closed: usize,
    /// Session ended by a `logout` typed on the console
    pub logged_out: bool,
    pub stats: DetectionStats,
}

/// One line typed on the session console
#[derive(Debug, Clone)]
pub enum ConsoleInput {
    Command(DetectionCommand),
    Logout,
    Quit,
}

pub fn parse_console_line(line: &str) -> Option<ConsoleInput> {
    let mut words = line.split_whitespace();
    let input = match words.next()?.to_ascii_lowercase().as_str() {
        "start" => ConsoleInput::Command(DetectionCommand::Start),
        "stop" => ConsoleInput::Command(DetectionCommand::Stop),
        "close" => ConsoleInput::Command(DetectionCommand::ClosePlayback),
        "toggle" => ConsoleInput::Command(DetectionCommand::ToggleCamera),
        "mute" => ConsoleInput::Command(DetectionCommand::SetMuted(true)),
        "unmute" => ConsoleInput::Command(DetectionCommand::SetMuted(false)),
        "threshold" => {
            let value = words.next()?.parse::<f32>().ok()?;
            ConsoleInput::Command(DetectionCommand::UpdateThreshold(value))
        }
        "logout" => ConsoleInput::Logout,
        "quit" | "exit" => ConsoleInput::Quit,
        _ => return None,
    };
    Some(input)
}

/// Forward console lines to the detection loop; true when the user logged out
async fn read_console<R>(input: R, cmd_tx: mpsc::Sender<DetectionCommand>) -> bool
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(input).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                log::debug!("Console input closed");
                return false;
            }
            Err(e) => {
                log::warn!("⚠️ Console input failed: {}", e);
                return false;
            }
        };

        let (command, logged_out) = match parse_console_line(&line) {
            Some(ConsoleInput::Command(command)) => (command, false),
            Some(ConsoleInput::Logout) => (DetectionCommand::Shutdown, true),
            Some(ConsoleInput::Quit) => (DetectionCommand::Shutdown, false),
            None => {
                if !line.trim().is_empty() {
                    log::warn!("⚠️ Unknown command: {}", line.trim());
                }
                continue;
            }
        };
        log::info!("⌨️ {}", line.trim());
        let ending = matches!(command, DetectionCommand::Shutdown);
        if cmd_tx.send(command).await.is_err() || ending {
            return logged_out;
        }
    }
}

fn present(notices: Vec<Notice>) {
    for notice in notices {
        let detail = notice.detail.as_deref().unwrap_or("");
        match notice.level {
            NoticeLevel::Error => log::error!("🔔 {} {}", notice.title, detail),
            NoticeLevel::Success | NoticeLevel::Info => {
                log::info!("🔔 {} {}", notice.title, detail)
            }
        }
    }
}

#[derive(Debug, Default)]
struct EventTally {
    detections: usize,
    overlays_closed: usize,
}

/// Log events as they arrive and count detections and closed overlays
async fn watch_events(mut event_rx: mpsc::Receiver<DetectionEvent>) -> EventTally {
    let mut tally = EventTally::default();
    while let Some(event) = event_rx.recv().await {
        match event {
            DetectionEvent::TargetDetected(result) => {
                tally.detections += 1;
                log::info!(
                    "🎯 Target detected! confidence {:.3} at ({},{})",
                    result.confidence,
                    result.location.0,
                    result.location.1
                );
            }
            DetectionEvent::PlaybackStarted(path) => {
                log::info!("🔔 Video loaded: playing {}", path.display())
            }
            DetectionEvent::PlaybackFinished(outcome) => {
                if matches!(outcome, PlaybackOutcome::Closed { .. }) {
                    tally.overlays_closed += 1;
                }
                log::info!("🔔 Video finished ({:?}), returning to camera view...", outcome)
            }
            DetectionEvent::CameraSwitched(facing) => {
                log::info!("🔔 Switched to {} camera", facing.label())
            }
            DetectionEvent::Error(message) => log::warn!("⚠️ {}", message),
            DetectionEvent::StateChanged(_) | DetectionEvent::Confidence(_) => {}
        }
    }
    tally
}

async fn wait_for_exit(timeout: Option<Duration>) {
    match timeout {
        Some(limit) => {
            tokio::select! {
                _ = tokio::time::sleep(limit) => {
                    log::info!("⏰ Timeout reached after {}s", limit.as_secs_f32());
                }
                _ = tokio::signal::ctrl_c() => log::info!("🛑 Interrupted"),
            }
        }
        None => {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("❌ Failed to listen for Ctrl-C: {}", e);
            }
        }
    }
}

/// Welcome, PIN check, camera, then detection driven by stdin commands
/// until logout, quit, timeout or Ctrl-C
pub async fn run_session(
    config: &ViewerConfig,
    pin: &str,
    timeout: Option<Duration>,
) -> ViewerResult<SessionReport> {
    run_session_with_console(config, pin, timeout, tokio::io::stdin()).await
}

/// [`run_session`] reading console commands from `console`
pub async fn run_session_with_console<R>(
    config: &ViewerConfig,
    pin: &str,
    timeout: Option<Duration>,
    console: R,
) -> ViewerResult<SessionReport>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let device = ImageSequenceDevice::new(config.camera.frames_dir.clone());
    let frames = FrameSource::new(Box::new(device), &config.camera);
    let playback = PlaybackController::new(player_from_config(&config.playback), &config.playback);
    let (cmd_tx, cmd_rx, event_tx, event_rx) = create_detection_channels();
    let mut detection = DetectionLoop::new(
        &config.detection,
        TemplateStore::from_config(&config.detection),
        frames,
        NccMatcher::new(),
        playback,
    )
    .with_events(event_tx);

    let mut flow = ScreenFlow::new(&config.access);
    log::info!("✨ Welcome");
    // Template loads while the welcome screen is up; a failure shows later
    let (template, ()) = tokio::join!(
        detection.load_template(),
        tokio::time::sleep(flow.welcome_duration())
    );
    if let Err(e) = template {
        log::warn!("⚠️ Continuing without template: {}", e);
    }
    flow.advance_welcome(flow.welcome_duration());

    flow.pin_input(pin);
    let access = flow.submit_pin();
    present(flow.take_notices());
    if access != PinOutcome::Granted {
        return Ok(SessionReport {
            access,
            camera: None,
            detections: 0,
            overlays_closed: 0,
            logged_out: false,
            stats: detection.stats().clone(),
        });
    }

    let camera = flow.enter_camera(&mut detection);
    present(flow.take_notices());
    if camera != CameraStatus::Active {
        return Ok(SessionReport {
            access,
            camera: Some(camera),
            detections: 0,
            overlays_closed: 0,
            logged_out: false,
            stats: detection.stats().clone(),
        });
    }
    if detection.frames().has_multiple_cameras() {
        log::debug!("🔄 Camera switch available");
    }

    let started = flow.request_detection(&mut detection);
    present(flow.take_notices());
    started?;

    let watcher = tokio::spawn(watch_events(event_rx));
    let console = tokio::spawn(read_console(console, cmd_tx.clone()));
    let shutdown_tx = cmd_tx.clone();
    let shutdown = tokio::spawn(async move {
        wait_for_exit(timeout).await;
        if shutdown_tx.send(DetectionCommand::Shutdown).await.is_err() {
            log::debug!("Detection loop already gone");
        }
    });

    detection.run(cmd_rx).await;
    shutdown.abort();
    console.abort();
    let logged_out = match console.await {
        Ok(logged_out) => logged_out,
        Err(e) if e.is_cancelled() => false,
        Err(e) => return Err(e.into()),
    };

    flow.logout(&mut detection);
    present(flow.take_notices());
    let stats = detection.stats().clone();
    log::info!(
        "📊 {} ticks, {} matched, {} skipped, {} faults, {} detections",
        stats.ticks,
        stats.matcher_calls,
        stats.frames_skipped,
        stats.faults,
        stats.detections
    );

    // Dropping the loop closes the event channel so the watcher can finish
    drop(detection);
    drop(cmd_tx);
    let tally = watcher.await?;

    Ok(SessionReport {
        access,
        camera: Some(camera),
        detections: tally.detections,
        overlays_closed: tally.overlays_closed,
        logged_out,
        stats,
    })
}

/// Score a single still image against the configured template
pub fn match_once(config: &ViewerConfig, image_path: &Path) -> ViewerResult<MatchResult> {
    let mut templates = TemplateStore::from_config(&config.detection);
    let template = templates.load(&config.detection.template_path)?;

    let image = image::open(image_path).map_err(|e| ViewerError::capture(0, e.to_string()))?;
    let frame = Frame::from_dynamic(image, 0);
    if !fits(&frame, &template) {
        return Err(ViewerError::matching(format!(
            "template {}x{} does not fit in {}x{} image",
            template.width(),
            template.height(),
            frame.width(),
            frame.height()
        )));
    }

    let result = NccMatcher::new().match_frame(&frame, &template)?;
    log::info!("🔍 {}", result.describe(&template));
    Ok(result)
}
