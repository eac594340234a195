// Screen flow - welcome, PIN gate and the camera screen with its inline overlay.
// Presentation is left to the caller; this module only tracks which screen is
// up and emits notices for it to show.

pub mod pin;


pub use pin::{PinGate, PinOutcome};

use crate::config::AccessConfig;
use crate::detection::DetectionLoop;
use crate::error::{ViewerError, ViewerResult};
use crate::template_matching::FrameMatcher;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Welcome,
    PinGate,
    Camera,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraStatus {
    Initializing,
    Active,
    /// Shown with a retry action
    PermissionDenied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// Toast-style message for whoever presents the screens
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub detail: Option<String>,
}

impl Notice {
    fn new(level: NoticeLevel, title: impl Into<String>, detail: Option<&str>) -> Self {
        Self {
            level,
            title: title.into(),
            detail: detail.map(str::to_string),
        }
    }
}

pub struct ScreenFlow {
    screen: Screen,
    pin: PinGate,
    camera: Option<CameraStatus>,
    welcome_total: Duration,
    notices: Vec<Notice>,
}

impl ScreenFlow {
    pub fn new(config: &AccessConfig) -> Self {
        Self {
            screen: Screen::Welcome,
            pin: PinGate::from_config(config),
            camera: None,
            welcome_total: config.welcome_total(),
            notices: Vec::new(),
        }
    }

    fn notify(&mut self, level: NoticeLevel, title: impl Into<String>, detail: Option<&str>) {
        let notice = Notice::new(level, title, detail);
        log::debug!("🔔 {:?}: {}", notice.level, notice.title);
        self.notices.push(notice);
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn camera_status(&self) -> Option<CameraStatus> {
        self.camera
    }

    /// How long the welcome screen stays up, fade included
    pub fn welcome_duration(&self) -> Duration {
        self.welcome_total
    }

    /// Leave the welcome screen once `elapsed` covers display and fade
    pub fn advance_welcome(&mut self, elapsed: Duration) -> bool {
        if self.screen == Screen::Welcome && elapsed >= self.welcome_total {
            self.screen = Screen::PinGate;
            log::info!("🔐 Welcome done, showing PIN gate");
            return true;
        }
        false
    }

    pub fn pin(&self) -> &PinGate {
        &self.pin
    }

    pub fn pin_input(&mut self, value: &str) {
        self.pin.input(value);
    }

    pub fn submit_pin(&mut self) -> PinOutcome {
        if self.screen != Screen::PinGate {
            return PinOutcome::SubmitDisabled;
        }
        let outcome = self.pin.submit();
        match outcome {
            PinOutcome::Granted => {
                log::info!("✅ Access granted");
                self.notify(
                    NoticeLevel::Success,
                    "Access granted! Welcome to AR Camera",
                    Some("Starting camera system..."),
                );
                self.screen = Screen::Camera;
                self.camera = Some(CameraStatus::Initializing);
            }
            PinOutcome::Denied => {
                log::warn!("⛔ Access denied");
                self.notify(
                    NoticeLevel::Error,
                    "Access denied",
                    Some("Incorrect security PIN. Please try again."),
                );
            }
            PinOutcome::SubmitDisabled => {}
        }
        outcome
    }

    /// Acquire the camera for the camera screen
    pub fn enter_camera<M: FrameMatcher>(&mut self, detection: &mut DetectionLoop<M>) -> CameraStatus {
        if self.screen != Screen::Camera {
            return self.camera.unwrap_or(CameraStatus::Initializing);
        }
        self.camera = Some(CameraStatus::Initializing);
        let status = match detection.open_camera() {
            Ok(()) => {
                self.notify(
                    NoticeLevel::Success,
                    "Camera initialized",
                    Some("High-quality camera feed active"),
                );
                CameraStatus::Active
            }
            Err(e) => {
                log::error!("❌ Camera error: {}", e);
                self.notify(
                    NoticeLevel::Error,
                    "Camera access denied",
                    Some("Please allow camera permissions to continue"),
                );
                CameraStatus::PermissionDenied
            }
        };
        self.camera = Some(status);
        status
    }

    /// Retry action offered after a denial
    pub fn retry_camera<M: FrameMatcher>(&mut self, detection: &mut DetectionLoop<M>) -> CameraStatus {
        match self.camera {
            Some(CameraStatus::PermissionDenied) => self.enter_camera(detection),
            Some(status) => status,
            None => CameraStatus::Initializing,
        }
    }

    /// "Start detection" on the camera screen
    pub fn request_detection<M: FrameMatcher>(
        &mut self,
        detection: &mut DetectionLoop<M>,
    ) -> ViewerResult<()> {
        if self.camera != Some(CameraStatus::Active) {
            return Err(ViewerError::PermissionDenied {
                reason: "camera is not active".to_string(),
            });
        }
        match detection.start() {
            Ok(()) => {
                self.notify(
                    NoticeLevel::Info,
                    "Detection started",
                    Some("Point camera at target image..."),
                );
                Ok(())
            }
            Err(e) => {
                self.notify(NoticeLevel::Error, "Template image not ready", None);
                Err(e)
            }
        }
    }

    pub fn stop_detection<M: FrameMatcher>(&mut self, detection: &mut DetectionLoop<M>) {
        detection.stop();
        self.notify(NoticeLevel::Info, "Detection stopped", None);
    }

    /// Back to the PIN gate; the camera is torn down on the way out
    pub fn logout<M: FrameMatcher>(&mut self, detection: &mut DetectionLoop<M>) {
        detection.shutdown_camera();
        self.camera = None;
        self.pin.clear();
        if self.screen == Screen::Camera {
            log::info!("👋 Logged out");
            self.screen = Screen::PinGate;
        }
    }

    /// Notices raised since the last call
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }
}
