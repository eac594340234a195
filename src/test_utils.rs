//! Test doubles for the capture, matching and playback seams.

use crate::camera::{CaptureDevice, FacingMode, Frame, StreamRequest, VideoInput, VideoStream};
use crate::error::{ViewerError, ViewerResult};
use crate::playback::MediaPlayer;
use crate::playback::player::PlayerStatus;
use crate::template_matching::{FrameMatcher, MatchResult, Template};
use image::{DynamicImage, GrayImage, Luma};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Deterministic textured raster: no two neighbouring windows look alike
pub fn textured_image(width: u32, height: u32, seed: u32) -> GrayImage {
    GrayImage::from_fn(width, height, |x, y| {
        let v = (x.wrapping_mul(7919) ^ y.wrapping_mul(104_729) ^ seed.wrapping_mul(31))
            .wrapping_mul(2_654_435_761)
            >> 24;
        Luma([v as u8])
    })
}

pub fn flat_image(width: u32, height: u32, value: u8) -> GrayImage {
    GrayImage::from_pixel(width, height, Luma([value]))
}

/// Shared log of device calls, e.g. `open:user`, `stop:environment`
pub type CallLog = Arc<Mutex<Vec<String>>>;

/// In-memory capture device. Each facing mode serves a fixed frame size.
pub struct FakeCamera {
    pub environment_size: (u32, u32),
    pub user_size: (u32, u32),
    pub deny: bool,
    pub fail_grabs: Arc<AtomicUsize>,
    pub log: CallLog,
    pub inputs: usize,
}

impl FakeCamera {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            environment_size: (width, height),
            user_size: (width, height),
            deny: false,
            fail_grabs: Arc::new(AtomicUsize::new(0)),
            log: Arc::new(Mutex::new(Vec::new())),
            inputs: 2,
        }
    }
}

impl CaptureDevice for FakeCamera {
    fn enumerate_video_inputs(&self) -> ViewerResult<Vec<VideoInput>> {
        Ok((0..self.inputs)
            .map(|i| VideoInput {
                device_id: format!("fake-{i}"),
                label: format!("fake camera {i}"),
                facing: None,
            })
            .collect())
    }

    fn open_stream(&mut self, request: &StreamRequest) -> ViewerResult<Box<dyn VideoStream>> {
        if self.deny {
            return Err(ViewerError::PermissionDenied {
                reason: "denied by test".to_string(),
            });
        }
        self.log
            .lock()
            .unwrap()
            .push(format!("open:{}", request.facing.as_str()));
        let size = match request.facing {
            FacingMode::Environment => self.environment_size,
            FacingMode::User => self.user_size,
        };
        Ok(Box::new(FakeStream {
            size,
            facing: request.facing,
            live: true,
            fail_grabs: self.fail_grabs.clone(),
            log: self.log.clone(),
            seed: 0,
        }))
    }
}

struct FakeStream {
    size: (u32, u32),
    facing: FacingMode,
    live: bool,
    fail_grabs: Arc<AtomicUsize>,
    log: CallLog,
    seed: u32,
}

impl VideoStream for FakeStream {
    fn grab(&mut self) -> ViewerResult<DynamicImage> {
        if !self.live {
            return Err(ViewerError::capture(0, "stopped"));
        }
        let pending = self.fail_grabs.load(Ordering::SeqCst);
        if pending > 0 {
            self.fail_grabs.store(pending - 1, Ordering::SeqCst);
            return Err(ViewerError::capture(0, "injected grab failure"));
        }
        self.seed += 1;
        Ok(DynamicImage::ImageLuma8(textured_image(
            self.size.0,
            self.size.1,
            self.seed,
        )))
    }

    fn dimensions(&self) -> (u32, u32) {
        self.size
    }

    fn stop_tracks(&mut self) {
        if self.live {
            self.live = false;
            self.log
                .lock()
                .unwrap()
                .push(format!("stop:{}", self.facing.as_str()));
        }
    }

    fn is_live(&self) -> bool {
        self.live
    }
}

/// Matcher that replays a scripted confidence sequence and counts calls
#[derive(Clone)]
pub struct ScriptedMatcher {
    pub calls: Arc<AtomicUsize>,
    script: Arc<Mutex<VecDeque<ViewerResult<f32>>>>,
    fallback: f32,
}

impl ScriptedMatcher {
    pub fn new(confidences: &[f32]) -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            script: Arc::new(Mutex::new(confidences.iter().map(|c| Ok(*c)).collect())),
            fallback: 0.0,
        }
    }

    pub fn with_fallback(mut self, confidence: f32) -> Self {
        self.fallback = confidence;
        self
    }

    pub fn push_error(&self, description: &str) {
        self.script
            .lock()
            .unwrap()
            .push_back(Err(ViewerError::matching(description)));
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl FrameMatcher for ScriptedMatcher {
    fn match_frame(&self, _frame: &Frame, _template: &Template) -> ViewerResult<MatchResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        let confidence = match next {
            Some(result) => result?,
            None => self.fallback,
        };
        Ok(MatchResult::new(confidence, (0, 0)))
    }
}

/// Player whose status is driven from the test
#[derive(Clone)]
pub struct ScriptedPlayer {
    pub status: Arc<Mutex<PlayerStatus>>,
    pub loads: Arc<AtomicUsize>,
    pub stops: Arc<AtomicUsize>,
    pub fail_load: bool,
    pub muted: Arc<Mutex<bool>>,
}

impl ScriptedPlayer {
    pub fn new() -> Self {
        Self {
            status: Arc::new(Mutex::new(PlayerStatus::Idle)),
            loads: Arc::new(AtomicUsize::new(0)),
            stops: Arc::new(AtomicUsize::new(0)),
            fail_load: false,
            muted: Arc::new(Mutex::new(false)),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_load: true,
            ..Self::new()
        }
    }

    pub fn finish(&self) {
        *self.status.lock().unwrap() = PlayerStatus::Ended;
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl MediaPlayer for ScriptedPlayer {
    fn load(&mut self, asset: &Path) -> ViewerResult<()> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.fail_load {
            return Err(ViewerError::PlaybackLoadFailure {
                path: asset.to_path_buf(),
                description: "scripted failure".to_string(),
            });
        }
        *self.status.lock().unwrap() = PlayerStatus::Playing;
        Ok(())
    }

    fn status(&mut self) -> PlayerStatus {
        self.status.lock().unwrap().clone()
    }

    fn stop(&mut self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        *self.status.lock().unwrap() = PlayerStatus::Idle;
    }

    fn position(&self) -> Duration {
        match *self.status.lock().unwrap() {
            PlayerStatus::Playing => Duration::from_millis(500),
            _ => Duration::ZERO,
        }
    }

    fn set_muted(&mut self, muted: bool) {
        *self.muted.lock().unwrap() = muted;
    }
}

/// Fresh scratch directory under the system temp dir
pub fn scratch_dir(name: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "ar-target-viewer-{}-{}",
        name,
        std::process::id()
    ));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}
