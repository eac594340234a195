//! Frame source: exclusive owner of the live capture stream

use super::types::{CaptureDevice, FacingMode, Frame, StreamRequest, VideoInput, VideoStream};
use crate::config::CameraConfig;
use crate::error::{ViewerError, ViewerResult};
use std::time::Instant;

/// Owns a live stream; tracks are stopped when the handle is released or dropped
pub struct CameraHandle {
    stream: Box<dyn VideoStream>,
    facing: FacingMode,
}

impl CameraHandle {
    fn new(stream: Box<dyn VideoStream>, facing: FacingMode) -> Self {
        Self { stream, facing }
    }

    pub fn facing(&self) -> FacingMode {
        self.facing
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.stream.dimensions()
    }

    pub fn release(mut self) {
        self.stream.stop_tracks();
    }
}

impl Drop for CameraHandle {
    fn drop(&mut self) {
        self.stream.stop_tracks();
    }
}

pub struct FrameSource {
    device: Box<dyn CaptureDevice>,
    handle: Option<CameraHandle>,
    facing: FacingMode,
    ideal_width: u32,
    ideal_height: u32,
    inputs: Vec<VideoInput>,
    frame_counter: u64,
}

impl FrameSource {
    pub fn new(device: Box<dyn CaptureDevice>, config: &CameraConfig) -> Self {
        Self {
            device,
            handle: None,
            facing: config.facing,
            ideal_width: config.ideal_width,
            ideal_height: config.ideal_height,
            inputs: Vec::new(),
            frame_counter: 0,
        }
    }

    /// Request a stream for the current facing mode, replacing any open one
    pub fn open(&mut self) -> ViewerResult<()> {
        self.release();

        let request = StreamRequest {
            facing: self.facing,
            ideal_width: self.ideal_width,
            ideal_height: self.ideal_height,
        };
        let stream = self.device.open_stream(&request)?;
        let (width, height) = stream.dimensions();
        log::info!(
            "📷 Camera stream open: facing={} {}x{}",
            self.facing.as_str(),
            width,
            height
        );
        self.handle = Some(CameraHandle::new(stream, self.facing));

        self.inputs = match self.device.enumerate_video_inputs() {
            Ok(inputs) => inputs,
            Err(e) => {
                log::warn!("⚠️ Failed to enumerate video inputs: {}", e);
                Vec::new()
            }
        };
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| handle.stream.is_live())
    }

    /// Capture the frame currently shown by the stream
    pub fn current_frame(&mut self) -> ViewerResult<Frame> {
        let index = self.frame_counter;
        let handle = self
            .handle
            .as_mut()
            .ok_or_else(|| ViewerError::capture(index, "camera not open"))?;

        let start = Instant::now();
        let image = handle.stream.grab()?;
        self.frame_counter += 1;

        let mut frame = Frame::from_dynamic(image, index);
        frame.capture_ms = start.elapsed().as_millis();
        Ok(frame)
    }

    /// Switch between front and back camera. The old stream's tracks are
    /// stopped before the new stream is requested.
    pub fn toggle_facing(&mut self) -> ViewerResult<FacingMode> {
        self.release();
        self.facing = self.facing.toggled();
        log::info!("🔄 Switching to {} camera...", self.facing.label());
        self.open()?;
        Ok(self.facing)
    }

    pub fn release(&mut self) {
        if let Some(handle) = self.handle.take() {
            log::debug!("📷 Releasing {} camera stream", handle.facing().as_str());
            handle.release();
        }
    }

    pub fn facing(&self) -> FacingMode {
        self.facing
    }

    pub fn frame_dimensions(&self) -> Option<(u32, u32)> {
        self.handle.as_ref().map(CameraHandle::dimensions)
    }

    pub fn video_inputs(&self) -> &[VideoInput] {
        &self.inputs
    }

    /// Camera switching is only offered when more than one input exists
    pub fn has_multiple_cameras(&self) -> bool {
        self.inputs.len() > 1
    }

    pub fn frames_captured(&self) -> u64 {
        self.frame_counter
    }
}

impl Drop for FrameSource {
    fn drop(&mut self) {
        self.release();
    }
}
