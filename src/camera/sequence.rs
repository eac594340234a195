//! Capture device that replays still images from disk as a live feed
//!
//! Layout: `<root>/environment/*` and `<root>/user/*` give one input per
//! facing mode; a flat `<root>/*` serves both.

use super::types::{CaptureDevice, FacingMode, StreamRequest, VideoInput, VideoStream};
use crate::error::{ViewerError, ViewerResult};
use image::DynamicImage;
use std::path::{Path, PathBuf};

const SUPPORTED_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

pub struct ImageSequenceDevice {
    root: PathBuf,
    permission_granted: bool,
}

impl ImageSequenceDevice {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            permission_granted: true,
        }
    }

    /// Behave like a device whose user refused camera access
    pub fn deny_permission(mut self) -> Self {
        self.permission_granted = false;
        self
    }

    fn facing_dir(&self, facing: FacingMode) -> PathBuf {
        self.root.join(facing.as_str())
    }

    fn resolve_dir(&self, facing: FacingMode) -> PathBuf {
        let dir = self.facing_dir(facing);
        if dir.is_dir() { dir } else { self.root.clone() }
    }

    fn list_frames(dir: &Path) -> ViewerResult<Vec<PathBuf>> {
        let entries = std::fs::read_dir(dir).map_err(|e| ViewerError::DeviceNotFound {
            description: format!("Failed to read frame directory {}: {e}", dir.display()),
        })?;

        let mut frames: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && is_supported_image(path))
            .collect();

        // Sort for consistent ordering
        frames.sort();
        Ok(frames)
    }
}

fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
        .is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
}

impl CaptureDevice for ImageSequenceDevice {
    fn enumerate_video_inputs(&self) -> ViewerResult<Vec<VideoInput>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }

        let per_facing: Vec<VideoInput> = [FacingMode::Environment, FacingMode::User]
            .into_iter()
            .filter(|facing| self.facing_dir(*facing).is_dir())
            .map(|facing| VideoInput {
                device_id: self.facing_dir(facing).to_string_lossy().to_string(),
                label: format!("{} camera", facing.label()),
                facing: Some(facing),
            })
            .collect();

        if per_facing.is_empty() {
            Ok(vec![VideoInput {
                device_id: self.root.to_string_lossy().to_string(),
                label: "image sequence".to_string(),
                facing: None,
            }])
        } else {
            Ok(per_facing)
        }
    }

    fn open_stream(&mut self, request: &StreamRequest) -> ViewerResult<Box<dyn VideoStream>> {
        if !self.permission_granted {
            return Err(ViewerError::PermissionDenied {
                reason: "capture device refused access".to_string(),
            });
        }

        let dir = self.resolve_dir(request.facing);
        let frames = Self::list_frames(&dir)?;
        let first = frames.first().ok_or_else(|| ViewerError::DeviceNotFound {
            description: format!("No frames found in {}", dir.display()),
        })?;
        let dimensions = image::image_dimensions(first).map_err(|e| ViewerError::DeviceNotFound {
            description: format!("Unreadable frame {}: {e}", first.display()),
        })?;

        log::debug!(
            "🎞️ Replaying {} frames from {} (requested {}x{})",
            frames.len(),
            dir.display(),
            request.ideal_width,
            request.ideal_height
        );

        Ok(Box::new(ImageSequenceStream {
            frames,
            position: 0,
            dimensions,
            live: true,
        }))
    }
}

struct ImageSequenceStream {
    frames: Vec<PathBuf>,
    position: usize,
    dimensions: (u32, u32),
    live: bool,
}

impl VideoStream for ImageSequenceStream {
    fn grab(&mut self) -> ViewerResult<DynamicImage> {
        let index = self.position as u64;
        if !self.live {
            return Err(ViewerError::capture(index, "stream tracks stopped"));
        }

        let path = &self.frames[self.position % self.frames.len()];
        self.position = (self.position + 1) % self.frames.len();

        let image = image::open(path)
            .map_err(|e| ViewerError::capture(index, format!("{}: {e}", path.display())))?;
        self.dimensions = (image.width(), image.height());
        Ok(image)
    }

    fn dimensions(&self) -> (u32, u32) {
        self.dimensions
    }

    fn stop_tracks(&mut self) {
        self.live = false;
    }

    fn is_live(&self) -> bool {
        self.live
    }
}
