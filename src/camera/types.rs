// Capture device types and traits
use crate::error::ViewerResult;
use image::{DynamicImage, GrayImage};
use serde::{Deserialize, Serialize};

/// Which way the requested camera should face
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    User,
    #[default]
    Environment,
}

impl FacingMode {
    pub fn toggled(self) -> Self {
        match self {
            FacingMode::User => FacingMode::Environment,
            FacingMode::Environment => FacingMode::User,
        }
    }

    /// Label used in user notices
    pub fn label(self) -> &'static str {
        match self {
            FacingMode::User => "front",
            FacingMode::Environment => "back",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FacingMode::User => "user",
            FacingMode::Environment => "environment",
        }
    }
}

/// Parameters of a stream request; width and height are hints, not guarantees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamRequest {
    pub facing: FacingMode,
    pub ideal_width: u32,
    pub ideal_height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoInput {
    pub device_id: String,
    pub label: String,
    pub facing: Option<FacingMode>,
}

/// A live stream handed out by a capture device
pub trait VideoStream: Send {
    /// Grab the picture currently shown by the stream
    fn grab(&mut self) -> ViewerResult<DynamicImage>;
    fn dimensions(&self) -> (u32, u32);
    /// Stop every track; must be safe to call more than once
    fn stop_tracks(&mut self);
    fn is_live(&self) -> bool;
}

// Capture device capabilities consumed by the frame source
pub trait CaptureDevice: Send {
    fn enumerate_video_inputs(&self) -> ViewerResult<Vec<VideoInput>>;
    fn open_stream(&mut self, request: &StreamRequest) -> ViewerResult<Box<dyn VideoStream>>;
}

/// One still capture, already reduced to grayscale
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: GrayImage,
    pub index: u64, // sequential capture count (per frame source)
    pub capture_ms: u128,
}

impl Frame {
    pub fn new(image: GrayImage, index: u64) -> Self {
        Self {
            image,
            index,
            capture_ms: 0,
        }
    }

    pub fn from_dynamic(image: DynamicImage, index: u64) -> Self {
        let image = match image {
            DynamicImage::ImageLuma8(gray) => gray,
            other => other.to_luma8(),
        };
        Self::new(image, index)
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}
