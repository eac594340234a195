/// Template matching data types
use image::GrayImage;
use serde::Serialize;
use std::sync::Arc;

/// Immutable grayscale reference image, shared cheaply between owners
#[derive(Clone, Debug)]
pub struct Template {
    /// Template label, usually the asset file stem
    pub name: String,
    image: Arc<GrayImage>,
    /// Size of the asset before any downscaling
    pub source_dimensions: (u32, u32),
}

impl Template {
    pub fn new(name: impl Into<String>, image: GrayImage, source_dimensions: (u32, u32)) -> Self {
        Self {
            name: name.into(),
            image: Arc::new(image),
            source_dimensions,
        }
    }

    pub fn image(&self) -> &GrayImage {
        &self.image
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

    /// True when both handles point at the same pixel buffer
    pub fn same_image(&self, other: &Template) -> bool {
        Arc::ptr_eq(&self.image, &other.image)
    }

    /// Shared pixel buffer, for caches keyed on template identity
    pub(crate) fn shared_image(&self) -> &Arc<GrayImage> {
        &self.image
    }

    pub fn was_downscaled(&self) -> bool {
        self.source_dimensions != self.dimensions()
    }
}

/// Best alignment of a template inside a frame
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct MatchResult {
    /// Peak normalized correlation, in [-1, 1]
    pub confidence: f32,
    /// Top-left corner of the best-aligning region
    pub location: (u32, u32),
}

impl MatchResult {
    pub fn new(confidence: f32, location: (u32, u32)) -> Self {
        Self {
            confidence,
            location,
        }
    }

    /// Confidence used for threshold decisions; anti-correlation counts as none
    pub fn effective_confidence(&self) -> f32 {
        if self.confidence.is_nan() {
            0.0
        } else {
            self.confidence.clamp(0.0, 1.0)
        }
    }

    pub fn meets(&self, threshold: f32) -> bool {
        self.effective_confidence() >= threshold
    }

    /// Format match with correlation percentage
    pub fn describe(&self, template: &Template) -> String {
        let pct = (self.effective_confidence() * 100.0) as u32;
        format!(
            "{} at ({},{}) - {}%",
            template.name, self.location.0, self.location.1, pct
        )
    }
}
