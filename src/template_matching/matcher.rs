/// Template matching implementation
///
/// Zero-mean normalized cross-correlation over every placement of the
/// template, reduced to the global maximum.
use super::correlation::{CorrelationEngine, ScoreMap};
use super::types::{MatchResult, Template};
use crate::camera::Frame;
use crate::error::{ViewerError, ViewerResult};
use imageproc::template_matching::find_extremes;
use std::sync::Mutex;
use std::time::Instant;

/// Scores one frame against one template
pub trait FrameMatcher: Send {
    /// Precondition: the template fits inside the frame (see [`fits`]).
    fn match_frame(&self, frame: &Frame, template: &Template) -> ViewerResult<MatchResult>;
}

/// True when the template fits inside the frame in both dimensions
pub fn fits(frame: &Frame, template: &Template) -> bool {
    template.width() <= frame.width() && template.height() <= frame.height()
}

/// FFT-accelerated normalized cross-correlation matcher
pub struct NccMatcher {
    engine: Mutex<CorrelationEngine>,
}

impl NccMatcher {
    pub fn new() -> Self {
        Self {
            engine: Mutex::new(CorrelationEngine::new()),
        }
    }

    /// Full score matrix, `(frame.w - template.w + 1) x (frame.h - template.h + 1)`
    pub fn score_map(&self, frame: &Frame, template: &Template) -> ViewerResult<ScoreMap> {
        let mut engine = self
            .engine
            .lock()
            .map_err(|_| ViewerError::matching("correlation engine poisoned"))?;
        engine.score_map(&frame.image, template.shared_image())
    }
}

impl Default for NccMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameMatcher for NccMatcher {
    fn match_frame(&self, frame: &Frame, template: &Template) -> ViewerResult<MatchResult> {
        if !fits(frame, template) {
            return Err(ViewerError::matching(format!(
                "template {}x{} larger than frame {}x{}",
                template.width(),
                template.height(),
                frame.width(),
                frame.height()
            )));
        }

        let start = Instant::now();
        let scores = self.score_map(frame, template)?;
        let extremes = find_extremes(&scores);
        log::trace!(
            "  ⏳ Correlation over {}x{} placements took {}ms",
            scores.width(),
            scores.height(),
            start.elapsed().as_millis()
        );

        Ok(MatchResult::new(
            extremes.max_value,
            extremes.max_value_location,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template_matching::correlation::direct_score;
    use crate::test_utils::{flat_image, textured_image};
    use image::{GrayImage, Luma};

    fn template_from(image: GrayImage) -> Template {
        let dims = image.dimensions();
        Template::new("test", image, dims)
    }

    fn crop(frame: &GrayImage, x: u32, y: u32, w: u32, h: u32) -> GrayImage {
        image::imageops::crop_imm(frame, x, y, w, h).to_image()
    }

    #[test]
    fn test_score_map_dimensions() {
        let matcher = NccMatcher::new();
        let frame = Frame::new(textured_image(60, 40, 1), 0);
        let template = template_from(textured_image(15, 10, 2));

        let scores = matcher.score_map(&frame, &template).unwrap();
        assert_eq!(scores.dimensions(), (46, 31));
    }

    #[test]
    fn test_finds_exact_crop() {
        let matcher = NccMatcher::new();
        let image = textured_image(80, 60, 3);
        let template = template_from(crop(&image, 23, 17, 20, 16));
        let frame = Frame::new(image, 0);

        let result = matcher.match_frame(&frame, &template).unwrap();
        assert_eq!(result.location, (23, 17));
        assert!(
            result.confidence > 0.999,
            "Exact crop should correlate perfectly, got {}",
            result.confidence
        );
    }

    #[test]
    fn test_brightness_and_contrast_invariance() {
        let matcher = NccMatcher::new();
        let image = textured_image(64, 48, 5);
        let patch = crop(&image, 10, 12, 16, 16);
        // Affine intensity change keeps zero-mean correlation at 1
        let adjusted = GrayImage::from_fn(16, 16, |x, y| {
            Luma([(patch.get_pixel(x, y)[0] as u32 / 2 + 40) as u8])
        });
        let template = template_from(adjusted);
        let frame = Frame::new(image, 0);

        let result = matcher.match_frame(&frame, &template).unwrap();
        assert_eq!(result.location, (10, 12));
        assert!(result.confidence > 0.99);
    }

    #[test]
    fn test_fast_path_agrees_with_direct_sum() {
        let matcher = NccMatcher::new();
        let frame_image = textured_image(31, 23, 7);
        let template_image = textured_image(9, 7, 8);
        let frame = Frame::new(frame_image.clone(), 0);
        let template = template_from(template_image.clone());

        let scores = matcher.score_map(&frame, &template).unwrap();
        for (u, v) in [(0, 0), (5, 3), (22, 16), (11, 9)] {
            let expected = direct_score(&frame_image, &template_image, u, v);
            let actual = scores.get_pixel(u, v)[0] as f64;
            assert!(
                (expected - actual).abs() < 1e-4,
                "({u},{v}): direct {expected} vs fast {actual}"
            );
        }
    }

    #[test]
    fn test_deterministic_for_identical_input() {
        let frame = Frame::new(textured_image(50, 50, 11), 0);
        let template = template_from(textured_image(12, 12, 12));

        let first = NccMatcher::new().match_frame(&frame, &template).unwrap();
        let shared = NccMatcher::new();
        let second = shared.match_frame(&frame, &template).unwrap();
        let third = shared.match_frame(&frame.clone(), &template).unwrap();

        assert_eq!(first, second);
        assert_eq!(second, third);
    }

    #[test]
    fn test_cache_follows_frame_size_change() {
        let matcher = NccMatcher::new();
        let big = textured_image(64, 64, 21);
        let small = crop(&big, 0, 0, 40, 30);
        let template = template_from(crop(&big, 8, 6, 12, 10));

        let a = matcher.match_frame(&Frame::new(big, 0), &template).unwrap();
        let b = matcher.match_frame(&Frame::new(small, 1), &template).unwrap();
        assert_eq!(a.location, (8, 6));
        assert_eq!(b.location, (8, 6));
    }

    #[test]
    fn test_shared_matcher_follows_each_new_template() {
        let shared = NccMatcher::new();
        let frame = Frame::new(textured_image(48, 40, 30), 0);

        for seed in 0..200 {
            // Each template is dropped before the next one is built
            let template = template_from(textured_image(12, 10, 1000 + seed));
            let reused = shared.match_frame(&frame, &template).unwrap();
            let fresh = NccMatcher::new().match_frame(&frame, &template).unwrap();
            assert_eq!(reused, fresh, "template seed {seed} scored with a cached spectrum");
        }
    }

    #[test]
    fn test_reloaded_template_is_not_scored_with_old_pixels() {
        let shared = NccMatcher::new();
        let image = textured_image(40, 32, 8);
        let frame = Frame::new(image.clone(), 0);

        let first = template_from(crop(&image, 3, 4, 10, 8));
        assert_eq!(shared.match_frame(&frame, &first).unwrap().location, (3, 4));
        drop(first);

        let second = template_from(crop(&image, 25, 20, 10, 8));
        assert_eq!(shared.match_frame(&frame, &second).unwrap().location, (25, 20));
    }

    #[test]
    fn test_oversized_template_is_rejected() {
        let matcher = NccMatcher::new();
        let frame = Frame::new(textured_image(20, 20, 1), 0);
        let template = template_from(textured_image(21, 10, 1));

        assert!(!fits(&frame, &template));
        let err = matcher.match_frame(&frame, &template).unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn test_flat_frame_scores_zero() {
        let matcher = NccMatcher::new();
        let frame = Frame::new(flat_image(30, 30, 128), 0);
        let template = template_from(textured_image(10, 10, 2));

        let result = matcher.match_frame(&frame, &template).unwrap();
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.location, (0, 0));
    }

    #[test]
    fn test_inverted_patch_is_anticorrelated() {
        let matcher = NccMatcher::new();
        let image = textured_image(24, 24, 4);
        let frame = Frame::new(image.clone(), 0);
        let inverted = GrayImage::from_fn(24, 24, |x, y| Luma([255 - image.get_pixel(x, y)[0]]));
        let template = template_from(inverted);

        let scores = matcher.score_map(&frame, &template).unwrap();
        assert_eq!(scores.dimensions(), (1, 1));
        assert!(scores.get_pixel(0, 0)[0] < -0.99);

        let result = matcher.match_frame(&frame, &template).unwrap();
        assert_eq!(result.effective_confidence(), 0.0);
    }
}
