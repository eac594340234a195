//! Template store: loads the reference image once and hands out shared handles

use super::types::Template;
use crate::config::DetectionConfig;
use crate::error::{ViewerError, ViewerResult};
use image::{DynamicImage, GrayImage, Luma};
use std::path::{Path, PathBuf};

pub struct TemplateStore {
    max_width: u32,
    max_height: u32,
    template: Option<Template>,
    last_failure: Option<(PathBuf, String)>,
    load_count: usize,
}

impl TemplateStore {
    /// Create an empty store; it stays "not ready" until a load succeeds
    pub fn new(max_width: u32, max_height: u32) -> Self {
        Self {
            max_width,
            max_height,
            template: None,
            last_failure: None,
            load_count: 0,
        }
    }

    pub fn from_config(config: &DetectionConfig) -> Self {
        Self::new(config.max_template_width, config.max_template_height)
    }

    /// Decode, convert to grayscale and bound the template size
    pub fn load(&mut self, path: &Path) -> ViewerResult<Template> {
        self.load_count += 1;
        let decoded = image::open(path).map_err(|e| ViewerError::TemplateLoadFailure {
            path: path.to_path_buf(),
            description: e.to_string(),
        });
        self.finish_load(path, decoded)
    }

    /// Same as `load`, with decoding moved off the async scheduler
    pub async fn load_async(&mut self, path: PathBuf) -> ViewerResult<Template> {
        self.load_count += 1;
        let decode_path = path.clone();
        let decoded = tokio::task::spawn_blocking(move || image::open(&decode_path))
            .await
            .map_err(|e| ViewerError::TemplateLoadFailure {
                path: path.clone(),
                description: format!("decode task failed: {e}"),
            })
            .and_then(|res| {
                res.map_err(|e| ViewerError::TemplateLoadFailure {
                    path: path.clone(),
                    description: e.to_string(),
                })
            });
        self.finish_load(&path, decoded)
    }

    /// Install an already decoded image as the template
    pub fn from_image(&mut self, name: &str, image: DynamicImage) -> Template {
        self.load_count += 1;
        let template = self.prepare(name, image);
        self.last_failure = None;
        self.template = Some(template.clone());
        template
    }

    fn finish_load(
        &mut self,
        path: &Path,
        decoded: ViewerResult<DynamicImage>,
    ) -> ViewerResult<Template> {
        match decoded {
            Ok(image) => {
                let name = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or("template");
                let template = self.prepare(name, image);
                log::info!(
                    "✅ Target template loaded: {} {}x{} (source {}x{})",
                    template.name,
                    template.width(),
                    template.height(),
                    template.source_dimensions.0,
                    template.source_dimensions.1
                );
                self.last_failure = None;
                self.template = Some(template.clone());
                Ok(template)
            }
            Err(e) => {
                log::error!("❌ {}", e);
                self.template = None;
                self.last_failure = Some((path.to_path_buf(), e.to_string()));
                Err(e)
            }
        }
    }

    fn prepare(&self, name: &str, image: DynamicImage) -> Template {
        let gray = image.to_luma8();
        let source_dimensions = gray.dimensions();
        let (width, height) = bounded_size(source_dimensions, (self.max_width, self.max_height));
        let gray = if (width, height) != source_dimensions {
            log::debug!(
                "📐 Resizing template {}x{} -> {}x{}",
                source_dimensions.0,
                source_dimensions.1,
                width,
                height
            );
            downscale_area(&gray, width, height)
        } else {
            gray
        };
        Template::new(name, gray, source_dimensions)
    }

    pub fn is_ready(&self) -> bool {
        self.template.is_some()
    }

    pub fn template(&self) -> Option<&Template> {
        self.template.as_ref()
    }

    /// Template handle for starting detection, or the reason it is missing
    pub fn require(&self) -> ViewerResult<Template> {
        if let Some(template) = &self.template {
            return Ok(template.clone());
        }
        match &self.last_failure {
            Some((path, description)) => Err(ViewerError::TemplateLoadFailure {
                path: path.clone(),
                description: description.clone(),
            }),
            None => Err(ViewerError::TemplateNotReady),
        }
    }

    /// Number of load attempts made on this store
    pub fn load_count(&self) -> usize {
        self.load_count
    }
}

/// Largest size with scale factor <= 1 that fits both bounds, aspect preserved
pub fn bounded_size(source: (u32, u32), bounds: (u32, u32)) -> (u32, u32) {
    let (width, height) = source;
    if width <= bounds.0 && height <= bounds.1 {
        return source;
    }
    let scale = f64::min(
        bounds.0 as f64 / width as f64,
        bounds.1 as f64 / height as f64,
    );
    let scaled_w = ((width as f64 * scale).round() as u32).clamp(1, bounds.0);
    let scaled_h = ((height as f64 * scale).round() as u32).clamp(1, bounds.1);
    (scaled_w, scaled_h)
}

/// Area-averaging downscale: every destination pixel is the coverage-weighted
/// mean of the source pixels under its footprint
pub fn downscale_area(src: &GrayImage, width: u32, height: u32) -> GrayImage {
    let (src_w, src_h) = src.dimensions();
    let x_weights = area_weights(src_w as usize, width as usize);
    let y_weights = area_weights(src_h as usize, height as usize);

    // Horizontal pass into a float buffer, src_h rows of `width` columns
    let mut horizontal = vec![0f32; src_h as usize * width as usize];
    for y in 0..src_h as usize {
        let row = &src.as_raw()[y * src_w as usize..(y + 1) * src_w as usize];
        for (dx, taps) in x_weights.iter().enumerate() {
            horizontal[y * width as usize + dx] = taps
                .iter()
                .map(|&(sx, w)| row[sx] as f32 * w)
                .sum();
        }
    }

    GrayImage::from_fn(width, height, |dx, dy| {
        let value: f32 = y_weights[dy as usize]
            .iter()
            .map(|&(sy, w)| horizontal[sy * width as usize + dx as usize] * w)
            .sum();
        Luma([value.round().clamp(0.0, 255.0) as u8])
    })
}

/// For each destination index, the overlapping source indices and their
/// normalized coverage
fn area_weights(src_len: usize, dst_len: usize) -> Vec<Vec<(usize, f32)>> {
    let scale = src_len as f64 / dst_len as f64;
    (0..dst_len)
        .map(|d| {
            let start = d as f64 * scale;
            let end = ((d + 1) as f64 * scale).min(src_len as f64);
            let first = start.floor() as usize;
            let last = (end.ceil() as usize).min(src_len);
            (first..last)
                .filter_map(|s| {
                    let overlap = (end.min((s + 1) as f64) - start.max(s as f64)) / scale;
                    (overlap > 1e-9).then_some((s, overlap as f32))
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{scratch_dir, textured_image};

    #[test]
    fn test_bounded_size_keeps_small_images() {
        assert_eq!(bounded_size((200, 100), (320, 240)), (200, 100));
        assert_eq!(bounded_size((320, 240), (320, 240)), (320, 240));
    }

    #[test]
    fn test_bounded_size_preserves_aspect() {
        assert_eq!(bounded_size((640, 480), (320, 240)), (320, 240));
        // Width-limited: scale 0.32
        assert_eq!(bounded_size((1000, 600), (320, 240)), (320, 192));
        // Height-limited: scale 0.2
        assert_eq!(bounded_size((800, 1200), (320, 240)), (160, 240));
    }

    #[test]
    fn test_area_downscale_averages_blocks() {
        // 2x2 blocks of 0 and 100 alternate horizontally
        let src = GrayImage::from_fn(8, 4, |x, _| Luma([if (x / 2) % 2 == 0 { 0 } else { 100 }]));
        let out = downscale_area(&src, 4, 2);
        assert_eq!(out.dimensions(), (4, 2));
        assert_eq!(out.get_pixel(0, 0)[0], 0);
        assert_eq!(out.get_pixel(1, 0)[0], 100);

        // Factor 4 mixes both columns equally
        let out = downscale_area(&src, 2, 1);
        assert_eq!(out.get_pixel(0, 0)[0], 50);
    }

    #[test]
    fn test_area_downscale_non_integer_factor() {
        let src = GrayImage::from_pixel(300, 300, Luma([77]));
        let out = downscale_area(&src, 128, 128);
        assert!(out.pixels().all(|p| p[0] == 77));
    }

    #[test]
    fn test_store_not_ready_until_loaded() {
        let store = TemplateStore::new(320, 240);
        assert!(!store.is_ready());
        assert!(matches!(store.require(), Err(ViewerError::TemplateNotReady)));
    }

    #[test]
    fn test_missing_asset_reports_load_failure() {
        let mut store = TemplateStore::new(320, 240);
        let err = store.load(Path::new("assets/missing-template.jpeg")).unwrap_err();
        assert!(matches!(err, ViewerError::TemplateLoadFailure { .. }));
        assert!(!store.is_ready());
        assert!(matches!(
            store.require(),
            Err(ViewerError::TemplateLoadFailure { .. })
        ));
    }

    #[test]
    fn test_load_downscales_large_asset() {
        let dir = scratch_dir("template-load");
        let path = dir.join("poster.png");
        textured_image(640, 360, 9).save(&path).unwrap();

        let mut store = TemplateStore::new(320, 240);
        let template = store.load(&path).unwrap();
        assert_eq!(template.name, "poster");
        assert_eq!(template.dimensions(), (320, 180));
        assert_eq!(template.source_dimensions, (640, 360));
        assert!(store.is_ready());
        assert_eq!(store.load_count(), 1);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_async_load_matches_sync_load() {
        let dir = scratch_dir("template-async");
        let path = dir.join("target.png");
        textured_image(100, 80, 4).save(&path).unwrap();

        let mut sync_store = TemplateStore::new(320, 240);
        let mut async_store = TemplateStore::new(320, 240);
        let a = sync_store.load(&path).unwrap();
        let b = async_store.load_async(path.clone()).await.unwrap();
        assert_eq!(a.image(), b.image());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_from_image_converts_rgb_to_gray() {
        let mut store = TemplateStore::new(320, 240);
        let rgb = image::RgbImage::from_pixel(10, 10, image::Rgb([255, 255, 255]));
        let template = store.from_image("white", DynamicImage::ImageRgb8(rgb));
        assert_eq!(template.image().get_pixel(0, 0)[0], 255);
        assert!(store.is_ready());
    }
}
