/// Fast zero-mean normalized cross-correlation
///
/// Numerators come from one frequency-domain product per frame (the template
/// spectrum is cached per frame size); denominators come from integral images,
/// after J.P. Lewis, "Fast Normalized Cross-Correlation".
use crate::error::{ViewerError, ViewerResult};
use image::{GrayImage, ImageBuffer, Luma};
use imageproc::integral_image::{integral_image, integral_squared_image};
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

/// Correlation score per template placement, `(fw - tw + 1) x (fh - th + 1)`
pub type ScoreMap = ImageBuffer<Luma<f32>, Vec<f32>>;

// Windows whose pixel variance sums below this are treated as flat
const FLAT_WINDOW_EPSILON: f64 = 0.5;

struct TemplateSpectrum {
    /// Held so the buffer stays allocated while the spectrum is cached
    template: Arc<GrayImage>,
    frame_dims: (u32, u32),
    spectrum: Vec<Complex<f64>>,
    /// Sum of squared zero-mean template values
    energy: f64,
}

struct Plans {
    dims: (u32, u32),
    row_forward: Arc<dyn Fft<f64>>,
    col_forward: Arc<dyn Fft<f64>>,
    row_inverse: Arc<dyn Fft<f64>>,
    col_inverse: Arc<dyn Fft<f64>>,
}

/// Reusable correlation state: FFT plans and the last template spectrum
pub struct CorrelationEngine {
    planner: FftPlanner<f64>,
    plans: Option<Plans>,
    spectrum: Option<TemplateSpectrum>,
}

impl CorrelationEngine {
    pub fn new() -> Self {
        Self {
            planner: FftPlanner::new(),
            plans: None,
            spectrum: None,
        }
    }

    fn plans_for(&mut self, dims: (u32, u32)) -> &Plans {
        if self.plans.as_ref().is_some_and(|p| p.dims != dims) {
            self.plans = None;
        }
        let planner = &mut self.planner;
        self.plans.get_or_insert_with(|| {
            let (w, h) = (dims.0 as usize, dims.1 as usize);
            Plans {
                dims,
                row_forward: planner.plan_fft_forward(w),
                col_forward: planner.plan_fft_forward(h),
                row_inverse: planner.plan_fft_inverse(w),
                col_inverse: planner.plan_fft_inverse(h),
            }
        })
    }

    fn ensure_spectrum(&mut self, template: &Arc<GrayImage>, frame_dims: (u32, u32)) {
        let fresh = self
            .spectrum
            .as_ref()
            .is_some_and(|s| Arc::ptr_eq(&s.template, template) && s.frame_dims == frame_dims);
        if fresh {
            return;
        }

        let (fw, fh) = (frame_dims.0 as usize, frame_dims.1 as usize);
        let (tw, th) = (template.width() as usize, template.height() as usize);
        let n = (tw * th) as f64;
        let mean = template.pixels().map(|p| p[0] as f64).sum::<f64>() / n;

        let mut padded = vec![Complex::new(0.0, 0.0); fw * fh];
        let mut energy = 0.0;
        for (x, y, pixel) in template.enumerate_pixels() {
            let centered = pixel[0] as f64 - mean;
            energy += centered * centered;
            padded[y as usize * fw + x as usize] = Complex::new(centered, 0.0);
        }

        let plans = self.plans_for(frame_dims);
        fft_2d(&mut padded, fw, fh, &*plans.row_forward, &*plans.col_forward);

        log::debug!(
            "🧮 Template spectrum computed for {}x{} frames",
            frame_dims.0,
            frame_dims.1
        );
        self.spectrum = Some(TemplateSpectrum {
            template: Arc::clone(template),
            frame_dims,
            spectrum: padded,
            energy,
        });
    }

    /// Full correlation map of `template` over `frame`.
    ///
    /// The template spectrum is reused while the same buffer is passed in
    /// against frames of the same size.
    pub fn score_map(
        &mut self,
        frame: &GrayImage,
        template: &Arc<GrayImage>,
    ) -> ViewerResult<ScoreMap> {
        let (fw, fh) = frame.dimensions();
        let (tw, th) = template.dimensions();
        if tw == 0 || th == 0 {
            return Err(ViewerError::matching("template has zero size"));
        }
        if tw > fw || th > fh {
            return Err(ViewerError::matching(format!(
                "template {tw}x{th} larger than frame {fw}x{fh}"
            )));
        }

        self.ensure_spectrum(template, (fw, fh));
        let plans = self.plans_for((fw, fh));
        let (row_forward, col_forward) = (plans.row_forward.clone(), plans.col_forward.clone());
        let (row_inverse, col_inverse) = (plans.row_inverse.clone(), plans.col_inverse.clone());
        let Some(cached) = self.spectrum.as_ref() else {
            return Err(ViewerError::matching("template spectrum unavailable"));
        };
        let energy = cached.energy;

        let (w, h) = (fw as usize, fh as usize);
        let mut product: Vec<Complex<f64>> = frame
            .as_raw()
            .iter()
            .map(|&v| Complex::new(v as f64, 0.0))
            .collect();

        fft_2d(&mut product, w, h, &*row_forward, &*col_forward);
        for (f, t) in product.iter_mut().zip(cached.spectrum.iter()) {
            *f *= t.conj();
        }
        fft_2d(&mut product, w, h, &*row_inverse, &*col_inverse);
        let norm = 1.0 / (w * h) as f64;

        let sums = integral_image::<_, u64>(frame);
        let squares = integral_squared_image::<_, u64>(frame);
        let n = (tw as f64) * (th as f64);

        let window = |table: &ImageBuffer<Luma<u64>, Vec<u64>>, u: u32, v: u32| -> f64 {
            let a = table.get_pixel(u, v)[0];
            let b = table.get_pixel(u + tw, v)[0];
            let c = table.get_pixel(u, v + th)[0];
            let d = table.get_pixel(u + tw, v + th)[0];
            (d + a - b - c) as f64
        };

        let scores = ScoreMap::from_fn(fw - tw + 1, fh - th + 1, |u, v| {
            if energy <= f64::EPSILON {
                return Luma([0.0]);
            }
            let sum = window(&sums, u, v);
            let sum_sq = window(&squares, u, v);
            let variance_term = sum_sq - sum * sum / n;
            if variance_term < FLAT_WINDOW_EPSILON {
                return Luma([0.0]);
            }
            let numerator = product[v as usize * w + u as usize].re * norm;
            let score = numerator / (variance_term * energy).sqrt();
            Luma([score.clamp(-1.0, 1.0) as f32])
        });

        Ok(scores)
    }
}

impl Default for CorrelationEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// In-place 2-D transform: rows first, then columns through a transpose
fn fft_2d(
    data: &mut Vec<Complex<f64>>,
    width: usize,
    height: usize,
    row_fft: &dyn Fft<f64>,
    col_fft: &dyn Fft<f64>,
) {
    row_fft.process(data);
    let mut columns = transpose(data, width, height);
    col_fft.process(&mut columns);
    *data = transpose(&columns, height, width);
}

fn transpose(src: &[Complex<f64>], width: usize, height: usize) -> Vec<Complex<f64>> {
    let mut out = vec![Complex::new(0.0, 0.0); src.len()];
    for y in 0..height {
        for x in 0..width {
            out[x * height + y] = src[y * width + x];
        }
    }
    out
}

/// Direct evaluation of one placement, used to cross-check the fast path
#[cfg(test)]
pub(crate) fn direct_score(frame: &GrayImage, template: &GrayImage, u: u32, v: u32) -> f64 {
    let (tw, th) = template.dimensions();
    let n = (tw * th) as f64;
    let t_mean = template.pixels().map(|p| p[0] as f64).sum::<f64>() / n;
    let mut f_sum = 0.0;
    for y in 0..th {
        for x in 0..tw {
            f_sum += frame.get_pixel(u + x, v + y)[0] as f64;
        }
    }
    let f_mean = f_sum / n;
    let (mut num, mut f_energy, mut t_energy) = (0.0, 0.0, 0.0);
    for y in 0..th {
        for x in 0..tw {
            let f = frame.get_pixel(u + x, v + y)[0] as f64 - f_mean;
            let t = template.get_pixel(x, y)[0] as f64 - t_mean;
            num += f * t;
            f_energy += f * f;
            t_energy += t * t;
        }
    }
    if f_energy < FLAT_WINDOW_EPSILON || t_energy <= f64::EPSILON {
        0.0
    } else {
        num / (f_energy * t_energy).sqrt()
    }
}
