use crate::models::verification::MatchResult;
use image::RgbaImage;
use rayon::prelude::*;
use std::ops::Range;

const CHANNELS: usize = 3;

/// Variance products below this are treated as flat and score zero
const FLAT_EPSILON: f64 = 1e-6;

/// Allowed top-left positions for a template; clipped to what fits in the region
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchWindow {
    pub x: Range<u32>,
    pub y: Range<u32>,
}

impl SearchWindow {
    /// Every position the template fits
    pub fn unbounded() -> Self {
        Self {
            x: 0..u32::MAX,
            y: 0..u32::MAX,
        }
    }
}

/// Template pixel with non-zero intensity, relative to the template origin
struct InkPixel {
    dx: u32,
    dy: u32,
    value: [f64; CHANNELS],
}

/// Template flattened over black, with the statistics the score needs
struct PreparedTemplate {
    width: u32,
    height: u32,
    ink: Vec<InkPixel>,
    mean: [f64; CHANNELS],
    /// Sum of squared deviations over all channels
    energy: f64,
}

impl PreparedTemplate {
    fn new(template: &RgbaImage) -> Self {
        let (width, height) = template.dimensions();
        let count = (width as f64) * (height as f64);

        let mut ink = Vec::new();
        let mut sum = [0.0f64; CHANNELS];
        let mut sum_sq = [0.0f64; CHANNELS];

        for (dx, dy, pixel) in template.enumerate_pixels() {
            let value = premultiply(pixel.0);
            if value.iter().all(|v| *v == 0.0) {
                continue;
            }
            for c in 0..CHANNELS {
                sum[c] += value[c];
                sum_sq[c] += value[c] * value[c];
            }
            ink.push(InkPixel { dx, dy, value });
        }

        let mut mean = [0.0f64; CHANNELS];
        let mut energy = 0.0;
        if count > 0.0 {
            for c in 0..CHANNELS {
                mean[c] = sum[c] / count;
                energy += sum_sq[c] - count * mean[c] * mean[c];
            }
        }

        Self {
            width,
            height,
            ink,
            mean,
            energy: energy.max(0.0),
        }
    }
}

/// Composite an RGBA pixel over opaque black
fn premultiply(rgba: [u8; 4]) -> [f64; CHANNELS] {
    let alpha = rgba[3] as f64 / 255.0;
    [
        rgba[0] as f64 * alpha,
        rgba[1] as f64 * alpha,
        rgba[2] as f64 * alpha,
    ]
}

/// Normalized cross-correlation template matcher over one search region.
///
/// Scores follow the correlation-coefficient definition: template and window are
/// both mean-centred per channel, summed over the RGB channels, and normalised by
/// the product of their energies. Alpha only serves to composite both images over
/// black; screenshots are opaque, so an alpha channel would add template variance
/// the region can never match. Window sums come from integral images, so a region
/// is prepared once and matched against many templates.
pub struct Matcher {
    width: u32,
    height: u32,
    pixels: Vec<f64>,
    integral: Vec<f64>,
    integral_sq: Vec<f64>,
}

impl Matcher {
    /// Flatten `region` over black and build its integral tables
    pub fn new(region: &RgbaImage) -> Self {
        let (width, height) = region.dimensions();
        let (w, h) = (width as usize, height as usize);

        let mut pixels = Vec::with_capacity(w * h * CHANNELS);
        for pixel in region.pixels() {
            pixels.extend_from_slice(&premultiply(pixel.0));
        }

        let stride = (w + 1) * CHANNELS;
        let mut integral = vec![0.0f64; stride * (h + 1)];
        let mut integral_sq = vec![0.0f64; stride * (h + 1)];

        for y in 0..h {
            let mut row_sum = [0.0f64; CHANNELS];
            let mut row_sq = [0.0f64; CHANNELS];
            for x in 0..w {
                let src = (y * w + x) * CHANNELS;
                let dst = (y + 1) * stride + (x + 1) * CHANNELS;
                let above = y * stride + (x + 1) * CHANNELS;
                for c in 0..CHANNELS {
                    let v = pixels[src + c];
                    row_sum[c] += v;
                    row_sq[c] += v * v;
                    integral[dst + c] = integral[above + c] + row_sum[c];
                    integral_sq[dst + c] = integral_sq[above + c] + row_sq[c];
                }
            }
        }

        Self {
            width,
            height,
            pixels,
            integral,
            integral_sq,
        }
    }

    /// Region width in pixels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Region height in pixels
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Best position of `template` anywhere in the region
    pub fn best_match(&self, template: &RgbaImage, pixel_size: u32) -> MatchResult {
        self.best_match_within(template, pixel_size, &SearchWindow::unbounded())
    }

    /// Best position of `template` whose top-left corner lies inside `window`.
    ///
    /// Ties resolve to the first position in row-major order. A template that does
    /// not fit, or a window that clips to nothing, yields a zero-confidence result.
    pub fn best_match_within(
        &self,
        template: &RgbaImage,
        pixel_size: u32,
        window: &SearchWindow,
    ) -> MatchResult {
        let prepared = PreparedTemplate::new(template);

        if prepared.width == 0
            || prepared.height == 0
            || prepared.width > self.width
            || prepared.height > self.height
        {
            return MatchResult::none(pixel_size);
        }

        let x_end = window.x.end.min(self.width - prepared.width + 1);
        let y_end = window.y.end.min(self.height - prepared.height + 1);
        if window.x.start >= x_end || window.y.start >= y_end {
            return MatchResult::none(pixel_size);
        }

        let rows: Vec<(f64, u32, u32)> = (window.y.start..y_end)
            .into_par_iter()
            .map(|y| {
                let mut best = (f64::NEG_INFINITY, window.x.start, y);
                for x in window.x.start..x_end {
                    let score = self.score_at(&prepared, x, y);
                    if score > best.0 {
                        best = (score, x, y);
                    }
                }
                best
            })
            .collect();

        let mut best = MatchResult::none(pixel_size);
        let mut best_score = f64::NEG_INFINITY;
        for (score, x, y) in rows {
            if score > best_score {
                best_score = score;
                best = MatchResult {
                    confidence: score,
                    x,
                    y,
                    pixel_size,
                };
            }
        }
        best
    }

    /// Correlation coefficient of `template` placed at (`x`, `y`)
    fn score_at(&self, template: &PreparedTemplate, x: u32, y: u32) -> f64 {
        if template.energy < FLAT_EPSILON {
            return 0.0;
        }

        let w = self.width as usize;
        let mut cross = 0.0f64;
        for ink in &template.ink {
            let idx = ((y + ink.dy) as usize * w + (x + ink.dx) as usize) * CHANNELS;
            for c in 0..CHANNELS {
                cross += ink.value[c] * self.pixels[idx + c];
            }
        }

        let count = (template.width as f64) * (template.height as f64);
        let sums = self.window_sums(&self.integral, x, y, template.width, template.height);
        let squares = self.window_sums(&self.integral_sq, x, y, template.width, template.height);

        let mut numerator = cross;
        let mut energy = 0.0f64;
        for c in 0..CHANNELS {
            numerator -= template.mean[c] * sums[c];
            energy += squares[c] - sums[c] * sums[c] / count;
        }

        let denominator = (template.energy * energy.max(0.0)).sqrt();
        if denominator < FLAT_EPSILON {
            return 0.0;
        }
        (numerator / denominator).clamp(-1.0, 1.0)
    }

    /// Per-channel sum over a `w` x `h` window from an integral table
    fn window_sums(&self, table: &[f64], x: u32, y: u32, w: u32, h: u32) -> [f64; CHANNELS] {
        let stride = (self.width as usize + 1) * CHANNELS;
        let (x0, y0) = (x as usize, y as usize);
        let (x1, y1) = (x0 + w as usize, y0 + h as usize);

        let mut out = [0.0f64; CHANNELS];
        for (c, slot) in out.iter_mut().enumerate() {
            *slot = table[y1 * stride + x1 * CHANNELS + c] - table[y0 * stride + x1 * CHANNELS + c]
                - table[y1 * stride + x0 * CHANNELS + c]
                + table[y0 * stride + x0 * CHANNELS + c];
        }
        out
    }
}
