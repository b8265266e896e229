use ab_glyph::{point, Font, FontArc, PxScale, ScaleFont};
use image::{imageops, Rgb, Rgba, RgbaImage};
use std::collections::HashSet;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Font shipped with the crate, used when no font path is configured
pub const BUNDLED_FONT: &str = "assets/fonts/DejaVuSansMono.ttf";

/// Blocks the in-game chat can display: Basic Latin, Latin-1, Latin Extended-A and Cyrillic.
///
/// Fonts usually cover far more (symbols, dingbats) than the client draws, so the
/// support check only trusts glyphs inside these blocks.
pub const CHAT_CHARSET: &[RangeInclusive<char>] = &[
    ' '..='~',
    '\u{00A0}'..='\u{017F}',
    '\u{0400}'..='\u{04FF}',
];

/// Horizontal tracking applied after every glyph; the chat font is drawn tighter than its metrics
const TRACKING: f32 = -1.0;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("font not found in any expected location (tried {tried:?})")]
    FontNotFound { tried: Vec<PathBuf> },
    #[error("failed to read font {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid font data: {0}")]
    InvalidFont(String),
    #[error("text {0:?} contains glyphs the font cannot draw")]
    UnsupportedText(String),
    #[error("cannot render empty text")]
    EmptyText,
}

/// Locate the font asset.
///
/// A configured path must exist; the bundled font is only searched for when no
/// path is configured.
pub fn resolve_font_path(configured: Option<&Path>) -> Result<PathBuf, RenderError> {
    if let Some(path) = configured {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        return Err(RenderError::FontNotFound {
            tried: vec![path.to_path_buf()],
        });
    }

    let mut tried = Vec::new();

    let candidates = [
        PathBuf::from(BUNDLED_FONT),                       // from the project root
        PathBuf::from("../").join(BUNDLED_FONT),           // from target/ or a sub-directory
        Path::new(env!("CARGO_MANIFEST_DIR")).join(BUNDLED_FONT), // build tree
        PathBuf::from("/usr/share/dayr-verify/DejaVuSansMono.ttf"),
    ];

    for candidate in candidates {
        if candidate.exists() {
            return Ok(candidate);
        }
        tried.push(candidate);
    }

    Err(RenderError::FontNotFound { tried })
}

/// Rasterizes reference strings into tightly cropped RGBA bitmaps
pub struct GlyphRenderer {
    font: FontArc,
    coverage: HashSet<char>,
    downscale: u32,
}

impl GlyphRenderer {
    /// Parse font data; coverage is the font's cmap restricted to [`CHAT_CHARSET`]
    pub fn from_bytes(data: Vec<u8>, downscale: u32) -> Result<Self, RenderError> {
        let font = FontArc::try_from_vec(data).map_err(|e| RenderError::InvalidFont(e.to_string()))?;
        let coverage = font
            .codepoint_ids()
            .map(|(_, c)| c)
            .filter(|c| CHAT_CHARSET.iter().any(|range| range.contains(c)))
            .collect();

        Ok(Self {
            font,
            coverage,
            downscale: downscale.max(1),
        })
    }

    /// Read and parse a font file
    pub fn from_file<P: AsRef<Path>>(path: P, downscale: u32) -> Result<Self, RenderError> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|source| RenderError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let renderer = Self::from_bytes(data, downscale)?;
        tracing::info!(
            font = %path.display(),
            glyphs = renderer.coverage.len(),
            "loaded glyph renderer"
        );
        Ok(renderer)
    }

    /// Whether every character of `text` has a glyph the chat can display.
    ///
    /// Fails closed: empty text and control characters are never supported.
    pub fn is_supported(&self, text: &str) -> bool {
        !text.is_empty()
            && text
                .chars()
                .all(|c| !c.is_control() && self.coverage.contains(&c))
    }

    /// Render `text` at `pixel_size` in `color` on a transparent background.
    ///
    /// The bitmap's top edge is the font's ascender line, so two strings rendered at
    /// the same size share a baseline and line up row for row. The result is then
    /// shrunk by the configured downscale factor.
    pub fn render(&self, text: &str, pixel_size: u32, color: Rgb<u8>) -> Result<RgbaImage, RenderError> {
        if text.is_empty() {
            return Err(RenderError::EmptyText);
        }

        let scale = PxScale::from(pixel_size as f32);
        let scaled = self.font.as_scaled(scale);
        let ascent = scaled.ascent();

        let mut caret = 0.0f32;
        let mut outlines = Vec::with_capacity(text.len());
        for c in text.chars() {
            let id = scaled.glyph_id(c);
            let glyph = id.with_scale_and_position(scale, point(caret, ascent));
            if let Some(outlined) = self.font.outline_glyph(glyph) {
                outlines.push(outlined);
            }
            caret += scaled.h_advance(id) + TRACKING;
        }

        // Extent runs from the pen origin to the furthest inked pixel
        let mut width = (caret - TRACKING).ceil().max(1.0) as u32;
        let mut height = 1u32;
        for outlined in &outlines {
            let bounds = outlined.px_bounds();
            width = width.max(bounds.max.x.ceil().max(0.0) as u32);
            height = height.max(bounds.max.y.ceil().max(0.0) as u32);
        }

        let mut canvas = RgbaImage::new(width, height);
        for outlined in &outlines {
            let bounds = outlined.px_bounds();
            let (left, top) = (bounds.min.x as i32, bounds.min.y as i32);
            outlined.draw(|gx, gy, coverage| {
                let x = left + gx as i32;
                let y = top + gy as i32;
                if x < 0 || y < 0 || x >= width as i32 || y >= height as i32 {
                    return;
                }
                let alpha = (coverage.clamp(0.0, 1.0) * 255.0).round() as u8;
                let pixel = canvas.get_pixel_mut(x as u32, y as u32);
                // Overlapping glyphs keep the stronger coverage
                if alpha > pixel[3] {
                    *pixel = Rgba([color[0], color[1], color[2], alpha]);
                }
            });
        }

        if self.downscale == 1 {
            return Ok(canvas);
        }

        let target_w = (width / self.downscale).max(1);
        let target_h = (height / self.downscale).max(1);
        Ok(imageops::resize(
            &canvas,
            target_w,
            target_h,
            imageops::FilterType::Triangle,
        ))
    }
}
