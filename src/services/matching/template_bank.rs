use super::renderer::{GlyphRenderer, RenderError};
use crate::models::verification::FontTemplate;
use image::Rgb;
use rayon::prelude::*;
use std::sync::Arc;

/// Keyword bitmaps for every candidate font size.
///
/// Built once at startup and never mutated, so it can be shared across sessions
/// behind an `Arc` without locking.
pub struct TemplateBank {
    renderer: Arc<GlyphRenderer>,
    keyword: String,
    templates: Vec<FontTemplate>,
}

impl TemplateBank {
    /// Render `keyword` at each size in `pixel_sizes`, preserving their order
    pub fn build(
        renderer: Arc<GlyphRenderer>,
        keyword: &str,
        pixel_sizes: &[u32],
        color: Rgb<u8>,
    ) -> Result<Self, RenderError> {
        if !renderer.is_supported(keyword) {
            return Err(RenderError::UnsupportedText(keyword.to_string()));
        }

        let templates = pixel_sizes
            .par_iter()
            .map(|&pixel_size| {
                renderer
                    .render(keyword, pixel_size, color)
                    .map(|bitmap| FontTemplate { pixel_size, bitmap })
            })
            .collect::<Result<Vec<_>, _>>()?;

        tracing::info!(keyword, sizes = ?pixel_sizes, "built keyword template bank");

        Ok(Self {
            renderer,
            keyword: keyword.to_string(),
            templates,
        })
    }

    /// Phrase the bank was rendered from
    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    /// Templates in scan order
    pub fn templates(&self) -> &[FontTemplate] {
        &self.templates
    }

    /// Candidate sizes in scan order
    pub fn pixel_sizes(&self) -> Vec<u32> {
        self.templates.iter().map(|t| t.pixel_size).collect()
    }

    /// Renderer shared with username rendering
    pub fn renderer(&self) -> &Arc<GlyphRenderer> {
        &self.renderer
    }
}
