use crate::models::config::VerificationConfig;
use crate::services::matching::GlyphRenderer;
use anyhow::Context;
use image::Rgb;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderReport {
    pub output: PathBuf,
    pub text: String,
    pub pixel_size: u32,
    pub width: u32,
    pub height: u32,
}

/// Render `text` the way the verifier draws its templates and save it as PNG.
///
/// `as_username` switches from the keyword colour to the username colour.
pub fn render_template(
    renderer: &GlyphRenderer,
    config: &VerificationConfig,
    text: &str,
    pixel_size: u32,
    as_username: bool,
    output: &Path,
) -> anyhow::Result<RenderReport> {
    if !renderer.is_supported(text) {
        anyhow::bail!("text {:?} contains glyphs the font cannot draw", text);
    }

    let color = if as_username {
        config.username_color
    } else {
        config.keyword_color
    };
    let bitmap = renderer.render(text, pixel_size, Rgb(color))?;

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    bitmap
        .save(output)
        .with_context(|| format!("failed to write {}", output.display()))?;

    tracing::info!(output = %output.display(), text, pixel_size, "rendered template");
    Ok(RenderReport {
        output: output.to_path_buf(),
        text: text.to_string(),
        pixel_size,
        width: bitmap.width(),
        height: bitmap.height(),
    })
}
