use crate::models::config::{AppConfig, VerificationConfig};
use crate::models::verification::{FontTemplate, MatchResult, Verification, VerificationStatus};
use crate::services::matching::{
    resolve_font_path, GlyphRenderer, Matcher, RenderError, SearchWindow, TemplateBank,
};
use image::{DynamicImage, Rgb, Rgba, RgbaImage};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Distinct custom keywords whose banks are kept; later ones are rendered per call
const MAX_CUSTOM_BANKS: usize = 16;

/// Decides whether a chat screenshot shows `<username>: <keyword>`.
///
/// The keyword is located first by scanning every candidate font size; the
/// username is then matched at the winning size, restricted to the keyword's row
/// and the start of the line, and must end right where the keyword begins.
pub struct Verifier {
    bank: Arc<TemplateBank>,
    /// Banks for non-default keywords, built on first use
    custom_banks: Mutex<HashMap<String, Arc<TemplateBank>>>,
    config: VerificationConfig,
    dump_dir: Option<PathBuf>,
}

impl Verifier {
    pub fn new(bank: Arc<TemplateBank>, config: VerificationConfig) -> Self {
        Self {
            bank,
            custom_banks: Mutex::new(HashMap::new()),
            config,
            dump_dir: None,
        }
    }

    /// Load the font and build the keyword bank described by `config`
    pub fn from_config(config: &AppConfig) -> Result<Self, RenderError> {
        let settings = &config.verification;
        let font_path = resolve_font_path(settings.font_path.as_deref())?;
        let renderer = Arc::new(GlyphRenderer::from_file(&font_path, settings.downscale)?);
        let bank = TemplateBank::build(
            renderer,
            &settings.keyword,
            &settings.pixel_sizes(),
            Rgb(settings.keyword_color),
        )?;

        Ok(Self::new(Arc::new(bank), settings.clone()).with_dump_dir(config.debug.dump_dir.clone()))
    }

    /// Save templates and an annotated search region for every verification
    pub fn with_dump_dir(mut self, dump_dir: Option<PathBuf>) -> Self {
        self.dump_dir = dump_dir;
        self
    }

    /// Default keyword phrase
    pub fn keyword(&self) -> &str {
        self.bank.keyword()
    }

    /// Confidence both the keyword and the username must reach
    pub fn threshold(&self) -> f64 {
        self.config.threshold
    }

    /// Fails closed for names with glyphs the chat font cannot draw
    pub fn username_is_supported(&self, username: &str) -> bool {
        self.bank.renderer().is_supported(username)
    }

    /// Verify against the default keyword bank
    pub fn verify(&self, image: &DynamicImage, username: &str) -> Verification {
        self.run(image, username, self.bank.templates())
    }

    /// Verify against a one-off keyword; the default keyword reuses the shared bank
    pub fn verify_with_keyword(
        &self,
        image: &DynamicImage,
        username: &str,
        keyword: &str,
    ) -> Result<Verification, RenderError> {
        if keyword == self.bank.keyword() {
            return Ok(self.verify(image, username));
        }

        let bank = self.custom_bank(keyword)?;
        Ok(self.run(image, username, bank.templates()))
    }

    /// Cached bank for a non-default keyword
    fn custom_bank(&self, keyword: &str) -> Result<Arc<TemplateBank>, RenderError> {
        if let Some(bank) = self.custom_banks.lock().get(keyword) {
            return Ok(bank.clone());
        }

        // Rendered without holding the lock
        let bank = Arc::new(TemplateBank::build(
            self.bank.renderer().clone(),
            keyword,
            &self.bank.pixel_sizes(),
            Rgb(self.config.keyword_color),
        )?);
        debug!(keyword, "built custom keyword bank");
        let mut banks = self.custom_banks.lock();
        if banks.len() < MAX_CUSTOM_BANKS {
            banks.insert(keyword.to_string(), bank.clone());
        }
        Ok(bank)
    }

    /// Keyword scan over `templates`, then the username search and the decision
    fn run(&self, image: &DynamicImage, username: &str, templates: &[FontTemplate]) -> Verification {
        if !self.username_is_supported(username) {
            return Verification::unsupported();
        }

        let region = search_region(image);
        let matcher = Matcher::new(&region);

        // Later sizes win ties, so the scan order of the bank is significant
        let mut keyword: Option<MatchResult> = None;
        for template in templates {
            let result = matcher.best_match(&template.bitmap, template.pixel_size);
            debug!(
                pixel_size = template.pixel_size,
                confidence = result.confidence,
                x = result.x,
                y = result.y,
                "keyword candidate"
            );
            if keyword.map_or(true, |best| result.confidence >= best.confidence) {
                keyword = Some(result);
            }
        }
        let Some(keyword) = keyword else {
            return Verification {
                status: VerificationStatus::Invalid,
                username_confidence: 0.0,
                keyword_confidence: 0.0,
                chosen_pixel_size: 0,
            };
        };

        let username_color = Rgb(self.config.username_color);
        let username_image = match self
            .bank
            .renderer()
            .render(username, keyword.pixel_size, username_color)
        {
            Ok(image) => image,
            Err(e) => {
                warn!(error = %e, username, "failed to render username");
                return Verification::unsupported();
            }
        };

        let band = self.config.row_band;
        let window = SearchWindow {
            x: 0..self.config.username_max_x,
            y: keyword.y.saturating_sub(band)..keyword.y + band,
        };
        let user = matcher.best_match_within(&username_image, keyword.pixel_size, &window);

        let threshold = self.config.threshold;
        let right_edge = i64::from(user.x) + i64::from(username_image.width());
        let gap = (right_edge - i64::from(keyword.x)).abs();

        let status = if keyword.confidence < threshold {
            VerificationStatus::Invalid
        } else if user.confidence < threshold || gap >= i64::from(self.config.adjacency_tolerance) {
            VerificationStatus::UsernameMismatch
        } else {
            VerificationStatus::Verified
        };

        info!(
            username,
            status = ?status,
            keyword_confidence = keyword.confidence,
            username_confidence = user.confidence,
            pixel_size = keyword.pixel_size,
            gap,
            "verification finished"
        );

        if let Some(dir) = &self.dump_dir {
            let keyword_image = templates
                .iter()
                .find(|t| t.pixel_size == keyword.pixel_size)
                .map(|t| &t.bitmap);
            if let Err(e) = dump_debug_images(dir, &region, keyword_image, &keyword, &username_image, &user) {
                warn!(error = %e, dir = %dir.display(), "failed to write debug images");
            }
        }

        Verification {
            status,
            username_confidence: user.confidence,
            keyword_confidence: keyword.confidence,
            chosen_pixel_size: keyword.pixel_size,
        }
    }
}

/// Lower-left quadrant, where the game draws its chat overlay
pub fn search_region(image: &DynamicImage) -> RgbaImage {
    let (width, height) = (image.width(), image.height());
    let top = height / 2;
    image.crop_imm(0, top, width / 2, height - top).to_rgba8()
}

fn dump_debug_images(
    dir: &std::path::Path,
    region: &RgbaImage,
    keyword_image: Option<&RgbaImage>,
    keyword: &MatchResult,
    username_image: &RgbaImage,
    user: &MatchResult,
) -> Result<(), image::ImageError> {
    std::fs::create_dir_all(dir)?;

    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default();

    let mut annotated = region.clone();
    if let Some(keyword_image) = keyword_image {
        keyword_image.save(dir.join(format!("{}_keyword.png", timestamp)))?;
        outline(&mut annotated, keyword.x, keyword.y, keyword_image.width(), keyword_image.height(), Rgba([0, 128, 255, 255]));
    }
    username_image.save(dir.join(format!("{}_username.png", timestamp)))?;
    outline(&mut annotated, user.x, user.y, username_image.width(), username_image.height(), Rgba([255, 0, 0, 255]));
    annotated.save(dir.join(format!("{}_result.png", timestamp)))?;

    debug!(dir = %dir.display(), timestamp, "saved debug images");
    Ok(())
}

/// Draw a one-pixel rectangle outline, clipped to the image
fn outline(image: &mut RgbaImage, x: u32, y: u32, width: u32, height: u32, color: Rgba<u8>) {
    let (w, h) = image.dimensions();
    let x_end = (x + width).min(w);
    let y_end = (y + height).min(h);
    if x >= x_end || y >= y_end {
        return;
    }
    for px in x..x_end {
        image.put_pixel(px, y, color);
        image.put_pixel(px, y_end - 1, color);
    }
    for py in y..y_end {
        image.put_pixel(x, py, color);
        image.put_pixel(x_end - 1, py, color);
    }
}

/// Paste rendered text at the given offsets within the search region
#[cfg(test)]
pub(crate) fn compose_screenshot(width: u32, height: u32, parts: &[(&RgbaImage, i64, i64)]) -> DynamicImage {
    let mut screenshot = RgbaImage::from_pixel(width, height, Rgba([12, 14, 18, 255]));
    let top = i64::from(height / 2);
    for (bitmap, x, y) in parts {
        image::imageops::overlay(&mut screenshot, *bitmap, *x, top + *y);
    }
    DynamicImage::ImageRgba8(screenshot)
}
