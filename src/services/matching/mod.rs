pub mod matcher;
pub mod renderer;
pub mod template_bank;

// Re-export main types
pub use matcher::{Matcher, SearchWindow};
pub use renderer::{resolve_font_path, GlyphRenderer, RenderError};
pub use template_bank::TemplateBank;
