use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Fixed system phrase players type in chat as proof of account control
pub const DEFAULT_KEYWORD: &str = "dayr discord";

/// Template matching and decision settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VerificationConfig {
    /// Confidence threshold used for both the keyword and the username stage
    pub threshold: f64,
    pub keyword: String,
    /// Candidate font pixel sizes, inclusive, enumerated ascending
    pub min_pixel_size: u32,
    pub max_pixel_size: u32,
    /// Rendered text is shrunk by this factor (the client draws chat at half size)
    pub downscale: u32,
    #[serde(default)]
    pub font_path: Option<PathBuf>,
    pub keyword_color: [u8; 3],
    pub username_color: [u8; 3],
    /// Username rows accepted around the keyword row
    pub row_band: u32,
    /// Username must start within this many pixels of the region's left edge
    pub username_max_x: u32,
    /// Max gap between the username's right edge and the keyword's left edge
    pub adjacency_tolerance: u32,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            threshold: 0.75,
            keyword: DEFAULT_KEYWORD.to_string(),
            min_pixel_size: 74,
            max_pixel_size: 78,
            downscale: 2,
            font_path: None,
            keyword_color: [255, 255, 255],
            username_color: [255, 229, 51],
            row_band: 10,
            username_max_x: 75,
            adjacency_tolerance: 20,
        }
    }
}

impl VerificationConfig {
    /// Candidate sizes in scan order
    pub fn pixel_sizes(&self) -> Vec<u32> {
        (self.min_pixel_size..=self.max_pixel_size).collect()
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(self.threshold > 0.0 && self.threshold <= 1.0) {
            return Err(format!("threshold must be in (0, 1], got {}", self.threshold));
        }
        if self.min_pixel_size == 0 {
            return Err("min_pixel_size must be positive".to_string());
        }
        if self.min_pixel_size > self.max_pixel_size {
            return Err(format!(
                "empty pixel size range {}..={}",
                self.min_pixel_size, self.max_pixel_size
            ));
        }
        if self.downscale == 0 {
            return Err("downscale must be at least 1".to_string());
        }
        if self.keyword.trim().is_empty() {
            return Err("keyword must not be empty".to_string());
        }
        Ok(())
    }
}

/// Guild role identifiers applied on successful verification
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RoleConfig {
    pub guild_id: u64,
    pub verified_role_id: u64,
    pub unverified_role_id: u64,
}

/// HTTP client settings for attachment downloads
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub max_attachment_bytes: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            max_attachment_bytes: 8 * 1024 * 1024,
        }
    }
}

/// Logging output configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    pub json: bool,
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            json: false,
            filter: "info".to_string(),
        }
    }
}

/// Debug artifact output
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DebugConfig {
    #[serde(default)]
    pub dump_dir: Option<PathBuf>,
}

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AppConfig {
    pub verification: VerificationConfig,
    #[serde(default)]
    pub roles: RoleConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub debug: DebugConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.verification.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();

        assert_eq!(config.verification.threshold, 0.75);
        assert_eq!(config.verification.keyword, "dayr discord");
        assert_eq!(config.verification.pixel_sizes(), vec![74, 75, 76, 77, 78]);
        assert_eq!(config.verification.downscale, 2);
        assert_eq!(config.verification.username_color, [255, 229, 51]);
        assert!(config.verification.font_path.is_none());
        assert_eq!(config.roles, RoleConfig::default());
        assert_eq!(config.http.timeout_secs, 10);
        assert!(!config.logging.json);
        assert!(config.debug.dump_dir.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_app_config_serialization() {
        let mut config = AppConfig::default();
        config.roles.verified_role_id = 42;
        config.verification.font_path = Some(PathBuf::from("/tmp/font.ttf"));

        let json = serde_json::to_string_pretty(&config).unwrap();
        let deserialized: AppConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_optional_sections_default_when_missing() {
        let json = serde_json::to_string(&serde_json::json!({
            "verification": VerificationConfig::default(),
        }))
        .unwrap();

        let config: AppConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = VerificationConfig::default();
        config.threshold = 0.0;
        assert!(config.validate().is_err());

        let mut config = VerificationConfig::default();
        config.min_pixel_size = 80;
        assert!(config.validate().unwrap_err().contains("empty pixel size range"));

        let mut config = VerificationConfig::default();
        config.downscale = 0;
        assert!(config.validate().is_err());

        let mut config = VerificationConfig::default();
        config.keyword = "   ".to_string();
        assert!(config.validate().is_err());
    }
}
