use image::RgbaImage;
use serde::{Deserialize, Serialize};

/// Keyword bitmap rendered at one candidate font size
#[derive(Debug, Clone)]
pub struct FontTemplate {
    pub pixel_size: u32,
    pub bitmap: RgbaImage,
}

/// Best-scoring template position inside a search region
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct MatchResult {
    /// Normalized correlation coefficient, clipped to [-1, 1]
    pub confidence: f64,
    pub x: u32,
    pub y: u32,
    pub pixel_size: u32,
}

impl MatchResult {
    /// Result for a template that could not be placed anywhere
    pub fn none(pixel_size: u32) -> Self {
        Self {
            confidence: 0.0,
            x: 0,
            y: 0,
            pixel_size,
        }
    }
}

/// Outcome of checking one screenshot against a claimed username
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationStatus {
    UsernameNotSupported,
    Invalid,
    UsernameMismatch,
    Verified,
}

impl VerificationStatus {
    /// Only `Verified` grants roles
    pub fn is_verified(self) -> bool {
        matches!(self, Self::Verified)
    }
}

/// Verdict plus the scores that produced it
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Verification {
    pub status: VerificationStatus,
    pub username_confidence: f64,
    pub keyword_confidence: f64,
    pub chosen_pixel_size: u32,
}

impl Verification {
    /// Verdict for a username that was never matched
    pub fn unsupported() -> Self {
        Self {
            status: VerificationStatus::UsernameNotSupported,
            username_confidence: 0.0,
            keyword_confidence: 0.0,
            chosen_pixel_size: 0,
        }
    }
}
