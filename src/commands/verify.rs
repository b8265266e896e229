use crate::models::verification::VerificationStatus;
use crate::services::session::SessionCodec;
use crate::services::verifier::Verifier;
use anyhow::Context;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Verdict for one screenshot, printed by `dayr-verify verify`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyReport {
    pub image: PathBuf,
    pub username: String,
    pub keyword: String,
    pub threshold: f64,
    pub status: VerificationStatus,
    pub verified: bool,
    pub username_confidence: f64,
    pub keyword_confidence: f64,
    pub chosen_pixel_size: u32,
}

/// Check a screenshot file against a claimed username
pub fn verify_screenshot(
    verifier: &Verifier,
    image_path: &Path,
    username: &str,
    keyword: Option<&str>,
) -> anyhow::Result<VerifyReport> {
    let image = image::open(image_path)
        .with_context(|| format!("failed to open screenshot {}", image_path.display()))?;
    let username = username.trim();
    let keyword = keyword.unwrap_or_else(|| verifier.keyword());

    let verification = verifier
        .verify_with_keyword(&image, username, keyword)
        .with_context(|| format!("cannot match keyword `{}`", keyword))?;

    Ok(VerifyReport {
        image: image_path.to_path_buf(),
        username: username.to_string(),
        keyword: keyword.to_string(),
        threshold: verifier.threshold(),
        status: verification.status,
        verified: verification.status.is_verified(),
        username_confidence: verification.username_confidence,
        keyword_confidence: verification.keyword_confidence,
        chosen_pixel_size: verification.chosen_pixel_size,
    })
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UsernameCheck {
    pub username: String,
    pub supported: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Whether a session could be opened for `username`
pub fn check_username(verifier: &Verifier, username: &str) -> UsernameCheck {
    let username = username.trim();

    let reason = if username.is_empty() {
        Some("username is empty".to_string())
    } else if !SessionCodec::can_carry(username) {
        Some("username contains line breaks or the session delimiter".to_string())
    } else if !verifier.username_is_supported(username) {
        Some("username contains characters the chat font cannot render".to_string())
    } else {
        None
    };

    UsernameCheck {
        username: username.to_string(),
        supported: reason.is_none(),
        reason,
    }
}
