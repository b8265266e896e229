use crate::models::config::HttpConfig;
use crate::models::session::Attachment;
use image::DynamicImage;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("download failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("attachment is {size} bytes, limit is {max}")]
    TooLarge { size: u64, max: u64 },
    #[error("not a readable image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("attachment not available: {0}")]
    Unavailable(String),
}

/// Resolves a reply attachment into a decoded screenshot
pub trait ImageSource: Send + Sync {
    fn fetch(&self, attachment: &Attachment) -> impl Future<Output = Result<DynamicImage, FetchError>> + Send;
}

/// Downloads attachments over HTTP
#[derive(Clone)]
pub struct HttpImageSource {
    client: reqwest::Client,
    max_bytes: u64,
}

impl HttpImageSource {
    /// Client with the configured timeout and size cap
    pub fn new(config: &HttpConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            max_bytes: config.max_attachment_bytes,
        })
    }
}

impl ImageSource for HttpImageSource {
    async fn fetch(&self, attachment: &Attachment) -> Result<DynamicImage, FetchError> {
        if attachment.size > self.max_bytes {
            return Err(FetchError::TooLarge {
                size: attachment.size,
                max: self.max_bytes,
            });
        }

        let response = self
            .client
            .get(&attachment.url)
            .send()
            .await?
            .error_for_status()?;
        let bytes = response.bytes().await?;

        if bytes.len() as u64 > self.max_bytes {
            return Err(FetchError::TooLarge {
                size: bytes.len() as u64,
                max: self.max_bytes,
            });
        }

        tracing::debug!(url = %attachment.url, bytes = bytes.len(), "downloaded attachment");
        decode_image(&bytes)
    }
}

/// Decode PNG/JPEG/... bytes into an image
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, FetchError> {
    Ok(image::load_from_memory(bytes)?)
}
