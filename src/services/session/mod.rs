pub mod codec;
pub mod image_source;
pub mod platform;
pub mod responses;
pub mod verification_session;

#[cfg(test)]
pub(crate) mod memory;

pub use codec::{CodecError, SessionCodec};
pub use image_source::{FetchError, HttpImageSource, ImageSource};
pub use platform::{GuildId, Platform, PlatformError};
pub use verification_session::{ReplyOutcome, SessionError, StartOutcome, VerificationSession};
