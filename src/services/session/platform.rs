use crate::models::session::{ChannelId, Marker, Message, MessageId, RoleId, UserId};
use std::future::Future;
use thiserror::Error;

pub type GuildId = u64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlatformError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("platform request failed: {0}")]
    Transport(String),
}

/// Chat platform operations the verification flow depends on.
///
/// Implemented by the bot's gateway adapter; the flow itself keeps no state beyond
/// what these calls read and write.
pub trait Platform: Send + Sync {
    /// Account the bot posts as; only its messages can carry session state
    fn bot_user_id(&self) -> UserId;

    /// `Ok(None)` when the message no longer exists
    fn fetch_message(
        &self,
        channel: ChannelId,
        id: MessageId,
    ) -> impl Future<Output = Result<Option<Message>, PlatformError>> + Send;

    fn send_message(
        &self,
        channel: ChannelId,
        reply_to: Option<MessageId>,
        body: &str,
    ) -> impl Future<Output = Result<MessageId, PlatformError>> + Send;

    fn edit_message(
        &self,
        channel: ChannelId,
        id: MessageId,
        body: &str,
    ) -> impl Future<Output = Result<(), PlatformError>> + Send;

    fn add_marker(
        &self,
        channel: ChannelId,
        id: MessageId,
        marker: Marker,
    ) -> impl Future<Output = Result<(), PlatformError>> + Send;

    fn remove_marker(
        &self,
        channel: ChannelId,
        id: MessageId,
        marker: Marker,
    ) -> impl Future<Output = Result<(), PlatformError>> + Send;

    fn is_member(
        &self,
        guild: GuildId,
        user: UserId,
    ) -> impl Future<Output = Result<bool, PlatformError>> + Send;

    fn grant_role(
        &self,
        guild: GuildId,
        user: UserId,
        role: RoleId,
    ) -> impl Future<Output = Result<(), PlatformError>> + Send;

    fn revoke_role(
        &self,
        guild: GuildId,
        user: UserId,
        role: RoleId,
    ) -> impl Future<Output = Result<(), PlatformError>> + Send;

    /// Fails with [`PlatformError::Forbidden`] for members the bot may not rename
    fn set_display_name(
        &self,
        guild: GuildId,
        user: UserId,
        name: &str,
    ) -> impl Future<Output = Result<(), PlatformError>> + Send;
}
