//! In-memory platform and image source for exercising the verification flow

use super::image_source::{decode_image, FetchError, ImageSource};
use super::platform::{GuildId, Platform, PlatformError};
use crate::models::session::{Attachment, ChannelId, Marker, Message, MessageId, RoleId, UserId};
use image::DynamicImage;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

pub const BOT_ID: UserId = 1;

#[derive(Debug, Default)]
pub struct PlatformState {
    pub messages: HashMap<MessageId, Message>,
    pub sent: Vec<Message>,
    pub edits: Vec<(MessageId, String)>,
    pub markers: HashSet<(MessageId, Marker)>,
    pub members: HashSet<UserId>,
    pub granted: Vec<(UserId, RoleId)>,
    pub revoked: Vec<(UserId, RoleId)>,
    pub renamed: Vec<(UserId, String)>,
    pub protected: HashSet<UserId>,
    next_id: MessageId,
}

#[derive(Default)]
pub struct MemoryPlatform {
    pub state: Mutex<PlatformState>,
}

impl MemoryPlatform {
    pub fn new() -> Self {
        let platform = Self::default();
        platform.state.lock().next_id = 1000;
        platform
    }

    /// Store a user-authored message and return it
    pub fn post(&self, channel: ChannelId, author: UserId, content: &str, reference: Option<MessageId>, attachments: Vec<Attachment>) -> Message {
        let mut state = self.state.lock();
        state.next_id += 1;
        let message = Message {
            id: state.next_id,
            channel_id: channel,
            author_id: author,
            content: content.to_string(),
            attachments,
            reference,
        };
        state.messages.insert(message.id, message.clone());
        message
    }

    pub fn body(&self, id: MessageId) -> Option<String> {
        self.state.lock().messages.get(&id).map(|m| m.content.clone())
    }

    pub fn has_marker(&self, id: MessageId, marker: Marker) -> bool {
        self.state.lock().markers.contains(&(id, marker))
    }

    pub fn last_sent(&self) -> Option<Message> {
        self.state.lock().sent.last().cloned()
    }
}

impl Platform for MemoryPlatform {
    fn bot_user_id(&self) -> UserId {
        BOT_ID
    }

    async fn fetch_message(&self, _channel: ChannelId, id: MessageId) -> Result<Option<Message>, PlatformError> {
        Ok(self.state.lock().messages.get(&id).cloned())
    }

    async fn send_message(&self, channel: ChannelId, reply_to: Option<MessageId>, body: &str) -> Result<MessageId, PlatformError> {
        let mut state = self.state.lock();
        state.next_id += 1;
        let message = Message {
            id: state.next_id,
            channel_id: channel,
            author_id: BOT_ID,
            content: body.to_string(),
            attachments: Vec::new(),
            reference: reply_to,
        };
        state.messages.insert(message.id, message.clone());
        state.sent.push(message.clone());
        Ok(message.id)
    }

    async fn edit_message(&self, _channel: ChannelId, id: MessageId, body: &str) -> Result<(), PlatformError> {
        let mut state = self.state.lock();
        let message = state
            .messages
            .get_mut(&id)
            .ok_or_else(|| PlatformError::NotFound(format!("message {}", id)))?;
        message.content = body.to_string();
        state.edits.push((id, body.to_string()));
        Ok(())
    }

    async fn add_marker(&self, _channel: ChannelId, id: MessageId, marker: Marker) -> Result<(), PlatformError> {
        self.state.lock().markers.insert((id, marker));
        Ok(())
    }

    async fn remove_marker(&self, _channel: ChannelId, id: MessageId, marker: Marker) -> Result<(), PlatformError> {
        self.state.lock().markers.remove(&(id, marker));
        Ok(())
    }

    async fn is_member(&self, _guild: GuildId, user: UserId) -> Result<bool, PlatformError> {
        Ok(self.state.lock().members.contains(&user))
    }

    async fn grant_role(&self, _guild: GuildId, user: UserId, role: RoleId) -> Result<(), PlatformError> {
        self.state.lock().granted.push((user, role));
        Ok(())
    }

    async fn revoke_role(&self, _guild: GuildId, user: UserId, role: RoleId) -> Result<(), PlatformError> {
        self.state.lock().revoked.push((user, role));
        Ok(())
    }

    async fn set_display_name(&self, _guild: GuildId, user: UserId, name: &str) -> Result<(), PlatformError> {
        let mut state = self.state.lock();
        if state.protected.contains(&user) {
            return Err(PlatformError::Forbidden(format!("cannot rename {}", user)));
        }
        state.renamed.push((user, name.to_string()));
        Ok(())
    }
}

/// Attachment bytes keyed by URL
#[derive(Default)]
pub struct MemoryImageSource {
    pub files: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryImageSource {
    pub fn insert_png(&self, url: &str, image: &DynamicImage) -> Attachment {
        let mut bytes = Vec::new();
        image
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .expect("png encoding should succeed");
        let size = bytes.len() as u64;
        self.files.lock().insert(url.to_string(), bytes);

        Attachment {
            url: url.to_string(),
            filename: "screenshot.png".to_string(),
            size,
        }
    }

    pub fn insert_raw(&self, url: &str, bytes: Vec<u8>) -> Attachment {
        let size = bytes.len() as u64;
        self.files.lock().insert(url.to_string(), bytes);
        Attachment {
            url: url.to_string(),
            filename: "file.bin".to_string(),
            size,
        }
    }
}

impl ImageSource for MemoryImageSource {
    async fn fetch(&self, attachment: &Attachment) -> Result<DynamicImage, FetchError> {
        let bytes = self
            .files
            .lock()
            .get(&attachment.url)
            .cloned()
            .ok_or_else(|| FetchError::Unavailable(attachment.url.clone()))?;
        decode_image(&bytes)
    }
}
