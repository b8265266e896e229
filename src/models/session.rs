use serde::{Deserialize, Serialize};

pub type MessageId = u64;
pub type ChannelId = u64;
pub type UserId = u64;
pub type RoleId = u64;

/// Failed screenshots allowed before a session escalates
pub const MAX_ATTEMPTS: u32 = 3;

/// Protocol state carried entirely inside one outstanding bot message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionState {
    pub origin_message_id: MessageId,
    pub claimed_username: String,
    pub attempts: u32,
}

impl SessionState {
    pub fn new(origin_message_id: MessageId, claimed_username: impl Into<String>) -> Self {
        Self {
            origin_message_id,
            claimed_username: claimed_username.into(),
            attempts: 0,
        }
    }

    /// No attempts left
    pub fn is_exhausted(&self) -> bool {
        self.attempts >= MAX_ATTEMPTS
    }

    pub fn attempts_left(&self) -> u32 {
        MAX_ATTEMPTS.saturating_sub(self.attempts)
    }

    /// State after one more rejected screenshot
    pub fn with_failure(&self) -> Self {
        Self {
            attempts: self.attempts + 1,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Attachment {
    pub url: String,
    pub filename: String,
    #[serde(default)]
    pub size: u64,
}

/// Platform message as seen by the verification flow
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub channel_id: ChannelId,
    pub author_id: UserId,
    pub content: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    /// Message this one replies to
    #[serde(default)]
    pub reference: Option<MessageId>,
}

/// Status indicator attached to the origin request (reactions on Discord)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Marker {
    Pending,
    Verified,
    Failed,
}

impl Marker {
    /// Reaction used on Discord
    pub fn emoji(self) -> &'static str {
        match self {
            Self::Pending => "\u{23F3}",
            Self::Verified => "\u{2705}",
            Self::Failed => "\u{274C}",
        }
    }
}
