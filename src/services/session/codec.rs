//! Session state carried inside the text of the bot's instruction message.
//!
//! Layout of an open session message:
//!
//! ```text
//! <instructions>
//! ===<origin message id>
//! ===
//! <claimed username>
//! <one '.' per failed attempt>
//! ```
//!
//! Splitting the body on `===` gives at most three parts: the instructions, the
//! origin id, and a block whose first line is the username and whose second line's
//! length is the attempt count. A failed attempt appends one `.` to the body. A
//! closed session is a body without the delimiter, which no longer decodes.

use crate::models::session::{SessionState, MAX_ATTEMPTS};
use thiserror::Error;

pub const DELIMITER: &str = "===";
const ATTEMPT_MARK: char = '.';

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("message carries no session block")]
    MissingSessionBlock,
    #[error("invalid origin message id {0:?}")]
    InvalidOriginId(String),
    #[error("session block has no username line")]
    MissingUsername,
    #[error("invalid attempts line {0:?}")]
    InvalidAttempts(String),
    #[error("username {0:?} cannot be carried in a session message")]
    UnencodableUsername(String),
    #[error("instructions must not contain the session delimiter")]
    DelimiterInInstructions,
}

/// Encodes and decodes [`SessionState`] to and from a message body
#[derive(Debug, Clone)]
pub struct SessionCodec {
    instructions: String,
}

impl SessionCodec {
    /// Codec prefixing every session block with `instructions`
    pub fn new(instructions: impl Into<String>) -> Result<Self, CodecError> {
        let instructions = instructions.into();
        if instructions.contains(DELIMITER) {
            return Err(CodecError::DelimiterInInstructions);
        }
        Ok(Self { instructions })
    }

    /// Human-readable preamble of open session messages
    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    /// Whether `username` survives a round trip through a message body
    pub fn can_carry(username: &str) -> bool {
        !username.is_empty()
            && username.trim() == username
            && !username.contains(DELIMITER)
            && !username.chars().any(|c| c == '\n' || c == '\r')
    }

    /// Full message body for `state`
    pub fn encode(&self, state: &SessionState) -> Result<String, CodecError> {
        if !Self::can_carry(&state.claimed_username) {
            return Err(CodecError::UnencodableUsername(state.claimed_username.clone()));
        }
        Ok(format!(
            "{}\n{}",
            self.instructions,
            session_block(state.origin_message_id, &state.claimed_username, state.attempts)
        ))
    }

    /// Parse the session state out of a (possibly edited or whitespace-trimmed) body
    pub fn decode(body: &str) -> Result<SessionState, CodecError> {
        let mut parts = body.splitn(3, DELIMITER);
        let _instructions = parts.next();
        let (Some(origin), Some(block)) = (parts.next(), parts.next()) else {
            return Err(CodecError::MissingSessionBlock);
        };

        let origin_message_id = origin
            .trim()
            .parse::<u64>()
            .map_err(|_| CodecError::InvalidOriginId(origin.trim().to_string()))?;

        let block = block
            .strip_prefix("\r\n")
            .or_else(|| block.strip_prefix('\n'))
            .unwrap_or(block);
        let (username_line, rest) = block.split_once('\n').unwrap_or((block, ""));
        let claimed_username = username_line.trim_end_matches('\r');
        if claimed_username.trim().is_empty() {
            return Err(CodecError::MissingUsername);
        }

        let attempts_line = rest.trim_end();
        if !attempts_line.chars().all(|c| c == ATTEMPT_MARK) {
            return Err(CodecError::InvalidAttempts(attempts_line.to_string()));
        }
        let attempts = attempts_line.len() as u32;
        if attempts > MAX_ATTEMPTS {
            return Err(CodecError::InvalidAttempts(attempts_line.to_string()));
        }

        Ok(SessionState {
            origin_message_id,
            claimed_username: claimed_username.to_string(),
            attempts,
        })
    }

    /// Body with one more failed attempt recorded, and the state it now encodes.
    ///
    /// For a body this codec produced, the result is the body with a single `.`
    /// appended. A body whose trailing newline was stripped in transit is first
    /// restored to canonical form.
    pub fn record_failure(body: &str) -> Result<(String, SessionState), CodecError> {
        let state = Self::decode(body)?;
        let next = state.with_failure();
        if next.attempts > MAX_ATTEMPTS {
            return Err(CodecError::InvalidAttempts(
                ATTEMPT_MARK.to_string().repeat(next.attempts as usize),
            ));
        }

        // decode() succeeded, so the delimiter is present
        let instructions_end = body.find(DELIMITER).unwrap_or(body.len());
        let canonical = format!(
            "{}{}",
            &body[..instructions_end],
            session_block(state.origin_message_id, &state.claimed_username, state.attempts)
        );

        Ok((format!("{}{}", canonical, ATTEMPT_MARK), next))
    }
}

fn session_block(origin_message_id: u64, username: &str, attempts: u32) -> String {
    format!(
        "{d}{id}\n{d}\n{name}\n{marks}",
        d = DELIMITER,
        id = origin_message_id,
        name = username,
        marks = ATTEMPT_MARK.to_string().repeat(attempts as usize),
    )
}
