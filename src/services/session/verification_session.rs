use super::codec::{CodecError, SessionCodec};
use super::image_source::ImageSource;
use super::platform::{Platform, PlatformError};
use super::responses;
use crate::models::config::RoleConfig;
use crate::models::session::{Marker, Message, MessageId, SessionState};
use crate::models::verification::{Verification, VerificationStatus};
use crate::services::verifier::Verifier;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Platform(#[from] PlatformError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("verification worker failed: {0}")]
    Worker(String),
}

/// Result of a start request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Started { session_message_id: MessageId },
    UsernameNotSupported,
}

/// Result of a reply addressed to some message
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyOutcome {
    /// Not a reply to an open session message
    Ignored,
    /// Reply to a session message that has already ended
    SessionClosed,
    MissingAttachment,
    OriginNotFound,
    NotRequester,
    /// Download or decode failure; no attempt consumed
    FetchFailed,
    Rejected { status: VerificationStatus, attempts: u32 },
    Escalated { status: VerificationStatus },
    /// Body already recorded every attempt (edited by hand)
    Exhausted,
    UsernameNotSupported,
    MemberNotFound,
    Verified { verification: Verification },
}

/// Multi-turn verification conversation.
///
/// Holds no per-session state: every reply is resolved by decoding the session
/// message it answers, and every transition rewrites that message.
pub struct VerificationSession<P, S> {
    platform: P,
    images: S,
    verifier: Arc<Verifier>,
    codec: SessionCodec,
    closed_body: String,
    roles: RoleConfig,
}

impl<P: Platform, S: ImageSource> VerificationSession<P, S> {
    /// Session handler over `platform`, with instructions naming the verifier's keyword
    pub fn new(platform: P, images: S, verifier: Arc<Verifier>, roles: RoleConfig) -> Result<Self, SessionError> {
        let codec = SessionCodec::new(responses::session_instructions(verifier.keyword()))?;
        let closed_body = responses::closed_instructions(verifier.keyword());

        Ok(Self {
            platform,
            images,
            verifier,
            codec,
            closed_body,
            roles,
        })
    }

    /// Platform the session talks to
    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Open a session for `claimed_username`, requested by `request`
    pub async fn start(&self, request: &Message, claimed_username: &str) -> Result<StartOutcome, SessionError> {
        let username = claimed_username.trim();

        if !self.verifier.username_is_supported(username) || !SessionCodec::can_carry(username) {
            info!(request = request.id, username, "rejected unsupported username");
            self.platform
                .send_message(request.channel_id, Some(request.id), &responses::unsupported_username(username))
                .await?;
            return Ok(StartOutcome::UsernameNotSupported);
        }

        let body = self.codec.encode(&SessionState::new(request.id, username))?;
        let session_message_id = self
            .platform
            .send_message(request.channel_id, Some(request.id), &body)
            .await?;
        self.platform
            .add_marker(request.channel_id, request.id, Marker::Pending)
            .await?;

        info!(request = request.id, session = session_message_id, username, "verification session started");
        Ok(StartOutcome::Started { session_message_id })
    }

    /// Process a reply; only replies to an open session message do anything
    pub async fn handle_reply(&self, reply: &Message) -> Result<ReplyOutcome, SessionError> {
        let Some(target_id) = reply.reference else {
            return Ok(ReplyOutcome::Ignored);
        };
        let channel = reply.channel_id;

        let target = match self.platform.fetch_message(channel, target_id).await? {
            Some(target) if target.author_id == self.platform.bot_user_id() => target,
            _ => return Ok(ReplyOutcome::Ignored),
        };

        if target.content == self.closed_body {
            self.respond(reply, &responses::session_closed()).await?;
            return Ok(ReplyOutcome::SessionClosed);
        }

        let state = match SessionCodec::decode(&target.content) {
            Ok(state) => state,
            Err(e) => {
                debug!(message = target.id, error = %e, "reply target carries no session");
                return Ok(ReplyOutcome::Ignored);
            }
        };

        let Some(attachment) = reply.attachments.first() else {
            self.respond(reply, &responses::missing_attachment()).await?;
            return Ok(ReplyOutcome::MissingAttachment);
        };

        let Some(origin) = self.platform.fetch_message(channel, state.origin_message_id).await? else {
            info!(session = target.id, origin = state.origin_message_id, "origin request vanished");
            self.respond(reply, &responses::origin_not_found()).await?;
            return Ok(ReplyOutcome::OriginNotFound);
        };

        if reply.author_id != origin.author_id {
            self.respond(reply, &responses::not_requester()).await?;
            return Ok(ReplyOutcome::NotRequester);
        }

        if state.is_exhausted() {
            warn!(session = target.id, "session body already exhausted");
            self.escalate(reply, &target, &state, None).await?;
            return Ok(ReplyOutcome::Exhausted);
        }

        let image = match self.images.fetch(attachment).await {
            Ok(image) => image,
            Err(e) => {
                warn!(session = target.id, error = %e, "failed to load screenshot");
                self.respond(reply, &responses::fetch_failed(&e.to_string())).await?;
                return Ok(ReplyOutcome::FetchFailed);
            }
        };

        let verifier = self.verifier.clone();
        let username = state.claimed_username.clone();
        let verification = tokio::task::spawn_blocking(move || verifier.verify(&image, &username))
            .await
            .map_err(|e| SessionError::Worker(e.to_string()))?;

        match verification.status {
            VerificationStatus::Verified => self.complete(reply, &target, &origin, &state, verification).await,
            VerificationStatus::Invalid | VerificationStatus::UsernameMismatch => {
                self.reject(reply, &target, &state, verification.status).await
            }
            VerificationStatus::UsernameNotSupported => {
                self.close(&target, &origin, Marker::Failed).await?;
                self.respond(reply, &responses::unsupported_username(&state.claimed_username))
                    .await?;
                Ok(ReplyOutcome::UsernameNotSupported)
            }
        }
    }

    /// Record a rejected screenshot, escalating on the last attempt
    async fn reject(
        &self,
        reply: &Message,
        target: &Message,
        state: &SessionState,
        status: VerificationStatus,
    ) -> Result<ReplyOutcome, SessionError> {
        let next = state.with_failure();
        if next.is_exhausted() {
            self.escalate(reply, target, state, Some(status)).await?;
            return Ok(ReplyOutcome::Escalated { status });
        }

        let (body, next) = SessionCodec::record_failure(&target.content)?;
        self.platform.edit_message(target.channel_id, target.id, &body).await?;

        info!(session = target.id, status = ?status, attempts = next.attempts, "screenshot rejected");
        let attempts_left = next.attempts_left();
        self.respond(
            reply,
            &responses::rejected(status, self.verifier.keyword(), &state.claimed_username, attempts_left),
        )
        .await?;

        Ok(ReplyOutcome::Rejected {
            status,
            attempts: next.attempts,
        })
    }

    /// Close the session as failed and point the user to manual review
    async fn escalate(
        &self,
        reply: &Message,
        target: &Message,
        state: &SessionState,
        status: Option<VerificationStatus>,
    ) -> Result<(), SessionError> {
        let channel = target.channel_id;
        self.platform
            .remove_marker(channel, state.origin_message_id, Marker::Pending)
            .await?;
        self.platform
            .add_marker(channel, state.origin_message_id, Marker::Failed)
            .await?;
        self.platform.edit_message(channel, target.id, &self.closed_body).await?;

        info!(session = target.id, username = %state.claimed_username, "session escalated to manual review");
        let status = status.unwrap_or(VerificationStatus::Invalid);
        self.respond(
            reply,
            &responses::escalated(status, self.verifier.keyword(), &state.claimed_username),
        )
        .await
    }

    /// Apply roles and nickname, then close the session as verified
    async fn complete(
        &self,
        reply: &Message,
        target: &Message,
        origin: &Message,
        state: &SessionState,
        verification: Verification,
    ) -> Result<ReplyOutcome, SessionError> {
        let guild = self.roles.guild_id;
        let member = origin.author_id;

        if !self.platform.is_member(guild, member).await? {
            self.respond(reply, &responses::member_not_found()).await?;
            return Ok(ReplyOutcome::MemberNotFound);
        }

        self.platform
            .grant_role(guild, member, self.roles.verified_role_id)
            .await?;
        self.platform
            .revoke_role(guild, member, self.roles.unverified_role_id)
            .await?;

        match self
            .platform
            .set_display_name(guild, member, &state.claimed_username)
            .await
        {
            Ok(()) => {}
            Err(PlatformError::Forbidden(reason)) => {
                warn!(member, reason = %reason, "not allowed to rename member, keeping nickname");
            }
            Err(e) => return Err(e.into()),
        }

        self.close(target, origin, Marker::Verified).await?;
        info!(session = target.id, member, username = %state.claimed_username, "member verified");
        self.respond(reply, &responses::verified(&state.claimed_username)).await?;

        Ok(ReplyOutcome::Verified { verification })
    }

    /// Mark the origin request and make the session message undecodable
    async fn close(&self, target: &Message, origin: &Message, marker: Marker) -> Result<(), SessionError> {
        self.platform
            .remove_marker(origin.channel_id, origin.id, Marker::Pending)
            .await?;
        self.platform.add_marker(origin.channel_id, origin.id, marker).await?;
        self.platform
            .edit_message(target.channel_id, target.id, &self.closed_body)
            .await?;
        Ok(())
    }

    /// Reply to `reply` with `body`
    async fn respond(&self, reply: &Message, body: &str) -> Result<(), SessionError> {
        self.platform
            .send_message(reply.channel_id, Some(reply.id), body)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::memory::{MemoryImageSource, MemoryPlatform, BOT_ID};
    use super::*;
    use crate::services::verifier::tests::{chat_line, test_verifier};

    const CHANNEL: u64 = 77;
    const PLAYER: u64 = 500;
    const GUILD: u64 = 9;
    const VERIFIED_ROLE: u64 = 11;
    const UNVERIFIED_ROLE: u64 = 12;

    fn session() -> VerificationSession<MemoryPlatform, MemoryImageSource> {
        let platform = MemoryPlatform::new();
        platform.state.lock().members.insert(PLAYER);
        let roles = RoleConfig {
            guild_id: GUILD,
            verified_role_id: VERIFIED_ROLE,
            unverified_role_id: UNVERIFIED_ROLE,
        };
        VerificationSession::new(platform, MemoryImageSource::default(), test_verifier(), roles).unwrap()
    }

    /// Start a session for `username`; returns (request id, session message id)
    fn start(session: &VerificationSession<MemoryPlatform, MemoryImageSource>, username: &str) -> (MessageId, MessageId) {
        let request = session.platform().post(CHANNEL, PLAYER, &format!("!verify {}", username), None, vec![]);
        match tokio_test::block_on(session.start(&request, username)).unwrap() {
            StartOutcome::Started { session_message_id } => (request.id, session_message_id),
            other => panic!("unexpected start outcome {:?}", other),
        }
    }

    fn reply_with(
        session: &VerificationSession<MemoryPlatform, MemoryImageSource>,
        target: MessageId,
        author: u64,
        screenshot: Option<image::DynamicImage>,
    ) -> ReplyOutcome {
        let attachments = match screenshot {
            Some(image) => {
                let url = format!("https://cdn.example/{}.png", target);
                vec![session.images.insert_png(&url, &image)]
            }
            None => vec![],
        };
        let reply = session.platform().post(CHANNEL, author, "here", Some(target), attachments);
        tokio_test::block_on(session.handle_reply(&reply)).unwrap()
    }

    #[test]
    fn test_start_encodes_session_and_marks_pending() {
        let session = session();
        let (request, message) = start(&session, "  justhalf ");

        let body = session.platform().body(message).unwrap();
        let state = SessionCodec::decode(&body).unwrap();
        assert_eq!(state, SessionState::new(request, "justhalf"));
        assert!(body.ends_with("===\njusthalf\n"));
        assert!(session.platform().has_marker(request, Marker::Pending));
    }

    #[test]
    fn test_start_rejects_unsupported_username() {
        let session = session();
        let request = session.platform().post(CHANNEL, PLAYER, "!verify 名前", None, vec![]);

        let outcome = tokio_test::block_on(session.start(&request, "名前")).unwrap();
        assert_eq!(outcome, StartOutcome::UsernameNotSupported);

        let sent = session.platform().last_sent().unwrap();
        assert!(sent.content.contains("cannot be verified"));
        assert!(SessionCodec::decode(&sent.content).is_err());
        assert!(!session.platform().has_marker(request.id, Marker::Pending));
    }

    #[test]
    fn test_verified_end_to_end() {
        let session = session();
        let (request, message) = start(&session, "justhalf");

        let outcome = reply_with(&session, message, PLAYER, Some(chat_line("justhalf", 6, true)));
        match outcome {
            ReplyOutcome::Verified { verification } => assert_eq!(verification.chosen_pixel_size, 76),
            other => panic!("expected verified, got {:?}", other),
        }

        let platform = session.platform();
        {
            let state = platform.state.lock();
            assert_eq!(state.granted, vec![(PLAYER, VERIFIED_ROLE)]);
            assert_eq!(state.revoked, vec![(PLAYER, UNVERIFIED_ROLE)]);
            assert_eq!(state.renamed, vec![(PLAYER, "justhalf".to_string())]);
        }
        assert!(platform.has_marker(request, Marker::Verified));
        assert!(!platform.has_marker(request, Marker::Pending));
        assert!(SessionCodec::decode(&platform.body(message).unwrap()).is_err());
        assert!(platform.last_sent().unwrap().content.starts_with("Verified!"));

        // The closed message no longer accepts screenshots
        let again = reply_with(&session, message, PLAYER, Some(chat_line("justhalf", 6, true)));
        assert_eq!(again, ReplyOutcome::SessionClosed);
        assert_eq!(platform.state.lock().granted.len(), 1);
    }

    #[test]
    fn test_rename_forbidden_is_swallowed() {
        let session = session();
        session.platform().state.lock().protected.insert(PLAYER);
        let (request, message) = start(&session, "justhalf");

        let outcome = reply_with(&session, message, PLAYER, Some(chat_line("justhalf", 6, true)));
        assert!(matches!(outcome, ReplyOutcome::Verified { .. }));

        let platform = session.platform();
        assert!(platform.state.lock().renamed.is_empty());
        assert_eq!(platform.state.lock().granted.len(), 1);
        assert!(platform.has_marker(request, Marker::Verified));
    }

    #[test]
    fn test_three_failures_escalate() {
        let session = session();
        let (request, message) = start(&session, "justhalf");
        let no_keyword = || Some(chat_line("justhalf", 6, false));

        assert_eq!(
            reply_with(&session, message, PLAYER, no_keyword()),
            ReplyOutcome::Rejected { status: VerificationStatus::Invalid, attempts: 1 }
        );
        assert!(session.platform().body(message).unwrap().ends_with("justhalf\n."));

        assert_eq!(
            reply_with(&session, message, PLAYER, Some(chat_line("wwwwwwww", 6, true))),
            ReplyOutcome::Rejected { status: VerificationStatus::UsernameMismatch, attempts: 2 }
        );
        assert!(session.platform().body(message).unwrap().ends_with("justhalf\n.."));

        assert_eq!(
            reply_with(&session, message, PLAYER, no_keyword()),
            ReplyOutcome::Escalated { status: VerificationStatus::Invalid }
        );

        let platform = session.platform();
        let body = platform.body(message).unwrap();
        assert!(!body.contains("==="));
        assert!(platform.has_marker(request, Marker::Failed));
        assert!(!platform.has_marker(request, Marker::Pending));
        assert!(platform.last_sent().unwrap().content.contains("moderator"));

        // A fourth screenshot is not processed as an attempt
        let edits_before = platform.state.lock().edits.len();
        let fourth = reply_with(&session, message, PLAYER, Some(chat_line("justhalf", 6, true)));
        assert_eq!(fourth, ReplyOutcome::SessionClosed);
        assert_eq!(platform.state.lock().edits.len(), edits_before);
        assert!(platform.state.lock().granted.is_empty());
    }

    #[test]
    fn test_missing_attachment_costs_nothing() {
        let session = session();
        let (_, message) = start(&session, "justhalf");
        let before = session.platform().body(message).unwrap();

        assert_eq!(reply_with(&session, message, PLAYER, None), ReplyOutcome::MissingAttachment);
        assert_eq!(session.platform().body(message).unwrap(), before);
        assert!(session.platform().last_sent().unwrap().content.contains("attach"));
    }

    #[test]
    fn test_origin_deleted_abandons_session() {
        let session = session();
        let (request, message) = start(&session, "justhalf");
        session.platform().state.lock().messages.remove(&request);
        let before = session.platform().body(message).unwrap();

        let outcome = reply_with(&session, message, PLAYER, Some(chat_line("justhalf", 6, true)));
        assert_eq!(outcome, ReplyOutcome::OriginNotFound);
        assert_eq!(session.platform().body(message).unwrap(), before);
        assert!(session.platform().state.lock().granted.is_empty());
    }

    #[test]
    fn test_other_user_cannot_submit() {
        let session = session();
        let (_, message) = start(&session, "justhalf");

        let outcome = reply_with(&session, message, PLAYER + 1, Some(chat_line("justhalf", 6, true)));
        assert_eq!(outcome, ReplyOutcome::NotRequester);
        assert!(session.platform().state.lock().granted.is_empty());
    }

    #[test]
    fn test_undecodable_attachment_costs_nothing() {
        let session = session();
        let (_, message) = start(&session, "justhalf");
        let before = session.platform().body(message).unwrap();

        let attachment = session.images.insert_raw("https://cdn.example/notes.txt", b"hello".to_vec());
        let reply = session.platform().post(CHANNEL, PLAYER, "", Some(message), vec![attachment]);
        let outcome = tokio_test::block_on(session.handle_reply(&reply)).unwrap();

        assert_eq!(outcome, ReplyOutcome::FetchFailed);
        assert_eq!(session.platform().body(message).unwrap(), before);
    }

    #[test]
    fn test_replies_to_other_messages_are_ignored() {
        let session = session();
        let chatter = session.platform().post(CHANNEL, PLAYER, "hello", None, vec![]);

        assert_eq!(reply_with(&session, chatter.id, PLAYER, None), ReplyOutcome::Ignored);

        let loose = session.platform().post(CHANNEL, PLAYER, "no reference", None, vec![]);
        assert_eq!(
            tokio_test::block_on(session.handle_reply(&loose)).unwrap(),
            ReplyOutcome::Ignored
        );

        let bot_note = tokio_test::block_on(session.platform().send_message(CHANNEL, None, "plain note")).unwrap();
        assert_eq!(reply_with(&session, bot_note, PLAYER, None), ReplyOutcome::Ignored);
        assert_eq!(session.platform().bot_user_id(), BOT_ID);
    }

    #[test]
    fn test_exhausted_body_ignores_replies_that_cannot_count() {
        let session = session();
        let (request, message) = start(&session, "justhalf");
        session
            .platform()
            .state
            .lock()
            .messages
            .get_mut(&message)
            .unwrap()
            .content
            .push_str("...");
        let before = session.platform().body(message).unwrap();

        assert_eq!(reply_with(&session, message, PLAYER + 1, None), ReplyOutcome::MissingAttachment);
        assert_eq!(reply_with(&session, message, PLAYER, None), ReplyOutcome::MissingAttachment);
        assert_eq!(
            reply_with(&session, message, PLAYER + 1, Some(chat_line("justhalf", 6, true))),
            ReplyOutcome::NotRequester
        );

        let platform = session.platform();
        assert_eq!(platform.body(message).unwrap(), before);
        assert!(!platform.has_marker(request, Marker::Failed));
        assert!(platform.has_marker(request, Marker::Pending));
    }

    #[test]
    fn test_hand_edited_exhausted_body_escalates() {
        let session = session();
        let (request, message) = start(&session, "justhalf");
        {
            let mut state = session.platform().state.lock();
            let body = state.messages.get_mut(&message).unwrap();
            body.content.push_str("...");
        }

        let outcome = reply_with(&session, message, PLAYER, Some(chat_line("justhalf", 6, true)));
        assert_eq!(outcome, ReplyOutcome::Exhausted);
        assert!(session.platform().has_marker(request, Marker::Failed));
        assert!(session.platform().state.lock().granted.is_empty());
    }
}
