use crate::models::session::MAX_ATTEMPTS;
use crate::models::verification::VerificationStatus;

/// Instructions that open every session message
pub fn session_instructions(keyword: &str) -> String {
    format!(
        "Welcome! To verify your Day R account:\n\
         1. Type `{keyword}` in the in-game chat.\n\
         2. Take a screenshot where your name appears right before the phrase.\n\
         3. Reply to this message with the screenshot attached.\n\
         You have {MAX_ATTEMPTS} attempts."
    )
}

/// Body left behind once a session has ended
pub fn closed_instructions(keyword: &str) -> String {
    format!(
        "This verification session has ended. To verify again, start a new request with \
         your in-game username, type `{keyword}` in the in-game chat, and reply to the new \
         instructions with a screenshot."
    )
}

/// Username has glyphs the verifier cannot render
pub fn unsupported_username(username: &str) -> String {
    format!(
        "Sorry, the username `{username}` contains characters that cannot be verified \
         automatically. Please ask a moderator to verify you manually."
    )
}

/// Reply carried no screenshot
pub fn missing_attachment() -> String {
    "Please attach your screenshot to the reply. This did not count as an attempt.".to_string()
}

/// Reply came from someone other than the requester
pub fn not_requester() -> String {
    "Only the member who started this verification can submit screenshots for it.".to_string()
}

/// Origin request was deleted
pub fn origin_not_found() -> String {
    "The original verification request could not be found, so this session was abandoned. \
     Please start a new request."
        .to_string()
}

/// Screenshot could not be downloaded or decoded
pub fn fetch_failed(reason: &str) -> String {
    format!(
        "Could not read the attached screenshot ({reason}). Please try again with a PNG or \
         JPEG image. This did not count as an attempt."
    )
}

/// Requester is no longer in the guild
pub fn member_not_found() -> String {
    "You need to be a member of the server to be verified.".to_string()
}

/// Reply to a session that already ended
pub fn session_closed() -> String {
    "This verification session has already ended. Please start a new request.".to_string()
}

/// Reason a screenshot was rejected, with the attempts still available
pub fn rejected(status: VerificationStatus, keyword: &str, username: &str, attempts_left: u32) -> String {
    let reason = rejection_reason(status, keyword, username);
    let plural = if attempts_left == 1 { "" } else { "s" };
    format!("{reason} You have {attempts_left} attempt{plural} left; reply to the instructions with a new screenshot.")
}

/// Final failure: attempts exhausted, manual review required
pub fn escalated(status: VerificationStatus, keyword: &str, username: &str) -> String {
    let reason = rejection_reason(status, keyword, username);
    format!(
        "{reason} You have used all {MAX_ATTEMPTS} attempts. A moderator will review your \
         request manually, or you can start a new request."
    )
}

/// Success confirmation
pub fn verified(username: &str) -> String {
    format!("Verified! Welcome, `{username}`. Your roles and nickname have been updated.")
}

fn rejection_reason(status: VerificationStatus, keyword: &str, username: &str) -> String {
    match status {
        VerificationStatus::Invalid => format!(
            "I could not find the phrase `{keyword}` in the chat area (bottom-left) of your screenshot."
        ),
        VerificationStatus::UsernameMismatch => format!(
            "I found `{keyword}`, but not the name `{username}` right before it."
        ),
        VerificationStatus::UsernameNotSupported => unsupported_username(username),
        VerificationStatus::Verified => "The screenshot was accepted.".to_string(),
    }
}
