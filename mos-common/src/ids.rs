//! Session token and rater identity generation

use uuid::Uuid;

/// Opaque token identifying one rating session
pub type SessionToken = Uuid;

/// Generate a new session token (UUIDv4)
pub fn new_session_token() -> SessionToken {
    Uuid::new_v4()
}

/// Parse a session token from its string form
pub fn parse_session_token(s: &str) -> Result<SessionToken, uuid::Error> {
    Uuid::parse_str(s)
}

/// Generate a rater identifier of the form `user_xxxxxxxx`
///
/// The id is self-asserted and carries no authentication.
pub fn new_user_id() -> String {
    let simple = Uuid::new_v4().simple().to_string();
    format!("user_{}", &simple[..8])
}

/// Build the idempotency key of a single submission
///
/// Stable across retries of the same file within the same session, distinct
/// across sessions.
pub fn submission_id(token: &SessionToken, index: usize, audio_file: &str) -> String {
    format!("{}:{}:{}", token, index, audio_file)
}
