//! Username rules applied during the handshake.

use crate::{SessionConfig, SessionError};

/// Trims the reply to the username prompt and checks its length.
///
/// Length is counted in characters, so a multi-byte name is measured the
/// way the person typing it would count. Names are not checked for
/// uniqueness; two participants may share one.
///
/// # Errors
/// Returns [`SessionError::InvalidUsername`] when the trimmed name has
/// fewer than `config.min_name_len` or more than `config.max_name_len`
/// characters.
pub fn validate_username(
    raw: &str,
    config: &SessionConfig,
) -> Result<String, SessionError> {
    let name = raw.trim();
    let length = name.chars().count();
    if length < config.min_name_len || length > config.max_name_len {
        return Err(SessionError::InvalidUsername {
            length,
            min: config.min_name_len,
            max: config.max_name_len,
        });
    }
    Ok(name.to_owned())
}
