//! The account being watched.

use std::fmt;

use secrecy::{ExposeSecret, SecretString};

use crate::constants::{CLIENT_ID_COOKIE, UID_COOKIE};
use crate::errors::IdentityError;

/// Session credential plus numeric user id, fixed for the process lifetime.
///
/// The uid doubles as the join `channel_param` and as the key for
/// self-echo suppression.
pub struct Identity {
    client_id: SecretString,
    uid: String,
}

impl Identity {
    /// Validate and build an identity. Surrounding whitespace is trimmed.
    pub fn new(client_id: &str, uid: &str) -> Result<Self, IdentityError> {
        let client_id = client_id.trim();
        let uid = uid.trim();
        if client_id.is_empty() {
            return Err(IdentityError::MissingClientId);
        }
        if uid.is_empty() {
            return Err(IdentityError::MissingUid);
        }
        if !uid.bytes().all(|b| b.is_ascii_digit()) {
            return Err(IdentityError::InvalidUid(uid.to_owned()));
        }
        Ok(Self {
            client_id: SecretString::from(client_id.to_owned()),
            uid: uid.to_owned(),
        })
    }

    /// The numeric user id, as the decimal string it was supplied as.
    pub fn uid(&self) -> &str {
        &self.uid
    }

    /// `Cookie` header value for the handshake.
    pub fn cookie_header(&self) -> String {
        format!(
            "{CLIENT_ID_COOKIE}={}; {UID_COOKIE}={}",
            self.client_id.expose_secret(),
            self.uid
        )
    }

    /// Whether a normalized sender uid refers to this account.
    pub fn is_self(&self, sender_uid: &str) -> bool {
        sender_uid == self.uid
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("client_id", &"[REDACTED]")
            .field("uid", &self.uid)
            .finish()
    }
}
