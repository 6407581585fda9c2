//! Challenge/response authentication against the relay
//!
//! The relay sends a random UUID; the client proves it knows the shared
//! secret by returning `hex(HMAC-SHA256(SHA-256(secret), uuid_bytes))`.

use crate::transport::FramedConnection;
use hmac::{Hmac, Mac};
use porthole_common::{Result, TunnelError};
use porthole_protocol::{ClientMessage, ServerMessage};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Constant-time comparison of two byte slices
#[must_use]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Hash a secret using SHA-256
#[must_use]
pub fn hash_secret(secret: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.finalize().into()
}

/// Answers relay challenges with a key derived once from the shared secret
#[derive(Clone)]
pub struct Authenticator {
    key: [u8; 32],
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator").finish_non_exhaustive()
    }
}

impl Authenticator {
    pub fn new(secret: &str) -> Self {
        Self {
            key: hash_secret(secret),
        }
    }

    /// Lower-case hex tag for `challenge`.
    pub fn answer(&self, challenge: &Uuid) -> String {
        #[allow(clippy::expect_used)]
        let mut mac =
            HmacSha256::new_from_slice(&self.key).expect("HMAC accepts keys of any length");
        mac.update(challenge.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Check a tag produced by [`answer`](Self::answer), in constant time.
    pub fn validate(&self, challenge: &Uuid, tag: &str) -> bool {
        constant_time_eq(self.answer(challenge).as_bytes(), tag.as_bytes())
    }

    /// Receive the relay's challenge and send back the answer.
    ///
    /// Runs once per socket: the control connection and every tunnel socket
    /// are challenged independently.
    pub async fn client_handshake<S>(&self, conn: &mut FramedConnection<S>) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let challenge = match conn.receive_message(true).await? {
            Some(ServerMessage::Challenge(challenge)) => challenge,
            Some(other) => {
                return Err(TunnelError::UnexpectedHandshakeMessage(
                    other.kind().to_string(),
                ))
            }
            None => return Err(TunnelError::UnexpectedEof),
        };

        debug!(%challenge, "Answering authentication challenge");
        conn.send(&ClientMessage::Authenticate(self.answer(&challenge)))
            .await
    }
}
