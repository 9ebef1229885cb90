//! Token registry: per-window shared secrets.
//!
//! A token is 64 bytes from the OS-seeded CSPRNG, hex encoded. Tokens are
//! never checked for uniqueness (collisions are negligible at 512 bits)
//! and never revoked explicitly: removing the owning listener record is
//! what invalidates one.

use std::fmt;

use rand::RngCore;

/// Number of random bytes in a token.
pub const TOKEN_BYTES: usize = 64;

/// Capability secret binding a remote peer to one window identity.
#[derive(Clone)]
pub struct Token(String);

impl Token {
    /// Issue a fresh random token.
    pub fn issue() -> Self {
        let mut bytes = [0u8; TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    /// The encoded secret, for handing to the renderer process.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compare against a token presented by a peer in constant time.
    pub fn matches(&self, provided: &str) -> bool {
        constant_time_eq(self.0.as_bytes(), provided.as_bytes())
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.matches(&other.0)
    }
}

impl Eq for Token {}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token([REDACTED])")
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
