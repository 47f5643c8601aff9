use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

const PEER_ID_PREFIX: &str = "web-";
const SUFFIX_LEN: usize = 9;
const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Stable identifier of one participant's session.
///
/// Ordering is plain string ordering; the transport uses it to decide which
/// side of a pair sends the offer.
#[derive(Debug, Serialize, Deserialize, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[serde(transparent)]
pub struct PeerId(pub String);

impl PeerId {
    /// Generate a fresh `web-xxxxxxxxx` id from a random v4 UUID.
    pub fn generate() -> Self {
        let mut n = Uuid::new_v4().as_u128();
        let mut suffix = String::with_capacity(SUFFIX_LEN);
        for _ in 0..SUFFIX_LEN {
            suffix.push(BASE36[(n % 36) as usize] as char);
            n /= 36;
        }
        Self(format!("{PEER_ID_PREFIX}{suffix}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PeerId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for PeerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
