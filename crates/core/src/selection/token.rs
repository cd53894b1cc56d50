use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use super::SelectionError;

/// Hex characters kept from the digest. Short enough for a callback payload.
pub const TOKEN_LEN: usize = 12;

/// Short opaque handle for a cached payload.
///
/// Tokens are content hashes, so the same key always produces the same token
/// and repeating a selection overwrites the entry with an identical payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SelectionToken(String);

impl SelectionToken {
    /// Token for a stable key such as a magnet URI or a title.
    pub fn for_key(key: &str) -> Self {
        let digest = Sha256::digest(key.as_bytes());
        let hex = format!("{:x}", digest);
        Self(hex[..TOKEN_LEN].to_string())
    }

    /// Token for a payload narrowed from this one by `discriminator`
    /// (group name, quality label, `sub`/`dub`, `p` for paging).
    pub fn derive(&self, discriminator: &str) -> Self {
        Self::for_key(&format!("{}|{}", self.0, discriminator))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SelectionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SelectionToken {
    type Err = SelectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() == TOKEN_LEN && s.bytes().all(|b| b.is_ascii_hexdigit()) {
            Ok(Self(s.to_ascii_lowercase()))
        } else {
            Err(SelectionError::InvalidCallback(s.to_string()))
        }
    }
}
