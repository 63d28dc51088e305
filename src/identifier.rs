//! NCP identifiers — 4-byte ASCII tokens used for packet types, field
//! names, and param names.
//!
//! ```text
//! Offset  Size   Field
//! ──────  ─────  ──────────────
//!   0       4    ascii bytes, right-padded with 0x20 or 0x00
//! ```

use crate::error::NcpError;

/// Fixed on-wire size of an identifier.
pub const IDENTIFIER_SIZE: usize = 4;

/// A 4-byte ASCII token, stored semantically as a right-trimmed string.
///
/// Round-trips through [`Identifier::to_bytes`] / [`Identifier::from_bytes`]
/// by padding with `0x20` on encode and trimming `0x20`/`0x00` on decode.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier(String);

impl Identifier {
    /// Build an identifier from a string, rejecting names that don't fit
    /// in 4 bytes once encoded as Latin-1.
    pub fn new(name: impl Into<String>) -> Result<Self, NcpError> {
        let name = name.into();
        if name.len() > IDENTIFIER_SIZE {
            return Err(NcpError::InvalidIdentifier(name));
        }
        if !name.bytes().all(|b| b.is_ascii_graphic() || b == b' ') {
            return Err(NcpError::InvalidIdentifier(name));
        }
        Ok(Self(name))
    }

    /// Serialize to exactly [`IDENTIFIER_SIZE`] bytes, right-padded with `0x20`.
    pub fn to_bytes(&self) -> [u8; IDENTIFIER_SIZE] {
        let mut buf = [b' '; IDENTIFIER_SIZE];
        let bytes = self.0.as_bytes();
        buf[..bytes.len()].copy_from_slice(bytes);
        buf
    }

    /// Decode from exactly [`IDENTIFIER_SIZE`] bytes, trimming trailing
    /// `0x20`/`0x00` padding.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let trimmed = bytes
            .iter()
            .rposition(|&b| b != b' ' && b != 0)
            .map(|end| &bytes[..=end])
            .unwrap_or(&[]);
        Self(String::from_utf8_lossy(trimmed).into_owned())
    }

    /// Borrow the semantic string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Identifier {
    type Err = NcpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<&str> for Identifier {
    type Error = NcpError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl PartialEq<str> for Identifier {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Identifier {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}
