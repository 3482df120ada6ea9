//! 128-bit device/namespace identifiers (C1).
//!
//! Version 4 (random) and version 5 (namespaced SHA-1) identifiers per
//! RFC 4122 §4.3/§4.4, plus the string/base64/base64url encodings Astarte
//! uses on the wire and in topic names.

use crate::error::{Error, Result};
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use rand::RngCore;
use sha1::{Digest, Sha1};

/// A 128-bit identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id([u8; 16]);

impl Id {
    /// Wrap raw bytes without touching version/variant bits.
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Id(bytes)
    }

    /// Raw 16-byte form.
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Generate a version 4 (random) identifier.
    pub fn v4() -> Self {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        set_version(&mut bytes, 4);
        set_variant(&mut bytes);
        Id(bytes)
    }

    /// Generate a version 5 (namespaced SHA-1) identifier.
    ///
    /// `v5 = SHA1(namespace || data)`, truncated to 16 bytes, with the
    /// version nibble and variant bits overwritten.
    pub fn v5(namespace: Id, data: &[u8]) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(namespace.0);
        hasher.update(data);
        let digest = hasher.finalize();

        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&digest[..16]);
        set_version(&mut bytes, 5);
        set_variant(&mut bytes);
        Id(bytes)
    }

    /// Parse the canonical 8-4-4-4-12 hex string form.
    pub fn parse(text: &str) -> Result<Self> {
        let b = text.as_bytes();
        if b.len() != 36 {
            return Err(Error::invalid_param("identifier must be 36 characters"));
        }
        for &pos in &[8usize, 13, 18, 23] {
            if b[pos] != b'-' {
                return Err(Error::invalid_param("identifier hyphen misplaced"));
            }
        }

        let mut bytes = [0u8; 16];
        let mut out = 0usize;
        let mut i = 0usize;
        while i < b.len() {
            if b[i] == b'-' {
                i += 1;
                continue;
            }
            let hi = hex_val(b[i]).ok_or_else(|| Error::invalid_param("invalid hex digit"))?;
            let lo = hex_val(*b.get(i + 1).unwrap_or(&0))
                .ok_or_else(|| Error::invalid_param("invalid hex digit"))?;
            bytes[out] = (hi << 4) | lo;
            out += 1;
            i += 2;
        }
        if out != 16 {
            return Err(Error::invalid_param("identifier malformed"));
        }
        Ok(Id(bytes))
    }

    /// Canonical 8-4-4-4-12 hex string.
    pub fn to_string_canonical(&self) -> String {
        let b = &self.0;
        format!(
            "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7], b[8], b[9], b[10], b[11], b[12], b[13], b[14], b[15]
        )
    }

    /// Standard (padded) base64 encoding of the 16 raw bytes.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }

    /// URL-safe, unpadded base64 encoding (22 characters).
    pub fn to_base64url(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.0)
    }
}

impl std::fmt::Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_string_canonical())
    }
}

fn set_version(bytes: &mut [u8; 16], version: u8) {
    bytes[6] = (bytes[6] & 0x0f) | (version << 4);
}

fn set_variant(bytes: &mut [u8; 16]) {
    bytes[8] = (bytes[8] & 0x3f) | 0x80;
}

fn hex_val(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v4_bit_fields() {
        for _ in 0..64 {
            let id = Id::v4();
            let b = id.as_bytes();
            assert_eq!(b[6] >> 4, 4, "version nibble must be 4");
            assert_eq!(b[8] >> 6, 0b10, "variant bits must be 10");
        }
    }

    #[test]
    fn v5_is_deterministic() {
        let ns = Id::v4();
        let a = Id::v5(ns, b"astarte");
        let b = Id::v5(ns, b"astarte");
        assert_eq!(a, b);

        let c = Id::v5(ns, b"other");
        assert_ne!(a, c);

        assert_eq!(a.as_bytes()[6] >> 4, 5);
        assert_eq!(a.as_bytes()[8] >> 6, 0b10);
    }

    #[test]
    fn string_round_trip() {
        let id = Id::v4();
        let text = id.to_string_canonical();
        assert_eq!(text.len(), 36);
        let parsed = Id::parse(&text).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!(Id::parse("not-a-uuid").is_err());
        assert!(Id::parse(&"a".repeat(36)).is_err());
        let mut ok = Id::v4().to_string_canonical();
        ok.replace_range(8..9, "x");
        assert!(Id::parse(&ok).is_err());
    }

    #[test]
    fn base64url_has_no_padding_and_fixed_length() {
        let id = Id::v4();
        let b64url = id.to_base64url();
        assert_eq!(b64url.len(), 22);
        assert!(!b64url.contains('='));
        assert!(!b64url.contains('+'));
        assert!(!b64url.contains('/'));
    }
}
