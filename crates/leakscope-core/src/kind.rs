//! Cryptographic operation kinds and wire-name parsing.
//!
//! Every measurement is keyed by an [`OperationKind`] — the closed set of
//! primitives the recorder knows how to instrument. Wire names (the strings
//! external callers send, e.g. `"AES_ENCRYPT"`) parse strictly: an unknown
//! name is an [`UnknownOperationKind`] error, never a silent fallback to
//! some default kind.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Cryptographic operation kind under measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationKind {
    /// AES block encryption.
    AesEncrypt,
    /// AES block decryption.
    AesDecrypt,
    /// RSA public-key encryption (modular exponentiation).
    RsaEncrypt,
    /// RSA private-key decryption (modular exponentiation).
    RsaDecrypt,
    /// ECDSA signature generation.
    EcdsaSign,
    /// ECDSA signature verification.
    EcdsaVerify,
    /// SHA-256 digest computation.
    Sha256Hash,
    /// Key derivation (KDF rounds).
    KeyDerivation,
}

impl OperationKind {
    /// All kinds, in storage-slot order.
    pub const ALL: [OperationKind; 8] = [
        OperationKind::AesEncrypt,
        OperationKind::AesDecrypt,
        OperationKind::RsaEncrypt,
        OperationKind::RsaDecrypt,
        OperationKind::EcdsaSign,
        OperationKind::EcdsaVerify,
        OperationKind::Sha256Hash,
        OperationKind::KeyDerivation,
    ];

    /// Canonical wire name, as accepted by [`OperationKind::from_str`].
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AesEncrypt => "AES_ENCRYPT",
            Self::AesDecrypt => "AES_DECRYPT",
            Self::RsaEncrypt => "RSA_ENCRYPT",
            Self::RsaDecrypt => "RSA_DECRYPT",
            Self::EcdsaSign => "ECDSA_SIGN",
            Self::EcdsaVerify => "ECDSA_VERIFY",
            Self::Sha256Hash => "SHA256_HASH",
            Self::KeyDerivation => "KEY_DERIVATION",
        }
    }

    /// Whether this kind carries the RSA-specific metric block
    /// (modular-exponentiation timings, Montgomery cache counters).
    pub fn is_rsa(&self) -> bool {
        matches!(self, Self::RsaEncrypt | Self::RsaDecrypt)
    }

    /// Stable index into per-kind storage slots.
    pub(crate) fn slot(&self) -> usize {
        *self as usize
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a wire name matches no known [`OperationKind`].
///
/// Callers are expected to surface this to whoever sent the name. Mapping
/// unknown names onto a default kind would silently pollute that kind's
/// measurement log, so no such fallback exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownOperationKind {
    /// The name that failed to parse.
    pub name: String,
}

impl std::fmt::Display for UnknownOperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown operation kind \"{}\"", self.name)
    }
}

impl std::error::Error for UnknownOperationKind {}

impl FromStr for OperationKind {
    type Err = UnknownOperationKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        for kind in Self::ALL {
            if kind.as_str() == s {
                return Ok(kind);
            }
        }
        Err(UnknownOperationKind {
            name: s.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_kinds_roundtrip_through_wire_names() {
        for kind in OperationKind::ALL {
            let name = kind.as_str();
            let parsed: OperationKind = name.parse().unwrap();
            assert_eq!(parsed, kind, "wire name {name} should parse back");
        }
    }

    #[test]
    fn test_unknown_name_is_an_error() {
        let err = "QUANTUM_FOO".parse::<OperationKind>().unwrap_err();
        assert_eq!(err.name, "QUANTUM_FOO");
        assert!(err.to_string().contains("QUANTUM_FOO"));
    }

    #[test]
    fn test_unknown_name_is_not_coerced_to_aes() {
        // A near-miss name must never land in some default kind's log.
        assert!("AES_ENCRYP".parse::<OperationKind>().is_err());
        assert!("".parse::<OperationKind>().is_err());
        assert!("aes_encrypt".parse::<OperationKind>().is_err());
    }

    #[test]
    fn test_rsa_discriminator() {
        assert!(OperationKind::RsaEncrypt.is_rsa());
        assert!(OperationKind::RsaDecrypt.is_rsa());
        assert!(!OperationKind::AesEncrypt.is_rsa());
        assert!(!OperationKind::EcdsaSign.is_rsa());
    }

    #[test]
    fn test_slots_are_dense_and_unique() {
        let mut seen = [false; 8];
        for kind in OperationKind::ALL {
            let slot = kind.slot();
            assert!(slot < 8);
            assert!(!seen[slot], "slot {slot} assigned twice");
            seen[slot] = true;
        }
    }

    #[test]
    fn test_serde_uses_wire_names() {
        let json = serde_json::to_string(&OperationKind::Sha256Hash).unwrap();
        assert_eq!(json, "\"SHA256_HASH\"");
        let parsed: OperationKind = serde_json::from_str("\"KEY_DERIVATION\"").unwrap();
        assert_eq!(parsed, OperationKind::KeyDerivation);
    }
}
