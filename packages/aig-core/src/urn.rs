//! URN handling for vertex identifiers.
//!
//! External vertex ids take the form `aig:<64 lowercase hex chars>` (32
//! random bytes). Parsing is strict: any other namespace is rejected.

use crate::errors::AigError;

const NAMESPACE: &str = "aig";
const ID_BYTES: usize = 32;

/// A parsed vertex identifier: 32 random bytes rendered as lowercase hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexId(pub [u8; ID_BYTES]);

impl VertexId {
    /// Generate a fresh random id.
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut bytes = [0u8; ID_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Render as the external URN form, `aig:<hex>`.
    pub fn to_urn(self) -> String {
        format!("{NAMESPACE}:{}", hex::encode(self.0))
    }

    /// Render just the lowercase hex id, with no namespace prefix.
    pub fn to_hex(self) -> String {
        hex::encode(self.0)
    }

    /// Parse a URN of the form `aig:<hex>`.
    ///
    /// # Errors
    ///
    /// Returns [`AigError::NamespaceMismatch`] if the namespace segment is
    /// not `aig`, or [`AigError::GuardViolation`] if the remainder is not 32
    /// bytes of valid hex.
    pub fn parse(urn: &str) -> Result<Self, AigError> {
        let (namespace, rest) = urn.split_once(':').ok_or_else(|| AigError::GuardViolation {
            message: format!("malformed urn: {urn}"),
        })?;
        if namespace != NAMESPACE {
            return Err(AigError::NamespaceMismatch {
                found: namespace.to_string(),
            });
        }
        let decoded = hex::decode(rest).map_err(|e| AigError::GuardViolation {
            message: format!("invalid hex in urn: {e}"),
        })?;
        let bytes: [u8; ID_BYTES] = decoded.try_into().map_err(|v: Vec<u8>| {
            AigError::GuardViolation {
                message: format!("expected {ID_BYTES} bytes, found {}", v.len()),
            }
        })?;
        Ok(Self(bytes))
    }
}

impl std::fmt::Display for VertexId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_urn())
    }
}

impl serde::Serialize for VertexId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> serde::Deserialize<'de> for VertexId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let hex_str = String::deserialize(deserializer)?;
        let decoded = hex::decode(&hex_str).map_err(serde::de::Error::custom)?;
        let bytes: [u8; ID_BYTES] = decoded
            .try_into()
            .map_err(|_| serde::de::Error::custom("expected 32 bytes of hex"))?;
        Ok(Self(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── 1. round trip through urn string ────────────────────────────────

    #[test]
    fn round_trip() {
        let id = VertexId([0x01; ID_BYTES]);
        let urn = id.to_urn();
        assert_eq!(urn, "aig:0101010101010101010101010101010101010101010101010101010101010101");
        let parsed = VertexId::parse(&urn).unwrap();
        assert_eq!(parsed, id);
    }

    // ── 2. wrong namespace rejected ──────────────────────────────────────

    #[test]
    fn rejects_wrong_namespace() {
        let err = VertexId::parse("urn:01010101010101010101010101010101010101010101010101010101010101010101")
            .unwrap_err();
        match err {
            AigError::NamespaceMismatch { found } => assert_eq!(found, "urn"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    // ── 3. malformed hex rejected ────────────────────────────────────────

    #[test]
    fn rejects_bad_hex() {
        let err = VertexId::parse("aig:not-hex").unwrap_err();
        assert!(matches!(err, AigError::GuardViolation { .. }));
    }

    // ── 4. wrong length rejected ─────────────────────────────────────────

    #[test]
    fn rejects_wrong_length() {
        let err = VertexId::parse("aig:0101").unwrap_err();
        assert!(matches!(err, AigError::GuardViolation { .. }));
    }

    // ── 5. generate produces distinct ids ───────────────────────────────

    #[test]
    fn generate_is_random() {
        let a = VertexId::generate();
        let b = VertexId::generate();
        assert_ne!(a, b);
    }
}
