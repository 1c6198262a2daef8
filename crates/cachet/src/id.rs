//! Cache identifiers.

use std::str::FromStr;

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use uuid::Uuid;

use crate::Error;

/// Globally unique 128-bit identifier of a cache inside a provider.
///
/// Text and wire form is the canonical hyphenated lowercase UUID string.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct CacheId(Uuid);

impl CacheId {
    /// Mints a fresh random (version 4) identifier.
    pub fn generate() -> Self {
        Self(uuid::Builder::from_random_bytes(rand::random()).into_uuid())
    }

    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl std::fmt::Display for CacheId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for CacheId {
    type Err = Error;

    /// Only the 36-character hyphenated form is accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != uuid::fmt::Hyphenated::LENGTH {
            return Err(Error::MalformedIdentifier(s.to_string()));
        }
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| Error::MalformedIdentifier(s.to_string()))
    }
}

impl Serialize for CacheId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CacheId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn text_form_parses_back() {
        let id = CacheId::generate();
        let text = id.to_string();
        assert_eq!(text.len(), 36);
        assert_eq!(text.matches('-').count(), 4);
        assert_eq!(text.parse::<CacheId>().unwrap(), id);
    }

    #[test]
    fn generated_ids_are_version_4() {
        let id = CacheId::generate();
        assert_eq!(Uuid::from_bytes(*id.as_bytes()).get_version_num(), 4);
    }

    #[test]
    fn generated_ids_do_not_repeat() {
        let ids: HashSet<CacheId> = (0..10_000).map(|_| CacheId::generate()).collect();
        assert_eq!(ids.len(), 10_000);
    }

    #[test]
    fn malformed_text_is_rejected() {
        for bad in ["", "not-an-id", "0123456789abcdef0123456789abcdef", "zzzzzzzz-zzzz-zzzz-zzzz-zzzzzzzzzzzz"] {
            assert!(
                matches!(bad.parse::<CacheId>(), Err(Error::MalformedIdentifier(_))),
                "{:?} should not parse",
                bad
            );
        }
    }

    #[test]
    fn serializes_as_canonical_string() {
        let id = CacheId::from_bytes([0xab; 16]);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"abababab-abab-abab-abab-abababababab\"");
        assert_eq!(serde_json::from_str::<CacheId>(&json).unwrap(), id);
        assert!(serde_json::from_str::<CacheId>("\"abab\"").is_err());
    }
}
