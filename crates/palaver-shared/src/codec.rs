//! Serde helpers for binary payloads carried inside JSON frames.

/// Serialize `Vec<u8>` as standard base64 text.
///
/// Deserialization also accepts a data URL (`data:<mime>;base64,<data>`),
/// which is what browser peers produce when they read a file.
pub mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        let encoded = match text.split_once("base64,") {
            Some((prefix, data)) if prefix.starts_with("data:") => data,
            _ => text.as_str(),
        };
        STANDARD
            .decode(encoded.trim())
            .map_err(serde::de::Error::custom)
    }
}
