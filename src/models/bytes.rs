//! Serde helpers for byte fields that travel as base64 text in JSON.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Deserializer, Serializer};

use crate::error::{AppError, AppResult};

pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&STANDARD.encode(bytes))
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    STANDARD.decode(raw).map_err(serde::de::Error::custom)
}

/// Decode a client-supplied base64 field
pub fn decode(raw: &str, field: &str) -> AppResult<Vec<u8>> {
    STANDARD
        .decode(raw.trim())
        .map_err(|e| AppError::InvalidArgument(format!("{} is not valid base64: {}", field, e)))
}

pub mod option {
    use super::*;

    pub fn serialize<S: Serializer>(
        bytes: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(bytes) => serializer.serialize_some(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        raw.map(|raw| STANDARD.decode(raw).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_rejects_garbage() {
        assert_eq!(decode("aGVsbG8=", "raw_data").unwrap(), b"hello");
        assert!(decode("not base64!", "raw_data").is_err());
    }
}
