//! Serialize u64 fields as JSON strings.
//!
//! Seeds use the full 64-bit range; JavaScript consumers of the API would
//! silently round anything past 2^53, so the wire form is a string. Numbers
//! are still accepted on input for hand-written payloads.

use serde::de::Error;
use serde::{Deserialize, Deserializer, Serializer};

pub fn serialize<S>(value: &u64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&value.to_string())
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum U64Input {
        String(String),
        Number(u64),
    }

    match U64Input::deserialize(deserializer)? {
        U64Input::String(raw) => raw.parse::<u64>().map_err(D::Error::custom),
        U64Input::Number(value) => Ok(value),
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
    struct Wrapper {
        #[serde(with = "super")]
        seed: u64,
    }

    #[test]
    fn serializes_as_string() {
        let encoded = serde_json::to_string(&Wrapper { seed: u64::MAX }).expect("serialize");
        assert_eq!(encoded, format!(r#"{{"seed":"{}"}}"#, u64::MAX));
    }

    #[test]
    fn deserialize_accepts_string_and_number() {
        let parsed: Wrapper = serde_json::from_str(r#"{"seed":"1337"}"#).expect("string seed");
        assert_eq!(parsed.seed, 1337);
        let parsed: Wrapper = serde_json::from_str(r#"{"seed":1337}"#).expect("numeric seed");
        assert_eq!(parsed.seed, 1337);
    }

    #[test]
    fn round_trip_preserves_full_range() {
        let original = Wrapper {
            seed: (1 << 53) + 1,
        };
        let encoded = serde_json::to_string(&original).expect("serialize");
        let decoded: Wrapper = serde_json::from_str(&encoded).expect("deserialize");
        assert_eq!(original, decoded);
    }
}
