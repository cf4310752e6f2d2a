//! Serde adapters for token amounts.
//!
//! Amounts are written as decimal strings so configuration files and JSON
//! receipts stay readable. Input accepts a decimal string, a `0x` hex string
//! or a plain integer.

use std::str::FromStr;

use alloy_primitives::U256;
use serde::{de, Deserialize, Deserializer, Serializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum RawAmount {
    Int(u64),
    Text(String),
}

fn parse(raw: RawAmount) -> Result<U256, String> {
    match raw {
        RawAmount::Int(v) => Ok(U256::from(v)),
        RawAmount::Text(s) => {
            let s = s.trim().replace('_', "");
            U256::from_str(&s).map_err(|e| format!("invalid amount {s:?}: {e}"))
        }
    }
}

pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&value.to_string())
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
    parse(RawAmount::deserialize(deserializer)?).map_err(de::Error::custom)
}

/// Same encoding for optional amounts
pub mod option {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Option<U256>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.serialize_some(&v.to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<U256>, D::Error> {
        Option::<RawAmount>::deserialize(deserializer)?
            .map(parse)
            .transpose()
            .map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Holder {
        #[serde(with = "super")]
        value: U256,
    }

    #[test]
    fn test_accepts_decimal_hex_and_integer() {
        let a: Holder = serde_json::from_str(r#"{"value":"1000000000000000000"}"#).unwrap();
        let b: Holder = serde_json::from_str(r#"{"value":"0xde0b6b3a7640000"}"#).unwrap();
        let c: Holder = serde_json::from_str(r#"{"value":42}"#).unwrap();
        assert_eq!(a.value, U256::from(1_000_000_000_000_000_000u128));
        assert_eq!(a, b);
        assert_eq!(c.value, U256::from(42));
    }

    #[test]
    fn test_writes_decimal() {
        let json = serde_json::to_string(&Holder { value: U256::from(25) }).unwrap();
        assert_eq!(json, r#"{"value":"25"}"#);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(serde_json::from_str::<Holder>(r#"{"value":"ten"}"#).is_err());
    }
}
