use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TypeError;

/// Content hash of a payload held in external content-addressed storage.
///
/// A BLAKE3 digest; rendered and serialized as 64 lowercase hex characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    pub const fn from_hash(hash: [u8; 32]) -> Self {
        Self(hash)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s.trim()).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(TypeError::InvalidLength {
                expected: 32,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.short_hex())
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl TryFrom<String> for ContentHash {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<ContentHash> for String {
    fn from(hash: ContentHash) -> Self {
        hash.to_hex()
    }
}

impl std::str::FromStr for ContentHash {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

/// The value compared by change detection.
///
/// A deployment stores either the payload itself or the hash of a payload
/// held in a content-addressed store. A running system uses one strategy
/// only; the two variants never compare equal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Fingerprint {
    Embedded(Value),
    ContentAddressed(ContentHash),
}

impl Fingerprint {
    /// Whether two fingerprints denote the same payload.
    pub fn matches(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Embedded(a), Self::Embedded(b)) => canonical_json(a) == canonical_json(b),
            (Self::ContentAddressed(a), Self::ContentAddressed(b)) => a == b,
            _ => false,
        }
    }

    pub fn content_hash(&self) -> Option<ContentHash> {
        match self {
            Self::ContentAddressed(hash) => Some(*hash),
            Self::Embedded(_) => None,
        }
    }
}

/// Serialize JSON with object keys in sorted order at every depth.
///
/// Two values that differ only in key order produce identical output.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_json_sorts_nested_keys() {
        let a = json!({"b": 1, "a": {"y": [1, {"d": 2, "c": 3}], "x": null}});
        assert_eq!(
            canonical_json(&a),
            r#"{"a":{"x":null,"y":[1,{"c":3,"d":2}]},"b":1}"#
        );
    }

    #[test]
    fn canonical_json_escapes_keys_and_strings() {
        let v = json!({"quo\"te": "line\nbreak"});
        assert_eq!(canonical_json(&v), r#"{"quo\"te":"line\nbreak"}"#);
    }

    #[test]
    fn canonical_json_preserves_array_order() {
        assert_ne!(canonical_json(&json!([1, 2])), canonical_json(&json!([2, 1])));
    }

    #[test]
    fn embedded_fingerprints_ignore_key_order() {
        let a: Value = serde_json::from_str(r#"{"abi":[],"bytecode":"0x60"}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"bytecode":"0x60","abi":[]}"#).unwrap();
        assert!(Fingerprint::Embedded(a).matches(&Fingerprint::Embedded(b)));
    }

    #[test]
    fn embedded_fingerprints_detect_value_change() {
        let a = Fingerprint::Embedded(json!({"bytecode": "0x60"}));
        let b = Fingerprint::Embedded(json!({"bytecode": "0x61"}));
        assert!(!a.matches(&b));
    }

    #[test]
    fn mixed_strategies_never_match() {
        let hash = ContentHash::from_hash([1; 32]);
        let embedded = Fingerprint::Embedded(json!(hash.to_hex()));
        assert!(!embedded.matches(&Fingerprint::ContentAddressed(hash)));
    }

    #[test]
    fn content_hash_hex_roundtrip() {
        let hash = ContentHash::from_hash([0xab; 32]);
        assert_eq!(ContentHash::from_hex(&hash.to_hex()).unwrap(), hash);
        assert_eq!(hash.short_hex(), "abababab");
    }

    #[test]
    fn content_hash_rejects_bad_input() {
        assert!(matches!(
            ContentHash::from_hex("zz"),
            Err(TypeError::InvalidHex(_))
        ));
        assert!(matches!(
            ContentHash::from_hex("abcd"),
            Err(TypeError::InvalidLength { expected: 32, actual: 2 })
        ));
    }

    #[test]
    fn fingerprint_serde_shape() {
        let fp = Fingerprint::ContentAddressed(ContentHash::from_hash([0; 32]));
        let json = serde_json::to_value(&fp).unwrap();
        assert_eq!(json["kind"], "content_addressed");
        assert_eq!(json["value"], "0".repeat(64));

        let embedded = Fingerprint::Embedded(json!({"k": 1}));
        let back: Fingerprint =
            serde_json::from_value(serde_json::to_value(&embedded).unwrap()).unwrap();
        assert_eq!(back, embedded);
    }
}
