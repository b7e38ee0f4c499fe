//! Item stacks held in escrow by auctions, and their stored text form.
//!
//! An item is stored as a JSON object:
//!
//! ```text
//! {"id":"minecraft:diamond_sword","count":1,"tag":{"Compound":{"Damage":{"Int":3}}}}
//! ```
//!
//! `tag` is a typed tree. Every node names its own type, so the text form
//! decodes back to exactly the same tree. Compound keys are kept sorted,
//! which makes the encoding canonical.

use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

const DEFAULT_NAMESPACE: &str = "minecraft";

#[derive(Debug, Error)]
pub enum ItemError {
    #[error("Invalid item identity: {0:?}")]
    InvalidIdentity(String),

    #[error("Item count must be at least 1")]
    EmptyStack,

    #[error("Malformed item record: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Namespaced item identity such as `minecraft:diamond_sword`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(String);

impl ItemId {
    pub const UNKNOWN: &'static str = "auctionhouse:unknown";

    /// Accepts display names too: `Diamond Sword` becomes `minecraft:diamond_sword`.
    pub fn parse(raw: &str) -> Result<ItemId, ItemError> {
        let normalized = raw.trim().to_lowercase().replace(' ', "_");
        let (namespace, path) = match normalized.split_once(':') {
            Some((namespace, path)) => (namespace.to_string(), path.to_string()),
            None => (DEFAULT_NAMESPACE.to_string(), normalized),
        };

        let namespace_ok = !namespace.is_empty()
            && namespace
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '-' | '.'));
        let path_ok = !path.is_empty()
            && path
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '-' | '.' | '/'));

        if namespace_ok && path_ok {
            Ok(ItemId(format!("{}:{}", namespace, path)))
        } else {
            Err(ItemError::InvalidIdentity(raw.to_string()))
        }
    }

    pub fn unknown() -> ItemId {
        ItemId(Self::UNKNOWN.to_string())
    }

    pub fn is_unknown(&self) -> bool {
        self.0 == Self::UNKNOWN
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Typed metadata tree attached to an item.
///
/// Floats compare by their bit patterns, so `NaN` equals itself and `-0.0`
/// differs from `0.0`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Tag {
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(#[serde(with = "f32_text")] f32),
    Double(#[serde(with = "f64_text")] f64),
    String(String),
    ByteArray(Vec<i8>),
    IntArray(Vec<i32>),
    LongArray(Vec<i64>),
    List(Vec<Tag>),
    Compound(BTreeMap<String, Tag>),
}

impl PartialEq for Tag {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Tag::Byte(a), Tag::Byte(b)) => a == b,
            (Tag::Short(a), Tag::Short(b)) => a == b,
            (Tag::Int(a), Tag::Int(b)) => a == b,
            (Tag::Long(a), Tag::Long(b)) => a == b,
            (Tag::Float(a), Tag::Float(b)) => a.to_bits() == b.to_bits(),
            (Tag::Double(a), Tag::Double(b)) => a.to_bits() == b.to_bits(),
            (Tag::String(a), Tag::String(b)) => a == b,
            (Tag::ByteArray(a), Tag::ByteArray(b)) => a == b,
            (Tag::IntArray(a), Tag::IntArray(b)) => a == b,
            (Tag::LongArray(a), Tag::LongArray(b)) => a == b,
            (Tag::List(a), Tag::List(b)) => a == b,
            (Tag::Compound(a), Tag::Compound(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Tag {}

/// Finite floats are plain JSON numbers. JSON has no literal for the rest, so
/// they are written as `"Infinity"`, `"-Infinity"`, `"NaN"`, or `"NaN:0x…"`
/// with the exact bits of any other NaN.
macro_rules! float_text {
    ($module:ident, $float:ty, $bits:ty, $serialize:ident) => {
        mod $module {
            use serde::de::{self, Visitor};
            use serde::{Deserializer, Serializer};
            use std::fmt;

            pub fn serialize<S: Serializer>(value: &$float, serializer: S) -> Result<S::Ok, S::Error> {
                let value = *value;
                if value.is_finite() {
                    serializer.$serialize(value)
                } else if value == <$float>::INFINITY {
                    serializer.serialize_str("Infinity")
                } else if value == <$float>::NEG_INFINITY {
                    serializer.serialize_str("-Infinity")
                } else if value.to_bits() == <$float>::NAN.to_bits() {
                    serializer.serialize_str("NaN")
                } else {
                    serializer.serialize_str(&format!("NaN:{:#x}", value.to_bits()))
                }
            }

            pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<$float, D::Error> {
                deserializer.deserialize_any(FloatVisitor)
            }

            struct FloatVisitor;

            impl<'de> Visitor<'de> for FloatVisitor {
                type Value = $float;

                fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str("a number, \"Infinity\", \"-Infinity\" or a NaN")
                }

                fn visit_f64<E: de::Error>(self, v: f64) -> Result<$float, E> {
                    Ok(v as $float)
                }

                fn visit_i64<E: de::Error>(self, v: i64) -> Result<$float, E> {
                    Ok(v as $float)
                }

                fn visit_u64<E: de::Error>(self, v: u64) -> Result<$float, E> {
                    Ok(v as $float)
                }

                fn visit_str<E: de::Error>(self, v: &str) -> Result<$float, E> {
                    match v {
                        "Infinity" => Ok(<$float>::INFINITY),
                        "-Infinity" => Ok(<$float>::NEG_INFINITY),
                        "NaN" => Ok(<$float>::NAN),
                        _ => v
                            .strip_prefix("NaN:0x")
                            .and_then(|hex| <$bits>::from_str_radix(hex, 16).ok())
                            .map(<$float>::from_bits)
                            .filter(|value| value.is_nan())
                            .ok_or_else(|| E::invalid_value(de::Unexpected::Str(v), &self)),
                    }
                }
            }
        }
    };
}

float_text!(f32_text, f32, u32, serialize_f32);
float_text!(f64_text, f64, u64, serialize_f64);

impl Tag {
    pub fn compound<I, K>(entries: I) -> Tag
    where
        I: IntoIterator<Item = (K, Tag)>,
        K: Into<String>,
    {
        Tag::Compound(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn get(&self, key: &str) -> Option<&Tag> {
        match self {
            Tag::Compound(entries) => entries.get(key),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ItemRecord {
    id: String,
    count: u32,
    #[serde(default)]
    tag: Option<Tag>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ItemRecord", into = "ItemRecord")]
pub struct Item {
    pub identity: ItemId,
    pub count: u32,
    pub tag: Option<Tag>,
}

impl Item {
    pub fn new(identity: &str, count: u32) -> Result<Item, ItemError> {
        if count == 0 {
            return Err(ItemError::EmptyStack);
        }
        Ok(Item {
            identity: ItemId::parse(identity)?,
            count,
            tag: None,
        })
    }

    pub fn with_tag(mut self, tag: Tag) -> Item {
        self.tag = Some(tag);
        self
    }

    pub fn encode(&self) -> String {
        // Map keys are always strings and floats have a text form for every
        // value, so serde_json has nothing to reject.
        serde_json::to_string(&ItemRecord::from(self.clone())).unwrap_or_else(|e| {
            warn!("Failed to encode item {}: {}", self.identity, e);
            format!("{{\"id\":\"{}\",\"count\":{},\"tag\":null}}", self.identity, self.count)
        })
    }

    /// Decodes a stored item. A bad identity falls back to [`ItemId::UNKNOWN`]
    /// so one corrupt listing cannot stop the rest from loading.
    pub fn decode(text: &str) -> Result<Item, ItemError> {
        let record: ItemRecord = serde_json::from_str(text)?;
        let identity = ItemId::parse(&record.id).unwrap_or_else(|_| {
            warn!("Unknown item identity {:?}, using {}", record.id, ItemId::UNKNOWN);
            ItemId::unknown()
        });
        Ok(Item {
            identity,
            count: record.count,
            tag: record.tag,
        })
    }
}

impl TryFrom<ItemRecord> for Item {
    type Error = ItemError;

    fn try_from(record: ItemRecord) -> Result<Self, Self::Error> {
        let item = Item::new(&record.id, record.count)?;
        Ok(Item { tag: record.tag, ..item })
    }
}

impl From<Item> for ItemRecord {
    fn from(item: Item) -> Self {
        ItemRecord {
            id: item.identity.0,
            count: item.count,
            tag: item.tag,
        }
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} x{}", self.identity, self.count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_is_normalized() {
        assert_eq!(ItemId::parse("Diamond Sword").unwrap().as_str(), "minecraft:diamond_sword");
        assert_eq!(ItemId::parse("mymod:Ruby").unwrap().as_str(), "mymod:ruby");
    }

    #[test]
    fn malformed_identities_are_rejected() {
        for raw in ["", "minecraft:", ":stone", "a:b:c", "st*ne", "minecraft:<script>"] {
            assert!(ItemId::parse(raw).is_err(), "{:?} should be rejected", raw);
        }
    }

    #[test]
    fn non_finite_floats_have_a_text_form() {
        let item = Item::new("stone", 1).unwrap().with_tag(Tag::compound([
            ("x", Tag::Float(f32::NAN)),
            ("y", Tag::Double(f64::INFINITY)),
            ("z", Tag::Double(f64::NEG_INFINITY)),
            ("w", Tag::Float(f32::from_bits(0xffc0_0001))),
        ]));
        let text = item.encode();
        assert_eq!(
            text,
            r#"{"id":"minecraft:stone","count":1,"tag":{"Compound":{"w":{"Float":"NaN:0xffc00001"},"x":{"Float":"NaN"},"y":{"Double":"Infinity"},"z":{"Double":"-Infinity"}}}}"#
        );
        assert_eq!(Item::decode(&text).unwrap(), item);
    }

    #[test]
    fn float_text_rejects_non_nan_bits() {
        assert!(Item::decode(r#"{"id":"stone","count":1,"tag":{"Float":"NaN:0x3f800000"}}"#).is_err());
        assert!(Item::decode(r#"{"id":"stone","count":1,"tag":{"Double":"lots"}}"#).is_err());
        assert!(Item::decode(r#"{"id":"stone","count":1,"tag":{"Double":null}}"#).is_err());
    }

    #[test]
    fn floats_compare_by_bits() {
        assert_eq!(Tag::Double(f64::NAN), Tag::Double(f64::NAN));
        assert_ne!(Tag::Double(0.0), Tag::Double(-0.0));
        assert_ne!(Tag::Float(1.0), Tag::Double(1.0));
    }

    #[test]
    fn empty_stacks_are_rejected() {
        assert!(matches!(Item::new("stone", 0), Err(ItemError::EmptyStack)));
    }
}
