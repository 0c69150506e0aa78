//! Unit identifiers.

use std::fmt;
use std::sync::Arc;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Opaque unit identifier: a packed numeric id or a name.
///
/// Numeric ids are what bundlers emit; named ids are convenient for tests
/// and for hosts that key units by path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UnitId {
    Num(u32),
    Name(Arc<str>),
}

impl UnitId {
    /// Numeric value, if this is a numeric id.
    #[inline]
    pub fn as_num(&self) -> Option<u32> {
        match self {
            Self::Num(n) => Some(*n),
            Self::Name(_) => None,
        }
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Num(n) => write!(f, "{n}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

impl From<u32> for UnitId {
    fn from(n: u32) -> Self {
        Self::Num(n)
    }
}

impl From<&str> for UnitId {
    fn from(name: &str) -> Self {
        Self::Name(name.into())
    }
}

impl From<String> for UnitId {
    fn from(name: String) -> Self {
        Self::Name(name.into())
    }
}

impl From<&UnitId> for UnitId {
    fn from(id: &UnitId) -> Self {
        id.clone()
    }
}

// =============================================================================
// Serde
// =============================================================================

impl Serialize for UnitId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Num(n) => serializer.serialize_u32(*n),
            Self::Name(name) => serializer.serialize_str(name),
        }
    }
}

/// Decimal strings deserialize as numeric ids: JSON object keys are always
/// strings, and inverse dependency maps are keyed by unit id.
impl<'de> Deserialize<'de> for UnitId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct UnitIdVisitor;

        impl Visitor<'_> for UnitIdVisitor {
            type Value = UnitId;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a u32 unit id or a unit name")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<UnitId, E> {
                u32::try_from(v)
                    .map(UnitId::Num)
                    .map_err(|_| E::custom(format!("unit id {v} exceeds u32")))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<UnitId, E> {
                u32::try_from(v)
                    .map(UnitId::Num)
                    .map_err(|_| E::custom(format!("unit id {v} is not a valid u32")))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<UnitId, E> {
                Ok(match v.parse::<u32>() {
                    Ok(n) => UnitId::Num(n),
                    Err(_) => UnitId::from(v),
                })
            }
        }

        deserializer.deserialize_any(UnitIdVisitor)
    }
}
