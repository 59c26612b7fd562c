use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::constants::{ID_LEN, TAIL_OFFSET, TIMESTAMP_BYTES};
use crate::error::IdError;
use crate::id_gen;

/// Common access to the opaque 16-byte identifiers kept in a drive index.
pub trait ByteId: Copy + Eq + Ord + std::hash::Hash + fmt::Debug {
    fn from_bytes(bytes: [u8; ID_LEN]) -> Self;

    fn as_bytes(&self) -> &[u8; ID_LEN];

    fn from_slice(bytes: &[u8]) -> Result<Self, IdError> {
        let arr: [u8; ID_LEN] = bytes
            .try_into()
            .map_err(|_| IdError::InvalidLength(bytes.len()))?;
        Ok(Self::from_bytes(arr))
    }
}

// Ordering of every id type is the derived array ordering, i.e. unsigned
// big-endian byte-wise comparison over all 16 bytes.
macro_rules! byte_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub [u8; ID_LEN]);

        impl $name {
            pub fn random() -> Self {
                Self(rand::random())
            }

            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            pub fn from_hex(s: &str) -> Result<Self, IdError> {
                let bytes = hex::decode(s)?;
                <Self as ByteId>::from_slice(&bytes)
            }

            pub fn short(&self) -> String {
                self.to_hex()[..8].to_string()
            }
        }

        impl ByteId for $name {
            fn from_bytes(bytes: [u8; ID_LEN]) -> Self {
                Self(bytes)
            }

            fn as_bytes(&self) -> &[u8; ID_LEN] {
                &self.0
            }
        }

        impl From<[u8; ID_LEN]> for $name {
            fn from(bytes: [u8; ID_LEN]) -> Self {
                Self(bytes)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.to_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_hex())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Self::from_hex(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

byte_id!(
    /// Primary key of a drive item. Time-ordered: see [`crate::id_gen`].
    FileId
);
byte_id!(
    /// An entity (circle, identity, app) allowed to see a drive item.
    MemberId
);
byte_id!(
    /// Opaque categorisation tag.
    TagId
);
byte_id!(
    /// Who sent a drive item.
    SenderId
);
byte_id!(
    /// Conversation / thread a drive item belongs to.
    ThreadId
);

impl FileId {
    /// Issue a fresh identifier from the process-wide generator.
    pub fn new() -> Self {
        id_gen::global().create()
    }

    /// Smallest identifier that can carry the given millisecond timestamp.
    pub fn lower_bound_at(unix_millis: u64) -> Self {
        id_gen::compose(unix_millis, 0, [0u8; ID_LEN - TAIL_OFFSET])
    }

    /// Unix milliseconds embedded in the leading bytes.
    pub fn unix_millis(&self) -> u64 {
        let mut buf = [0u8; 8];
        buf[8 - TIMESTAMP_BYTES..].copy_from_slice(&self.0[..TIMESTAMP_BYTES]);
        u64::from_be_bytes(buf)
    }

    /// Unix seconds embedded in the leading bytes, for display.
    pub fn unix_seconds(&self) -> u64 {
        self.unix_millis() / 1000
    }

    pub fn compare(a: &FileId, b: &FileId) -> Ordering {
        a.0.cmp(&b.0)
    }
}

impl Default for FileId {
    fn default() -> Self {
        Self::new()
    }
}
