//! Strongly-typed identifiers.
//!
//! All IDs are validated at construction time and implement common traits.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Macro to define a strongly-typed ID newtype wrapper.
///
/// Generates: struct, `from_string()`, `as_str()`, Display, Serialize, Deserialize.
/// Optionally generates `new()` (UUID v4) and `Default` if `uuid` flag is passed.
macro_rules! define_id {
    ($name:ident, uuid) => {
        define_id!($name);

        impl $name {
            pub fn new() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }
    };
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn from_string(s: String) -> Result<Self, &'static str> {
                if s.is_empty() {
                    return Err(concat!(stringify!($name), " cannot be empty"));
                }
                Ok(Self(s))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_id!(ConnectionId, uuid);
define_id!(ContentType);

impl ContentType {
    /// MessagePack, the default binary encoding.
    pub const MSGPACK: &'static str = "application/msgpack";
    /// JSON text encoding.
    pub const JSON: &'static str = "application/json";

    pub fn msgpack() -> Self {
        Self(Self::MSGPACK.to_string())
    }

    pub fn json() -> Self {
        Self(Self::JSON.to_string())
    }
}

impl From<&'static str> for ContentType {
    fn from(s: &'static str) -> Self {
        Self(s.to_string())
    }
}

impl std::borrow::Borrow<str> for ContentType {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for ContentType {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}
