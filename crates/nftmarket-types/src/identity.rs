//! Identity types
//!
//! Accounts and collections are string-backed (they usually carry an
//! address); items are numbered within their collection.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Generates string-backed identity types with common implementations
macro_rules! define_name_type {
    ($name:ident, $prefix:literal, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            /// Wrap an existing name or address
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Create a random, prefixed identity
            pub fn generate() -> Self {
                Self(format!("{}_{}", $prefix, Uuid::new_v4()))
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

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

define_name_type!(AccountId, "acct", "An identity that can own items, list them and hold proceeds");
define_name_type!(CollectionId, "coll", "Identifies an asset collection in the registry");

/// Item number within a collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(pub u64);

impl ItemId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// The id after this one (collections mint sequentially)
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ItemId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Address of a single item: (collection, item)
///
/// This is the key of the listing table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemKey {
    pub collection: CollectionId,
    pub item: ItemId,
}

impl ItemKey {
    pub fn new(collection: impl Into<CollectionId>, item: impl Into<ItemId>) -> Self {
        Self {
            collection: collection.into(),
            item: item.into(),
        }
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.collection, self.item)
    }
}
