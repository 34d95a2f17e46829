//! Identities of the resources the bridge tracks on behalf of the host.
//!
//! Identities are never reused during the lifetime of a bridge, so a late engine callback can
//! never be mistaken for one addressed to a newer resource.

use std::sync::atomic::{AtomicU64, Ordering};

use compact_str::{format_compact, CompactString};
use serde::{Deserialize, Serialize};

use crate::bridge::ObjectKind;

macro_rules! identity {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
            derive_more::Display,
        )]
        #[serde(transparent)]
        pub struct $name(CompactString);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.into())
            }
        }
    };
}

identity!(
    /// A placemark, polygon or user location layer on a map view.
    ObjectId
);
identity!(
    /// A single search submitted to a search manager.
    SessionId
);
identity!(
    /// A search manager created by the host (or the default one).
    ManagerId
);
identity!(MapViewId);

/// Hands out identities unique for the lifetime of the generator.
#[derive(Debug, Default)]
pub struct IdGenerator {
    counter: AtomicU64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&self, prefix: &str) -> CompactString {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        format_compact!("{prefix}-{n}")
    }

    pub fn object_id(&self, kind: ObjectKind) -> ObjectId {
        ObjectId(self.next(kind.prefix()))
    }

    pub fn session_id(&self) -> SessionId {
        SessionId(self.next("search"))
    }

    pub fn manager_id(&self) -> ManagerId {
        ManagerId(self.next("manager"))
    }

    pub fn map_view_id(&self) -> MapViewId {
        MapViewId(self.next("view"))
    }
}
