//! A bridge between a host application and a native map and geosearch engine.
//!
//! The host sends commands on named channels and receives events from a single
//! [`EventStream`]. The bridge tracks the identities of the map views, map objects, search
//! managers and search sessions the host works with, and makes sure every asynchronous engine
//! response reaches the host at most once, and never after the host cancelled or disposed
//! the operation it belongs to.

mod bridge;
mod codec;
mod config;
mod error;
mod ids;

pub use bridge::*;
pub use codec::{Codec, DecodeError, EncodeError};
pub use config::BridgeConfig;
pub use error::{BridgeError, BridgeResult};
pub use ids::{IdGenerator, ManagerId, MapViewId, ObjectId, SessionId};
pub use mapkit_engine as engine;
