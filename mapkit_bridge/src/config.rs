use compact_str::CompactString;
use mapkit_engine::SearchManagerType;
use serde::{Deserialize, Serialize};

use crate::codec::{Codec, DecodeError};

/// Settings fixed when a bridge is constructed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BridgeConfig {
    /// The kind of the manager created lazily for searches submitted without a manager and for
    /// suggestions.
    pub default_search_manager: SearchManagerType,
    /// Whether the suggest stream has a listener before the host sends `listen`.
    pub suggest_listener_attached: bool,
    /// The prefix of all channel names.
    pub channel_prefix: CompactString,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            default_search_manager: SearchManagerType::Combined,
            suggest_listener_attached: true,
            channel_prefix: "mapkit".into(),
        }
    }
}

impl BridgeConfig {
    /// Read a configuration from JSON. Missing fields take their default values.
    pub fn from_json(json: &[u8]) -> Result<Self, DecodeError> {
        Codec.decode(json)
    }
}
