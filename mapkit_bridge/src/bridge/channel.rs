//! Named delivery paths between the host and the bridge.
//!
//! With the default prefix the channel names are:
//!
//! | channel | name |
//! |---|---|
//! | plugin | `mapkit` |
//! | map view | `mapkit/map_<view id>` |
//! | search session | `mapkit_search_<session id>` |
//! | suggest results | `mapkit_suggest_result` |

use compact_str::{format_compact, CompactString};

use crate::ids::{MapViewId, SessionId};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Commands concerning the whole bridge.
    Plugin,
    /// Commands and events of one map view.
    MapView(MapViewId),
    /// Commands and events of one search session.
    SearchSession(SessionId),
    /// The single stream of suggest results.
    SuggestResults,
}

const MAP_VIEW_INFIX: &str = "/map_";
const SEARCH_INFIX: &str = "_search_";
const SUGGEST_SUFFIX: &str = "_suggest_result";

impl Channel {
    pub fn name(&self, prefix: &str) -> CompactString {
        match self {
            Self::Plugin => prefix.into(),
            Self::MapView(id) => format_compact!("{prefix}{MAP_VIEW_INFIX}{id}"),
            Self::SearchSession(id) => format_compact!("{prefix}{SEARCH_INFIX}{id}"),
            Self::SuggestResults => format_compact!("{prefix}{SUGGEST_SUFFIX}"),
        }
    }

    /// Parse a channel name. Returns `None` if the name does not denote a channel.
    pub fn parse(name: &str, prefix: &str) -> Option<Self> {
        let rest = name.strip_prefix(prefix)?;
        if rest.is_empty() {
            Some(Self::Plugin)
        } else if rest == SUGGEST_SUFFIX {
            Some(Self::SuggestResults)
        } else if let Some(id) = rest.strip_prefix(MAP_VIEW_INFIX) {
            (!id.is_empty()).then(|| Self::MapView(id.into()))
        } else if let Some(id) = rest.strip_prefix(SEARCH_INFIX) {
            (!id.is_empty()).then(|| Self::SearchSession(id.into()))
        } else {
            None
        }
    }
}
