use compact_str::CompactString;

use crate::codec::EncodeError;
use crate::ids::{ManagerId, MapViewId, ObjectId, SessionId};

/// Errors reported synchronously to the host for a command.
///
/// Failures of the engine itself are never returned here. They arrive later as error events on
/// the channel of the operation that caused them.
#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum BridgeError {
    /// The payload did not have the shape the command requires. Nothing was changed.
    #[display("Malformed payload for `{method}`: {reason}")]
    MalformedPayload {
        method: CompactString,
        reason: CompactString,
    },
    #[display("Unsupported command `{method}` on channel `{channel}`")]
    UnsupportedCommand {
        channel: CompactString,
        method: CompactString,
    },
    #[display("Unknown map object {id}")]
    UnknownObject { id: ObjectId },
    #[display("Unknown search session {id}")]
    UnknownSession { id: SessionId },
    #[display("Unknown search manager {id}")]
    UnknownManager { id: ManagerId },
    #[display("Unknown map view {id}")]
    UnknownMapView { id: MapViewId },
    #[display("Unknown channel `{name}`")]
    UnknownChannel { name: CompactString },
    #[display("Failed to encode reply: {source}")]
    Encode { source: EncodeError },
}

pub type BridgeResult<T, E = BridgeError> = Result<T, E>;
