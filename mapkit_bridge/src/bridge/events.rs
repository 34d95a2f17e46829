//! Events travelling from the engine back to the host.
//!
//! Engine callbacks arrive on arbitrary engine threads. Every event is encoded completely on the
//! calling thread and then pushed as one [`EventEnvelope`] into a single unbounded queue, which
//! the host drains through an [`EventStream`]. That queue is the only place where events from
//! different threads meet, so the host sees whole events in one well defined order.

use std::pin::Pin;
use std::task::{Context, Poll};

use compact_str::CompactString;
use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use futures::Stream;
use log::{debug, warn};
use mapkit_engine::{
    CameraPosition, EngineError, Point, SearchItem, SearchResponse, SuggestItem,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use super::Channel;
use crate::codec::{Codec, DecodeError};
use crate::ids::{ObjectId, SessionId};

/// The method name an event is delivered with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, derive_more::Display)]
pub enum EventName {
    #[display("onCameraPositionChanged")]
    CameraPositionChanged,
    #[display("onMapObjectTap")]
    MapObjectTap,
    #[display("onMapObjectDrag")]
    MapObjectDrag,
    #[display("onMapObjectDragStart")]
    MapObjectDragStart,
    #[display("onMapObjectDragEnd")]
    MapObjectDragEnd,
    #[display("onSearchResult")]
    SearchResult,
    #[display("onSearchError")]
    SearchError,
    #[display("onSuggestResult")]
    SuggestResult,
    #[display("onSuggestError")]
    SuggestError,
}

/// An encoded event ready to be handed to the host.
#[derive(Clone, Debug, PartialEq)]
pub struct EventEnvelope {
    pub channel: Channel,
    pub name: EventName,
    pub payload: Vec<u8>,
}

impl EventEnvelope {
    /// Decode the payload, e.g. to inspect it in a host written in Rust.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, DecodeError> {
        Codec.decode(&self.payload)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraPositionChanged {
    pub position: CameraPosition,
    /// False while the camera is still moving.
    pub finished: bool,
}

/// A tap on or a drag of an object to a point.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapObjectPointEvent {
    pub id: ObjectId,
    pub point: Point,
}

/// The start or end of a drag.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapObjectEvent {
    pub id: ObjectId,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponseEvent {
    pub session_id: SessionId,
    pub is_success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<CompactString>,
    pub items: Vec<SearchItem>,
}

impl SearchResponseEvent {
    pub fn success(session_id: SessionId, response: SearchResponse) -> Self {
        Self {
            session_id,
            is_success: true,
            error: None,
            items: response.items,
        }
    }

    pub fn failure(session_id: SessionId, error: &EngineError) -> Self {
        Self {
            session_id,
            is_success: false,
            error: Some(error.to_string().into()),
            items: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestResponseEvent {
    pub is_error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<CompactString>,
    pub items: Vec<SuggestItem>,
}

impl SuggestResponseEvent {
    pub fn success(items: Vec<SuggestItem>) -> Self {
        Self {
            is_error: false,
            error: None,
            items,
        }
    }

    pub fn failure(error: &EngineError) -> Self {
        Self {
            is_error: true,
            error: Some(error.to_string().into()),
            items: Vec::new(),
        }
    }
}

/// The sending half of the event queue. Cheap to clone and usable from any thread.
#[derive(Clone, Debug)]
pub struct EventEmitter {
    sender: UnboundedSender<EventEnvelope>,
    codec: Codec,
}

impl EventEmitter {
    pub fn new(codec: Codec) -> (Self, EventStream) {
        let (sender, receiver) = mpsc::unbounded();
        (Self { sender, codec }, EventStream(receiver))
    }

    /// Encode `payload` and queue it on `channel`. Returns whether the event was queued.
    pub fn emit<T: Serialize>(&self, channel: Channel, name: EventName, payload: &T) -> bool {
        let payload = match self.codec.encode(payload) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Dropping {name} event: {e}");
                return false;
            }
        };
        match self.sender.unbounded_send(EventEnvelope {
            channel,
            name,
            payload,
        }) {
            Ok(()) => true,
            Err(_) => {
                debug!("Dropping {name} event: the event stream is closed");
                false
            }
        }
    }
}

/// The receiving half of the event queue, handed to the host.
#[derive(Debug)]
pub struct EventStream(UnboundedReceiver<EventEnvelope>);

impl Stream for EventStream {
    type Item = EventEnvelope;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.0).poll_next(cx)
    }
}
