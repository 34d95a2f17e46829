//! The native map and geosearch engine as seen from the bridge.
//!
//! This crate only declares what the bridge needs from the engine: a process wide [`MapKit`]
//! entry point, [`MapWindow`]s with the objects placed on them, and [`SearchManager`]s running
//! asynchronous searches and suggestions. Rendering, tile loading and search ranking all live on
//! the other side of these traits.
//!
//! The engine may invoke every listener and [`Responder`] from any of its internal threads, so
//! all of them are `Send` and implementations on the bridge side must synchronize themselves.

mod geometry;
mod icon;
mod search;

use std::fmt;
use std::sync::Arc;

use compact_str::CompactString;

pub use geometry::*;
pub use icon::*;
pub use search::*;

/// An error reported asynchronously by the engine.
#[derive(Clone, Debug, PartialEq, derive_more::Display, derive_more::Error)]
pub enum EngineError {
    #[display("Network error")]
    Network,
    /// The backend answered with an error.
    #[display("Remote error: {_0}")]
    Remote(#[error(not(source))] CompactString),
    /// The engine dropped the response handler without ever calling it.
    #[display("The engine abandoned the request")]
    Abandoned,
}

pub type EngineResult<T, E = EngineError> = Result<T, E>;

/// The single-shot handler for the result of an asynchronous engine operation.
///
/// [`Responder::respond`] consumes the responder, so a result can be delivered at most once. If
/// the engine drops the responder without responding, the handler is called with
/// [`EngineError::Abandoned`] instead so that the waiting side always learns about the outcome.
pub struct Responder<T> {
    handler: Option<Box<dyn FnOnce(EngineResult<T>) + Send>>,
}

impl<T> Responder<T> {
    pub fn new(handler: impl FnOnce(EngineResult<T>) + Send + 'static) -> Self {
        Self {
            handler: Some(Box::new(handler)),
        }
    }

    /// Deliver the result of the operation.
    pub fn respond(mut self, result: EngineResult<T>) {
        if let Some(handler) = self.handler.take() {
            handler(result);
        }
    }
}

impl<T> Drop for Responder<T> {
    fn drop(&mut self) {
        if let Some(handler) = self.handler.take() {
            handler(Err(EngineError::Abandoned));
        }
    }
}

impl<T> fmt::Debug for Responder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Responder")
            .field("pending", &self.handler.is_some())
            .finish()
    }
}

/// Process wide engine state.
pub trait MapKit: Send + Sync {
    /// Set the credential used for all requests. Called at most once.
    fn set_api_key(&self, api_key: &str);

    fn create_search_manager(&self, kind: SearchManagerType) -> Arc<dyn SearchManager>;
}

/// A native map view.
pub trait MapWindow: Send + Sync {
    /// Move the camera, optionally animated.
    fn move_camera(&self, position: CameraPosition, animation: Option<Animation>);

    /// Set or clear the listener for camera movements.
    ///
    /// The listener is called continuously while the camera moves, not only when a movement
    /// has finished.
    fn set_camera_listener(&self, listener: Option<Arc<dyn CameraListener>>);

    fn add_placemark(&self, point: Point) -> Box<dyn Placemark>;

    fn add_polygon(&self, polygon: &Polygon, style: &PolygonStyle) -> Box<dyn MapObject>;

    /// Enable the layer showing the user's location, using `icon` as the pin.
    fn show_user_location(&self, icon: &Icon) -> Box<dyn MapObject>;
}

/// An object placed on a map window.
pub trait MapObject: Send {
    /// Remove the object from its map. Listeners are not called after this returns.
    fn remove(&mut self);
}

/// A point object with an icon which can be tapped and dragged.
pub trait Placemark: MapObject {
    fn set_icon(&mut self, icon: &Icon);
    fn set_visible(&mut self, visible: bool);
    fn set_draggable(&mut self, draggable: bool);
    fn set_opacity(&mut self, opacity: f32);
    fn set_z_index(&mut self, z_index: f32);
    fn set_tap_observer(&mut self, observer: Arc<dyn TapObserver>);
    fn set_drag_observer(&mut self, observer: Arc<dyn DragObserver>);
}

pub trait CameraListener: Send + Sync {
    fn on_camera_position_changed(&self, position: CameraPosition, finished: bool);
}

pub trait TapObserver: Send + Sync {
    /// Returns whether the tap was handled.
    fn on_tap(&self, point: Point) -> bool;
}

pub trait DragObserver: Send + Sync {
    fn on_drag_start(&self);
    fn on_drag(&self, point: Point);
    fn on_drag_end(&self);
}

/// A running search. Dropping the session does not cancel it.
pub trait SearchSession: Send {
    /// Ask the engine to stop the search.
    ///
    /// This is advisory: the responder of the search may still be called afterwards.
    fn cancel(&mut self);
}

pub trait SearchManager: Send + Sync {
    /// Start a search around `point`.
    fn submit(
        &self,
        point: Point,
        zoom: Option<f32>,
        options: &SearchOptions,
        responder: Responder<SearchResponse>,
    ) -> Box<dyn SearchSession>;

    /// Request suggestions for a partial query. A new request supersedes the previous one.
    fn suggest(
        &self,
        text: &str,
        window: BoundingBox,
        options: &SearchOptions,
        responder: Responder<Vec<SuggestItem>>,
    );

    /// Cancel the current suggest request, if any.
    fn cancel_suggest(&self);
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[test]
    fn test_responder_delivers_once() {
        let results = Arc::new(Mutex::new(Vec::new()));
        let sink = results.clone();
        let responder = Responder::new(move |res: EngineResult<u32>| {
            sink.lock().unwrap().push(res)
        });
        responder.respond(Ok(7));
        assert_eq!(*results.lock().unwrap(), vec![Ok(7)]);
    }

    #[test]
    fn test_dropped_responder_reports_abandoned() {
        let results = Arc::new(Mutex::new(Vec::new()));
        let sink = results.clone();
        drop(Responder::new(move |res: EngineResult<u32>| {
            sink.lock().unwrap().push(res)
        }));
        assert_eq!(*results.lock().unwrap(), vec![Err(EngineError::Abandoned)]);
    }
}
