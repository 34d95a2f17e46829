//! A recording engine for driving the bridge from tests.
//!
//! Nothing here runs in the background: the test decides when a pending search or suggest
//! response is delivered, on whichever thread it likes.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use futures::{FutureExt, StreamExt};
use mapkit_bridge::engine::{
    Animation, BoundingBox, CameraListener, CameraPosition, DragObserver, Icon,
    MapKit, MapObject, MapWindow, Placemark, Point, Polygon, PolygonStyle, Responder,
    SearchManager, SearchManagerType, SearchOptions, SearchResponse, SearchSession, SuggestItem,
    TapObserver,
};
use mapkit_bridge::{Bridge, BridgeConfig, EventEnvelope, EventStream};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn bridge() -> (Bridge, EventStream, Arc<FakeKit>) {
    bridge_with(BridgeConfig::default())
}

pub fn bridge_with(config: BridgeConfig) -> (Bridge, EventStream, Arc<FakeKit>) {
    init_logger();
    let kit = Arc::new(FakeKit::default());
    let (bridge, events) = Bridge::new(kit.clone(), config);
    (bridge, events, kit)
}

/// Take every event queued so far without waiting.
pub fn drain(events: &mut EventStream) -> Vec<EventEnvelope> {
    let mut drained = Vec::new();
    while let Some(Some(event)) = events.next().now_or_never() {
        drained.push(event);
    }
    drained
}

pub fn point(latitude: f64, longitude: f64) -> Point {
    Point::new(latitude, longitude)
}

#[derive(Default)]
pub struct FakeKit {
    pub api_keys: Mutex<Vec<String>>,
    pub managers: Mutex<Vec<Arc<FakeSearchManager>>>,
}

impl FakeKit {
    pub fn manager(&self, index: usize) -> Arc<FakeSearchManager> {
        self.managers.lock().unwrap()[index].clone()
    }

    pub fn manager_count(&self) -> usize {
        self.managers.lock().unwrap().len()
    }
}

impl MapKit for FakeKit {
    fn set_api_key(&self, api_key: &str) {
        self.api_keys.lock().unwrap().push(api_key.to_owned());
    }

    fn create_search_manager(&self, kind: SearchManagerType) -> Arc<dyn SearchManager> {
        let manager = Arc::new(FakeSearchManager {
            kind,
            ..FakeSearchManager::default()
        });
        self.managers.lock().unwrap().push(manager.clone());
        manager
    }
}

pub struct PendingSearch {
    pub point: Point,
    pub zoom: Option<f32>,
    pub options: SearchOptions,
    pub responder: Responder<SearchResponse>,
    pub cancelled: Arc<Mutex<bool>>,
}

pub struct PendingSuggest {
    pub text: String,
    pub window: BoundingBox,
    pub options: SearchOptions,
    pub responder: Responder<Vec<SuggestItem>>,
}

#[derive(Default)]
pub struct FakeSearchManager {
    pub kind: SearchManagerType,
    pub searches: Mutex<Vec<PendingSearch>>,
    pub suggests: Mutex<Vec<PendingSuggest>>,
    pub suggest_cancellations: Mutex<usize>,
    /// Respond synchronously from inside `submit`.
    pub respond_immediately: Mutex<Option<SearchResponse>>,
}

impl FakeSearchManager {
    /// Take the oldest pending search.
    pub fn take_search(&self) -> PendingSearch {
        self.searches.lock().unwrap().remove(0)
    }

    pub fn take_suggest(&self) -> PendingSuggest {
        self.suggests.lock().unwrap().remove(0)
    }

    pub fn pending_searches(&self) -> usize {
        self.searches.lock().unwrap().len()
    }

    pub fn suggest_cancellations(&self) -> usize {
        *self.suggest_cancellations.lock().unwrap()
    }
}

impl SearchManager for FakeSearchManager {
    fn submit(
        &self,
        point: Point,
        zoom: Option<f32>,
        options: &SearchOptions,
        responder: Responder<SearchResponse>,
    ) -> Box<dyn SearchSession> {
        let cancelled = Arc::new(Mutex::new(false));
        let immediate = self.respond_immediately.lock().unwrap().clone();
        match immediate {
            Some(response) => responder.respond(Ok(response)),
            None => self.searches.lock().unwrap().push(PendingSearch {
                point,
                zoom,
                options: options.clone(),
                responder,
                cancelled: cancelled.clone(),
            }),
        }
        Box::new(FakeSearchSession { cancelled })
    }

    fn suggest(
        &self,
        text: &str,
        window: BoundingBox,
        options: &SearchOptions,
        responder: Responder<Vec<SuggestItem>>,
    ) {
        self.suggests.lock().unwrap().push(PendingSuggest {
            text: text.to_owned(),
            window,
            options: options.clone(),
            responder,
        });
    }

    fn cancel_suggest(&self) {
        *self.suggest_cancellations.lock().unwrap() += 1;
    }
}

pub struct FakeSearchSession {
    cancelled: Arc<Mutex<bool>>,
}

impl SearchSession for FakeSearchSession {
    fn cancel(&mut self) {
        *self.cancelled.lock().unwrap() = true;
    }
}

/// What happened to one placemark.
#[derive(Default)]
pub struct PlacemarkLog {
    pub point: Option<Point>,
    pub icon: Option<Icon>,
    pub visible: Vec<bool>,
    pub draggable: Vec<bool>,
    pub opacity: Vec<f32>,
    pub z_index: Vec<f32>,
    pub removed: bool,
    pub tap: Option<Arc<dyn TapObserver>>,
    pub drag: Option<Arc<dyn DragObserver>>,
}

#[derive(Default)]
pub struct FakeWindow {
    pub moves: Mutex<Vec<(CameraPosition, Option<Animation>)>>,
    pub camera_listener: Mutex<Option<Arc<dyn CameraListener>>>,
    pub placemarks: Mutex<Vec<Arc<Mutex<PlacemarkLog>>>>,
    /// Removal flags of polygons and user location layers, in creation order.
    pub objects: Mutex<Vec<Arc<Mutex<bool>>>>,
    pub polygons: Mutex<Vec<(Polygon, PolygonStyle)>>,
    /// Make placemarks report a tap from inside `set_visible`, as some engines do when a
    /// hidden placemark under the finger is shown again.
    pub tap_on_visibility_change: AtomicBool,
}

impl FakeWindow {
    pub fn placemark(&self, index: usize) -> Arc<Mutex<PlacemarkLog>> {
        self.placemarks.lock().unwrap()[index].clone()
    }

    pub fn object_removed(&self, index: usize) -> bool {
        *self.objects.lock().unwrap()[index].lock().unwrap()
    }

    pub fn tap(&self, index: usize, at: Point) -> bool {
        let observer = self.placemark(index).lock().unwrap().tap.clone();
        observer.map_or(false, |observer| observer.on_tap(at))
    }

    pub fn drag(&self, index: usize, to: Point) {
        let observer = self.placemark(index).lock().unwrap().drag.clone();
        if let Some(observer) = observer {
            observer.on_drag_start();
            observer.on_drag(to);
            observer.on_drag_end();
        }
    }

    /// Move the camera as a gesture would. Returns whether a listener was registered.
    pub fn gesture(&self, position: CameraPosition, finished: bool) -> bool {
        let listener = self.camera_listener.lock().unwrap().clone();
        match listener {
            Some(listener) => {
                listener.on_camera_position_changed(position, finished);
                true
            }
            None => false,
        }
    }
}

impl MapWindow for FakeWindow {
    fn move_camera(&self, position: CameraPosition, animation: Option<Animation>) {
        self.moves.lock().unwrap().push((position, animation));
    }

    fn set_camera_listener(&self, listener: Option<Arc<dyn CameraListener>>) {
        *self.camera_listener.lock().unwrap() = listener;
    }

    fn add_placemark(&self, point: Point) -> Box<dyn Placemark> {
        let log = Arc::new(Mutex::new(PlacemarkLog {
            point: Some(point),
            ..PlacemarkLog::default()
        }));
        self.placemarks.lock().unwrap().push(log.clone());
        Box::new(FakePlacemark {
            log,
            tap_on_visibility_change: self.tap_on_visibility_change.load(Ordering::SeqCst),
        })
    }

    fn add_polygon(&self, polygon: &Polygon, style: &PolygonStyle) -> Box<dyn MapObject> {
        self.polygons
            .lock()
            .unwrap()
            .push((polygon.clone(), *style));
        self.object()
    }

    fn show_user_location(&self, _icon: &Icon) -> Box<dyn MapObject> {
        self.object()
    }
}

impl FakeWindow {
    fn object(&self) -> Box<dyn MapObject> {
        let removed = Arc::new(Mutex::new(false));
        self.objects.lock().unwrap().push(removed.clone());
        Box::new(FakeObject(removed))
    }
}

struct FakeObject(Arc<Mutex<bool>>);

impl MapObject for FakeObject {
    fn remove(&mut self) {
        *self.0.lock().unwrap() = true;
    }
}

struct FakePlacemark {
    log: Arc<Mutex<PlacemarkLog>>,
    tap_on_visibility_change: bool,
}

impl MapObject for FakePlacemark {
    fn remove(&mut self) {
        let mut log = self.log.lock().unwrap();
        log.removed = true;
        log.tap = None;
        log.drag = None;
    }
}

impl Placemark for FakePlacemark {
    fn set_icon(&mut self, icon: &Icon) {
        self.log.lock().unwrap().icon = Some(icon.clone());
    }

    fn set_visible(&mut self, visible: bool) {
        let tap = {
            let mut log = self.log.lock().unwrap();
            log.visible.push(visible);
            log.tap.clone()
        };
        if let (true, Some(tap)) = (self.tap_on_visibility_change, tap) {
            let point = self.log.lock().unwrap().point.unwrap_or(Point::new(0.0, 0.0));
            tap.on_tap(point);
        }
    }

    fn set_draggable(&mut self, draggable: bool) {
        self.log.lock().unwrap().draggable.push(draggable);
    }

    fn set_opacity(&mut self, opacity: f32) {
        self.log.lock().unwrap().opacity.push(opacity);
    }

    fn set_z_index(&mut self, z_index: f32) {
        self.log.lock().unwrap().z_index.push(z_index);
    }

    fn set_tap_observer(&mut self, observer: Arc<dyn TapObserver>) {
        self.log.lock().unwrap().tap = Some(observer);
    }

    fn set_drag_observer(&mut self, observer: Arc<dyn DragObserver>) {
        self.log.lock().unwrap().drag = Some(observer);
    }
}
