//! The objects placed on one map view, keyed by identity.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use log::debug;
use mapkit_engine::{
    DragObserver, Icon, MapObject, MapWindow, Placemark, Point, Polygon, PolygonStyle,
    TapObserver,
};
use serde::{Deserialize, Serialize};

use super::events::{EventEmitter, EventName, MapObjectEvent, MapObjectPointEvent};
use super::{lock, Channel, MarkerProps};
use crate::error::{BridgeError, BridgeResult};
use crate::ids::{IdGenerator, MapViewId, ObjectId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ObjectKind {
    Placemark,
    Polygon,
    UserLocationLayer,
}

impl ObjectKind {
    pub(crate) fn prefix(self) -> &'static str {
        match self {
            Self::Placemark => "marker",
            Self::Polygon => "polygon",
            Self::UserLocationLayer => "user-location",
        }
    }
}

/// The display properties of a placemark as last set by the host.
#[derive(Clone, Debug, PartialEq)]
pub struct PlacemarkProps {
    pub icon: Option<Icon>,
    pub visible: bool,
    pub draggable: bool,
    pub opacity: f32,
    pub z_index: f32,
}

impl Default for PlacemarkProps {
    fn default() -> Self {
        Self {
            icon: None,
            visible: true,
            draggable: false,
            opacity: 1.0,
            z_index: 0.0,
        }
    }
}

/// A placemark handle shared between the table and callers updating it. Empty once removed.
type SharedPlacemark = Arc<Mutex<Option<Box<dyn Placemark>>>>;

enum Entry {
    Placemark {
        placemark: SharedPlacemark,
        props: PlacemarkProps,
    },
    Polygon(Box<dyn MapObject>),
    UserLocationLayer(Box<dyn MapObject>),
}

impl Entry {
    fn kind(&self) -> ObjectKind {
        match self {
            Self::Placemark { .. } => ObjectKind::Placemark,
            Self::Polygon(_) => ObjectKind::Polygon,
            Self::UserLocationLayer(_) => ObjectKind::UserLocationLayer,
        }
    }

    /// Remove the native object. Must be called without the table lock.
    fn remove(self) {
        match self {
            Self::Placemark { placemark, .. } => {
                let placemark = lock(&placemark).take();
                if let Some(mut placemark) = placemark {
                    placemark.remove();
                }
            }
            Self::Polygon(mut object) | Self::UserLocationLayer(mut object) => object.remove(),
        }
    }
}

#[derive(Default)]
struct ObjectTable {
    objects: HashMap<ObjectId, Entry>,
    user_location: Option<ObjectId>,
    /// Set when the owning map view is disposed. No objects are added afterwards.
    torn_down: bool,
}

/// The registry of the objects on one map view.
///
/// Every lookup and the action depending on it, including emitting an event for an object,
/// happen under one lock, so an object is either fully present or fully gone.
///
/// The engine is never called with the table lock held, since it may call back into
/// [`PlacemarkController`] synchronously. Placemark setters run under the placemark's own lock,
/// which may be followed by the table lock but never the other way round.
pub struct MapObjectRegistry {
    view: MapViewId,
    window: Arc<dyn MapWindow>,
    ids: Arc<IdGenerator>,
    emitter: EventEmitter,
    table: Mutex<ObjectTable>,
}

impl MapObjectRegistry {
    pub(crate) fn new(
        view: MapViewId,
        window: Arc<dyn MapWindow>,
        ids: Arc<IdGenerator>,
        emitter: EventEmitter,
    ) -> Self {
        Self {
            view,
            window,
            ids,
            emitter,
            table: Mutex::default(),
        }
    }

    pub fn view(&self) -> &MapViewId {
        &self.view
    }

    /// Add a placemark and return its identity.
    pub fn create_placemark(
        self: &Arc<Self>,
        point: Point,
        init: &MarkerProps,
    ) -> BridgeResult<ObjectId> {
        let id = self.ids.object_id(ObjectKind::Placemark);
        let mut placemark = self.window.add_placemark(point);
        let controller = Arc::new(PlacemarkController {
            id: id.clone(),
            registry: Arc::downgrade(self),
        });
        placemark.set_tap_observer(controller.clone());
        placemark.set_drag_observer(controller);
        init.apply(&mut *placemark);
        let mut props = PlacemarkProps::default();
        init.record(&mut props);
        let placemark = Arc::new(Mutex::new(Some(placemark)));
        self.insert(id, Entry::Placemark { placemark, props })
    }

    pub fn create_polygon(
        &self,
        polygon: &Polygon,
        style: &PolygonStyle,
    ) -> BridgeResult<ObjectId> {
        let id = self.ids.object_id(ObjectKind::Polygon);
        let object = self.window.add_polygon(polygon, style);
        self.insert(id, Entry::Polygon(object))
    }

    /// Show the user location layer. Only the first call creates it; later calls return the
    /// identity of the existing layer.
    pub fn show_user_location(&self, icon: &Icon) -> BridgeResult<ObjectId> {
        if let Some(id) = self.user_location()? {
            return Ok(id);
        }
        let layer = self.window.show_user_location(icon);
        let mut table = lock(&self.table);
        let current = table.user_location.clone();
        let outcome = match current {
            _ if table.torn_down => Err(BridgeError::UnknownMapView {
                id: self.view.clone(),
            }),
            // Shown by another thread in the meantime.
            Some(id) => Ok(id),
            None => {
                let id = self.ids.object_id(ObjectKind::UserLocationLayer);
                table
                    .objects
                    .insert(id.clone(), Entry::UserLocationLayer(layer));
                table.user_location = Some(id.clone());
                return Ok(id);
            }
        };
        drop(table);
        Entry::UserLocationLayer(layer).remove();
        outcome
    }

    fn user_location(&self) -> BridgeResult<Option<ObjectId>> {
        let table = lock(&self.table);
        if table.torn_down {
            return Err(BridgeError::UnknownMapView {
                id: self.view.clone(),
            });
        }
        Ok(table.user_location.clone())
    }

    fn insert(&self, id: ObjectId, entry: Entry) -> BridgeResult<ObjectId> {
        let mut table = lock(&self.table);
        if table.torn_down {
            drop(table);
            entry.remove();
            return Err(BridgeError::UnknownMapView {
                id: self.view.clone(),
            });
        }
        table.objects.insert(id.clone(), entry);
        Ok(id)
    }

    /// Apply the fields present in `update` to a placemark. Other fields keep their values.
    pub fn update(&self, id: &ObjectId, update: &MarkerProps) -> BridgeResult<()> {
        let unknown = || BridgeError::UnknownObject { id: id.clone() };
        let shared = match lock(&self.table).objects.get(id) {
            Some(Entry::Placemark { placemark, .. }) => placemark.clone(),
            // Only placemarks can be updated.
            _ => return Err(unknown()),
        };
        let mut placemark = lock(&shared);
        // Removed after the lookup.
        let native = placemark.as_mut().ok_or_else(unknown)?;
        update.apply(&mut **native);
        if let Some(Entry::Placemark { props, .. }) = lock(&self.table).objects.get_mut(id) {
            update.record(props);
        }
        Ok(())
    }

    /// Remove an object. Removing an unknown or already removed object does nothing.
    ///
    /// Returns whether an object was removed.
    pub fn remove(&self, id: &ObjectId) -> bool {
        let removed = {
            let mut table = lock(&self.table);
            if table.user_location.as_ref() == Some(id) {
                table.user_location = None;
            }
            table.objects.remove(id)
        };
        match removed {
            Some(entry) => {
                entry.remove();
                true
            }
            None => {
                debug!("Ignoring removal of unknown object {id} on {}", self.view);
                false
            }
        }
    }

    /// Remove every object and refuse new ones.
    pub(crate) fn tear_down(&self) {
        let entries: Vec<Entry> = {
            let mut table = lock(&self.table);
            table.torn_down = true;
            table.user_location = None;
            table.objects.drain().map(|(_, entry)| entry).collect()
        };
        for entry in entries {
            entry.remove();
        }
    }

    pub fn contains(&self, id: &ObjectId) -> bool {
        lock(&self.table).objects.contains_key(id)
    }

    pub fn kind(&self, id: &ObjectId) -> Option<ObjectKind> {
        lock(&self.table).objects.get(id).map(Entry::kind)
    }

    pub fn placemark_props(&self, id: &ObjectId) -> Option<PlacemarkProps> {
        match lock(&self.table).objects.get(id) {
            Some(Entry::Placemark { props, .. }) => Some(props.clone()),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.table).objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Emit an event of the map view itself unless the view has been torn down.
    pub(crate) fn emit_view_event<T: Serialize>(&self, name: EventName, payload: &T) {
        let table = lock(&self.table);
        if table.torn_down {
            debug!("Dropping {name} for disposed map view {}", self.view);
        } else {
            self.emitter
                .emit(Channel::MapView(self.view.clone()), name, payload);
        }
    }

    /// Emit an event for an object if the object is still registered.
    fn emit_for<T: Serialize>(&self, id: &ObjectId, name: EventName, payload: &T) {
        let table = lock(&self.table);
        if table.objects.contains_key(id) {
            self.emitter
                .emit(Channel::MapView(self.view.clone()), name, payload);
        } else {
            debug!("Dropping {name} for removed object {id}");
        }
    }
}

/// Receives tap and drag callbacks of one placemark and routes them to the host.
///
/// The engine keeps the controller alive, so it only holds a weak reference to the registry.
struct PlacemarkController {
    id: ObjectId,
    registry: Weak<MapObjectRegistry>,
}

impl PlacemarkController {
    fn emit<T: Serialize>(&self, name: EventName, payload: &T) {
        if let Some(registry) = self.registry.upgrade() {
            registry.emit_for(&self.id, name, payload);
        }
    }

    fn point_event(&self, name: EventName, point: Point) {
        let event = MapObjectPointEvent {
            id: self.id.clone(),
            point,
        };
        self.emit(name, &event);
    }

    fn terminal_event(&self, name: EventName) {
        let event = MapObjectEvent { id: self.id.clone() };
        self.emit(name, &event);
    }
}

impl TapObserver for PlacemarkController {
    fn on_tap(&self, point: Point) -> bool {
        self.point_event(EventName::MapObjectTap, point);
        true
    }
}

impl DragObserver for PlacemarkController {
    fn on_drag_start(&self) {
        self.terminal_event(EventName::MapObjectDragStart);
    }

    fn on_drag(&self, point: Point) {
        self.point_event(EventName::MapObjectDrag, point);
    }

    fn on_drag_end(&self) {
        self.terminal_event(EventName::MapObjectDragEnd);
    }
}
