use std::sync::{Arc, Weak};

use mapkit_engine::{CameraListener, CameraPosition, MapWindow};

use super::events::{CameraPositionChanged, EventEmitter, EventName};
use super::{MapObjectRegistry, MoveParams};
use crate::ids::{IdGenerator, MapViewId};

/// A native map window attached to the bridge together with the objects placed on it.
pub struct MapView {
    id: MapViewId,
    window: Arc<dyn MapWindow>,
    objects: Arc<MapObjectRegistry>,
}

impl MapView {
    pub(crate) fn attach(
        id: MapViewId,
        window: Arc<dyn MapWindow>,
        ids: Arc<IdGenerator>,
        emitter: EventEmitter,
    ) -> Self {
        let objects = Arc::new(MapObjectRegistry::new(
            id.clone(),
            window.clone(),
            ids,
            emitter,
        ));
        window.set_camera_listener(Some(Arc::new(CameraController {
            objects: Arc::downgrade(&objects),
        })));
        Self {
            id,
            window,
            objects,
        }
    }

    pub fn id(&self) -> &MapViewId {
        &self.id
    }

    pub fn objects(&self) -> &Arc<MapObjectRegistry> {
        &self.objects
    }

    pub fn move_camera(&self, params: &MoveParams) {
        self.window.move_camera(params.position, params.animation());
    }

    /// Detach from the window and remove all objects of the view.
    pub(crate) fn tear_down(&self) {
        self.window.set_camera_listener(None);
        self.objects.tear_down();
    }
}

/// Forwards every camera movement, finished or not, to the map view's channel.
struct CameraController {
    objects: Weak<MapObjectRegistry>,
}

impl CameraListener for CameraController {
    fn on_camera_position_changed(&self, position: CameraPosition, finished: bool) {
        if let Some(objects) = self.objects.upgrade() {
            objects.emit_view_event(
                EventName::CameraPositionChanged,
                &CameraPositionChanged { position, finished },
            );
        }
    }
}
