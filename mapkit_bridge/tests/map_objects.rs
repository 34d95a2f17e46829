mod common;

use std::collections::HashSet;
use std::sync::atomic::Ordering;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use common::{bridge, drain, point, FakeWindow};
use mapkit_bridge::engine::{CameraPosition, Icon};
use mapkit_bridge::{
    BridgeError, CameraPositionChanged, Channel, EventName, MapObjectEvent, MapObjectPointEvent,
    MarkerProps, ObjectId, ObjectKind, Reply,
};
use proptest::prelude::*;

fn id(reply: Reply) -> ObjectId {
    match reply {
        Reply::Id(id) => ObjectId::from(id.as_str()),
        Reply::Void => panic!("Expected an identity"),
    }
}

fn init_marker(bridge: &mapkit_bridge::Bridge, channel: &Channel, payload: &str) -> ObjectId {
    id(bridge
        .dispatch(channel.clone(), "marker#init", payload.as_bytes())
        .unwrap())
}

const MARKER: &str = r#"{"point": {"latitude": 55.75, "longitude": 37.62}}"#;

#[test]
fn test_marker_lifecycle() {
    let (bridge, mut events, _) = bridge();
    let window = Arc::new(FakeWindow::default());
    let view = bridge.create_map_view(window.clone());
    let channel = Channel::MapView(view.clone());

    let marker = init_marker(
        &bridge,
        &channel,
        r#"{"point": {"latitude": 55.75, "longitude": 37.62},
            "icon": ["fromAsset", "assets/pin.png"], "draggable": true}"#,
    );
    assert!(marker.as_str().starts_with("marker-"));
    {
        let log = window.placemark(0);
        let log = log.lock().unwrap();
        assert_eq!(log.point, Some(point(55.75, 37.62)));
        assert_eq!(
            log.icon,
            Some(Icon::Asset {
                name: "assets/pin.png".into(),
                package: None
            })
        );
        assert_eq!(log.draggable, vec![true]);
        assert!(log.opacity.is_empty());
    }

    // Only the fields present in the update are touched.
    bridge
        .dispatch(
            channel.clone(),
            "marker#update",
            format!(r#"{{"id": "{marker}", "opacity": 0.5}}"#).as_bytes(),
        )
        .unwrap();
    let objects = bridge.map_view(&view).unwrap().objects().clone();
    let props = objects.placemark_props(&marker).unwrap();
    assert_eq!(props.opacity, 0.5);
    assert!(props.draggable);
    assert!(props.visible);
    assert_eq!(window.placemark(0).lock().unwrap().draggable, vec![true]);
    assert_eq!(window.placemark(0).lock().unwrap().opacity, vec![0.5]);

    let remove = format!(r#"{{"id": "{marker}"}}"#);
    assert_eq!(
        bridge
            .dispatch(channel.clone(), "marker#remove", remove.as_bytes())
            .unwrap(),
        Reply::Void
    );
    assert!(window.placemark(0).lock().unwrap().removed);
    // Removing twice is a no-op.
    assert_eq!(
        bridge
            .dispatch(channel.clone(), "marker#remove", remove.as_bytes())
            .unwrap(),
        Reply::Void
    );
    assert!(objects.is_empty());

    // Updating a removed marker is an error.
    let update = bridge.dispatch(
        channel,
        "marker#update",
        format!(r#"{{"id": "{marker}", "visible": false}}"#).as_bytes(),
    );
    assert!(matches!(update, Err(BridgeError::UnknownObject { .. })));
    assert!(drain(&mut events).is_empty());
}

#[test]
fn test_tap_and_drag_are_routed_to_the_view() {
    let (bridge, mut events, _) = bridge();
    let window = Arc::new(FakeWindow::default());
    let view = bridge.create_map_view(window.clone());
    let channel = Channel::MapView(view);
    let first = init_marker(&bridge, &channel, MARKER);
    let second = init_marker(&bridge, &channel, MARKER);

    assert!(window.tap(1, point(55.76, 37.63)));
    let tap = drain(&mut events);
    assert_eq!(tap.len(), 1);
    assert_eq!(tap[0].channel, channel);
    assert_eq!(tap[0].name, EventName::MapObjectTap);
    assert_eq!(
        tap[0].decode::<MapObjectPointEvent>().unwrap(),
        MapObjectPointEvent {
            id: second,
            point: point(55.76, 37.63)
        }
    );

    window.drag(0, point(55.8, 37.7));
    let drag = drain(&mut events);
    let names: Vec<_> = drag.iter().map(|e| e.name).collect();
    assert_eq!(
        names,
        [
            EventName::MapObjectDragStart,
            EventName::MapObjectDrag,
            EventName::MapObjectDragEnd
        ]
    );
    assert_eq!(
        drag[2].decode::<MapObjectEvent>().unwrap(),
        MapObjectEvent { id: first }
    );
}

#[test]
fn test_no_event_after_removal() {
    let (bridge, mut events, _) = bridge();
    let window = Arc::new(FakeWindow::default());
    let view = bridge.create_map_view(window.clone());
    let channel = Channel::MapView(view);
    let marker = init_marker(&bridge, &channel, MARKER);

    // The engine may still hold on to the observer after the removal.
    let observer = window.placemark(0).lock().unwrap().tap.clone().unwrap();
    bridge
        .dispatch(
            channel,
            "marker#remove",
            format!(r#"{{"id": "{marker}"}}"#).as_bytes(),
        )
        .unwrap();
    observer.on_tap(point(55.75, 37.62));
    assert!(drain(&mut events).is_empty());
}

#[test]
fn test_update_survives_synchronous_engine_callback() {
    let (bridge, mut events, _) = bridge();
    let window = Arc::new(FakeWindow::default());
    window.tap_on_visibility_change.store(true, Ordering::SeqCst);
    let view = bridge.create_map_view(window.clone());
    let channel = Channel::MapView(view.clone());
    let marker = init_marker(&bridge, &channel, MARKER);

    let bridge = Arc::new(bridge);
    let (done, finished) = mpsc::channel();
    {
        let bridge = bridge.clone();
        let payload = format!(r#"{{"id": "{marker}", "visible": false}}"#);
        thread::spawn(move || {
            let result = bridge.dispatch(channel, "marker#update", payload.as_bytes());
            let _ = done.send(result.is_ok());
        });
    }
    let updated = finished
        .recv_timeout(Duration::from_secs(5))
        .expect("marker#update blocked on the callback it triggered");
    assert!(updated);

    let delivered = drain(&mut events);
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].name, EventName::MapObjectTap);
    assert_eq!(
        delivered[0].decode::<MapObjectPointEvent>().unwrap().id,
        marker
    );
    let objects = bridge.map_view(&view).unwrap().objects().clone();
    assert!(!objects.placemark_props(&marker).unwrap().visible);
    assert_eq!(window.placemark(0).lock().unwrap().visible, vec![false]);
}

#[test]
fn test_tap_racing_removal() {
    for _ in 0..50 {
        let (bridge, mut events, _) = bridge();
        let window = Arc::new(FakeWindow::default());
        let view = bridge.create_map_view(window.clone());
        let channel = Channel::MapView(view.clone());
        let marker = init_marker(&bridge, &channel, MARKER);
        let observer = window.placemark(0).lock().unwrap().tap.clone().unwrap();

        let tapper = thread::spawn(move || {
            for _ in 0..20 {
                observer.on_tap(point(55.75, 37.62));
            }
            observer
        });
        bridge
            .dispatch(
                channel,
                "marker#remove",
                format!(r#"{{"id": "{marker}"}}"#).as_bytes(),
            )
            .unwrap();
        let observer = tapper.join().unwrap();

        // Taps before the removal are delivered whole, later ones are dropped.
        let delivered = drain(&mut events);
        assert!(delivered.len() <= 20);
        for event in &delivered {
            assert_eq!(event.name, EventName::MapObjectTap);
            assert_eq!(event.decode::<MapObjectPointEvent>().unwrap().id, marker);
        }
        observer.on_tap(point(55.75, 37.62));
        assert!(drain(&mut events).is_empty());
        assert!(bridge.map_view(&view).unwrap().objects().is_empty());
    }
}

#[test]
fn test_polygon_add_and_remove() {
    let (bridge, _events, _) = bridge();
    let window = Arc::new(FakeWindow::default());
    let view = bridge.create_map_view(window.clone());
    let channel = Channel::MapView(view.clone());
    let polygon = id(bridge
        .dispatch(
            channel.clone(),
            "polygon#add",
            br#"{"outerRing": [{"latitude": 0, "longitude": 0}, {"latitude": 0, "longitude": 1},
                {"latitude": 1, "longitude": 1}],
                "fillColor": 4278190335, "strokeColor": 4294967295, "strokeWidth": 1.5,
                "zIndex": 2}"#,
        )
        .unwrap());
    assert!(polygon.as_str().starts_with("polygon-"));
    let (shape, style) = window.polygons.lock().unwrap()[0].clone();
    assert_eq!(shape.outer_ring.len(), 3);
    assert_eq!(style.fill_color.blue, 1.0);
    assert_eq!(style.fill_color.red, 0.0);
    assert_eq!(style.z_index, 2.0);

    let objects = bridge.map_view(&view).unwrap().objects().clone();
    assert_eq!(objects.kind(&polygon), Some(ObjectKind::Polygon));
    // Only placemarks can be updated.
    assert!(matches!(
        objects.update(&polygon, &MarkerProps::default()),
        Err(BridgeError::UnknownObject { .. })
    ));
    bridge
        .dispatch(
            channel.clone(),
            "polygon#remove",
            format!(r#"{{"id": "{polygon}"}}"#).as_bytes(),
        )
        .unwrap();
    assert!(window.object_removed(0));
    assert!(!objects.contains(&polygon));
}

#[test]
fn test_user_location_layer_is_created_once() {
    let (bridge, _events, _) = bridge();
    let window = Arc::new(FakeWindow::default());
    let view = bridge.create_map_view(window.clone());
    let channel = Channel::MapView(view);
    let first = bridge
        .dispatch(channel.clone(), "showUserLocation", br#"["defaultMarker"]"#)
        .unwrap();
    let second = bridge
        .dispatch(channel, "showUserLocation", br#"["defaultMarker"]"#)
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(window.objects.lock().unwrap().len(), 1);
}

#[test]
fn test_concurrent_user_location_keeps_one_layer() {
    for _ in 0..20 {
        let (bridge, _events, _) = bridge();
        let window = Arc::new(FakeWindow::default());
        let view = bridge.create_map_view(window.clone());
        let bridge = Arc::new(bridge);

        let shows: Vec<_> = (0..4)
            .map(|_| {
                let bridge = bridge.clone();
                let channel = Channel::MapView(view.clone());
                thread::spawn(move || {
                    bridge
                        .dispatch(channel, "showUserLocation", br#"["defaultMarker"]"#)
                        .unwrap()
                })
            })
            .collect();
        let replies: HashSet<_> = shows
            .into_iter()
            .map(|show| id(show.join().unwrap()))
            .collect();
        assert_eq!(replies.len(), 1);

        // Layers that lost the race were removed again.
        let created = window.objects.lock().unwrap().len();
        let kept = (0..created).filter(|&i| !window.object_removed(i)).count();
        assert_eq!(kept, 1);
        assert_eq!(bridge.map_view(&view).unwrap().objects().len(), 1);
    }
}

#[test]
fn test_disposing_the_view_removes_its_objects() {
    let (bridge, mut events, _) = bridge();
    let window = Arc::new(FakeWindow::default());
    let view = bridge.create_map_view(window.clone());
    let channel = Channel::MapView(view.clone());
    init_marker(&bridge, &channel, MARKER);
    init_marker(&bridge, &channel, MARKER);
    let objects = bridge.map_view(&view).unwrap().objects().clone();
    let observer = window.placemark(0).lock().unwrap().tap.clone().unwrap();

    assert!(bridge.dispose_map_view(&view));
    assert!(!bridge.dispose_map_view(&view));
    assert!(window.placemark(0).lock().unwrap().removed);
    assert!(window.placemark(1).lock().unwrap().removed);
    assert!(objects.is_empty());
    assert!(window.camera_listener.lock().unwrap().is_none());

    observer.on_tap(point(0.0, 0.0));
    assert!(drain(&mut events).is_empty());
    assert!(matches!(
        bridge.dispatch(channel, "marker#init", MARKER.as_bytes()),
        Err(BridgeError::UnknownMapView { .. })
    ));
}

#[test]
fn test_camera_events_are_continuous() {
    let (bridge, mut events, _) = bridge();
    let window = Arc::new(FakeWindow::default());
    let view = bridge.create_map_view(window.clone());
    let position = |zoom| CameraPosition {
        target: point(55.75, 37.62),
        azimuth: 0.0,
        tilt: 0.0,
        zoom,
    };
    assert!(window.gesture(position(10.0), false));
    assert!(window.gesture(position(11.0), false));
    assert!(window.gesture(position(12.0), true));

    let changes: Vec<CameraPositionChanged> = drain(&mut events)
        .iter()
        .inspect(|e| assert_eq!(e.channel, Channel::MapView(view.clone())))
        .map(|e| e.decode().unwrap())
        .collect();
    let finished: Vec<_> = changes.iter().map(|c| c.finished).collect();
    assert_eq!(finished, [false, false, true]);
    assert_eq!(changes[2].position.zoom, 12.0);
}

#[test]
fn test_move_camera_with_animation() {
    let (bridge, _events, _) = bridge();
    let window = Arc::new(FakeWindow::default());
    let view = bridge.create_map_view(window.clone());
    bridge
        .dispatch(
            Channel::MapView(view),
            "move",
            br#"{"position": {"target": {"latitude": 55.75, "longitude": 37.62},
                "azimuth": 0, "tilt": 0, "zoom": 14},
                "animation": {"duration": 250, "smooth": false}}"#,
        )
        .unwrap();
    let (position, animation) = window.moves.lock().unwrap()[0];
    assert_eq!(position.zoom, 14.0);
    assert_eq!(animation.map(|a| a.duration), Some(0.25));
}

#[test]
fn test_concurrent_markers_get_distinct_ids() {
    let (bridge, _events, _) = bridge();
    let bridge = Arc::new(bridge);
    let window = Arc::new(FakeWindow::default());
    let channel = Channel::MapView(bridge.create_map_view(window.clone()));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let bridge = bridge.clone();
            let channel = channel.clone();
            thread::spawn(move || {
                (0..50)
                    .map(|_| init_marker(&bridge, &channel, MARKER))
                    .collect::<Vec<_>>()
            })
        })
        .collect();
    let mut ids = HashSet::new();
    for handle in handles {
        for id in handle.join().unwrap() {
            assert!(ids.insert(id));
        }
    }
    assert_eq!(ids.len(), 200);
    assert_eq!(window.placemarks.lock().unwrap().len(), 200);
}

proptest! {
    #[test]
    fn test_ids_are_never_reused(removals in prop::collection::vec(any::<bool>(), 1..40)) {
        let (bridge, _events, _) = bridge();
        let window = Arc::new(FakeWindow::default());
        let channel = Channel::MapView(bridge.create_map_view(window));
        let mut seen = HashSet::new();
        for remove in removals {
            let marker = init_marker(&bridge, &channel, MARKER);
            prop_assert!(seen.insert(marker.clone()));
            if remove {
                let payload = format!(r#"{{"id": "{marker}"}}"#);
                bridge.dispatch(channel.clone(), "marker#remove", payload.as_bytes()).unwrap();
            }
        }
    }
}
