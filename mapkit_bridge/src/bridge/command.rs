//! Commands from the host, decoded once at the boundary.
//!
//! A command is identified by the channel it arrives on and its method name. Its payload is
//! decoded and validated completely in [`Command::decode`], before anything is done, so a
//! malformed command never has a partial effect.

use compact_str::{format_compact, CompactString};
use mapkit_engine::{
    Animation, BoundingBox, CameraPosition, Color, Icon, Placemark, Point, Polygon,
    PolygonStyle, SearchManagerType, SearchOptions, SearchType,
};
use serde::{de::DeserializeOwned, Deserialize};

use super::{Channel, PlacemarkProps};
use crate::codec::Codec;
use crate::error::{BridgeError, BridgeResult};
use crate::ids::{ManagerId, MapViewId, ObjectId, SessionId};

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    // Plugin
    /// Configure the engine credential. Only the first key is used.
    SetApiKey(CompactString),
    /// Create a search manager. `None` means the configured default kind.
    CreateSearchManager(Option<SearchManagerType>),
    DisposeSearchManager(ManagerId),
    /// Start a search. Without a manager the default manager is used.
    SubmitWithPoint(SubmitParams),
    CancelSearch(SessionId),
    DisposeSearch(SessionId),
    Suggest(SuggestParams),
    CancelSuggest,

    // Suggest results
    ListenSuggest,
    UnlistenSuggest,

    // Map view
    Move {
        view: MapViewId,
        params: MoveParams,
    },
    AddPolygon {
        view: MapViewId,
        params: PolygonParams,
    },
    InitMarker {
        view: MapViewId,
        params: MarkerInit,
    },
    UpdateMarker {
        view: MapViewId,
        params: MarkerUpdate,
    },
    /// Remove a placemark or polygon. Unknown ids are ignored.
    RemoveObject {
        view: MapViewId,
        id: ObjectId,
    },
    ShowUserLocation {
        view: MapViewId,
        icon: Icon,
    },

    /// A method the channel does not know.
    Unsupported {
        channel: Channel,
        method: CompactString,
    },
}

/// Checks on a decoded payload which serde cannot express.
trait Validate {
    fn validate(&self) -> Result<(), CompactString>;
}

impl Validate for CompactString {
    fn validate(&self) -> Result<(), CompactString> {
        Ok(())
    }
}

impl<T: Validate> Validate for Option<T> {
    fn validate(&self) -> Result<(), CompactString> {
        self.as_ref().map_or(Ok(()), Validate::validate)
    }
}

fn check(ok: bool, reason: &str) -> Result<(), CompactString> {
    if ok {
        Ok(())
    } else {
        Err(reason.into())
    }
}

fn check_point(point: &Point) -> Result<(), CompactString> {
    check(
        point.is_valid(),
        "coordinates must be finite and within ±90°/±180°",
    )
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitParams {
    #[serde(default)]
    pub manager_id: Option<ManagerId>,
    pub point: Point,
    #[serde(default)]
    pub zoom: Option<f32>,
    #[serde(flatten)]
    pub options: SearchOptions,
}

impl Validate for SubmitParams {
    fn validate(&self) -> Result<(), CompactString> {
        check_point(&self.point)?;
        check(self.zoom.map_or(true, f32::is_finite), "zoom must be finite")
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestParams {
    pub text: CompactString,
    /// `"geo"`, `"biz"`, or anything else for all kinds.
    #[serde(rename = "type", default)]
    pub filter: CompactString,
    #[serde(alias = "boundingBox")]
    pub window: BoundingBox,
}

impl SuggestParams {
    pub fn options(&self) -> SearchOptions {
        let search_types = match self.filter.as_str() {
            "geo" => vec![SearchType::Geo],
            "biz" => vec![SearchType::Biz],
            _ => Vec::new(),
        };
        SearchOptions {
            search_types,
            ..SearchOptions::default()
        }
    }
}

impl Validate for SuggestParams {
    fn validate(&self) -> Result<(), CompactString> {
        check(self.window.is_valid(), "invalid bounding box")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimationParams {
    /// The duration in milliseconds.
    #[serde(alias = "durationMs")]
    pub duration: u64,
    #[serde(default)]
    pub smooth: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveParams {
    pub position: CameraPosition,
    #[serde(default)]
    pub animation: Option<AnimationParams>,
}

impl MoveParams {
    pub fn animation(&self) -> Option<Animation> {
        self.animation
            .map(|a| Animation::from_millis(a.smooth, a.duration))
    }
}

impl Validate for MoveParams {
    fn validate(&self) -> Result<(), CompactString> {
        check(self.position.is_valid(), "invalid camera position")
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolygonParams {
    #[serde(alias = "points")]
    pub outer_ring: Vec<Point>,
    #[serde(default)]
    pub inner_rings: Vec<Vec<Point>>,
    pub fill_color: Color,
    pub stroke_color: Color,
    pub stroke_width: f32,
    #[serde(default)]
    pub z_index: f32,
}

impl PolygonParams {
    pub fn polygon(&self) -> Polygon {
        Polygon {
            outer_ring: self.outer_ring.clone(),
            inner_rings: self.inner_rings.clone(),
        }
    }

    pub fn style(&self) -> PolygonStyle {
        PolygonStyle {
            fill_color: self.fill_color.to_rgba(),
            stroke_color: self.stroke_color.to_rgba(),
            stroke_width: self.stroke_width,
            z_index: self.z_index,
        }
    }
}

impl Validate for PolygonParams {
    fn validate(&self) -> Result<(), CompactString> {
        check(self.outer_ring.len() >= 3, "a ring needs at least 3 points")?;
        for ring in &self.inner_rings {
            check(ring.len() >= 3, "a ring needs at least 3 points")?;
        }
        for point in self.outer_ring.iter().chain(self.inner_rings.iter().flatten()) {
            check_point(point)?;
        }
        check(
            self.stroke_width.is_finite() && self.stroke_width >= 0.0,
            "stroke width must be a non-negative number",
        )?;
        check(self.z_index.is_finite(), "z-index must be finite")
    }
}

/// Placemark properties where every field is optional. Only the fields present are applied.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MarkerProps {
    pub icon: Option<Icon>,
    pub visible: Option<bool>,
    pub draggable: Option<bool>,
    pub opacity: Option<f32>,
    pub z_index: Option<f32>,
}

impl MarkerProps {
    /// Apply the present fields to a placemark.
    pub fn apply(&self, placemark: &mut dyn Placemark) {
        if let Some(icon) = &self.icon {
            placemark.set_icon(icon);
        }
        if let Some(visible) = self.visible {
            placemark.set_visible(visible);
        }
        if let Some(draggable) = self.draggable {
            placemark.set_draggable(draggable);
        }
        if let Some(opacity) = self.opacity {
            placemark.set_opacity(opacity);
        }
        if let Some(z_index) = self.z_index {
            placemark.set_z_index(z_index);
        }
    }

    /// Record the present fields in `props`.
    pub fn record(&self, props: &mut PlacemarkProps) {
        if let Some(icon) = &self.icon {
            props.icon = Some(icon.clone());
        }
        props.visible = self.visible.unwrap_or(props.visible);
        props.draggable = self.draggable.unwrap_or(props.draggable);
        props.opacity = self.opacity.unwrap_or(props.opacity);
        props.z_index = self.z_index.unwrap_or(props.z_index);
    }
}

impl Validate for MarkerProps {
    fn validate(&self) -> Result<(), CompactString> {
        check(
            self.opacity.map_or(true, |x| (0.0..=1.0).contains(&x)),
            "opacity must be within 0..=1",
        )?;
        check(
            self.z_index.map_or(true, f32::is_finite),
            "z-index must be finite",
        )
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerInit {
    pub point: Point,
    #[serde(flatten)]
    pub props: MarkerProps,
}

impl Validate for MarkerInit {
    fn validate(&self) -> Result<(), CompactString> {
        check_point(&self.point)?;
        self.props.validate()
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerUpdate {
    pub id: ObjectId,
    #[serde(flatten)]
    pub props: MarkerProps,
}

impl Validate for MarkerUpdate {
    fn validate(&self) -> Result<(), CompactString> {
        self.props.validate()
    }
}

#[derive(Deserialize)]
struct ObjectRef {
    id: ObjectId,
}

impl Validate for ObjectRef {
    fn validate(&self) -> Result<(), CompactString> {
        Ok(())
    }
}

macro_rules! no_validation {
    ($($ty:ty),*) => {
        $(impl Validate for $ty {
            fn validate(&self) -> Result<(), CompactString> {
                Ok(())
            }
        })*
    };
}

no_validation!(ManagerId, SessionId, Icon, ManagerKind);

/// The manager kind a host may ask for.
#[derive(Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
enum ManagerKind {
    Combined,
    Online,
    Offline,
    Default,
}

impl ManagerKind {
    fn resolve(self) -> Option<SearchManagerType> {
        match self {
            Self::Combined => Some(SearchManagerType::Combined),
            Self::Online => Some(SearchManagerType::Online),
            Self::Offline => Some(SearchManagerType::Offline),
            Self::Default => None,
        }
    }
}

/// Decode and validate the payload of `method`.
fn payload<T: DeserializeOwned + Validate>(
    codec: &Codec,
    method: &str,
    payload: &[u8],
) -> BridgeResult<T> {
    let malformed = |reason: CompactString| BridgeError::MalformedPayload {
        method: method.into(),
        reason,
    };
    let value: T = codec
        .decode(payload)
        .map_err(|e| malformed(format_compact!("{e}")))?;
    value.validate().map_err(malformed)?;
    Ok(value)
}

impl Command {
    pub fn decode(
        codec: &Codec,
        channel: Channel,
        method: &str,
        bytes: &[u8],
    ) -> BridgeResult<Self> {
        Ok(match (channel, method) {
            (Channel::Plugin, "setApiKey") => Self::SetApiKey(payload(codec, method, bytes)?),
            (Channel::Plugin, "createSearchManager") => {
                let kind: Option<ManagerKind> = payload(codec, method, bytes)?;
                Self::CreateSearchManager(kind.and_then(ManagerKind::resolve))
            }
            (Channel::Plugin, "disposeSearchManager") => {
                Self::DisposeSearchManager(payload(codec, method, bytes)?)
            }
            (Channel::Plugin, "submitWithPoint") => {
                Self::SubmitWithPoint(payload(codec, method, bytes)?)
            }
            // The single manager variant of the API: always the default manager.
            (Channel::Plugin, "search#withPoint") => Self::SubmitWithPoint(SubmitParams {
                manager_id: None,
                ..payload::<SubmitParams>(codec, method, bytes)?
            }),
            (Channel::Plugin, "cancel") => Self::CancelSearch(payload(codec, method, bytes)?),
            (Channel::Plugin, "dispose") => Self::DisposeSearch(payload(codec, method, bytes)?),
            (Channel::Plugin, "suggest") => Self::Suggest(payload(codec, method, bytes)?),
            (Channel::Plugin, "cancelSuggest") => Self::CancelSuggest,

            (Channel::SearchSession(id), "cancel") => Self::CancelSearch(id),
            (Channel::SearchSession(id), "dispose") => Self::DisposeSearch(id),

            (Channel::SuggestResults, "listen") => Self::ListenSuggest,
            (Channel::SuggestResults, "cancel") => Self::UnlistenSuggest,

            (Channel::MapView(view), "move") => Self::Move {
                view,
                params: payload(codec, method, bytes)?,
            },
            (Channel::MapView(view), "polygon#add") => Self::AddPolygon {
                view,
                params: payload(codec, method, bytes)?,
            },
            (Channel::MapView(view), "marker#init") => Self::InitMarker {
                view,
                params: payload(codec, method, bytes)?,
            },
            (Channel::MapView(view), "marker#update") => Self::UpdateMarker {
                view,
                params: payload(codec, method, bytes)?,
            },
            (Channel::MapView(view), "marker#remove" | "polygon#remove") => Self::RemoveObject {
                view,
                id: payload::<ObjectRef>(codec, method, bytes)?.id,
            },
            (Channel::MapView(view), "showUserLocation") => Self::ShowUserLocation {
                view,
                icon: payload(codec, method, bytes)?,
            },

            (channel, method) => Self::Unsupported {
                channel,
                method: method.into(),
            },
        })
    }
}
