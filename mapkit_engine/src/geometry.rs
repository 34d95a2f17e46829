//! Geometry and style values exchanged with the map engine.

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// A point on the map.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Point {
    /// The latitude in decimal degrees.
    pub latitude: f64,
    /// The longitude in decimal degrees.
    pub longitude: f64,
}

impl Point {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Whether the coordinates are finite and within the valid degree ranges.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// An area on the map given by two corners.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub north_east: Point,
    pub south_west: Point,
}

impl BoundingBox {
    pub fn is_valid(&self) -> bool {
        self.north_east.is_valid()
            && self.south_west.is_valid()
            && self.south_west.latitude <= self.north_east.latitude
    }
}

/// The position of the camera looking at the map.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraPosition {
    /// The point the camera is centered on.
    pub target: Point,
    /// Angle in degrees between the direction the camera faces and north, clockwise.
    pub azimuth: f32,
    /// Camera tilt in degrees. 0 means looking straight down.
    pub tilt: f32,
    pub zoom: f32,
}

impl CameraPosition {
    pub fn is_valid(&self) -> bool {
        self.target.is_valid()
            && self.azimuth.is_finite()
            && self.tilt.is_finite()
            && self.zoom.is_finite()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AnimationKind {
    Smooth,
    Linear,
}

/// An animated camera movement.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Animation {
    pub kind: AnimationKind,
    /// The duration in seconds.
    pub duration: f32,
}

impl Animation {
    pub fn from_millis(smooth: bool, millis: u64) -> Self {
        Self {
            kind: if smooth {
                AnimationKind::Smooth
            } else {
                AnimationKind::Linear
            },
            duration: millis as f32 / 1000.0,
        }
    }
}

/// A closed ring of points.
pub type LinearRing = Vec<Point>;

/// A polygon with an outer boundary and optional holes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Polygon {
    pub outer_ring: LinearRing,
    #[serde(default)]
    pub inner_rings: Vec<LinearRing>,
}

/// A color with every channel normalized to `0.0..=1.0`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rgba {
    pub red: f32,
    pub green: f32,
    pub blue: f32,
    pub alpha: f32,
}

/// A color packed as `0xAARRGGBB`.
///
/// On the wire a color is a single integer. Hosts with signed 32 bit integers send colors with
/// the alpha high bit set as negative numbers, so both signed and unsigned 32 bit values are
/// accepted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u32")]
pub struct Color(u32);

#[derive(Clone, Debug, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("Color value {_0} does not fit in 32 bits")]
pub struct ColorOutOfRange(#[error(not(source))] pub i64);

impl Color {
    pub const fn from_argb(argb: u32) -> Self {
        Self(argb)
    }

    pub const fn argb(self) -> u32 {
        self.0
    }

    /// Split the color into channels, each divided by 255.
    pub fn to_rgba(self) -> Rgba {
        let channel = |shift: u32| ((self.0 >> shift) & 0xFF) as f32 / 255.0;
        Rgba {
            alpha: channel(24),
            red: channel(16),
            green: channel(8),
            blue: channel(0),
        }
    }
}

impl TryFrom<i64> for Color {
    type Error = ColorOutOfRange;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if (i64::from(i32::MIN)..=i64::from(u32::MAX)).contains(&value) {
            Ok(Self(value as u32))
        } else {
            Err(ColorOutOfRange(value))
        }
    }
}

impl From<Color> for u32 {
    fn from(color: Color) -> Self {
        color.0
    }
}

/// The style of a polygon as handed to the engine.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolygonStyle {
    pub fill_color: Rgba,
    pub stroke_color: Rgba,
    pub stroke_width: f32,
    pub z_index: f32,
}

/// A localized distance, as returned with suggestions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Distance {
    /// The distance in meters.
    pub value: f64,
    /// A human readable form, e.g. "1.2 km".
    pub text: CompactString,
}
